//! API server entry point.

use std::sync::Arc;

use api::config::Config;
use api::state::{AppState, Publisher, SharedEventLog};
use clients::{HttpProductTransport, HttpUserTransport};
use event_log::{InMemoryEventLog, PostgresEventLog};
use inventory::{
    ConsumerConfig, InMemoryInventoryStore, InventoryReconciler, InventoryStore,
    PostgresInventoryStore, spawn_consumers,
};
use orders::PublishError;
use resilience::RetryPolicy;
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Opens the event log and inventory store, in PostgreSQL when configured.
async fn open_storage(config: &Config) -> (SharedEventLog, Arc<dyn InventoryStore>) {
    let Some(url) = &config.database_url else {
        tracing::warn!("DATABASE_URL not set, event log and inventory are in memory");
        return (
            Arc::new(InMemoryEventLog::new(config.event_log_partitions)),
            Arc::new(InMemoryInventoryStore::new()),
        );
    };

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await
        .expect("failed to connect to database");
    let log = PostgresEventLog::new(pool.clone(), config.event_log_partitions);
    log.run_migrations().await.expect("migrations failed");

    (Arc::new(log), Arc::new(PostgresInventoryStore::new(pool)))
}

/// Retries undelivered lifecycle events until shutdown.
fn spawn_outbox_flusher(
    publisher: Publisher,
    interval: std::time::Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }
            match publisher.flush_pending().await {
                Ok(0) => {}
                Ok(delivered) => tracing::info!(delivered, "flushed pending lifecycle events"),
                Err(PublishError::Deferred { pending, source }) => {
                    tracing::warn!(pending, error = %source, "event log still unavailable");
                }
                Err(e) => tracing::error!(error = %e, "dropped undeliverable event"),
            }
        }
    })
}

#[tokio::main]
async fn main() {
    // 1. Load configuration
    let config = Config::from_env().expect("invalid configuration");

    // 2. Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 3. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 4. Storage, remote services and application state
    let (log, inventory) = open_storage(&config).await;
    let state = Arc::new(AppState::new(
        &config,
        Arc::new(HttpUserTransport::new(&config.user_service_url)),
        Arc::new(HttpProductTransport::new(&config.product_service_url)),
        log.clone(),
    ));

    // 5. Background tasks: reconciler consumers and outbox flush
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reconciler = Arc::new(InventoryReconciler::new(
        inventory,
        RetryPolicy::default(),
    ));
    let consumer_config = ConsumerConfig {
        group: config.reconciler_group.clone(),
        ..Default::default()
    };
    let mut tasks = spawn_consumers(log, reconciler, consumer_config, shutdown_rx.clone());
    tasks.push(spawn_outbox_flusher(
        state.publisher.clone(),
        config.outbox_flush_interval,
        shutdown_rx,
    ));

    // 6. Build the application
    let app = api::create_app(state.clone(), metrics_handle);

    // 7. Start server
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // 8. Stop background tasks and make a last delivery attempt
    let _ = shutdown_tx.send(true);
    for task in tasks {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "background task panicked");
        }
    }
    if let Err(e) = state.publisher.flush_pending().await {
        tracing::warn!(error = %e, "undelivered lifecycle events at shutdown");
    }

    tracing::info!("server shut down gracefully");
}
