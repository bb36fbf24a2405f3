//! Shared application state and its wiring.

use std::sync::Arc;

use clients::{GuardedClient, ProductClient, ProductTransport, UserClient, UserTransport};
use domain::InMemoryOrderRepository;
use event_log::EventLog;
use orders::{LogEventPublisher, OrderOrchestrator};
use resilience::HealthSnapshot;

use crate::config::{Config, PRODUCT_SERVICE, USER_SERVICE};

pub type SharedUserTransport = Arc<dyn UserTransport>;
pub type SharedProductTransport = Arc<dyn ProductTransport>;
pub type SharedEventLog = Arc<dyn EventLog>;
pub type Publisher = LogEventPublisher<SharedEventLog>;

/// Orchestrator as wired by the server.
pub type Orchestrator = OrderOrchestrator<
    InMemoryOrderRepository,
    SharedUserTransport,
    SharedProductTransport,
    Publisher,
>;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub orchestrator: Orchestrator,
    /// Handle on the orchestrator's outbox, used by the flush task.
    pub publisher: Publisher,
}

impl AppState {
    /// Wires the orchestrator with one breaker per dependency.
    pub fn new(
        config: &Config,
        users: SharedUserTransport,
        products: SharedProductTransport,
        log: SharedEventLog,
    ) -> Self {
        let publisher = LogEventPublisher::new(log);
        let orchestrator = OrderOrchestrator::new(
            InMemoryOrderRepository::new(),
            UserClient::new(
                GuardedClient::from_config(USER_SERVICE, &config.user_service),
                users,
            ),
            ProductClient::new(
                GuardedClient::from_config(PRODUCT_SERVICE, &config.product_service),
                products,
            ),
            publisher.clone(),
        );

        Self {
            orchestrator,
            publisher,
        }
    }

    /// Breaker snapshots for every guarded dependency.
    pub fn dependency_health(&self) -> Vec<HealthSnapshot> {
        vec![
            self.orchestrator.users().guard().breaker().snapshot(),
            self.orchestrator.products().guard().breaker().snapshot(),
        ]
    }
}
