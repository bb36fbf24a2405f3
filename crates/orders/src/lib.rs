//! Order creation and lifecycle management.
//!
//! [`OrderOrchestrator`] validates a request against the user and product
//! services, prices it, persists it and announces every state change on
//! the order topic through an [`EventPublisher`].
//!
//! Order creation follows these stages:
//! 1. Validate the user and the stock of every line
//! 2. Price every line from the product service
//! 3. Persist the order as PENDING
//! 4. Publish ORDER_CREATED
//! 5. Confirm the order
//!
//! Any failure before step 3 aborts the whole order with nothing persisted.

pub mod error;
pub mod orchestrator;
pub mod publisher;
pub mod request;
pub mod stage;

pub use error::{OrchestratorError, PublishError, Result};
pub use orchestrator::OrderOrchestrator;
pub use publisher::{EventPublisher, LogEventPublisher};
pub use request::{CreateOrderRequest, OrderLine};
pub use stage::CreationStage;
