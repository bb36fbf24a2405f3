//! Clients for the services an order depends on.
//!
//! Every remote call goes through a [`GuardedClient`], which combines the
//! dependency's circuit breaker, its retry policy and a hard per-call
//! timeout. The wire protocol sits behind the [`UserTransport`] and
//! [`ProductTransport`] traits so tests can swap in scripted fakes.

pub mod error;
pub mod fake;
pub mod guarded;
pub mod http;
pub mod product;
pub mod transport;
pub mod user;

pub use error::{ClientError, UnavailableCause};
pub use fake::{InMemoryProductService, InMemoryUserService};
pub use guarded::GuardedClient;
pub use http::{HttpProductTransport, HttpUserTransport};
pub use product::ProductClient;
pub use transport::{ProductDetails, ProductTransport, UserTransport};
pub use user::UserClient;
