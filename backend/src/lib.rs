//! Contract Forge backend library.
//!
//! Hexagonal layout: [`domain`] holds the accounting rules and services,
//! [`inbound`] the Actix HTTP adapter, and [`outbound`] the persistence and
//! in-memory adapters behind the domain ports.

pub mod doc;
pub mod domain;
pub mod inbound;
pub mod middleware;
pub mod outbound;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

/// Public OpenAPI surface used by Swagger UI and tooling.
pub use doc::ApiDoc;
pub use domain::TraceId;
pub use middleware::Trace;
