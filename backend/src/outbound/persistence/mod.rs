//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! Each repository implements one domain port over `diesel-async` with `bb8`
//! pooling. Row structs (`models.rs`) and table definitions (`schema.rs`) stay
//! private to this module; adapters translate them into domain types and map
//! every database failure into the port's error enum.
//!
//! # Example
//!
//! ```no_run
//! use forge_backend::outbound::persistence::{DbPool, DieselUserRepository, PoolConfig};
//!
//! # async fn wire() -> Result<(), forge_backend::outbound::persistence::PoolError> {
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/forge")).await?;
//! let users = DieselUserRepository::new(pool);
//! # let _ = users;
//! # Ok(())
//! # }
//! ```

mod diesel_analytics_repository;
mod diesel_basic_error_mapping;
mod diesel_chat_request_repository;
mod diesel_dashboard_repository;
mod diesel_plan_repository;
mod diesel_user_repository;
mod diesel_user_variable_repository;
mod migrations;
mod models;
mod pool;
mod schema;

pub use diesel_analytics_repository::DieselAnalyticsRepository;
pub use diesel_chat_request_repository::DieselChatRequestRepository;
pub use diesel_dashboard_repository::DieselDashboardRepository;
pub use diesel_plan_repository::DieselPlanRepository;
pub use diesel_user_repository::DieselUserRepository;
pub use diesel_user_variable_repository::DieselUserVariableRepository;
pub use migrations::{MigrationError, apply_migrations};
pub use pool::{DbPool, PoolConfig, PoolError};
