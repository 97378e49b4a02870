//! Port for the cached dashboard aggregate.

use async_trait::async_trait;

use crate::domain::{DashboardSnapshot, Error, UserId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by dashboard cache adapters.
    pub enum DashboardRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "dashboard repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "dashboard repository query failed: {message}",
    }
}

/// Port for the per-user dashboard snapshot.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DashboardRepository: Send + Sync {
    /// Cached snapshot, if one was calculated.
    async fn find(
        &self,
        user_id: &UserId,
    ) -> Result<Option<DashboardSnapshot>, DashboardRepositoryError>;

    /// Insert or replace the snapshot.
    async fn upsert(
        &self,
        user_id: &UserId,
        snapshot: &DashboardSnapshot,
    ) -> Result<(), DashboardRepositoryError>;
}

impl From<DashboardRepositoryError> for Error {
    fn from(err: DashboardRepositoryError) -> Self {
        match err {
            DashboardRepositoryError::Connection { message } => {
                Error::service_unavailable(format!("dashboard repository unavailable: {message}"))
            }
            DashboardRepositoryError::Query { message } => {
                Error::internal(format!("dashboard repository error: {message}"))
            }
        }
    }
}
