//! Port for request analytics samples.

use async_trait::async_trait;

use crate::domain::{Error, PerformanceSample, RequestAnalytic, UserId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by analytics repository adapters.
    pub enum AnalyticsRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "analytics repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "analytics repository query failed: {message}",
    }
}

/// Port for storing analytics and reading them back in aggregate form.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnalyticsRepository: Send + Sync {
    /// Store one sample.
    async fn record(&self, analytic: &RequestAnalytic) -> Result<(), AnalyticsRepositoryError>;

    /// Sample counts per category; `None` is an uncategorised group.
    async fn category_counts(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<(Option<String>, u64)>, AnalyticsRepositoryError>;

    /// Response time, outcome, and rating of every sample the user has.
    async fn performance_samples(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<PerformanceSample>, AnalyticsRepositoryError>;
}

impl From<AnalyticsRepositoryError> for Error {
    fn from(err: AnalyticsRepositoryError) -> Self {
        match err {
            AnalyticsRepositoryError::Connection { message } => {
                Error::service_unavailable(format!("analytics repository unavailable: {message}"))
            }
            AnalyticsRepositoryError::Query { message } => {
                Error::internal(format!("analytics repository error: {message}"))
            }
        }
    }
}
