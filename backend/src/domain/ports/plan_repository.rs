//! Port for subscription plans.

use async_trait::async_trait;

use crate::domain::{Error, UserId, UserPlan};

use super::define_port_error;

define_port_error! {
    /// Errors raised by plan repository adapters.
    pub enum PlanRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "plan repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "plan repository query failed: {message}",
    }
}

/// Port for reading and switching a user's active plan.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlanRepository: Send + Sync {
    /// The user's single active plan, if any.
    async fn active_plan(&self, user_id: &UserId) -> Result<Option<UserPlan>, PlanRepositoryError>;

    /// Deactivate the current plan and store `plan` as active, atomically.
    async fn activate(&self, user_id: &UserId, plan: &UserPlan) -> Result<(), PlanRepositoryError>;
}

impl From<PlanRepositoryError> for Error {
    fn from(err: PlanRepositoryError) -> Self {
        match err {
            PlanRepositoryError::Connection { message } => {
                Error::service_unavailable(format!("plan repository unavailable: {message}"))
            }
            PlanRepositoryError::Query { message } => {
                Error::internal(format!("plan repository error: {message}"))
            }
        }
    }
}
