//! Port for per-user variables.

use async_trait::async_trait;

use crate::domain::{Error, UserId, UserVariable, VariableKey};

use super::define_port_error;

define_port_error! {
    /// Errors raised by user variable adapters.
    pub enum UserVariableRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "variable repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "variable repository query failed: {message}",
    }
}

/// Port for storing variables keyed by `(user, key)`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserVariableRepository: Send + Sync {
    /// Every variable the user owns, ordered by key.
    async fn list_variables(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<UserVariable>, UserVariableRepositoryError>;

    /// One variable by key.
    async fn find_variable(
        &self,
        user_id: &UserId,
        key: &VariableKey,
    ) -> Result<Option<UserVariable>, UserVariableRepositoryError>;

    /// Insert the variable, or overwrite the value, description, visibility,
    /// and `updated_at` of the one already stored under its key. Returns the
    /// stored row.
    async fn save_variable(
        &self,
        variable: &UserVariable,
    ) -> Result<UserVariable, UserVariableRepositoryError>;

    /// Remove a variable. Returns `false` when nothing was stored.
    async fn delete_variable(
        &self,
        user_id: &UserId,
        key: &VariableKey,
    ) -> Result<bool, UserVariableRepositoryError>;
}

impl From<UserVariableRepositoryError> for Error {
    fn from(err: UserVariableRepositoryError) -> Self {
        match err {
            UserVariableRepositoryError::Connection { message } => {
                Error::service_unavailable(format!("variable repository unavailable: {message}"))
            }
            UserVariableRepositoryError::Query { message } => {
                Error::internal(format!("variable repository error: {message}"))
            }
        }
    }
}
