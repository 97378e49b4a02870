//! Port for persisted chat requests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{ChatRequest, ChatRequestId, ChatRequestUpdate, Error, NewChatRequest, UserId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by chat request repository adapters.
    pub enum ChatRequestRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "chat request repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "chat request repository query failed: {message}",
    }
}

/// Port for creating, finishing, and listing chat requests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatRequestRepository: Send + Sync {
    /// Insert a pending request.
    async fn create(&self, request: &NewChatRequest) -> Result<(), ChatRequestRepositoryError>;

    /// Fetch a request owned by `user_id`.
    async fn find_for_user(
        &self,
        user_id: &UserId,
        id: ChatRequestId,
    ) -> Result<Option<ChatRequest>, ChatRequestRepositoryError>;

    /// Apply a terminal update to a request that is still pending.
    ///
    /// Returns `None` when the request is missing or already terminal.
    async fn finish(
        &self,
        id: ChatRequestId,
        update: &ChatRequestUpdate,
    ) -> Result<Option<ChatRequest>, ChatRequestRepositoryError>;

    /// Requests started at or after `since`, or all of them.
    async fn list_since(
        &self,
        user_id: &UserId,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ChatRequest>, ChatRequestRepositoryError>;

    /// Count requests created at or after `since`.
    async fn count_since(
        &self,
        user_id: &UserId,
        since: DateTime<Utc>,
    ) -> Result<u64, ChatRequestRepositoryError>;
}

impl From<ChatRequestRepositoryError> for Error {
    fn from(err: ChatRequestRepositoryError) -> Self {
        match err {
            ChatRequestRepositoryError::Connection { message } => Error::service_unavailable(
                format!("chat request repository unavailable: {message}"),
            ),
            ChatRequestRepositoryError::Query { message } => {
                Error::internal(format!("chat request repository error: {message}"))
            }
        }
    }
}
