//! Port abstraction for user persistence adapters and their errors.
//!
//! Besides plain lookups the port owns the credit counters: deductions are
//! conditional so two concurrent generations cannot both take the last
//! credit.
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{CreditBalance, CreditDeduction, EmailAddress, Error, User, UserId};

use super::define_port_error;

define_port_error! {
    /// Persistence errors raised by user repository adapters.
    pub enum UserPersistenceError {
        /// Repository connection could not be established.
        Connection { message: String } => "user repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "user repository query failed: {message}",
        /// Another account already uses this email address.
        DuplicateEmail { email: String } => "user with email {email} already exists",
    }
}

/// Port for user accounts and their credit counters.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fetch a user by identifier.
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserPersistenceError>;

    /// Fetch a user by normalised email address.
    async fn find_by_email(
        &self,
        email: &EmailAddress,
    ) -> Result<Option<User>, UserPersistenceError>;

    /// Insert a new user.
    async fn insert(&self, user: &User) -> Result<(), UserPersistenceError>;

    /// Stamp `last_login_at` and re-activate the account.
    async fn record_login(
        &self,
        id: &UserId,
        at: DateTime<Utc>,
    ) -> Result<Option<User>, UserPersistenceError>;

    /// Take one credit only while `used < limit`.
    async fn deduct_credit(&self, id: &UserId) -> Result<CreditDeduction, UserPersistenceError>;

    /// Raise the credit limit by `amount`.
    async fn add_credits(
        &self,
        id: &UserId,
        amount: u32,
    ) -> Result<Option<CreditBalance>, UserPersistenceError>;

    /// Clear the usage counter.
    async fn reset_credits(
        &self,
        id: &UserId,
    ) -> Result<Option<CreditBalance>, UserPersistenceError>;
}

impl From<UserPersistenceError> for Error {
    fn from(err: UserPersistenceError) -> Self {
        match err {
            UserPersistenceError::Connection { message } => {
                Error::service_unavailable(format!("user repository unavailable: {message}"))
            }
            UserPersistenceError::Query { message } => {
                Error::internal(format!("user repository error: {message}"))
            }
            UserPersistenceError::DuplicateEmail { email } => {
                Error::conflict(format!("user with email {email} already exists"))
            }
        }
    }
}
