//! PostgreSQL-backed `UserRepository` implementation using Diesel ORM.
//!
//! Credit mutations are single `UPDATE ... RETURNING` statements, so the
//! `requests_used < requests_limit` guard is evaluated by PostgreSQL under
//! the row lock and concurrent deductions cannot overshoot the limit.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::warn;

use crate::domain::ports::{UserPersistenceError, UserRepository};
use crate::domain::{CreditBalance, CreditDeduction, EmailAddress, PlanTier, User, UserId};

use super::diesel_basic_error_mapping::{
    is_unique_violation, map_basic_diesel_error, map_basic_pool_error, to_i32, to_u32,
};
use super::models::{NewUserRow, UserRow};
use super::pool::{DbPool, PoolError};
use super::schema::users;

diesel::define_sql_function! {
    /// PostgreSQL `LEAST` over two integers.
    fn least(a: diesel::sql_types::Integer, b: diesel::sql_types::Integer) -> diesel::sql_types::Integer;
}

/// Diesel-backed implementation of the `UserRepository` port.
#[derive(Clone)]
pub struct DieselUserRepository {
    pool: DbPool,
}

impl DieselUserRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> UserPersistenceError {
    map_basic_pool_error(error, UserPersistenceError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> UserPersistenceError {
    map_basic_diesel_error(
        error,
        UserPersistenceError::query,
        UserPersistenceError::connection,
    )
}

fn row_to_user(row: UserRow) -> Result<User, UserPersistenceError> {
    let email = EmailAddress::new(&row.email)
        .map_err(|err| UserPersistenceError::query(format!("stored email is invalid: {err}")))?;
    let plan = PlanTier::parse(&row.plan).unwrap_or_else(|| {
        warn!(
            value = row.plan.as_str(),
            user_id = %row.id,
            "unrecognised plan tier, defaulting to free"
        );
        PlanTier::Free
    });
    Ok(User {
        id: UserId::from_uuid(row.id),
        email,
        name: row.name,
        image: row.image,
        github_id: row.github_id,
        plan,
        plan_expires_at: row.plan_expires_at,
        credits: CreditBalance::new(to_u32(row.requests_used), to_u32(row.requests_limit)),
        is_active: row.is_active,
        last_login_at: row.last_login_at,
        created_at: row.created_at,
    })
}

fn balance_from((used, limit): (i32, i32)) -> CreditBalance {
    CreditBalance::new(to_u32(used), to_u32(limit))
}

#[async_trait]
impl UserRepository for DieselUserRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserPersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<UserRow> = users::table
            .filter(users::id.eq(id.as_uuid()))
            .select(UserRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(row_to_user).transpose()
    }

    async fn find_by_email(
        &self,
        email: &EmailAddress,
    ) -> Result<Option<User>, UserPersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<UserRow> = users::table
            .filter(users::email.eq(email.as_ref()))
            .select(UserRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(row_to_user).transpose()
    }

    async fn insert(&self, user: &User) -> Result<(), UserPersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = NewUserRow {
            id: *user.id.as_uuid(),
            email: user.email.as_ref(),
            name: user.name.as_deref(),
            image: user.image.as_deref(),
            github_id: user.github_id.as_deref(),
            plan: user.plan.as_str(),
            plan_expires_at: user.plan_expires_at,
            requests_used: to_i32(user.credits.used()),
            requests_limit: to_i32(user.credits.limit()),
            is_active: user.is_active,
            last_login_at: user.last_login_at,
            created_at: user.created_at,
            updated_at: user.created_at,
        };
        diesel::insert_into(users::table)
            .values(&row)
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(|err| {
                if is_unique_violation(&err) {
                    UserPersistenceError::duplicate_email(user.email.to_string())
                } else {
                    map_diesel_error(err)
                }
            })
    }

    async fn record_login(
        &self,
        id: &UserId,
        at: DateTime<Utc>,
    ) -> Result<Option<User>, UserPersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<UserRow> = diesel::update(users::table.filter(users::id.eq(id.as_uuid())))
            .set((
                users::last_login_at.eq(Some(at)),
                users::is_active.eq(true),
                users::updated_at.eq(at),
            ))
            .returning(UserRow::as_returning())
            .get_result(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(row_to_user).transpose()
    }

    async fn deduct_credit(&self, id: &UserId) -> Result<CreditDeduction, UserPersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let counters: Option<(i32, i32)> = diesel::update(
            users::table
                .filter(users::id.eq(id.as_uuid()))
                .filter(users::requests_used.lt(users::requests_limit)),
        )
        .set((
            users::requests_used.eq(users::requests_used + 1),
            users::updated_at.eq(diesel::dsl::now),
        ))
        .returning((users::requests_used, users::requests_limit))
        .get_result(&mut conn)
        .await
        .optional()
        .map_err(map_diesel_error)?;
        Ok(counters.map_or(CreditDeduction::Exhausted, |counters| {
            CreditDeduction::Applied(balance_from(counters))
        }))
    }

    async fn add_credits(
        &self,
        id: &UserId,
        amount: u32,
    ) -> Result<Option<CreditBalance>, UserPersistenceError> {
        let amount = to_i32(amount);
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        // Saturate at the column maximum instead of overflowing it.
        let counters: Option<(i32, i32)> =
            diesel::update(users::table.filter(users::id.eq(id.as_uuid())))
                .set((
                    users::requests_limit
                        .eq(least(users::requests_limit, i32::MAX - amount) + amount),
                    users::updated_at.eq(diesel::dsl::now),
                ))
                .returning((users::requests_used, users::requests_limit))
                .get_result(&mut conn)
                .await
                .optional()
                .map_err(map_diesel_error)?;
        Ok(counters.map(balance_from))
    }

    async fn reset_credits(
        &self,
        id: &UserId,
    ) -> Result<Option<CreditBalance>, UserPersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let counters: Option<(i32, i32)> =
            diesel::update(users::table.filter(users::id.eq(id.as_uuid())))
                .set((
                    users::requests_used.eq(0),
                    users::updated_at.eq(diesel::dsl::now),
                ))
                .returning((users::requests_used, users::requests_limit))
                .get_result(&mut conn)
                .await
                .optional()
                .map_err(map_diesel_error)?;
        Ok(counters.map(balance_from))
    }
}
