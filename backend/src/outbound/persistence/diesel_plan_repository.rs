//! PostgreSQL-backed `PlanRepository` implementation.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt as _;
use diesel_async::{AsyncConnection as _, RunQueryDsl};
use uuid::Uuid;

use crate::domain::ports::{PlanRepository, PlanRepositoryError};
use crate::domain::{BillingCycle, UserId, UserPlan};

use super::diesel_basic_error_mapping::{
    map_basic_diesel_error, map_basic_pool_error, to_i32, to_u32,
};
use super::models::{NewUserPlanRow, UserPlanRow};
use super::pool::{DbPool, PoolError};
use super::schema::user_plans;

/// Diesel-backed implementation of the `PlanRepository` port.
#[derive(Clone)]
pub struct DieselPlanRepository {
    pool: DbPool,
}

impl DieselPlanRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> PlanRepositoryError {
    map_basic_pool_error(error, PlanRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> PlanRepositoryError {
    map_basic_diesel_error(
        error,
        PlanRepositoryError::query,
        PlanRepositoryError::connection,
    )
}

fn row_to_plan(row: UserPlanRow) -> UserPlan {
    UserPlan {
        plan_name: row.plan_name,
        monthly_requests: to_u32(row.monthly_requests),
        daily_requests: to_u32(row.daily_requests),
        max_tokens_per_request: to_u32(row.max_tokens_per_request),
        features: row.features,
        is_active: row.is_active,
        price_per_month_cents: to_u32(row.price_per_month_cents),
        billing_cycle: BillingCycle::parse_or_monthly(&row.billing_cycle),
        starts_at: row.starts_at,
        expires_at: row.expires_at,
    }
}

/// Insertable row for `plan`. The row is stamped with the plan's start so
/// the audit column follows the service clock.
fn plan_to_row(id: Uuid, owner: Uuid, plan: &UserPlan) -> NewUserPlanRow<'_> {
    NewUserPlanRow {
        id,
        user_id: owner,
        plan_name: &plan.plan_name,
        monthly_requests: to_i32(plan.monthly_requests),
        daily_requests: to_i32(plan.daily_requests),
        max_tokens_per_request: to_i32(plan.max_tokens_per_request),
        features: &plan.features,
        is_active: true,
        price_per_month_cents: to_i32(plan.price_per_month_cents),
        billing_cycle: plan.billing_cycle.as_str(),
        starts_at: plan.starts_at,
        expires_at: plan.expires_at,
        created_at: plan.starts_at,
    }
}

#[async_trait]
impl PlanRepository for DieselPlanRepository {
    async fn active_plan(&self, user_id: &UserId) -> Result<Option<UserPlan>, PlanRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<UserPlanRow> = user_plans::table
            .filter(user_plans::user_id.eq(user_id.as_uuid()))
            .filter(user_plans::is_active.eq(true))
            .order(user_plans::starts_at.desc())
            .select(UserPlanRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(row_to_plan))
    }

    async fn activate(&self, user_id: &UserId, plan: &UserPlan) -> Result<(), PlanRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let owner = *user_id.as_uuid();
        let row = plan_to_row(Uuid::new_v4(), owner, plan);

        conn.transaction(|conn| {
            async move {
                diesel::update(
                    user_plans::table
                        .filter(user_plans::user_id.eq(owner))
                        .filter(user_plans::is_active.eq(true)),
                )
                .set(user_plans::is_active.eq(false))
                .execute(conn)
                .await?;
                diesel::insert_into(user_plans::table)
                    .values(&row)
                    .execute(conn)
                    .await?;
                Ok::<_, diesel::result::Error>(())
            }
            .scope_boxed()
        })
        .await
        .map_err(map_diesel_error)
    }
}
