//! PostgreSQL-backed `DashboardRepository` implementation.
//!
//! The aggregate is stored one row per user and replaced wholesale on each
//! recalculation.

use std::collections::BTreeMap;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::warn;

use crate::domain::ports::{DashboardRepository, DashboardRepositoryError};
use crate::domain::{DashboardSnapshot, UserId};

use super::diesel_basic_error_mapping::{
    map_basic_diesel_error, map_basic_pool_error, to_i64, to_u64,
};
use super::models::DashboardRow;
use super::pool::{DbPool, PoolError};
use super::schema::user_dashboard_data;

/// Diesel-backed implementation of the `DashboardRepository` port.
#[derive(Clone)]
pub struct DieselDashboardRepository {
    pool: DbPool,
}

impl DieselDashboardRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> DashboardRepositoryError {
    map_basic_pool_error(error, DashboardRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> DashboardRepositoryError {
    map_basic_diesel_error(
        error,
        DashboardRepositoryError::query,
        DashboardRepositoryError::connection,
    )
}

fn row_to_snapshot(row: DashboardRow) -> DashboardSnapshot {
    let requests_by_category: BTreeMap<String, u64> =
        serde_json::from_value(row.requests_by_category).unwrap_or_else(|err| {
            warn!(user_id = %row.user_id, error = %err, "discarding malformed category counts");
            BTreeMap::new()
        });
    DashboardSnapshot {
        total_requests: to_u64(row.total_requests),
        total_tokens_used: to_u64(row.total_tokens_used),
        total_cost_cents: to_u64(row.total_cost_cents),
        average_response_time_ms: row.average_response_time_ms,
        requests_by_category,
        requests_this_month: to_u64(row.requests_this_month),
        requests_today: to_u64(row.requests_today),
        last_calculated_at: row.last_calculated_at,
    }
}

fn snapshot_to_row(user_id: &UserId, snapshot: &DashboardSnapshot) -> DashboardRow {
    let requests_by_category = snapshot
        .requests_by_category
        .iter()
        .map(|(category, count)| (category.clone(), serde_json::Value::from(*count)))
        .collect::<serde_json::Map<_, _>>();
    DashboardRow {
        user_id: *user_id.as_uuid(),
        total_requests: to_i64(snapshot.total_requests),
        total_tokens_used: to_i64(snapshot.total_tokens_used),
        total_cost_cents: to_i64(snapshot.total_cost_cents),
        average_response_time_ms: snapshot.average_response_time_ms,
        requests_by_category: serde_json::Value::Object(requests_by_category),
        requests_this_month: to_i64(snapshot.requests_this_month),
        requests_today: to_i64(snapshot.requests_today),
        last_calculated_at: snapshot.last_calculated_at,
    }
}

#[async_trait]
impl DashboardRepository for DieselDashboardRepository {
    async fn find(
        &self,
        user_id: &UserId,
    ) -> Result<Option<DashboardSnapshot>, DashboardRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<DashboardRow> = user_dashboard_data::table
            .filter(user_dashboard_data::user_id.eq(user_id.as_uuid()))
            .select(DashboardRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(row_to_snapshot))
    }

    async fn upsert(
        &self,
        user_id: &UserId,
        snapshot: &DashboardSnapshot,
    ) -> Result<(), DashboardRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = snapshot_to_row(user_id, snapshot);
        diesel::insert_into(user_dashboard_data::table)
            .values(&row)
            .on_conflict(user_dashboard_data::user_id)
            .do_update()
            .set(&row)
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }
}
