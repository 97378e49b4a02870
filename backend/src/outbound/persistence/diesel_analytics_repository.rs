//! PostgreSQL-backed `AnalyticsRepository` implementation.

use async_trait::async_trait;
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::domain::ports::{AnalyticsRepository, AnalyticsRepositoryError};
use crate::domain::{PerformanceSample, RequestAnalytic, UserId, UserRating};

use super::diesel_basic_error_mapping::{
    map_basic_diesel_error, map_basic_pool_error, to_i32, to_u32, to_u64,
};
use super::models::NewRequestAnalyticRow;
use super::pool::{DbPool, PoolError};
use super::schema::request_analytics;

/// Diesel-backed implementation of the `AnalyticsRepository` port.
#[derive(Clone)]
pub struct DieselAnalyticsRepository {
    pool: DbPool,
}

impl DieselAnalyticsRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> AnalyticsRepositoryError {
    map_basic_pool_error(error, AnalyticsRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> AnalyticsRepositoryError {
    map_basic_diesel_error(
        error,
        AnalyticsRepositoryError::query,
        AnalyticsRepositoryError::connection,
    )
}

fn row_to_sample(
    (response_time_ms, was_successful, user_rating): (Option<i32>, bool, Option<i16>),
) -> PerformanceSample {
    PerformanceSample {
        response_time_ms: response_time_ms.map(to_u32),
        was_successful,
        user_rating: user_rating
            .and_then(|value| u8::try_from(value).ok())
            .and_then(UserRating::new),
    }
}

#[async_trait]
impl AnalyticsRepository for DieselAnalyticsRepository {
    async fn record(&self, analytic: &RequestAnalytic) -> Result<(), AnalyticsRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = NewRequestAnalyticRow {
            id: analytic.id,
            user_id: *analytic.user_id.as_uuid(),
            request_id: *analytic.request_id.as_uuid(),
            request_type: analytic.request_type.as_str(),
            category: analytic.category.as_deref(),
            complexity: analytic.complexity.as_str(),
            response_time_ms: analytic.response_time_ms.map(to_i32),
            tokens_input: analytic.tokens_input.map(to_i32),
            tokens_output: analytic.tokens_output.map(to_i32),
            user_rating: analytic
                .user_rating
                .map(|rating| i16::from(UserRating::value(rating))),
            was_successful: analytic.was_successful,
            created_at: analytic.created_at,
        };
        diesel::insert_into(request_analytics::table)
            .values(&row)
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn category_counts(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<(Option<String>, u64)>, AnalyticsRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<(Option<String>, i64)> = request_analytics::table
            .filter(request_analytics::user_id.eq(user_id.as_uuid()))
            .group_by(request_analytics::category)
            .select((request_analytics::category, count_star()))
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(rows
            .into_iter()
            .map(|(category, count)| (category, to_u64(count)))
            .collect())
    }

    async fn performance_samples(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<PerformanceSample>, AnalyticsRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<(Option<i32>, bool, Option<i16>)> = request_analytics::table
            .filter(request_analytics::user_id.eq(user_id.as_uuid()))
            .select((
                request_analytics::response_time_ms,
                request_analytics::was_successful,
                request_analytics::user_rating,
            ))
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(rows.into_iter().map(row_to_sample).collect())
    }
}
