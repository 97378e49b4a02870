//! PostgreSQL-backed `ChatRequestRepository` implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::warn;

use crate::domain::ports::{ChatRequestRepository, ChatRequestRepositoryError};
use crate::domain::{
    ChatRequest, ChatRequestId, ChatRequestStatus, ChatRequestUpdate, NewChatRequest,
    RequestMetrics, SessionTag, UserId,
};

use super::diesel_basic_error_mapping::{
    map_basic_diesel_error, map_basic_pool_error, to_i32, to_u32, to_u64,
};
use super::models::{ChatRequestCompletion, ChatRequestRow, NewChatRequestRow};
use super::pool::{DbPool, PoolError};
use super::schema::chat_requests;

/// Diesel-backed implementation of the `ChatRequestRepository` port.
#[derive(Clone)]
pub struct DieselChatRequestRepository {
    pool: DbPool,
}

impl DieselChatRequestRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> ChatRequestRepositoryError {
    map_basic_pool_error(error, ChatRequestRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> ChatRequestRepositoryError {
    map_basic_diesel_error(
        error,
        ChatRequestRepositoryError::query,
        ChatRequestRepositoryError::connection,
    )
}

fn row_to_request(row: ChatRequestRow) -> ChatRequest {
    let status = ChatRequestStatus::parse(&row.status).unwrap_or_else(|| {
        warn!(
            value = row.status.as_str(),
            request_id = %row.id,
            "unrecognised chat request status, treating as failed"
        );
        ChatRequestStatus::Failed
    });
    ChatRequest {
        id: ChatRequestId::from_uuid(row.id),
        user_id: UserId::from_uuid(row.user_id),
        session_id: SessionTag::from_client(row.session_id),
        prompt: row.prompt,
        response: row.response,
        model: row.model,
        status,
        metrics: RequestMetrics {
            tokens_used: row.tokens_used.map(to_u32),
            cost_cents: row.cost_cents.map(to_u32),
            duration_ms: row.duration_ms.map(to_u32),
        },
        error_message: row.error_message,
        started_at: row.started_at,
        completed_at: row.completed_at,
        created_at: row.created_at,
    }
}

#[async_trait]
impl ChatRequestRepository for DieselChatRequestRepository {
    async fn create(&self, request: &NewChatRequest) -> Result<(), ChatRequestRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = NewChatRequestRow {
            id: *request.id.as_uuid(),
            user_id: *request.user_id.as_uuid(),
            session_id: request.session_id.as_ref(),
            prompt: &request.prompt,
            model: &request.model,
            status: ChatRequestStatus::Pending.as_str(),
            ip_address: request.client.ip_address.as_deref(),
            user_agent: request.client.user_agent.as_deref(),
            started_at: request.started_at,
            created_at: request.started_at,
        };
        diesel::insert_into(chat_requests::table)
            .values(&row)
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn find_for_user(
        &self,
        user_id: &UserId,
        id: ChatRequestId,
    ) -> Result<Option<ChatRequest>, ChatRequestRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<ChatRequestRow> = chat_requests::table
            .filter(chat_requests::id.eq(id.as_uuid()))
            .filter(chat_requests::user_id.eq(user_id.as_uuid()))
            .select(ChatRequestRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(row_to_request))
    }

    async fn finish(
        &self,
        id: ChatRequestId,
        update: &ChatRequestUpdate,
    ) -> Result<Option<ChatRequest>, ChatRequestRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let changes = ChatRequestCompletion {
            status: update.status.as_str(),
            response: update.response.as_deref(),
            tokens_used: update.metrics.tokens_used.map(to_i32),
            cost_cents: update.metrics.cost_cents.map(to_i32),
            duration_ms: update.metrics.duration_ms.map(to_i32),
            error_message: update.error_message.as_deref(),
            completed_at: update.completed_at,
        };
        let row: Option<ChatRequestRow> = diesel::update(
            chat_requests::table
                .filter(chat_requests::id.eq(id.as_uuid()))
                .filter(chat_requests::status.eq(ChatRequestStatus::Pending.as_str())),
        )
        .set(&changes)
        .returning(ChatRequestRow::as_returning())
        .get_result(&mut conn)
        .await
        .optional()
        .map_err(map_diesel_error)?;
        Ok(row.map(row_to_request))
    }

    async fn list_since(
        &self,
        user_id: &UserId,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ChatRequest>, ChatRequestRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let mut query = chat_requests::table
            .filter(chat_requests::user_id.eq(user_id.as_uuid()))
            .select(ChatRequestRow::as_select())
            .order(chat_requests::created_at.desc())
            .into_boxed();
        if let Some(since) = since {
            query = query.filter(chat_requests::created_at.ge(since));
        }
        let rows: Vec<ChatRequestRow> = query.load(&mut conn).await.map_err(map_diesel_error)?;
        Ok(rows.into_iter().map(row_to_request).collect())
    }

    async fn count_since(
        &self,
        user_id: &UserId,
        since: DateTime<Utc>,
    ) -> Result<u64, ChatRequestRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let count: i64 = chat_requests::table
            .filter(chat_requests::user_id.eq(user_id.as_uuid()))
            .filter(chat_requests::created_at.ge(since))
            .count()
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(to_u64(count))
    }
}
