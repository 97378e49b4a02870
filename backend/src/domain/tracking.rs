//! Explicit request tracking for clients that call the provider themselves.
//!
//! `start` checks the plan limits and opens a pending record; `update`
//! closes it and, for completed answers, stores an analytics sample.

use std::sync::Arc;

use mockable::Clock;
use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::domain::plan::{day_start, month_start};
use crate::domain::ports::{AnalyticsRepository, ChatRequestRepository, PlanRepository};
use crate::domain::{
    AnalyticSource, AnalyticsInput, ChatRequest, ChatRequestId, ChatRequestStatus,
    ChatRequestUpdate, ClientInfo, DEFAULT_MODEL, Error, MAX_CATEGORY_LEN, MAX_MODEL_LEN,
    MAX_SESSION_TAG_LEN, NewChatRequest, PlanLimits, RequestAnalytic, RequestMetrics, SessionTag,
    UsageCounts, UserId,
};

/// Input for opening a tracked request.
#[derive(Debug, Clone, Default)]
pub struct StartTracking {
    pub prompt: String,
    pub session_id: Option<String>,
    pub model: Option<String>,
    pub client: ClientInfo,
}

/// Result of opening a tracked request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrackingStarted {
    pub request_id: ChatRequestId,
    pub limits: PlanLimits,
}

/// Input for closing a tracked request.
#[derive(Debug, Clone)]
pub struct TrackingUpdate {
    pub request_id: ChatRequestId,
    pub status: ChatRequestStatus,
    pub response: Option<String>,
    pub metrics: RequestMetrics,
    pub error_message: Option<String>,
    pub analytics: AnalyticsInput,
}

/// Service behind `POST`/`PUT /chat/track` and `GET /plan`.
#[derive(Clone)]
pub struct RequestTrackingService {
    chat_requests: Arc<dyn ChatRequestRepository>,
    plans: Arc<dyn PlanRepository>,
    analytics: Arc<dyn AnalyticsRepository>,
    clock: Arc<dyn Clock>,
}

impl RequestTrackingService {
    /// Create the service over its repositories.
    pub fn new(
        chat_requests: Arc<dyn ChatRequestRepository>,
        plans: Arc<dyn PlanRepository>,
        analytics: Arc<dyn AnalyticsRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            chat_requests,
            plans,
            analytics,
            clock,
        }
    }

    /// Evaluate the active plan against this month's and today's requests.
    pub async fn limits(&self, user_id: &UserId) -> Result<PlanLimits, Error> {
        let now = self.clock.utc();
        let plan = self.plans.active_plan(user_id).await?;
        let usage = UsageCounts {
            month: self
                .chat_requests
                .count_since(user_id, month_start(now))
                .await?,
            day: self.chat_requests.count_since(user_id, day_start(now)).await?,
        };
        Ok(PlanLimits::evaluate(plan, usage))
    }

    /// Open a pending request after the limit check.
    pub async fn start(
        &self,
        user_id: &UserId,
        input: StartTracking,
    ) -> Result<TrackingStarted, Error> {
        if input.prompt.trim().is_empty() {
            return Err(Error::invalid_request("Prompt is required"));
        }
        ensure_fits("sessionId", input.session_id.as_deref(), MAX_SESSION_TAG_LEN)?;
        ensure_fits("model", input.model.as_deref(), MAX_MODEL_LEN)?;
        let limits = self.limits(user_id).await?;
        limits.ensure_allowed()?;

        let now = self.clock.utc();
        let new_request = NewChatRequest {
            id: ChatRequestId::random(),
            user_id: user_id.clone(),
            session_id: input
                .session_id
                .map_or_else(|| SessionTag::generate(now), SessionTag::from_client),
            prompt: input.prompt,
            model: input.model.unwrap_or_else(|| DEFAULT_MODEL.to_owned()),
            client: input.client,
            started_at: now,
        };
        self.chat_requests.create(&new_request).await?;
        info!(user_id = %user_id, request_id = %new_request.id, "tracking chat request");
        Ok(TrackingStarted {
            request_id: new_request.id,
            limits,
        })
    }

    /// Close a pending request owned by `user_id`.
    ///
    /// Terminal requests are never reopened; a second update is a conflict.
    pub async fn update(
        &self,
        user_id: &UserId,
        input: TrackingUpdate,
    ) -> Result<ChatRequest, Error> {
        if !input.status.is_terminal() {
            return Err(Error::invalid_request("Invalid status").with_details(
                serde_json::json!({ "field": "status", "code": "not_terminal" }),
            ));
        }
        ensure_fits("category", input.analytics.category.as_deref(), MAX_CATEGORY_LEN)?;
        let existing = self
            .chat_requests
            .find_for_user(user_id, input.request_id)
            .await?
            .ok_or_else(|| Error::not_found("Chat request not found"))?;
        if existing.status.is_terminal() {
            return Err(already_finished(existing.status));
        }

        let now = self.clock.utc();
        let update = ChatRequestUpdate {
            status: input.status,
            response: input.response,
            metrics: input.metrics,
            error_message: input.error_message,
            completed_at: Some(now),
        };
        let finished = self
            .chat_requests
            .finish(input.request_id, &update)
            .await?
            .ok_or_else(|| already_finished(existing.status))?;

        if finished.status == ChatRequestStatus::Completed {
            if let Some(response) = finished.response.as_deref() {
                let analytic = RequestAnalytic::derive(
                    AnalyticSource {
                        user_id,
                        request_id: finished.id,
                        prompt: &finished.prompt,
                        response,
                        response_time_ms: finished.metrics.duration_ms,
                        was_successful: true,
                    },
                    input.analytics,
                    now,
                );
                if let Err(err) = self.analytics.record(&analytic).await {
                    warn!(request_id = %finished.id, error = %err, "failed to record analytics");
                }
            }
        }
        info!(
            user_id = %user_id,
            request_id = %finished.id,
            status = finished.status.as_str(),
            "tracked chat request finished"
        );
        Ok(finished)
    }
}

fn ensure_fits(field: &str, value: Option<&str>, max: usize) -> Result<(), Error> {
    match value {
        Some(text) if text.chars().count() > max => {
            Err(Error::invalid_request(format!("Invalid {field}")).with_details(
                serde_json::json!({ "field": field, "code": "too_long", "max": max }),
            ))
        }
        _ => Ok(()),
    }
}

fn already_finished(status: ChatRequestStatus) -> Error {
    Error::conflict("Chat request already finished")
        .with_details(serde_json::json!({ "status": status.as_str() }))
}
