//! Request tracking handlers for clients that call the provider directly.
//!
//! ```text
//! POST /api/v1/chat/track {"prompt":"...","sessionId":"...","model":"..."}
//! PUT /api/v1/chat/track {"requestId":"...","status":"completed","response":"..."}
//! GET /api/v1/plan
//! ```

use actix_web::{HttpRequest, get, post, put, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use crate::domain::{
    AnalyticsInput, ChatRequest, ChatRequestId, ChatRequestStatus, Complexity, Error,
    PlanLimits, RequestMetrics, RequestType, StartTracking, TrackingStarted, TrackingUpdate,
    UserRating,
};
use crate::inbound::http::ApiResult;
use crate::inbound::http::client::client_info;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;

/// Body for `POST /api/v1/chat/track`.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartTrackingRequest {
    pub prompt: String,
    pub session_id: Option<String>,
    pub model: Option<String>,
}

/// Body for `PUT /api/v1/chat/track`.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTrackingRequest {
    #[schema(value_type = String)]
    pub request_id: ChatRequestId,
    /// `completed`, `failed`, or `cancelled`.
    pub status: String,
    pub response: Option<String>,
    pub tokens_used: Option<u32>,
    pub cost_cents: Option<u32>,
    pub duration_ms: Option<u32>,
    pub error_message: Option<String>,
    pub request_type: Option<String>,
    pub category: Option<String>,
    pub complexity: Option<String>,
    pub user_rating: Option<u8>,
}

fn invalid_field(message: &str, field: &str, value: &str) -> Error {
    Error::invalid_request(message).with_details(json!({ "field": field, "value": value }))
}

fn parse_optional<T>(
    raw: Option<&str>,
    field: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Option<T>, Error> {
    raw.map(|value| {
        parse(value).ok_or_else(|| invalid_field(&format!("Invalid {field}"), field, value))
    })
    .transpose()
}

impl TryFrom<UpdateTrackingRequest> for TrackingUpdate {
    type Error = Error;

    fn try_from(body: UpdateTrackingRequest) -> Result<Self, Self::Error> {
        let status = ChatRequestStatus::parse(&body.status)
            .ok_or_else(|| invalid_field("Invalid status", "status", &body.status))?;
        let request_type =
            parse_optional(body.request_type.as_deref(), "requestType", RequestType::parse)?;
        let complexity =
            parse_optional(body.complexity.as_deref(), "complexity", Complexity::parse)?;
        let user_rating = body
            .user_rating
            .map(|rating| {
                UserRating::new(rating).ok_or_else(|| {
                    Error::invalid_request("Invalid userRating")
                        .with_details(json!({ "field": "userRating", "value": rating }))
                })
            })
            .transpose()?;
        Ok(Self {
            request_id: body.request_id,
            status,
            response: body.response,
            metrics: RequestMetrics {
                tokens_used: body.tokens_used,
                cost_cents: body.cost_cents,
                duration_ms: body.duration_ms,
            },
            error_message: body.error_message,
            analytics: AnalyticsInput {
                request_type,
                category: body.category,
                complexity,
                user_rating,
            },
        })
    }
}

/// Open a tracked request after checking the plan limits.
#[utoipa::path(
    post,
    path = "/api/v1/chat/track",
    request_body = StartTrackingRequest,
    responses(
        (status = 200, description = "Tracking started", body = TrackingStarted),
        (status = 400, description = "Prompt is required", body = Error),
        (status = 401, description = "Unauthorised", body = Error),
        (status = 429, description = "Request limit exceeded", body = Error),
        (status = 503, description = "Storage unavailable", body = Error)
    ),
    tags = ["tracking"],
    operation_id = "startTracking"
)]
#[post("/chat/track")]
pub async fn start_tracking(
    state: web::Data<HttpState>,
    session: SessionContext,
    req: HttpRequest,
    payload: web::Json<StartTrackingRequest>,
) -> ApiResult<web::Json<TrackingStarted>> {
    let user_id = session.require_user_id()?;
    let StartTrackingRequest {
        prompt,
        session_id,
        model,
    } = payload.into_inner();
    let started = state
        .tracking
        .start(
            &user_id,
            StartTracking {
                prompt,
                session_id,
                model,
                client: client_info(&req),
            },
        )
        .await?;
    Ok(web::Json(started))
}

/// Close a tracked request with its outcome and metrics.
#[utoipa::path(
    put,
    path = "/api/v1/chat/track",
    request_body = UpdateTrackingRequest,
    responses(
        (status = 200, description = "Updated request", body = ChatRequest),
        (status = 400, description = "Invalid status or analytics field", body = Error),
        (status = 401, description = "Unauthorised", body = Error),
        (status = 404, description = "Chat request not found", body = Error),
        (status = 409, description = "Chat request already finished", body = Error),
        (status = 503, description = "Storage unavailable", body = Error)
    ),
    tags = ["tracking"],
    operation_id = "updateTracking"
)]
#[put("/chat/track")]
pub async fn update_tracking(
    state: web::Data<HttpState>,
    session: SessionContext,
    payload: web::Json<UpdateTrackingRequest>,
) -> ApiResult<web::Json<ChatRequest>> {
    let user_id = session.require_user_id()?;
    let update = TrackingUpdate::try_from(payload.into_inner())?;
    let finished = state.tracking.update(&user_id, update).await?;
    Ok(web::Json(finished))
}

/// Plan limits and current window usage.
#[utoipa::path(
    get,
    path = "/api/v1/plan",
    responses(
        (status = 200, description = "Plan limits", body = PlanLimits),
        (status = 401, description = "Unauthorised", body = Error),
        (status = 503, description = "Storage unavailable", body = Error)
    ),
    tags = ["tracking"],
    operation_id = "getPlanLimits"
)]
#[get("/plan")]
pub async fn plan_limits(
    state: web::Data<HttpState>,
    session: SessionContext,
) -> ApiResult<web::Json<PlanLimits>> {
    let user_id = session.require_user_id()?;
    let limits = state.tracking.limits(&user_id).await?;
    Ok(web::Json(limits))
}

#[cfg(test)]
mod tests;
