//! Generation handlers: buffered contract generation and streamed chat.
//!
//! ```text
//! POST /api/v1/generate {"prompt":"Create an NFT contract"}
//! POST /api/v1/chat {"messages":[{"role":"user","content":"..."}]}
//! ```

use actix_web::http::header::ContentType;
use actix_web::{HttpRequest, HttpResponse, post, web};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::ports::ChatMessage;
use crate::domain::{ChatRequestId, CreditBalance, Error, GenerationOutcome, VirtualFile};
use crate::inbound::http::ApiResult;
use crate::inbound::http::client::client_info;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;

/// Body for `POST /api/v1/generate`.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct GenerateRequest {
    pub prompt: String,
}

/// Body for `POST /api/v1/chat`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ChatRequestBody {
    #[schema(value_type = Vec<Object>)]
    pub messages: Vec<ChatMessage>,
}

/// Credit counters after a generation.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreditUsage {
    pub used: u32,
    pub limit: u32,
    pub remaining: u32,
}

impl From<CreditBalance> for CreditUsage {
    fn from(balance: CreditBalance) -> Self {
        Self {
            used: balance.used(),
            limit: balance.limit(),
            remaining: balance.remaining(),
        }
    }
}

/// Generated answer with the files extracted from it.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub request_id: Option<ChatRequestId>,
    pub answer: String,
    pub files: Vec<VirtualFile>,
    pub credits: CreditUsage,
}

impl From<GenerationOutcome> for GenerateResponse {
    fn from(outcome: GenerationOutcome) -> Self {
        Self {
            request_id: outcome.request_id,
            answer: outcome.answer,
            files: outcome.files,
            credits: outcome.credits.into(),
        }
    }
}

/// Generate a contract for one prompt and spend one credit.
#[utoipa::path(
    post,
    path = "/api/v1/generate",
    request_body = GenerateRequest,
    responses(
        (status = 200, description = "Generated answer", body = GenerateResponse),
        (status = 400, description = "Prompt is required", body = Error),
        (status = 401, description = "Unauthorised", body = Error),
        (status = 404, description = "User not found", body = Error),
        (status = 429, description = "No credits remaining", body = Error),
        (status = 500, description = "Provider failure", body = Error)
    ),
    tags = ["generation"],
    operation_id = "generate"
)]
#[post("/generate")]
pub async fn generate(
    state: web::Data<HttpState>,
    session: SessionContext,
    req: HttpRequest,
    payload: web::Json<GenerateRequest>,
) -> ApiResult<web::Json<GenerateResponse>> {
    let user_id = session.require_user_id()?;
    let outcome = state
        .generation
        .generate(&user_id, &payload.prompt, client_info(&req))
        .await?;
    Ok(web::Json(outcome.into()))
}

/// Stream the answer to a conversation as plain text.
///
/// The credit is spent once the stream has been fully delivered.
#[utoipa::path(
    post,
    path = "/api/v1/chat",
    request_body = ChatRequestBody,
    responses(
        (status = 200, description = "Streamed answer", content_type = "text/plain", body = String),
        (status = 400, description = "Prompt is required", body = Error),
        (status = 401, description = "Unauthorised", body = Error),
        (status = 404, description = "User not found", body = Error),
        (status = 429, description = "No credits remaining", body = Error),
        (status = 500, description = "Provider failure", body = Error)
    ),
    tags = ["generation"],
    operation_id = "chat"
)]
#[post("/chat")]
pub async fn chat(
    state: web::Data<HttpState>,
    session: SessionContext,
    req: HttpRequest,
    payload: web::Json<ChatRequestBody>,
) -> ApiResult<HttpResponse> {
    let user_id = session.require_user_id()?;
    let ChatRequestBody { messages } = payload.into_inner();
    let answer = state
        .generation
        .chat(&user_id, messages, client_info(&req))
        .await?;
    Ok(HttpResponse::Ok()
        .content_type(ContentType::plaintext())
        .streaming(answer.map(|chunk| chunk.map(web::Bytes::from))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use actix_web::http::StatusCode;
    use actix_web::test as actix_test;
    use rstest::rstest;
    use serde_json::{Value, json};

    use crate::domain::ports::{
        ChatRequestRepository, FixtureCompletionProvider, UserRepository,
    };
    use crate::domain::{ChatRequestStatus, CreditBalance};
    use crate::inbound::http::test_utils::{TestContext, login_cookie};

    const ANSWER: &str = "Here you go:\n```cadence\naccess(all) contract Counter {}\n```\n";

    #[rstest]
    #[actix_web::test]
    async fn generate_returns_files_and_spends_a_credit() {
        let ctx = TestContext::with_provider(Arc::new(FixtureCompletionProvider::with_answer(
            ANSWER,
        )));
        let app = actix_test::init_service(ctx.app()).await;
        let cookie = login_cookie(&app).await;

        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/api/v1/generate")
                .cookie(cookie)
                .insert_header(("x-forwarded-for", "203.0.113.9"))
                .set_json(json!({ "prompt": "Write a counter" }))
                .to_request(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = actix_test::read_body_json(response).await;
        assert_eq!(body["answer"], ANSWER);
        assert_eq!(body["files"][0]["path"], "contracts/Counter.cdc");
        assert_eq!(body["credits"], json!({ "used": 1, "limit": 10, "remaining": 9 }));

        let user = ctx.fixture_user().await;
        assert_eq!(user.credits, CreditBalance::new(1, 10));
        let recorded = ctx
            .store
            .list_since(&user.id, None)
            .await
            .expect("list succeeds");
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].status, ChatRequestStatus::Completed);
    }

    #[rstest]
    #[actix_web::test]
    async fn spent_balance_is_rejected_before_the_provider_runs() {
        let ctx = TestContext::new();
        let app = actix_test::init_service(ctx.app()).await;
        let cookie = login_cookie(&app).await;
        let user = ctx.fixture_user().await;
        for _ in 0..10 {
            ctx.store
                .deduct_credit(&user.id)
                .await
                .expect("deduction succeeds");
        }

        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/api/v1/generate")
                .cookie(cookie)
                .set_json(json!({ "prompt": "Write a counter" }))
                .to_request(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let body: Value = actix_test::read_body_json(response).await;
        assert_eq!(body["code"], "rate_limited");
        let recorded = ctx
            .store
            .list_since(&user.id, None)
            .await
            .expect("list succeeds");
        assert!(recorded.is_empty(), "no record is opened past the gate");
    }

    #[rstest]
    #[actix_web::test]
    async fn blank_prompt_is_an_invalid_request() {
        let ctx = TestContext::new();
        let app = actix_test::init_service(ctx.app()).await;
        let cookie = login_cookie(&app).await;

        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/api/v1/generate")
                .cookie(cookie)
                .set_json(json!({ "prompt": "   " }))
                .to_request(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = actix_test::read_body_json(response).await;
        assert_eq!(body["message"], "Prompt is required");
    }

    #[rstest]
    #[actix_web::test]
    async fn generation_requires_a_session() {
        let ctx = TestContext::new();
        let app = actix_test::init_service(ctx.app()).await;

        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/api/v1/generate")
                .set_json(json!({ "prompt": "Write a counter" }))
                .to_request(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[rstest]
    #[actix_web::test]
    async fn provider_failure_records_a_failed_request_and_keeps_the_credit() {
        let ctx = TestContext::with_provider(Arc::new(FixtureCompletionProvider::unavailable(
            "upstream down",
        )));
        let app = actix_test::init_service(ctx.app()).await;
        let cookie = login_cookie(&app).await;

        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/api/v1/generate")
                .cookie(cookie)
                .set_json(json!({ "prompt": "Write a counter" }))
                .to_request(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = actix_test::read_body_json(response).await;
        assert_eq!(body["message"], "Internal server error");
        let user = ctx.fixture_user().await;
        assert_eq!(user.credits.used(), 0);
        let recorded = ctx
            .store
            .list_since(&user.id, None)
            .await
            .expect("list succeeds");
        assert_eq!(recorded[0].status, ChatRequestStatus::Failed);
    }

    #[rstest]
    #[actix_web::test]
    async fn chat_streams_plain_text_and_spends_a_credit() {
        let ctx = TestContext::with_provider(Arc::new(FixtureCompletionProvider::with_answer(
            ANSWER,
        )));
        let app = actix_test::init_service(ctx.app()).await;
        let cookie = login_cookie(&app).await;

        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/api/v1/chat")
                .cookie(cookie)
                .set_json(json!({
                    "messages": [{ "role": "user", "content": "Write a counter" }]
                }))
                .to_request(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get("content-type")
                .and_then(|value| value.to_str().ok()),
            Some("text/plain; charset=utf-8")
        );
        let body = actix_test::read_body(response).await;
        assert_eq!(body.as_ref(), ANSWER.as_bytes());
        assert_eq!(ctx.fixture_user().await.credits.used(), 1);
    }

    #[rstest]
    #[actix_web::test]
    async fn chat_without_a_user_turn_is_rejected() {
        let ctx = TestContext::new();
        let app = actix_test::init_service(ctx.app()).await;
        let cookie = login_cookie(&app).await;

        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/api/v1/chat")
                .cookie(cookie)
                .set_json(json!({ "messages": [] }))
                .to_request(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
