//! Tests for request tracking handlers.

use actix_web::cookie::Cookie;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::test as actix_test;
use rstest::rstest;
use serde_json::{Value, json};

use crate::domain::ports::AnalyticsRepository;
use crate::inbound::http::test_utils::{TestContext, login_cookie};

async fn start<S>(app: &S, cookie: &Cookie<'static>, body: Value) -> ServiceResponse
where
    S: Service<actix_http::Request, Response = ServiceResponse, Error = actix_web::Error>,
{
    actix_test::call_service(
        app,
        actix_test::TestRequest::post()
            .uri("/api/v1/chat/track")
            .cookie(cookie.clone())
            .set_json(body)
            .to_request(),
    )
    .await
}

async fn update<S>(app: &S, cookie: &Cookie<'static>, body: Value) -> ServiceResponse
where
    S: Service<actix_http::Request, Response = ServiceResponse, Error = actix_web::Error>,
{
    actix_test::call_service(
        app,
        actix_test::TestRequest::put()
            .uri("/api/v1/chat/track")
            .cookie(cookie.clone())
            .set_json(body)
            .to_request(),
    )
    .await
}

async fn started_request_id<S>(app: &S, cookie: &Cookie<'static>) -> String
where
    S: Service<actix_http::Request, Response = ServiceResponse, Error = actix_web::Error>,
{
    let response = start(app, cookie, json!({ "prompt": "Build an NFT marketplace" })).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = actix_test::read_body_json(response).await;
    body["requestId"]
        .as_str()
        .expect("request id present")
        .to_owned()
}

#[rstest]
#[actix_web::test]
async fn start_returns_the_request_id_and_limits() {
    let ctx = TestContext::new();
    let app = actix_test::init_service(ctx.app()).await;
    let cookie = login_cookie(&app).await;

    let response = start(
        &app,
        &cookie,
        json!({ "prompt": "Build a token", "sessionId": "session_1_abc", "model": "custom" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = actix_test::read_body_json(response).await;
    assert!(body["requestId"].is_string());
    assert_eq!(body["limits"]["canMakeRequest"], true);
    assert_eq!(body["limits"]["monthlyUsed"], 0);
    assert_eq!(body["limits"]["monthlyLimit"], 10);
}

#[rstest]
#[actix_web::test]
async fn completed_update_records_analytics_and_cannot_repeat() {
    let ctx = TestContext::new();
    let app = actix_test::init_service(ctx.app()).await;
    let cookie = login_cookie(&app).await;
    let request_id = started_request_id(&app, &cookie).await;

    let response = update(
        &app,
        &cookie,
        json!({
            "requestId": request_id,
            "status": "completed",
            "response": "access(all) contract Market {}",
            "tokensUsed": 120,
            "costCents": 2,
            "durationMs": 900,
            "userRating": 5
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = actix_test::read_body_json(response).await;
    assert_eq!(body["status"], "completed");
    assert_eq!(body["tokensUsed"], 120);
    assert!(body["completedAt"].is_string());

    let user = ctx.fixture_user().await;
    let categories = ctx
        .store
        .category_counts(&user.id)
        .await
        .expect("counts load");
    assert_eq!(categories.iter().map(|(_, count)| count).sum::<u64>(), 1);

    let again = update(
        &app,
        &cookie,
        json!({ "requestId": request_id, "status": "failed" }),
    )
    .await;
    assert_eq!(again.status(), StatusCode::CONFLICT);
}

#[rstest]
#[case(json!({ "status": "pending" }), "Invalid status")]
#[case(json!({ "status": "done" }), "Invalid status")]
#[case(json!({ "status": "completed", "complexity": "huge" }), "Invalid complexity")]
#[case(json!({ "status": "completed", "requestType": "poem" }), "Invalid requestType")]
#[case(json!({ "status": "completed", "userRating": 7 }), "Invalid userRating")]
#[actix_web::test]
async fn malformed_updates_are_rejected(#[case] fields: Value, #[case] message: &str) {
    let ctx = TestContext::new();
    let app = actix_test::init_service(ctx.app()).await;
    let cookie = login_cookie(&app).await;
    let request_id = started_request_id(&app, &cookie).await;
    let mut body = fields;
    body["requestId"] = Value::String(request_id);

    let response = update(&app, &cookie, body).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: Value = actix_test::read_body_json(response).await;
    assert_eq!(error["message"], message);
}

#[rstest]
#[actix_web::test]
async fn unknown_request_is_not_found() {
    let ctx = TestContext::new();
    let app = actix_test::init_service(ctx.app()).await;
    let cookie = login_cookie(&app).await;

    let response = update(
        &app,
        &cookie,
        json!({
            "requestId": "3fa85f64-5717-4562-b3fc-2c963f66afa6",
            "status": "completed"
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[rstest]
#[actix_web::test]
async fn plan_limit_blocks_further_tracking() {
    let ctx = TestContext::new();
    let app = actix_test::init_service(ctx.app()).await;
    let cookie = login_cookie(&app).await;
    for _ in 0..10 {
        started_request_id(&app, &cookie).await;
    }

    let plan = actix_test::call_service(
        &app,
        actix_test::TestRequest::get()
            .uri("/api/v1/plan")
            .cookie(cookie.clone())
            .to_request(),
    )
    .await;
    assert_eq!(plan.status(), StatusCode::OK);
    let limits: Value = actix_test::read_body_json(plan).await;
    assert_eq!(limits["canMakeRequest"], false);
    assert_eq!(limits["reason"], "Monthly request limit reached");

    let response = start(&app, &cookie, json!({ "prompt": "One more" })).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let error: Value = actix_test::read_body_json(response).await;
    assert_eq!(error["message"], "Request limit exceeded");
    assert_eq!(error["details"]["limits"]["monthlyUsed"], 10);
}
