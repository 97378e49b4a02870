//! Variable routes end to end over the in-memory store.

use actix_web::cookie::Cookie;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::test as actix_test;
use rstest::rstest;
use serde_json::{Value, json};

use crate::inbound::http::test_utils::{TestContext, login_cookie};

async fn send<S>(
    app: &S,
    request: actix_test::TestRequest,
    cookie: &Cookie<'static>,
) -> (StatusCode, Value)
where
    S: Service<actix_http::Request, Response = ServiceResponse, Error = actix_web::Error>,
{
    let response = actix_test::call_service(app, request.cookie(cookie.clone()).to_request()).await;
    let status = response.status();
    let body: Value = actix_test::read_body_json(response).await;
    (status, body)
}

#[rstest]
#[case(actix_test::TestRequest::get().uri("/api/v1/user/variables"))]
#[case(actix_test::TestRequest::delete().uri("/api/v1/user/variables/network"))]
#[actix_web::test]
async fn variables_require_a_session(#[case] request: actix_test::TestRequest) {
    let ctx = TestContext::new();
    let app = actix_test::init_service(ctx.app()).await;

    let response = actix_test::call_service(&app, request.to_request()).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[rstest]
#[actix_web::test]
async fn created_variables_are_listed_and_fetched() {
    let ctx = TestContext::new();
    let app = actix_test::init_service(ctx.app()).await;
    let cookie = login_cookie(&app).await;

    let (status, created) = send(
        &app,
        actix_test::TestRequest::post()
            .uri("/api/v1/user/variables")
            .set_json(json!({
                "key": "gas_limit",
                "value": "3000000",
                "type": "number",
                "description": "Default gas"
            })),
        &cookie,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["variable"]["value"], 3_000_000);
    assert_eq!(created["variable"]["type"], "number");
    assert_eq!(created["variable"]["isPublic"], false);

    let (status, listed) = send(
        &app,
        actix_test::TestRequest::get().uri("/api/v1/user/variables"),
        &cookie,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["variables"].as_array().map(Vec::len), Some(1));

    let (status, fetched) = send(
        &app,
        actix_test::TestRequest::get().uri("/api/v1/user/variables/gas_limit"),
        &cookie,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["variable"]["id"], created["variable"]["id"]);
    assert_eq!(fetched["variable"]["description"], "Default gas");
}

#[rstest]
#[actix_web::test]
async fn keyed_puts_replace_the_value() {
    let ctx = TestContext::new();
    let app = actix_test::init_service(ctx.app()).await;
    let cookie = login_cookie(&app).await;

    let (status, first) = send(
        &app,
        actix_test::TestRequest::put()
            .uri("/api/v1/user/variables/abi")
            .set_json(json!({ "value": { "name": "Token" }, "type": "json" })),
        &cookie,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["variable"]["jsonValue"], json!({ "name": "Token" }));

    let (status, second) = send(
        &app,
        actix_test::TestRequest::put()
            .uri("/api/v1/user/variables/abi")
            .set_json(json!({ "value": true, "type": "boolean", "isPublic": true })),
        &cookie,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["variable"]["id"], first["variable"]["id"]);
    assert_eq!(second["variable"]["value"], true);
    assert_eq!(second["variable"]["jsonValue"], Value::Null);
    assert_eq!(second["variable"]["isPublic"], true);
}

#[rstest]
#[actix_web::test]
async fn bulk_updates_report_what_was_stored() {
    let ctx = TestContext::new();
    let app = actix_test::init_service(ctx.app()).await;
    let cookie = login_cookie(&app).await;

    let (status, body) = send(
        &app,
        actix_test::TestRequest::put()
            .uri("/api/v1/user/variables")
            .set_json(json!({ "variables": [
                { "key": "network", "value": "testnet" },
                { "key": "gas", "value": 9999, "type": "number" },
            ] })),
        &cookie,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated"], 2);
    assert_eq!(body["variables"][1]["value"], 9999);
}

#[rstest]
#[actix_web::test]
async fn an_invalid_bulk_entry_stores_nothing() {
    let ctx = TestContext::new();
    let app = actix_test::init_service(ctx.app()).await;
    let cookie = login_cookie(&app).await;

    let (status, body) = send(
        &app,
        actix_test::TestRequest::put()
            .uri("/api/v1/user/variables")
            .set_json(json!({ "variables": [
                { "key": "network", "value": "testnet" },
                { "key": "gas", "value": "lots", "type": "number" },
            ] })),
        &cookie,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid value");

    let (_, listed) = send(
        &app,
        actix_test::TestRequest::get().uri("/api/v1/user/variables"),
        &cookie,
    )
    .await;
    assert_eq!(listed["variables"], json!([]));
}

#[rstest]
#[case(
    actix_test::TestRequest::post().uri("/api/v1/user/variables").set_json(json!({ "key": "network" })),
    "Key and value are required"
)]
#[case(
    actix_test::TestRequest::post().uri("/api/v1/user/variables").set_json(json!({ "key": "", "value": "x" })),
    "Key and value are required"
)]
#[case(
    actix_test::TestRequest::put().uri("/api/v1/user/variables").set_json(json!({})),
    "Variables array is required"
)]
#[case(
    actix_test::TestRequest::put().uri("/api/v1/user/variables/network").set_json(json!({ "value": null })),
    "Value is required"
)]
#[case(
    actix_test::TestRequest::put().uri("/api/v1/user/variables/network").set_json(json!({ "value": 1, "type": "date" })),
    "Invalid type"
)]
#[actix_web::test]
async fn malformed_writes_are_invalid_requests(
    #[case] request: actix_test::TestRequest,
    #[case] message: &str,
) {
    let ctx = TestContext::new();
    let app = actix_test::init_service(ctx.app()).await;
    let cookie = login_cookie(&app).await;

    let (status, body) = send(&app, request, &cookie).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], message);
}

#[rstest]
#[actix_web::test]
async fn deleting_twice_reports_a_missing_variable() {
    let ctx = TestContext::new();
    let app = actix_test::init_service(ctx.app()).await;
    let cookie = login_cookie(&app).await;
    send(
        &app,
        actix_test::TestRequest::post()
            .uri("/api/v1/user/variables")
            .set_json(json!({ "key": "network", "value": "testnet" })),
        &cookie,
    )
    .await;

    let (status, body) = send(
        &app,
        actix_test::TestRequest::delete().uri("/api/v1/user/variables/network"),
        &cookie,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Variable deleted successfully");

    let (status, body) = send(
        &app,
        actix_test::TestRequest::delete().uri("/api/v1/user/variables/network"),
        &cookie,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Variable not found");
}
