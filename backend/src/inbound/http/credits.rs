//! Credit balance handlers.
//!
//! ```text
//! GET /api/v1/credits
//! POST /api/v1/credits {"action":"add_credits","amount":5}
//! ```

use actix_web::{get, post, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{CreditAction, CreditsSummary, Error};
use crate::inbound::http::ApiResult;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;

/// Body for `POST /api/v1/credits`.
///
/// `action` is one of `use_credit`, `add_credits`, or `reset_credits`;
/// `amount` is required and positive for `add_credits`.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CreditActionRequest {
    pub action: String,
    pub amount: Option<i64>,
}

/// Credit counters merged with the active plan.
#[utoipa::path(
    get,
    path = "/api/v1/credits",
    responses(
        (status = 200, description = "Credit summary", body = CreditsSummary),
        (status = 401, description = "Unauthorised", body = Error),
        (status = 404, description = "User not found", body = Error),
        (status = 503, description = "Storage unavailable", body = Error)
    ),
    tags = ["credits"],
    operation_id = "getCredits"
)]
#[get("/credits")]
pub async fn get_credits(
    state: web::Data<HttpState>,
    session: SessionContext,
) -> ApiResult<web::Json<CreditsSummary>> {
    let user_id = session.require_user_id()?;
    let summary = state.accounts.credits_summary(&user_id).await?;
    Ok(web::Json(summary))
}

/// Spend, add, or reset credits.
#[utoipa::path(
    post,
    path = "/api/v1/credits",
    request_body = CreditActionRequest,
    responses(
        (status = 200, description = "Refreshed credit summary", body = CreditsSummary),
        (status = 400, description = "Invalid action, amount, or spent balance", body = Error),
        (status = 401, description = "Unauthorised", body = Error),
        (status = 404, description = "User not found", body = Error),
        (status = 503, description = "Storage unavailable", body = Error)
    ),
    tags = ["credits"],
    operation_id = "updateCredits"
)]
#[post("/credits")]
pub async fn update_credits(
    state: web::Data<HttpState>,
    session: SessionContext,
    payload: web::Json<CreditActionRequest>,
) -> ApiResult<web::Json<CreditsSummary>> {
    let user_id = session.require_user_id()?;
    let action = CreditAction::parse(&payload.action, payload.amount)?;
    let summary = state.accounts.apply_credit_action(&user_id, action).await?;
    Ok(web::Json(summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::test as actix_test;
    use rstest::rstest;
    use serde_json::{Value, json};

    use crate::inbound::http::test_utils::{TestContext, login_cookie};

    async fn post_action(body: Value) -> (StatusCode, Value) {
        let ctx = TestContext::new();
        let app = actix_test::init_service(ctx.app()).await;
        let cookie = login_cookie(&app).await;

        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/api/v1/credits")
                .cookie(cookie)
                .set_json(body)
                .to_request(),
        )
        .await;
        let status = response.status();
        (status, actix_test::read_body_json(response).await)
    }

    #[rstest]
    #[actix_web::test]
    async fn summary_reflects_a_fresh_account() {
        let ctx = TestContext::new();
        let app = actix_test::init_service(ctx.app()).await;
        let cookie = login_cookie(&app).await;

        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::get()
                .uri("/api/v1/credits")
                .cookie(cookie)
                .to_request(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = actix_test::read_body_json(response).await;
        assert_eq!(body["used"], 0);
        assert_eq!(body["limit"], 10);
        assert_eq!(body["remaining"], 10);
        assert_eq!(body["isNewUser"], true);
        assert_eq!(body["plan"], "free");
    }

    #[rstest]
    #[case(json!({ "action": "use_credit" }), 1, 10)]
    #[case(json!({ "action": "add_credits", "amount": 5 }), 0, 15)]
    #[actix_web::test]
    async fn actions_update_the_balance(
        #[case] body: Value,
        #[case] used: u64,
        #[case] limit: u64,
    ) {
        let (status, summary) = post_action(body).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary["used"], used);
        assert_eq!(summary["limit"], limit);
    }

    #[rstest]
    #[case(json!({ "action": "add_credits", "amount": 0 }), "Invalid amount")]
    #[case(json!({ "action": "add_credits" }), "Invalid amount")]
    #[case(json!({ "action": "add_credits", "amount": 4_294_967_295_u64 }), "Invalid amount")]
    #[case(json!({ "action": "reset_credits" }), "Cannot reset credits for free plan")]
    #[case(json!({ "action": "gift" }), "Invalid action")]
    #[actix_web::test]
    async fn rejected_actions_are_invalid_requests(#[case] body: Value, #[case] message: &str) {
        let (status, error) = post_action(body).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["message"], message);
    }

    #[rstest]
    #[actix_web::test]
    async fn missing_action_field_is_a_body_error() {
        let (status, error) = post_action(json!({ "amount": 5 })).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["code"], "invalid_request");
    }
}
