//! Dashboard handlers over the cached usage aggregate.
//!
//! ```text
//! GET /api/v1/dashboard
//! POST /api/v1/dashboard/recalculate
//! GET /api/v1/dashboard/stats
//! GET /api/v1/dashboard/analytics
//! GET /api/v1/dashboard/costs
//! ```

use actix_web::{get, post, web};

use crate::domain::{
    AnalyticsSummary, CostSummary, DashboardOverview, DashboardSnapshot, Error, UsageStats,
};
use crate::inbound::http::ApiResult;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;

/// Cached dashboard snapshot with the credit summary.
#[utoipa::path(
    get,
    path = "/api/v1/dashboard",
    responses(
        (status = 200, description = "Dashboard overview", body = DashboardOverview),
        (status = 401, description = "Unauthorised", body = Error),
        (status = 404, description = "User not found", body = Error),
        (status = 503, description = "Storage unavailable", body = Error)
    ),
    tags = ["dashboard"],
    operation_id = "getDashboard"
)]
#[get("/dashboard")]
pub async fn overview(
    state: web::Data<HttpState>,
    session: SessionContext,
) -> ApiResult<web::Json<DashboardOverview>> {
    let user_id = session.require_user_id()?;
    Ok(web::Json(state.dashboard.overview(&user_id).await?))
}

/// Rebuild the cached snapshot from raw requests.
#[utoipa::path(
    post,
    path = "/api/v1/dashboard/recalculate",
    responses(
        (status = 200, description = "Fresh snapshot", body = DashboardSnapshot),
        (status = 401, description = "Unauthorised", body = Error),
        (status = 503, description = "Storage unavailable", body = Error)
    ),
    tags = ["dashboard"],
    operation_id = "recalculateDashboard"
)]
#[post("/dashboard/recalculate")]
pub async fn recalculate(
    state: web::Data<HttpState>,
    session: SessionContext,
) -> ApiResult<web::Json<DashboardSnapshot>> {
    let user_id = session.require_user_id()?;
    Ok(web::Json(state.dashboard.recalculate(&user_id).await?))
}

/// Window counts with trends and recent activity.
#[utoipa::path(
    get,
    path = "/api/v1/dashboard/stats",
    responses(
        (status = 200, description = "Usage stats", body = UsageStats),
        (status = 401, description = "Unauthorised", body = Error),
        (status = 404, description = "User not found", body = Error),
        (status = 503, description = "Storage unavailable", body = Error)
    ),
    tags = ["dashboard"],
    operation_id = "getDashboardStats"
)]
#[get("/dashboard/stats")]
pub async fn stats(
    state: web::Data<HttpState>,
    session: SessionContext,
) -> ApiResult<web::Json<UsageStats>> {
    let user_id = session.require_user_id()?;
    Ok(web::Json(state.dashboard.stats(&user_id).await?))
}

/// Daily timeline and status counts.
#[utoipa::path(
    get,
    path = "/api/v1/dashboard/analytics",
    responses(
        (status = 200, description = "Usage analytics", body = AnalyticsSummary),
        (status = 401, description = "Unauthorised", body = Error),
        (status = 404, description = "User not found", body = Error),
        (status = 503, description = "Storage unavailable", body = Error)
    ),
    tags = ["dashboard"],
    operation_id = "getDashboardAnalytics"
)]
#[get("/dashboard/analytics")]
pub async fn analytics(
    state: web::Data<HttpState>,
    session: SessionContext,
) -> ApiResult<web::Json<AnalyticsSummary>> {
    let user_id = session.require_user_id()?;
    Ok(web::Json(state.dashboard.analytics(&user_id).await?))
}

/// Spend to date with the month projection.
#[utoipa::path(
    get,
    path = "/api/v1/dashboard/costs",
    responses(
        (status = 200, description = "Cost summary", body = CostSummary),
        (status = 401, description = "Unauthorised", body = Error),
        (status = 404, description = "User not found", body = Error),
        (status = 503, description = "Storage unavailable", body = Error)
    ),
    tags = ["dashboard"],
    operation_id = "getDashboardCosts"
)]
#[get("/dashboard/costs")]
pub async fn costs(
    state: web::Data<HttpState>,
    session: SessionContext,
) -> ApiResult<web::Json<CostSummary>> {
    let user_id = session.require_user_id()?;
    Ok(web::Json(state.dashboard.costs(&user_id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::test as actix_test;
    use rstest::rstest;
    use serde_json::{Value, json};

    use crate::inbound::http::test_utils::{TestContext, login_cookie};

    #[rstest]
    #[case("/api/v1/dashboard")]
    #[case("/api/v1/dashboard/stats")]
    #[case("/api/v1/dashboard/analytics")]
    #[case("/api/v1/dashboard/costs")]
    #[actix_web::test]
    async fn reads_require_a_session(#[case] uri: &str) {
        let ctx = TestContext::new();
        let app = actix_test::init_service(ctx.app()).await;

        let response =
            actix_test::call_service(&app, actix_test::TestRequest::get().uri(uri).to_request())
                .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[rstest]
    #[actix_web::test]
    async fn generations_show_up_after_recalculation() {
        let ctx = TestContext::new();
        let app = actix_test::init_service(ctx.app()).await;
        let cookie = login_cookie(&app).await;
        for prompt in ["Create an NFT collection", "Write a fungible token"] {
            let response = actix_test::call_service(
                &app,
                actix_test::TestRequest::post()
                    .uri("/api/v1/generate")
                    .cookie(cookie.clone())
                    .set_json(json!({ "prompt": prompt }))
                    .to_request(),
            )
            .await;
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/api/v1/dashboard/recalculate")
                .cookie(cookie.clone())
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let snapshot: Value = actix_test::read_body_json(response).await;
        assert_eq!(snapshot["totalRequests"], 2);
        assert_eq!(snapshot["requestsToday"], 2);

        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::get()
                .uri("/api/v1/dashboard")
                .cookie(cookie)
                .to_request(),
        )
        .await;
        let overview_body: Value = actix_test::read_body_json(response).await;
        assert_eq!(overview_body["dashboard"]["totalRequests"], 2);
        assert_eq!(overview_body["credits"]["used"], 2);
        assert_eq!(overview_body["credits"]["remaining"], 8);
        assert_eq!(overview_body["performance"]["totalRequests"], 0);
        assert_eq!(overview_body["performance"]["averageRating"], Value::Null);
    }

    #[rstest]
    #[actix_web::test]
    async fn analytics_cover_a_week_of_days() {
        let ctx = TestContext::new();
        let app = actix_test::init_service(ctx.app()).await;
        let cookie = login_cookie(&app).await;

        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::get()
                .uri("/api/v1/dashboard/analytics")
                .cookie(cookie)
                .to_request(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = actix_test::read_body_json(response).await;
        assert_eq!(body["timeline"].as_array().map(Vec::len), Some(7));
        assert_eq!(body["weeklyStats"]["total"], 0);
        assert_eq!(body["successRate"], 0.0);
    }

    #[rstest]
    #[actix_web::test]
    async fn costs_report_the_remaining_credits() {
        let ctx = TestContext::new();
        let app = actix_test::init_service(ctx.app()).await;
        let cookie = login_cookie(&app).await;

        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::get()
                .uri("/api/v1/dashboard/costs")
                .cookie(cookie)
                .to_request(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = actix_test::read_body_json(response).await;
        assert_eq!(body["remainingCredits"], 10);
        assert_eq!(body["monthRequests"], 0);
    }
}
