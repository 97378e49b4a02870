//! OpenAPI documentation configuration.
//!
//! [`ApiDoc`] registers every `/api/v1` handler, the health probes, the
//! request and response schemas, and the session cookie security scheme.
//! Swagger UI serves it in debug builds and `openapi-dump` prints it for
//! external tooling.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::domain::{
    AccountProfile, ActivityItem, AnalyticsSummary, BillingCycle, ChatRequest, ChatRequestStatus,
    CostSummary, CreditsSummary, DashboardOverview, DashboardSnapshot, Error, ErrorCode,
    PerformanceSummary, PlanLimits, PlanTier, RequestMetrics, StatusCounts, TimelineBucket,
    TrackingStarted, Trend, TrendStat, UsageStats, User, UserPlan, VariableType, VariableView,
    VirtualFile,
};
use crate::inbound::http::credits::CreditActionRequest;
use crate::inbound::http::generate::{
    ChatRequestBody, CreditUsage, GenerateRequest, GenerateResponse,
};
use crate::inbound::http::tracking::{StartTrackingRequest, UpdateTrackingRequest};
use crate::inbound::http::users::LoginRequest;
use crate::inbound::http::variables::{
    BulkVariablesRequest, BulkVariablesResponse, VariableDeleted, VariableInput,
    VariableListResponse, VariableResponse, VariableValueInput,
};

/// Enrich the generated document with the session cookie security scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "SessionCookie",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                "session",
                "Session cookie issued by POST /api/v1/login.",
            ))),
        );
    }
}

/// OpenAPI document for the REST API.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Contract Forge backend API",
        description = "Credit-gated smart contract generation, request tracking, and usage dashboards."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    security(("SessionCookie" = [])),
    paths(
        crate::inbound::http::users::login,
        crate::inbound::http::users::logout,
        crate::inbound::http::users::current_user,
        crate::inbound::http::generate::generate,
        crate::inbound::http::generate::chat,
        crate::inbound::http::credits::get_credits,
        crate::inbound::http::credits::update_credits,
        crate::inbound::http::tracking::start_tracking,
        crate::inbound::http::tracking::update_tracking,
        crate::inbound::http::tracking::plan_limits,
        crate::inbound::http::dashboard::overview,
        crate::inbound::http::dashboard::recalculate,
        crate::inbound::http::dashboard::stats,
        crate::inbound::http::dashboard::analytics,
        crate::inbound::http::dashboard::costs,
        crate::inbound::http::variables::list_variables,
        crate::inbound::http::variables::create_variable,
        crate::inbound::http::variables::update_variables,
        crate::inbound::http::variables::get_variable,
        crate::inbound::http::variables::put_variable,
        crate::inbound::http::variables::delete_variable,
        crate::inbound::http::health::ready,
        crate::inbound::http::health::live,
    ),
    components(schemas(
        Error,
        ErrorCode,
        User,
        PlanTier,
        AccountProfile,
        CreditsSummary,
        UserPlan,
        BillingCycle,
        PlanLimits,
        ChatRequest,
        ChatRequestStatus,
        RequestMetrics,
        TrackingStarted,
        VirtualFile,
        DashboardOverview,
        DashboardSnapshot,
        UsageStats,
        TrendStat,
        Trend,
        ActivityItem,
        AnalyticsSummary,
        TimelineBucket,
        StatusCounts,
        CostSummary,
        PerformanceSummary,
        VariableType,
        VariableView,
        LoginRequest,
        GenerateRequest,
        GenerateResponse,
        CreditUsage,
        ChatRequestBody,
        CreditActionRequest,
        StartTrackingRequest,
        UpdateTrackingRequest,
        VariableInput,
        VariableValueInput,
        BulkVariablesRequest,
        VariableListResponse,
        VariableResponse,
        BulkVariablesResponse,
        VariableDeleted,
    )),
    tags(
        (name = "users", description = "Sign-in and the current account"),
        (name = "generation", description = "Credit-gated contract generation"),
        (name = "credits", description = "Credit balance and actions"),
        (name = "tracking", description = "Explicit request tracking and plan limits"),
        (name = "dashboard", description = "Usage statistics and costs"),
        (name = "variables", description = "Per-user typed key/value variables"),
        (name = "health", description = "Endpoints for health checks")
    )
)]
pub struct ApiDoc;
