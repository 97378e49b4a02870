//! Domain primitives, accounting rules, and services.
//!
//! Purpose: define strongly typed entities used by the HTTP and persistence
//! adapters, plus the services that implement credit-gated generation,
//! request tracking, and dashboard aggregation over the ports in [`ports`].
//!
//! Public surface:
//! - Error / ErrorCode: transport-agnostic failure payload.
//! - User / CreditBalance / UserPlan: account and allowance state.
//! - ChatRequest / RequestAnalytic / DashboardSnapshot: usage records.
//! - AccountService, GenerationService, RequestTrackingService,
//!   DashboardService, VariableService: use-cases invoked by the HTTP
//!   handlers.

pub mod accounts;
pub mod analytics;
pub mod auth;
pub mod chat_request;
pub mod code_blocks;
pub mod credits;
pub mod dashboard;
pub mod dashboard_service;
pub mod error;
pub mod generation;
pub mod plan;
pub mod ports;
pub mod tracking;
pub mod trace_id;
pub mod user;
pub mod variable_service;
pub mod variables;

pub use self::accounts::{AccountProfile, AccountService};
pub use self::analytics::{
    AnalyticSource, AnalyticsInput, Complexity, MAX_CATEGORY_LEN, PerformanceSample,
    RequestAnalytic, RequestType, UNCATEGORIZED, UserRating, infer_category,
};
pub use self::auth::{LoginCredentials, LoginValidationError};
pub use self::chat_request::{
    ChatRequest, ChatRequestId, ChatRequestStatus, ChatRequestUpdate, ClientInfo, DEFAULT_MODEL,
    MAX_IP_ADDRESS_LEN, MAX_MODEL_LEN, MAX_SESSION_TAG_LEN, NewChatRequest, RequestMetrics,
    SessionTag,
};
pub use self::code_blocks::{
    CodeBlock, VirtualFile, Workspace, declared_contract_name, extension_for,
    extract_code_blocks, infer_base_name,
};
pub use self::credits::{
    CreditAction, CreditBalance, CreditDeduction, CreditsSummary, DEFAULT_FEATURES,
    FREE_CREDIT_ALLOWANCE, MAX_CREDIT_LIMIT,
};
pub use self::dashboard::{
    ActivityItem, AnalyticsSummary, CostSummary, DashboardSnapshot, PerformanceSummary,
    StatusCounts, TimelineBucket, Trend, TrendStat, UsageStats, usage_timeline,
};
pub use self::dashboard_service::{DashboardOverview, DashboardService, DashboardSources};
pub use self::error::{Error, ErrorCode, ErrorValidationError, TRACE_ID_HEADER};
pub use self::generation::{AnswerStream, GenerationOutcome, GenerationService};
pub use self::plan::{BillingCycle, PlanLimits, UsageCounts, UserPlan};
pub use self::trace_id::TraceId;
pub use self::tracking::{RequestTrackingService, StartTracking, TrackingStarted, TrackingUpdate};
pub use self::user::{EmailAddress, IdentityProfile, PlanTier, User, UserId, UserValidationError};
pub use self::variable_service::VariableService;
pub use self::variables::{
    MAX_VARIABLE_KEY_LEN, UserVariable, VariableFields, VariableKey, VariableType, VariableValue,
    VariableView, VariableWrite,
};

/// Convenient API result alias.
///
/// # Examples
/// ```
/// use actix_web::HttpResponse;
/// use forge_backend::domain::{ApiResult, Error};
///
/// fn handler() -> ApiResult<HttpResponse> {
///     Err(Error::forbidden("nope"))
/// }
/// ```
pub type ApiResult<T> = Result<T, Error>;
