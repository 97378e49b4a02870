//! Internal Diesel row structs.
//!
//! These types mirror `schema.rs` and never leave the persistence module;
//! repositories convert them to domain types at the boundary.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use super::schema::{
    chat_requests, request_analytics, user_dashboard_data, user_plans, user_variables, users,
};

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// Row struct for reading from the users table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
    pub github_id: Option<String>,
    pub plan: String,
    pub plan_expires_at: Option<DateTime<Utc>>,
    pub requests_used: i32,
    pub requests_limit: i32,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Insertable struct for new accounts.
#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub(crate) struct NewUserRow<'a> {
    pub id: Uuid,
    pub email: &'a str,
    pub name: Option<&'a str>,
    pub image: Option<&'a str>,
    pub github_id: Option<&'a str>,
    pub plan: &'a str,
    pub plan_expires_at: Option<DateTime<Utc>>,
    pub requests_used: i32,
    pub requests_limit: i32,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Chat requests
// ---------------------------------------------------------------------------

/// Row struct for reading from the chat_requests table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = chat_requests)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct ChatRequestRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub session_id: String,
    pub prompt: String,
    pub response: Option<String>,
    pub model: String,
    pub status: String,
    pub tokens_used: Option<i32>,
    pub cost_cents: Option<i32>,
    pub duration_ms: Option<i32>,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Insertable struct for a pending chat request.
#[derive(Debug, Insertable)]
#[diesel(table_name = chat_requests)]
pub(crate) struct NewChatRequestRow<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub session_id: &'a str,
    pub prompt: &'a str,
    pub model: &'a str,
    pub status: &'a str,
    pub ip_address: Option<&'a str>,
    pub user_agent: Option<&'a str>,
    pub started_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Terminal update; `None` fields keep their stored value.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = chat_requests)]
pub(crate) struct ChatRequestCompletion<'a> {
    pub status: &'a str,
    pub response: Option<&'a str>,
    pub tokens_used: Option<i32>,
    pub cost_cents: Option<i32>,
    pub duration_ms: Option<i32>,
    pub error_message: Option<&'a str>,
    pub completed_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Plans
// ---------------------------------------------------------------------------

/// Row struct for reading from the user_plans table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = user_plans)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct UserPlanRow {
    pub plan_name: String,
    pub monthly_requests: i32,
    pub daily_requests: i32,
    pub max_tokens_per_request: i32,
    pub features: Vec<String>,
    pub is_active: bool,
    pub price_per_month_cents: i32,
    pub billing_cycle: String,
    pub starts_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Insertable struct for a plan activation.
#[derive(Debug, Insertable)]
#[diesel(table_name = user_plans)]
pub(crate) struct NewUserPlanRow<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_name: &'a str,
    pub monthly_requests: i32,
    pub daily_requests: i32,
    pub max_tokens_per_request: i32,
    pub features: &'a [String],
    pub is_active: bool,
    pub price_per_month_cents: i32,
    pub billing_cycle: &'a str,
    pub starts_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Analytics
// ---------------------------------------------------------------------------

/// Insertable struct for request analytics samples.
#[derive(Debug, Insertable)]
#[diesel(table_name = request_analytics)]
pub(crate) struct NewRequestAnalyticRow<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub request_id: Uuid,
    pub request_type: &'a str,
    pub category: Option<&'a str>,
    pub complexity: &'a str,
    pub response_time_ms: Option<i32>,
    pub tokens_input: Option<i32>,
    pub tokens_output: Option<i32>,
    pub user_rating: Option<i16>,
    pub was_successful: bool,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Dashboard cache
// ---------------------------------------------------------------------------

/// Row struct for the dashboard aggregate.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = user_dashboard_data)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct DashboardRow {
    pub user_id: Uuid,
    pub total_requests: i64,
    pub total_tokens_used: i64,
    pub total_cost_cents: i64,
    pub average_response_time_ms: f64,
    pub requests_by_category: serde_json::Value,
    pub requests_this_month: i64,
    pub requests_today: i64,
    pub last_calculated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Variables
// ---------------------------------------------------------------------------

/// Row struct for user variables; inserted whole and returned by upserts.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = user_variables)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct UserVariableRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub key: String,
    pub value: Option<String>,
    pub json_value: Option<serde_json::Value>,
    pub variable_type: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
