//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match `backend/migrations` exactly. Regenerate with
//! `diesel print-schema` after changing a migration.

diesel::table! {
    /// Accounts keyed by verified email, with their credit counters.
    users (id) {
        id -> Uuid,
        email -> Varchar,
        name -> Nullable<Varchar>,
        image -> Nullable<Text>,
        github_id -> Nullable<Varchar>,
        plan -> Varchar,
        plan_expires_at -> Nullable<Timestamptz>,
        /// Credits consumed; never exceeds `requests_limit` after a deduction.
        requests_used -> Int4,
        requests_limit -> Int4,
        is_active -> Bool,
        last_login_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// One prompt/response exchange with the completion provider.
    chat_requests (id) {
        id -> Uuid,
        user_id -> Uuid,
        session_id -> Varchar,
        prompt -> Text,
        response -> Nullable<Text>,
        model -> Varchar,
        /// `pending`, `completed`, `failed`, or `cancelled`.
        status -> Varchar,
        tokens_used -> Nullable<Int4>,
        cost_cents -> Nullable<Int4>,
        duration_ms -> Nullable<Int4>,
        error_message -> Nullable<Text>,
        ip_address -> Nullable<Varchar>,
        user_agent -> Nullable<Text>,
        started_at -> Timestamptz,
        completed_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Subscription history; at most one row per user is active.
    user_plans (id) {
        id -> Uuid,
        user_id -> Uuid,
        plan_name -> Varchar,
        monthly_requests -> Int4,
        daily_requests -> Int4,
        max_tokens_per_request -> Int4,
        features -> Array<Text>,
        is_active -> Bool,
        price_per_month_cents -> Int4,
        billing_cycle -> Varchar,
        starts_at -> Timestamptz,
        expires_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Quality and performance samples for completed requests.
    request_analytics (id) {
        id -> Uuid,
        user_id -> Uuid,
        request_id -> Uuid,
        request_type -> Varchar,
        category -> Nullable<Varchar>,
        complexity -> Varchar,
        response_time_ms -> Nullable<Int4>,
        tokens_input -> Nullable<Int4>,
        tokens_output -> Nullable<Int4>,
        user_rating -> Nullable<Int2>,
        was_successful -> Bool,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Denormalised dashboard aggregate, one row per user.
    user_dashboard_data (user_id) {
        user_id -> Uuid,
        total_requests -> Int8,
        total_tokens_used -> Int8,
        total_cost_cents -> Int8,
        average_response_time_ms -> Float8,
        requests_by_category -> Jsonb,
        requests_this_month -> Int8,
        requests_today -> Int8,
        last_calculated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Typed key/value pairs, unique per `(user_id, key)`.
    user_variables (id) {
        id -> Uuid,
        user_id -> Uuid,
        key -> Varchar,
        /// Text form for every type except `json`.
        value -> Nullable<Text>,
        json_value -> Nullable<Jsonb>,
        variable_type -> Varchar,
        description -> Nullable<Text>,
        is_public -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::joinable!(chat_requests -> users (user_id));
diesel::joinable!(user_plans -> users (user_id));
diesel::joinable!(request_analytics -> chat_requests (request_id));
diesel::joinable!(user_dashboard_data -> users (user_id));
diesel::joinable!(user_variables -> users (user_id));

diesel::allow_tables_to_appear_in_same_query!(
    users,
    chat_requests,
    user_plans,
    request_analytics,
    user_dashboard_data,
    user_variables,
);
