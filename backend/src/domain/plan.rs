//! Subscription plans and the calendar-window request limits they impose.

use chrono::{DateTime, Datelike, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::domain::{Error, PlanTier};

/// How often a plan is billed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BillingCycle {
    Monthly,
    Yearly,
}

impl BillingCycle {
    /// Storage representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    /// Parse a stored value; anything unrecognised bills monthly.
    pub fn parse_or_monthly(raw: &str) -> Self {
        match raw {
            "yearly" => Self::Yearly,
            _ => Self::Monthly,
        }
    }
}

/// A user's subscription with its request ceilings and feature flags.
///
/// ## Invariants
/// - At most one plan per user has `is_active == true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserPlan {
    pub plan_name: String,
    pub monthly_requests: u32,
    pub daily_requests: u32,
    pub max_tokens_per_request: u32,
    pub features: Vec<String>,
    pub is_active: bool,
    pub price_per_month_cents: u32,
    pub billing_cycle: BillingCycle,
    pub starts_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl UserPlan {
    /// The plan attached to every new account.
    ///
    /// # Examples
    /// ```
    /// use chrono::Utc;
    /// use forge_backend::domain::UserPlan;
    ///
    /// let plan = UserPlan::free(Utc::now());
    /// assert_eq!(plan.monthly_requests, 10);
    /// assert!(plan.features.iter().any(|f| f == "code_generation"));
    /// ```
    pub fn free(starts_at: DateTime<Utc>) -> Self {
        Self {
            plan_name: PlanTier::Free.as_str().to_owned(),
            monthly_requests: 10,
            daily_requests: 10,
            max_tokens_per_request: 2000,
            features: vec!["basic_chat".to_owned(), "code_generation".to_owned()],
            is_active: true,
            price_per_month_cents: 0,
            billing_cycle: BillingCycle::Monthly,
            starts_at,
            expires_at: None,
        }
    }
}

/// Midnight UTC at the start of `now`'s day.
pub fn day_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&now.date_naive().and_time(NaiveTime::MIN))
}

/// Midnight UTC on the first of `now`'s month.
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let first = now.date_naive().with_day(1).unwrap_or_else(|| now.date_naive());
    Utc.from_utc_datetime(&first.and_time(NaiveTime::MIN))
}

/// Requests counted in the current calendar windows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageCounts {
    pub month: u64,
    pub day: u64,
}

/// Outcome of checking a user's plan against their usage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlanLimits {
    pub can_make_request: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub monthly_used: u64,
    pub monthly_limit: u32,
    pub daily_used: u64,
    pub daily_limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<UserPlan>,
}

impl PlanLimits {
    /// Compare usage against the active plan.
    ///
    /// Without an active plan no request is allowed.
    pub fn evaluate(plan: Option<UserPlan>, usage: UsageCounts) -> Self {
        let Some(plan) = plan else {
            return Self {
                can_make_request: false,
                reason: Some("No active plan".to_owned()),
                monthly_used: usage.month,
                monthly_limit: 0,
                daily_used: usage.day,
                daily_limit: 0,
                plan: None,
            };
        };

        let monthly_ok = usage.month < u64::from(plan.monthly_requests);
        let daily_ok = usage.day < u64::from(plan.daily_requests);
        let reason = match (monthly_ok, daily_ok) {
            (true, true) => None,
            (false, _) => Some("Monthly request limit reached".to_owned()),
            (true, false) => Some("Daily request limit reached".to_owned()),
        };
        Self {
            can_make_request: monthly_ok && daily_ok,
            reason,
            monthly_used: usage.month,
            monthly_limit: plan.monthly_requests,
            daily_used: usage.day,
            daily_limit: plan.daily_requests,
            plan: Some(plan),
        }
    }

    /// Reject with `rate_limited` carrying these limits when not allowed.
    pub fn ensure_allowed(&self) -> Result<(), Error> {
        if self.can_make_request {
            return Ok(());
        }
        let details = serde_json::to_value(self).unwrap_or_else(|_| json!({}));
        Err(Error::rate_limited("Request limit exceeded").with_details(json!({ "limits": details })))
    }
}
