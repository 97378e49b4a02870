//! Credit accounting: the gate in front of every generation and the
//! actions a user can take on their balance.
//!
//! A credit is one allowed generation. The balance is tracked as
//! `used` against `limit`; the gate rejects when `used >= limit`.

use serde::Serialize;
use serde_json::{Value, json};
use utoipa::ToSchema;

use crate::domain::{Error, PlanTier, User, UserPlan};

/// Requests granted to a newly onboarded free-tier account.
pub const FREE_CREDIT_ALLOWANCE: u32 = 10;

/// Largest limit a balance can hold, matching the `INTEGER` storage column.
pub const MAX_CREDIT_LIMIT: u32 = 2_147_483_647;

/// Feature list reported when the user has no active plan.
pub const DEFAULT_FEATURES: &[&str] = &["basic_chat"];

/// Per-user credit counters.
///
/// # Examples
/// ```
/// use forge_backend::domain::CreditBalance;
///
/// let balance = CreditBalance::new(3, 10);
/// assert_eq!(balance.remaining(), 7);
/// assert!(balance.ensure_available().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct CreditBalance {
    used: u32,
    limit: u32,
}

impl CreditBalance {
    /// Build a balance from raw counters.
    pub const fn new(used: u32, limit: u32) -> Self {
        Self { used, limit }
    }

    /// Balance granted at sign-up.
    pub const fn free_allowance() -> Self {
        Self::new(0, FREE_CREDIT_ALLOWANCE)
    }

    /// Requests consumed so far.
    pub const fn used(&self) -> u32 {
        self.used
    }

    /// Requests allowed in total.
    pub const fn limit(&self) -> u32 {
        self.limit
    }

    /// Credits left, never negative.
    pub const fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.used)
    }

    /// Whether one more request fits under the limit.
    pub const fn can_make_request(&self) -> bool {
        self.used < self.limit
    }

    /// True for an untouched free allowance.
    pub const fn is_new_user(&self) -> bool {
        self.used == 0 && self.limit == FREE_CREDIT_ALLOWANCE
    }

    /// Reject with `rate_limited` when the balance is spent.
    ///
    /// The error details carry `{ credits: { used, limit, remaining } }`.
    pub fn ensure_available(&self) -> Result<(), Error> {
        if self.can_make_request() {
            return Ok(());
        }
        Err(Error::rate_limited("No credits remaining").with_details(self.usage_details()))
    }

    /// `{ credits: { used, limit, remaining } }` for error payloads.
    pub fn usage_details(&self) -> Value {
        json!({
            "credits": {
                "used": self.used,
                "limit": self.limit,
                "remaining": self.remaining(),
            }
        })
    }

    /// Balance after one deduction, or `None` when already spent.
    pub fn consume(self) -> Option<Self> {
        self.can_make_request().then(|| Self::new(self.used + 1, self.limit))
    }

    /// Balance with `amount` extra credits on the limit, capped at
    /// [`MAX_CREDIT_LIMIT`].
    pub const fn with_added(self, amount: u32) -> Self {
        let raised = self.limit.saturating_add(amount);
        if raised > MAX_CREDIT_LIMIT {
            Self::new(self.used, MAX_CREDIT_LIMIT)
        } else {
            Self::new(self.used, raised)
        }
    }

    /// Balance with the usage counter cleared.
    pub const fn reset(self) -> Self {
        Self::new(0, self.limit)
    }
}

/// Result of the conditional credit deduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditDeduction {
    /// One credit was taken; the new balance is attached.
    Applied(CreditBalance),
    /// The balance was already spent, or the user no longer exists.
    Exhausted,
}

/// Operation requested through the credits endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditAction {
    /// Spend one credit outside a generation.
    UseCredit,
    /// Raise the limit by a positive amount.
    AddCredits { amount: u32 },
    /// Clear the usage counter on a paid plan.
    ResetCredits,
}

impl CreditAction {
    /// Parse the wire action name and optional amount.
    pub fn parse(action: &str, amount: Option<i64>) -> Result<Self, Error> {
        match action {
            "use_credit" => Ok(Self::UseCredit),
            "add_credits" => {
                let amount = amount.filter(|value| *value > 0).ok_or_else(|| {
                    Error::invalid_request("Invalid amount")
                        .with_details(json!({ "field": "amount", "code": "non_positive" }))
                })?;
                let amount = u32::try_from(amount)
                    .ok()
                    .filter(|value| *value <= MAX_CREDIT_LIMIT)
                    .ok_or_else(|| {
                        Error::invalid_request("Invalid amount").with_details(json!({
                            "field": "amount",
                            "code": "too_large",
                            "max": MAX_CREDIT_LIMIT,
                        }))
                    })?;
                Ok(Self::AddCredits { amount })
            }
            "reset_credits" => Ok(Self::ResetCredits),
            _ => Err(Error::invalid_request("Invalid action")
                .with_details(json!({ "field": "action", "code": "unknown_action" }))),
        }
    }
}

/// Credit view returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreditsSummary {
    pub used: u32,
    pub limit: u32,
    pub remaining: u32,
    pub is_new_user: bool,
    pub plan: PlanTier,
    pub plan_name: String,
    pub features: Vec<String>,
    pub can_make_request: bool,
}

impl CreditsSummary {
    /// Combine the user's balance with the active plan, if any.
    pub fn from_parts(user: &User, plan: Option<&UserPlan>) -> Self {
        let balance = user.credits;
        let (plan_name, features) = match plan {
            Some(plan) => (plan.plan_name.clone(), plan.features.clone()),
            None => (
                PlanTier::Free.as_str().to_owned(),
                DEFAULT_FEATURES.iter().map(|f| (*f).to_owned()).collect(),
            ),
        };
        Self {
            used: balance.used(),
            limit: balance.limit(),
            remaining: balance.remaining(),
            is_new_user: balance.is_new_user(),
            plan: user.plan,
            plan_name,
            features,
            can_make_request: balance.can_make_request(),
        }
    }
}
