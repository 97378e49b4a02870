//! Account onboarding, profile reads, and credit actions.

use std::sync::Arc;

use mockable::Clock;
use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;

use crate::domain::ports::{PlanRepository, UserPersistenceError, UserRepository};
use crate::domain::{
    CreditAction, CreditBalance, CreditDeduction, CreditsSummary, Error, IdentityProfile,
    PlanTier, User, UserId, UserPlan,
};

/// Profile returned by `GET /users/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountProfile {
    pub user: User,
    pub credits: CreditsSummary,
    pub plan: Option<UserPlan>,
}

pub(crate) fn user_not_found() -> Error {
    Error::not_found("User not found")
}

fn no_credits(balance: CreditBalance) -> Error {
    Error::invalid_request("No credits remaining").with_details(balance.usage_details())
}

/// Service owning user accounts and their credit balance.
#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UserRepository>,
    plans: Arc<dyn PlanRepository>,
    clock: Arc<dyn Clock>,
}

impl AccountService {
    /// Create the service over its repositories.
    pub fn new(
        users: Arc<dyn UserRepository>,
        plans: Arc<dyn PlanRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            plans,
            clock,
        }
    }

    /// Sign a verified identity in, creating the account on first sight.
    ///
    /// New accounts start on the free tier with ten credits and an active
    /// free plan. Returning users get `last_login_at` refreshed and are
    /// re-activated; one left without an active plan gets the free plan.
    pub async fn sign_in(&self, profile: IdentityProfile) -> Result<User, Error> {
        let now = self.clock.utc();
        if let Some(existing) = self.users.find_by_email(&profile.email).await? {
            return self.returning_user(&existing.id).await;
        }

        let user = User::onboard(profile.clone(), now);
        match self.users.insert(&user).await {
            Ok(()) => {}
            Err(UserPersistenceError::DuplicateEmail { .. }) => {
                // Concurrent first sign-in won the insert.
                let existing = self
                    .users
                    .find_by_email(&profile.email)
                    .await?
                    .ok_or_else(user_not_found)?;
                return self.returning_user(&existing.id).await;
            }
            Err(err) => return Err(err.into()),
        }
        self.plans.activate(&user.id, &UserPlan::free(now)).await?;
        info!(user_id = %user.id, "onboarded new user on the free plan");
        Ok(user)
    }

    async fn returning_user(&self, id: &UserId) -> Result<User, Error> {
        let user = self
            .users
            .record_login(id, self.clock.utc())
            .await?
            .ok_or_else(user_not_found)?;
        if self.plans.active_plan(id).await?.is_none() {
            self.plans.activate(id, &UserPlan::free(self.clock.utc())).await?;
            info!(user_id = %user.id, "restored missing free plan");
        }
        info!(user_id = %user.id, "user signed in");
        Ok(user)
    }

    /// Load a user or fail with 404 "User not found".
    pub async fn require_user(&self, id: &UserId) -> Result<User, Error> {
        self.users.find_by_id(id).await?.ok_or_else(user_not_found)
    }

    /// Credit counters merged with the active plan.
    pub async fn credits_summary(&self, id: &UserId) -> Result<CreditsSummary, Error> {
        let user = self.require_user(id).await?;
        let plan = self.plans.active_plan(id).await?;
        Ok(CreditsSummary::from_parts(&user, plan.as_ref()))
    }

    /// User, credit summary, and active plan.
    pub async fn profile(&self, id: &UserId) -> Result<AccountProfile, Error> {
        let user = self.require_user(id).await?;
        let plan = self.plans.active_plan(id).await?;
        let credits = CreditsSummary::from_parts(&user, plan.as_ref());
        Ok(AccountProfile {
            user,
            credits,
            plan,
        })
    }

    /// Apply a credit action and return the refreshed summary.
    pub async fn apply_credit_action(
        &self,
        id: &UserId,
        action: CreditAction,
    ) -> Result<CreditsSummary, Error> {
        let mut user = self.require_user(id).await?;
        let balance = match action {
            CreditAction::UseCredit => {
                if !user.credits.can_make_request() {
                    return Err(no_credits(user.credits));
                }
                match self.users.deduct_credit(id).await? {
                    CreditDeduction::Applied(balance) => balance,
                    CreditDeduction::Exhausted => return Err(no_credits(user.credits)),
                }
            }
            CreditAction::AddCredits { amount } => self
                .users
                .add_credits(id, amount)
                .await?
                .ok_or_else(user_not_found)?,
            CreditAction::ResetCredits => {
                if user.plan == PlanTier::Free {
                    return Err(Error::invalid_request("Cannot reset credits for free plan"));
                }
                self.users.reset_credits(id).await?.ok_or_else(user_not_found)?
            }
        };
        info!(
            user_id = %id,
            used = balance.used(),
            limit = balance.limit(),
            ?action,
            "credit action applied"
        );
        user.credits = balance;
        let plan = self.plans.active_plan(id).await?;
        Ok(CreditsSummary::from_parts(&user, plan.as_ref()))
    }
}

#[cfg(test)]
mod tests;
