//! In-process adapter implementing every persistence port.
//!
//! Used when no database URL is configured and by tests that need real
//! repository semantics without PostgreSQL. State lives behind one mutex so
//! each port call is atomic, matching the conditional updates of the Diesel
//! adapters.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::ports::{
    AnalyticsRepository, AnalyticsRepositoryError, ChatRequestRepository,
    ChatRequestRepositoryError, DashboardRepository, DashboardRepositoryError, PlanRepository,
    PlanRepositoryError, UserPersistenceError, UserRepository, UserVariableRepository,
    UserVariableRepositoryError,
};
use crate::domain::{
    ChatRequest, ChatRequestId, ChatRequestUpdate, CreditBalance, CreditDeduction,
    DashboardSnapshot, EmailAddress, NewChatRequest, PerformanceSample, RequestAnalytic, User,
    UserId, UserPlan, UserVariable, VariableKey,
};

#[derive(Debug, Default)]
struct State {
    users: HashMap<UserId, User>,
    chat_requests: Vec<ChatRequest>,
    plans: HashMap<UserId, Vec<UserPlan>>,
    analytics: Vec<RequestAnalytic>,
    dashboards: HashMap<UserId, DashboardSnapshot>,
    variables: BTreeMap<(UserId, VariableKey), UserVariable>,
}

/// Mutex-guarded store shared by all in-memory repositories.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Modify a stored user in place. Returns `false` when absent.
    pub fn update_user(&self, id: &UserId, change: impl FnOnce(&mut User)) -> bool {
        self.lock().users.get_mut(id).map(change).is_some()
    }

    /// Every stored request for `user_id`, oldest first.
    pub fn chat_requests_for(&self, user_id: &UserId) -> Vec<ChatRequest> {
        self.lock()
            .chat_requests
            .iter()
            .filter(|r| &r.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Every stored analytics sample.
    pub fn analytics(&self) -> Vec<RequestAnalytic> {
        self.lock().analytics.clone()
    }

    fn adjust_credits(
        &self,
        id: &UserId,
        change: impl FnOnce(CreditBalance) -> CreditBalance,
    ) -> Option<CreditBalance> {
        let mut state = self.lock();
        let user = state.users.get_mut(id)?;
        user.credits = change(user.credits);
        Some(user.credits)
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserPersistenceError> {
        Ok(self.lock().users.get(id).cloned())
    }

    async fn find_by_email(
        &self,
        email: &EmailAddress,
    ) -> Result<Option<User>, UserPersistenceError> {
        Ok(self
            .lock()
            .users
            .values()
            .find(|user| &user.email == email)
            .cloned())
    }

    async fn insert(&self, user: &User) -> Result<(), UserPersistenceError> {
        let mut state = self.lock();
        if state.users.values().any(|u| u.email == user.email) {
            return Err(UserPersistenceError::duplicate_email(user.email.to_string()));
        }
        state.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn record_login(
        &self,
        id: &UserId,
        at: DateTime<Utc>,
    ) -> Result<Option<User>, UserPersistenceError> {
        let mut state = self.lock();
        Ok(state.users.get_mut(id).map(|user| {
            user.last_login_at = Some(at);
            user.is_active = true;
            user.clone()
        }))
    }

    async fn deduct_credit(&self, id: &UserId) -> Result<CreditDeduction, UserPersistenceError> {
        let mut state = self.lock();
        let Some(user) = state.users.get_mut(id) else {
            return Ok(CreditDeduction::Exhausted);
        };
        Ok(match user.credits.consume() {
            Some(balance) => {
                user.credits = balance;
                CreditDeduction::Applied(balance)
            }
            None => CreditDeduction::Exhausted,
        })
    }

    async fn add_credits(
        &self,
        id: &UserId,
        amount: u32,
    ) -> Result<Option<CreditBalance>, UserPersistenceError> {
        Ok(self.adjust_credits(id, |balance| balance.with_added(amount)))
    }

    async fn reset_credits(
        &self,
        id: &UserId,
    ) -> Result<Option<CreditBalance>, UserPersistenceError> {
        Ok(self.adjust_credits(id, CreditBalance::reset))
    }
}

#[async_trait]
impl ChatRequestRepository for InMemoryStore {
    async fn create(&self, request: &NewChatRequest) -> Result<(), ChatRequestRepositoryError> {
        self.lock()
            .chat_requests
            .push(ChatRequest::from_new(request.clone()));
        Ok(())
    }

    async fn find_for_user(
        &self,
        user_id: &UserId,
        id: ChatRequestId,
    ) -> Result<Option<ChatRequest>, ChatRequestRepositoryError> {
        Ok(self
            .lock()
            .chat_requests
            .iter()
            .find(|r| r.id == id && &r.user_id == user_id)
            .cloned())
    }

    async fn finish(
        &self,
        id: ChatRequestId,
        update: &ChatRequestUpdate,
    ) -> Result<Option<ChatRequest>, ChatRequestRepositoryError> {
        let mut state = self.lock();
        Ok(state
            .chat_requests
            .iter_mut()
            .find(|r| r.id == id && !r.status.is_terminal())
            .map(|request| {
                request.apply(update.clone());
                request.clone()
            }))
    }

    async fn list_since(
        &self,
        user_id: &UserId,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ChatRequest>, ChatRequestRepositoryError> {
        Ok(self
            .lock()
            .chat_requests
            .iter()
            .filter(|r| &r.user_id == user_id && since.is_none_or(|s| r.started_at >= s))
            .cloned()
            .collect())
    }

    async fn count_since(
        &self,
        user_id: &UserId,
        since: DateTime<Utc>,
    ) -> Result<u64, ChatRequestRepositoryError> {
        let count = self
            .lock()
            .chat_requests
            .iter()
            .filter(|r| &r.user_id == user_id && r.created_at >= since)
            .count();
        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }
}

#[async_trait]
impl PlanRepository for InMemoryStore {
    async fn active_plan(&self, user_id: &UserId) -> Result<Option<UserPlan>, PlanRepositoryError> {
        Ok(self
            .lock()
            .plans
            .get(user_id)
            .and_then(|plans| plans.iter().find(|p| p.is_active).cloned()))
    }

    async fn activate(&self, user_id: &UserId, plan: &UserPlan) -> Result<(), PlanRepositoryError> {
        let mut state = self.lock();
        let plans = state.plans.entry(user_id.clone()).or_default();
        for existing in plans.iter_mut() {
            existing.is_active = false;
        }
        let mut active = plan.clone();
        active.is_active = true;
        plans.push(active);
        Ok(())
    }
}

#[async_trait]
impl AnalyticsRepository for InMemoryStore {
    async fn record(&self, analytic: &RequestAnalytic) -> Result<(), AnalyticsRepositoryError> {
        self.lock().analytics.push(analytic.clone());
        Ok(())
    }

    async fn category_counts(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<(Option<String>, u64)>, AnalyticsRepositoryError> {
        let state = self.lock();
        let mut counts: BTreeMap<Option<String>, u64> = BTreeMap::new();
        for analytic in state.analytics.iter().filter(|a| &a.user_id == user_id) {
            *counts.entry(analytic.category.clone()).or_insert(0) += 1;
        }
        Ok(counts.into_iter().collect())
    }

    async fn performance_samples(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<PerformanceSample>, AnalyticsRepositoryError> {
        Ok(self
            .lock()
            .analytics
            .iter()
            .filter(|a| &a.user_id == user_id)
            .map(PerformanceSample::from)
            .collect())
    }
}

#[async_trait]
impl DashboardRepository for InMemoryStore {
    async fn find(
        &self,
        user_id: &UserId,
    ) -> Result<Option<DashboardSnapshot>, DashboardRepositoryError> {
        Ok(self.lock().dashboards.get(user_id).cloned())
    }

    async fn upsert(
        &self,
        user_id: &UserId,
        snapshot: &DashboardSnapshot,
    ) -> Result<(), DashboardRepositoryError> {
        self.lock()
            .dashboards
            .insert(user_id.clone(), snapshot.clone());
        Ok(())
    }
}

#[async_trait]
impl UserVariableRepository for InMemoryStore {
    async fn list_variables(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<UserVariable>, UserVariableRepositoryError> {
        Ok(self
            .lock()
            .variables
            .values()
            .filter(|v| &v.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find_variable(
        &self,
        user_id: &UserId,
        key: &VariableKey,
    ) -> Result<Option<UserVariable>, UserVariableRepositoryError> {
        Ok(self
            .lock()
            .variables
            .get(&(user_id.clone(), key.clone()))
            .cloned())
    }

    async fn save_variable(
        &self,
        variable: &UserVariable,
    ) -> Result<UserVariable, UserVariableRepositoryError> {
        let mut state = self.lock();
        let slot = (variable.user_id.clone(), variable.key.clone());
        let stored = match state.variables.get(&slot) {
            Some(current) => UserVariable {
                id: current.id,
                created_at: current.created_at,
                ..variable.clone()
            },
            None => variable.clone(),
        };
        state.variables.insert(slot, stored.clone());
        Ok(stored)
    }

    async fn delete_variable(
        &self,
        user_id: &UserId,
        key: &VariableKey,
    ) -> Result<bool, UserVariableRepositoryError> {
        Ok(self
            .lock()
            .variables
            .remove(&(user_id.clone(), key.clone()))
            .is_some())
    }
}
