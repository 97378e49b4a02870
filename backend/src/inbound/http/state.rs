//! Shared HTTP adapter state.
//!
//! HTTP handlers accept this state via `actix_web::web::Data` so they only
//! depend on domain services and remain testable without I/O.

use std::sync::Arc;

use mockable::Clock;

use crate::domain::ports::{
    AnalyticsRepository, ChatRequestRepository, CompletionProvider, DashboardRepository,
    LoginService, PlanRepository, UserRepository, UserVariableRepository,
};
use crate::domain::{
    AccountService, DashboardService, DashboardSources, GenerationService,
    RequestTrackingService, VariableService,
};

/// Parameter object bundling the port implementations behind the services.
#[derive(Clone)]
pub struct HttpStatePorts {
    pub login: Arc<dyn LoginService>,
    pub users: Arc<dyn UserRepository>,
    pub chat_requests: Arc<dyn ChatRequestRepository>,
    pub plans: Arc<dyn PlanRepository>,
    pub analytics: Arc<dyn AnalyticsRepository>,
    pub dashboards: Arc<dyn DashboardRepository>,
    pub variables: Arc<dyn UserVariableRepository>,
    pub completions: Arc<dyn CompletionProvider>,
    pub clock: Arc<dyn Clock>,
}

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub login: Arc<dyn LoginService>,
    pub accounts: AccountService,
    pub generation: GenerationService,
    pub tracking: RequestTrackingService,
    pub dashboard: DashboardService,
    pub variables: VariableService,
}

impl HttpState {
    /// Wire the domain services over a ports bundle.
    ///
    /// # Examples
    /// ```
    /// use std::sync::Arc;
    ///
    /// use forge_backend::domain::ports::{FixtureCompletionProvider, FixtureLoginService};
    /// use forge_backend::inbound::http::state::{HttpState, HttpStatePorts};
    /// use forge_backend::outbound::memory::InMemoryStore;
    /// use mockable::DefaultClock;
    ///
    /// let store = Arc::new(InMemoryStore::new());
    /// let state = HttpState::new(HttpStatePorts {
    ///     login: Arc::new(FixtureLoginService),
    ///     users: store.clone(),
    ///     chat_requests: store.clone(),
    ///     plans: store.clone(),
    ///     analytics: store.clone(),
    ///     dashboards: store.clone(),
    ///     variables: store,
    ///     completions: Arc::new(FixtureCompletionProvider::default()),
    ///     clock: Arc::new(DefaultClock),
    /// });
    /// let _accounts = state.accounts.clone();
    /// ```
    pub fn new(ports: HttpStatePorts) -> Self {
        let HttpStatePorts {
            login,
            users,
            chat_requests,
            plans,
            analytics,
            dashboards,
            variables,
            completions,
            clock,
        } = ports;
        Self {
            login,
            accounts: AccountService::new(users.clone(), plans.clone(), clock.clone()),
            variables: VariableService::new(users.clone(), variables, clock.clone()),
            generation: GenerationService::new(
                users.clone(),
                chat_requests.clone(),
                completions,
                clock.clone(),
            ),
            tracking: RequestTrackingService::new(
                chat_requests.clone(),
                plans.clone(),
                analytics.clone(),
                clock.clone(),
            ),
            dashboard: DashboardService::new(
                DashboardSources {
                    users,
                    chat_requests,
                    plans,
                    analytics,
                    dashboards,
                },
                clock,
            ),
        }
    }
}
