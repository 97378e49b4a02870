//! Builders wiring port adapters into the HTTP state.

use std::sync::Arc;

use mockable::DefaultClock;

use forge_backend::domain::ports::{FixtureCompletionProvider, FixtureLoginService};
use forge_backend::inbound::http::state::{HttpState, HttpStatePorts};
use forge_backend::outbound::memory::InMemoryStore;
use forge_backend::outbound::persistence::{
    DbPool, DieselAnalyticsRepository, DieselChatRequestRepository, DieselDashboardRepository,
    DieselPlanRepository, DieselUserRepository, DieselUserVariableRepository,
};

use super::ServerConfig;

fn memory_ports() -> HttpStatePorts {
    let store = Arc::new(InMemoryStore::new());
    HttpStatePorts {
        login: Arc::new(FixtureLoginService),
        users: store.clone(),
        chat_requests: store.clone(),
        plans: store.clone(),
        analytics: store.clone(),
        dashboards: store.clone(),
        variables: store,
        completions: Arc::new(FixtureCompletionProvider::default()),
        clock: Arc::new(DefaultClock),
    }
}

fn diesel_ports(pool: &DbPool) -> HttpStatePorts {
    HttpStatePorts {
        login: Arc::new(FixtureLoginService),
        users: Arc::new(DieselUserRepository::new(pool.clone())),
        chat_requests: Arc::new(DieselChatRequestRepository::new(pool.clone())),
        plans: Arc::new(DieselPlanRepository::new(pool.clone())),
        analytics: Arc::new(DieselAnalyticsRepository::new(pool.clone())),
        dashboards: Arc::new(DieselDashboardRepository::new(pool.clone())),
        variables: Arc::new(DieselUserVariableRepository::new(pool.clone())),
        completions: Arc::new(FixtureCompletionProvider::default()),
        clock: Arc::new(DefaultClock),
    }
}

/// Build HTTP state over Diesel when a pool is configured, otherwise over a
/// process-local store.
pub(super) fn build_http_state(config: &ServerConfig) -> HttpState {
    let ports = match &config.db_pool {
        Some(pool) => diesel_ports(pool),
        None => memory_ports(),
    };
    HttpState::new(ports)
}
