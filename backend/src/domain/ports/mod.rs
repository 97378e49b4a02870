//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod analytics_repository;
mod chat_request_repository;
mod completion_provider;
mod dashboard_repository;
mod login_service;
mod plan_repository;
mod user_repository;
mod user_variable_repository;

#[cfg(test)]
pub use analytics_repository::MockAnalyticsRepository;
pub use analytics_repository::{AnalyticsRepository, AnalyticsRepositoryError};
#[cfg(test)]
pub use chat_request_repository::MockChatRequestRepository;
pub use chat_request_repository::{ChatRequestRepository, ChatRequestRepositoryError};
#[cfg(test)]
pub use completion_provider::MockCompletionProvider;
pub use completion_provider::{
    ChatMessage, ChatRole, CompletionError, CompletionProvider, CompletionRequest,
    CompletionStream, FixtureCompletionProvider,
};
#[cfg(test)]
pub use dashboard_repository::MockDashboardRepository;
pub use dashboard_repository::{DashboardRepository, DashboardRepositoryError};
#[cfg(test)]
pub use login_service::MockLoginService;
pub use login_service::{FIXTURE_EMAIL, FixtureLoginService, LoginService};
#[cfg(test)]
pub use plan_repository::MockPlanRepository;
pub use plan_repository::{PlanRepository, PlanRepositoryError};
#[cfg(test)]
pub use user_repository::MockUserRepository;
pub use user_repository::{UserPersistenceError, UserRepository};
#[cfg(test)]
pub use user_variable_repository::MockUserVariableRepository;
pub use user_variable_repository::{UserVariableRepository, UserVariableRepositoryError};
