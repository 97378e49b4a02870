//! Test helpers for inbound HTTP components.

use std::sync::Arc;

use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::cookie::{Cookie, Key};
use actix_web::dev::{Service, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, test as actix_test, web};
use serde_json::json;

use crate::domain::ports::{CompletionProvider, FIXTURE_EMAIL, FixtureCompletionProvider, FixtureLoginService};
use crate::domain::ports::UserRepository;
use crate::domain::{EmailAddress, User};
use crate::inbound::http::error::json_error_handler;
use crate::inbound::http::state::{HttpState, HttpStatePorts};
use crate::outbound::memory::InMemoryStore;
use crate::test_support::MutableClock;

/// Build a session middleware configured for tests.
///
/// Generates a fresh key per invocation and disables the `Secure` flag for
/// local HTTP tests.
pub fn test_session_middleware() -> SessionMiddleware<CookieSessionStore> {
    SessionMiddleware::builder(CookieSessionStore::default(), Key::generate())
        .cookie_name("session".to_owned())
        .cookie_secure(false)
        .build()
}

/// In-memory wiring shared by handler tests.
pub struct TestContext {
    pub store: Arc<InMemoryStore>,
    pub clock: Arc<MutableClock>,
    pub state: HttpState,
}

impl TestContext {
    /// Context with the default fixture completion provider.
    pub fn new() -> Self {
        Self::with_provider(Arc::new(FixtureCompletionProvider::default()))
    }

    /// Context whose generations go to `provider`.
    pub fn with_provider(provider: Arc<dyn CompletionProvider>) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(MutableClock::fixed());
        let state = HttpState::new(HttpStatePorts {
            login: Arc::new(FixtureLoginService),
            users: store.clone(),
            chat_requests: store.clone(),
            plans: store.clone(),
            analytics: store.clone(),
            dashboards: store.clone(),
            variables: store.clone(),
            completions: provider,
            clock: clock.clone(),
        });
        Self {
            store,
            clock,
            state,
        }
    }

    /// Application with the full `/api/v1` scope mounted.
    pub fn app(
        &self,
    ) -> App<
        impl ServiceFactory<
            ServiceRequest,
            Config = (),
            Response = ServiceResponse,
            Error = actix_web::Error,
            InitError = (),
        > + use<>,
    > {
        App::new()
            .app_data(web::Data::new(self.state.clone()))
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .wrap(test_session_middleware())
            .service(web::scope("/api/v1").configure(crate::inbound::http::configure))
    }

    /// The account created by the fixture login.
    pub async fn fixture_user(&self) -> User {
        let email = EmailAddress::new(FIXTURE_EMAIL).expect("fixture email");
        self.store
            .find_by_email(&email)
            .await
            .expect("lookup succeeds")
            .expect("fixture user signed in")
    }
}

/// Log in with the fixture credentials and return the session cookie.
pub async fn login_cookie<S>(app: &S) -> Cookie<'static>
where
    S: Service<actix_http::Request, Response = ServiceResponse, Error = actix_web::Error>,
{
    let request = actix_test::TestRequest::post()
        .uri("/api/v1/login")
        .set_json(json!({ "username": "admin", "password": "password" }))
        .to_request();
    let response = actix_test::call_service(app, request).await;
    assert!(response.status().is_success(), "fixture login succeeds");
    response
        .response()
        .cookies()
        .find(|cookie| cookie.name() == "session")
        .expect("session cookie")
        .into_owned()
}
