//! Server harness and shared world for HTTP behaviour suites.
//!
//! The harness owns a single-threaded Tokio runtime plus a `LocalSet` because
//! Actix uses `spawn_local` internally. Dropping the `WorldFixture` stops the
//! server even if a step panics.

use std::cell::RefCell;
use std::net::TcpListener;
use std::rc::Rc;
use std::sync::Arc;

use actix_session::SessionMiddleware;
use actix_session::config::{CookieContentSecurity, PersistentSession};
use actix_session::storage::CookieSessionStore;
use actix_web::cookie::{Key, SameSite, time::Duration as CookieDuration};
use actix_web::dev::ServerHandle;
use actix_web::http::{Method, header};
use actix_web::{App, HttpServer, web};
use awc::Client;
use serde_json::Value;
use tokio::runtime::Runtime;
use tokio::task::LocalSet;

use forge_backend::Trace;
use forge_backend::domain::TRACE_ID_HEADER;
use forge_backend::domain::ports::{FixtureCompletionProvider, FixtureLoginService};
use forge_backend::inbound::http::configure;
use forge_backend::inbound::http::error::json_error_handler;
use forge_backend::inbound::http::state::{HttpState, HttpStatePorts};
use forge_backend::outbound::memory::InMemoryStore;
use forge_backend::test_support::MutableClock;

pub(crate) struct ForgeWorld {
    pub(crate) runtime: Runtime,
    pub(crate) local: LocalSet,
    pub(crate) base_url: String,
    pub(crate) server: ServerHandle,
    pub(crate) store: Arc<InMemoryStore>,
    pub(crate) last_status: Option<u16>,
    pub(crate) last_body: Option<Value>,
    pub(crate) last_trace_id: Option<String>,
    pub(crate) session_cookie: Option<String>,
    pub(crate) tracked_request_id: Option<String>,
}

pub(crate) type SharedWorld = Rc<RefCell<ForgeWorld>>;

pub(crate) struct WorldFixture {
    world: SharedWorld,
}

impl WorldFixture {
    pub(crate) fn world(&self) -> SharedWorld {
        self.world.clone()
    }
}

impl Drop for WorldFixture {
    fn drop(&mut self) {
        shutdown(self.world.clone());
    }
}

fn shutdown(world: SharedWorld) {
    // `LocalSet` must be driven on the thread that owns it. The future must
    // not borrow the world.
    let ctx = world.borrow();
    let server = ctx.server.clone();
    ctx.local.block_on(&ctx.runtime, async move {
        server.stop(true).await;
    });
}

pub(crate) fn with_world_async<R, F>(world: &SharedWorld, operation: impl FnOnce(String) -> F) -> R
where
    F: std::future::Future<Output = R>,
{
    let ctx = world.borrow();
    let base_url = ctx.base_url.clone();
    ctx.local.block_on(&ctx.runtime, operation(base_url))
}

fn test_session_middleware(key: Key) -> SessionMiddleware<CookieSessionStore> {
    SessionMiddleware::builder(CookieSessionStore::default(), key)
        .cookie_name("session".to_owned())
        .cookie_path("/".to_owned())
        .cookie_secure(false)
        .cookie_http_only(true)
        .cookie_content_security(CookieContentSecurity::Private)
        .cookie_same_site(SameSite::Lax)
        .session_lifecycle(PersistentSession::default().session_ttl(CookieDuration::hours(2)))
        .build()
}

async fn spawn_server(http_state: HttpState) -> Result<(String, ServerHandle), String> {
    let key = Key::generate();
    let listener = TcpListener::bind("127.0.0.1:0").map_err(|err| err.to_string())?;
    let addr = listener.local_addr().map_err(|err| err.to_string())?;
    let http_data = web::Data::new(http_state);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(http_data.clone())
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .wrap(Trace)
            .service(
                web::scope("/api/v1")
                    .wrap(test_session_middleware(key.clone()))
                    .configure(configure),
            )
    })
    .disable_signals()
    .workers(1)
    .listen(listener)
    .map_err(|err| err.to_string())?
    .run();

    let handle = server.handle();
    actix_web::rt::spawn(server);

    Ok((format!("http://{addr}"), handle))
}

pub(crate) fn world() -> WorldFixture {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("tokio runtime");
    let local = LocalSet::new();
    let store = Arc::new(InMemoryStore::new());
    let http_state = HttpState::new(HttpStatePorts {
        login: Arc::new(FixtureLoginService),
        users: store.clone(),
        chat_requests: store.clone(),
        plans: store.clone(),
        analytics: store.clone(),
        dashboards: store.clone(),
        variables: store.clone(),
        completions: Arc::new(FixtureCompletionProvider::default()),
        clock: Arc::new(MutableClock::fixed()),
    });

    let (base_url, server) = local
        .block_on(&runtime, spawn_server(http_state))
        .expect("server starts");

    WorldFixture {
        world: Rc::new(RefCell::new(ForgeWorld {
            runtime,
            local,
            base_url,
            server,
            store,
            last_status: None,
            last_body: None,
            last_trace_id: None,
            session_cookie: None,
            tracked_request_id: None,
        })),
    }
}

/// Sign in with the fixture credentials and keep the session cookie.
pub(crate) fn login(world: &SharedWorld) {
    let (status, cookie) = with_world_async(world, |base_url| async move {
        let response = Client::default()
            .post(format!("{base_url}/api/v1/login"))
            .send_json(&serde_json::json!({
                "username": "admin",
                "password": "password"
            }))
            .await
            .expect("login request");
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .map(str::to_owned);
        (response.status().as_u16(), cookie)
    });

    assert_eq!(status, 200, "fixture login succeeds");
    let mut ctx = world.borrow_mut();
    ctx.session_cookie = cookie;
    ctx.last_status = Some(status);
    ctx.last_body = None;
    ctx.last_trace_id = None;
}

/// Send a JSON request, optionally with the session cookie, and record the
/// outcome on the world.
pub(crate) fn request(world: &SharedWorld, method: Method, path: &str, payload: Option<Value>) {
    let cookie = world.borrow().session_cookie.clone();
    let path = path.to_owned();
    let (status, trace_id, body) = with_world_async(world, |base_url| async move {
        let mut request = Client::default().request(method, format!("{base_url}{path}"));
        if let Some(cookie) = cookie {
            request = request.insert_header((header::COOKIE, cookie));
        }
        let mut response = match payload {
            Some(payload) => request.send_json(&payload).await,
            None => request.send().await,
        }
        .expect("request completes");
        let status = response.status().as_u16();
        let trace_id = response
            .headers()
            .get(TRACE_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let bytes = response.body().await.expect("response body");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, trace_id, body)
    });

    let mut ctx = world.borrow_mut();
    ctx.last_status = Some(status);
    ctx.last_trace_id = trace_id;
    ctx.last_body = Some(body);
}

/// Status and body of the most recent request.
pub(crate) fn last_response(world: &SharedWorld) -> (u16, Value) {
    let ctx = world.borrow();
    (
        ctx.last_status.expect("a request was made"),
        ctx.last_body.clone().unwrap_or(Value::Null),
    )
}
