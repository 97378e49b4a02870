//! Backend entry-point: loads settings, connects storage, and serves the API.

mod server;

use actix_web::web;
use ortho_config::OrthoConfig;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};

use forge_backend::inbound::http::health::HealthState;
use server::{BuildMode, ServerConfig, ServerSettings, connect_database, create_server};

/// Application bootstrap.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings = ServerSettings::load().map_err(std::io::Error::other)?;
    let key = settings.session_key(BuildMode::from_debug_assertions())?;
    let mut config = ServerConfig::new(key, settings.session_cookie_secure, settings.bind_addr()?);
    if let Some(pool) = connect_database(&settings).await? {
        config = config.with_db_pool(pool);
    }

    let health_state = web::Data::new(HealthState::new());
    create_server(health_state, config)?.await
}
