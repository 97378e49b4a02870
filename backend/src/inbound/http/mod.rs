//! HTTP inbound adapter exposing REST endpoints.

pub mod client;
pub mod credits;
pub mod dashboard;
pub mod error;
pub mod generate;
pub mod health;
pub mod session;
pub mod state;
#[cfg(test)]
pub mod test_utils;
pub mod tracking;
pub mod users;
pub mod variables;

pub use error::ApiResult;

use actix_web::web;

/// Register every session-backed `/api/v1` handler on a scope.
///
/// # Examples
/// ```
/// use actix_web::{App, web};
/// use forge_backend::inbound::http::configure;
///
/// let app = App::new().service(web::scope("/api/v1").configure(configure));
/// ```
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(users::login)
        .service(users::logout)
        .service(users::current_user)
        .service(generate::generate)
        .service(generate::chat)
        .service(credits::get_credits)
        .service(credits::update_credits)
        .service(tracking::start_tracking)
        .service(tracking::update_tracking)
        .service(tracking::plan_limits)
        .service(dashboard::overview)
        .service(dashboard::recalculate)
        .service(dashboard::stats)
        .service(dashboard::analytics)
        .service(dashboard::costs)
        .service(variables::list_variables)
        .service(variables::create_variable)
        .service(variables::update_variables)
        .service(variables::get_variable)
        .service(variables::put_variable)
        .service(variables::delete_variable);
}
