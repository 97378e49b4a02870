//! Client metadata recorded with each chat request.

use actix_web::HttpRequest;
use actix_web::http::header::{HeaderMap, USER_AGENT};

use crate::domain::{ClientInfo, MAX_IP_ADDRESS_LEN};

const FORWARDED_FOR: &str = "x-forwarded-for";
const REAL_IP: &str = "x-real-ip";

fn header_text<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Caller address and user agent.
///
/// The address is the first `x-forwarded-for` entry, then `x-real-ip`.
/// Neither is trusted for anything beyond bookkeeping, and an address too
/// long to store is dropped.
pub fn client_info(req: &HttpRequest) -> ClientInfo {
    let headers = req.headers();
    let ip_address = header_text(headers, FORWARDED_FOR)
        .and_then(|list| list.split(',').next())
        .map(str::trim)
        .filter(|first| !first.is_empty())
        .or_else(|| header_text(headers, REAL_IP))
        .filter(|address| address.len() <= MAX_IP_ADDRESS_LEN)
        .map(str::to_owned);
    ClientInfo {
        ip_address,
        user_agent: header_text(headers, USER_AGENT.as_str()).map(str::to_owned),
    }
}
