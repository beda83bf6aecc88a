use std::borrow::Cow;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use tracing::{info, warn};

use crate::hostname::{is_valid_hostname, strip_port};
use crate::render::display_url;

use super::{ApiError, AppState};

pub async fn handle_block(State(state): State<AppState>, headers: HeaderMap, uri: Uri) -> Response {
    let raw_host = requested_host(&headers, &uri);
    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    block_page(&state, raw_host.as_deref(), path_and_query).await
}

/// Host as the client sent it: the `Host` header, or for HTTP/2 requests
/// without one, the `:authority` (host and port, userinfo dropped).
fn requested_host<'a>(headers: &'a HeaderMap, uri: &Uri) -> Option<Cow<'a, str>> {
    if let Some(value) = headers.get(header::HOST) {
        return Some(String::from_utf8_lossy(value.as_bytes()));
    }
    let authority = uri.authority()?;
    Some(match authority.port() {
        Some(port) => Cow::Owned(format!("{}:{port}", authority.host())),
        None => Cow::Owned(authority.host().to_string()),
    })
}

/// Validate the requested host, categorize it and render the block page.
///
/// Only a missing or unsafe Host is rejected. Upstream failures always
/// degrade to the fallback category and a normal page.
pub async fn block_page(state: &AppState, raw_host: Option<&str>, path_and_query: &str) -> Response {
    let Some(raw_host) = raw_host.filter(|host| !host.is_empty()) else {
        warn!("missing Host header");
        return ApiError::bad_request("Bad Request: Missing Host header").into_response();
    };

    let hostname = strip_port(raw_host);
    if !is_valid_hostname(hostname) {
        warn!(hostname = ?hostname, "invalid hostname");
        return ApiError::bad_request("Bad Request: Invalid hostname").into_response();
    }

    info!(hostname, "request for hostname");
    let result = state.categorizer.classify(hostname).await;
    let category = result.label();
    info!(hostname, category = ?category, "blocked");

    let html = state
        .template
        .render(&display_url(raw_host, path_and_query), &category);

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8"),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
            (header::X_FRAME_OPTIONS, "DENY"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        html,
    )
        .into_response()
}
