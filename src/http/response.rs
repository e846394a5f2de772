//! Responses the proxy produces on its own.
//!
//! # Responsibilities
//! - Decoy page and redirect for denied requests
//! - Generic error responses that disclose nothing about internals
//!
//! # Design Decisions
//! - Denials never carry the failing rule
//! - Error bodies are fixed strings

use axum::{
    body::Body,
    http::{header, HeaderValue, Response, StatusCode},
};

/// Static page served to denied clients when no redirect is configured.
pub const DECOY_HTML: &str = include_str!("decoy.html");

pub const DECOY_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// 200 with the decoy page.
pub fn decoy_page() -> Response<Body> {
    let mut response = Response::new(Body::from(DECOY_HTML));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(DECOY_CONTENT_TYPE),
    );
    response
}

/// 302 to `location`.
///
/// Falls back to the decoy page if `location` cannot be a header value.
pub fn redirect(location: &str) -> Response<Body> {
    match HeaderValue::from_str(location) {
        Ok(value) => {
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::FOUND;
            response.headers_mut().insert(header::LOCATION, value);
            response
        }
        Err(_) => {
            tracing::error!(location = %location, "Fallback redirect target is not a valid header value");
            decoy_page()
        }
    }
}

/// Response for a denied request: redirect when configured, else the decoy.
pub fn denied(fallback_redirect_url: Option<&str>) -> Response<Body> {
    match fallback_redirect_url {
        Some(location) => redirect(location),
        None => decoy_page(),
    }
}

/// Generic 500.
pub fn internal_error() -> Response<Body> {
    plain(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
}

/// Generic 400.
pub fn bad_request() -> Response<Body> {
    plain(StatusCode::BAD_REQUEST, "Bad Request")
}

fn plain(status: StatusCode, text: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::from(text));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}
