//! Header rewriting in both directions.
//!
//! # Responsibilities
//! - Rewrite origin tokens to the backend token on the way out
//! - Rewrite backend tokens to the origin token on the way back
//! - Drop Content-Security-Policy in debug mode
//! - Strip hop-by-hop headers
//!
//! # Design Decisions
//! - Pure transforms: a new map is produced, the input is untouched
//! - Multi-valued headers (Set-Cookie) are rewritten value by value
//! - Values that are not visible ASCII are forwarded unchanged

use std::borrow::Cow;

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};

use crate::rewrite::token::{HostToken, TokenPattern};

/// Headers that describe a single connection and must not be forwarded.
const HOP_BY_HOP: [&str; 7] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Request direction: origin token → backend token.
pub fn to_outbound(headers: &HeaderMap, origin: &TokenPattern, proxy: &HostToken) -> HeaderMap {
    rewrite_values(headers, origin, proxy)
}

/// Response direction: backend token → origin token.
///
/// With `debug` set, the Content-Security-Policy header is removed so the
/// rewritten content can be inspected in a browser.
pub fn to_inbound(
    headers: &HeaderMap,
    proxy: &TokenPattern,
    origin: &HostToken,
    debug: bool,
) -> HeaderMap {
    let mut rewritten = rewrite_values(headers, proxy, origin);
    if debug {
        rewritten.remove(header::CONTENT_SECURITY_POLICY);
    }
    rewritten
}

/// Remove hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in named {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

fn rewrite_values(headers: &HeaderMap, from: &TokenPattern, to: &HostToken) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        out.append(name.clone(), rewrite_value(value, from, to));
    }
    out
}

fn rewrite_value(value: &HeaderValue, from: &TokenPattern, to: &HostToken) -> HeaderValue {
    let Ok(text) = value.to_str() else {
        return value.clone();
    };
    match from.replace_all(text, to) {
        Cow::Borrowed(_) => value.clone(),
        Cow::Owned(new) => match HeaderValue::from_str(&new) {
            Ok(mut rewritten) => {
                rewritten.set_sensitive(value.is_sensitive());
                rewritten
            }
            Err(_) => {
                tracing::debug!(value = %new, "Rewritten header value is not valid, keeping original");
                value.clone()
            }
        },
    }
}
