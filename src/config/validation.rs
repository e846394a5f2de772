//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check every admission/rewrite pattern compiles
//! - Validate value ranges (timeouts > 0, ports valid)
//! - Check the fallback redirect target is an absolute URL
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - A missing backend host is not an error: the route then denies everything

use std::net::SocketAddr;

use regex::Regex;
use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::rewrite::{HostToken, TokenPattern};

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid pattern: {message}")]
    InvalidPattern { field: &'static str, message: String },

    #[error("route.fallback_redirect_url: {0}")]
    InvalidRedirect(String),

    #[error("route.proxy_port must be non-zero")]
    ZeroPort,

    #[error("timeouts.{0} must be non-zero")]
    ZeroTimeout(&'static str),

    #[error("limits.max_text_body_bytes must be non-zero")]
    ZeroBodyLimit,

    #[error("listener.bind_address '{0}' is not a socket address")]
    InvalidBindAddress(String),
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let route = &config.route;

    let patterns = [
        ("route.pathname_filter", &route.pathname_filter),
        ("route.user_agent_allow", &route.user_agent_allow),
        ("route.user_agent_deny", &route.user_agent_deny),
        ("route.ip_allow", &route.ip_allow),
        ("route.ip_deny", &route.ip_deny),
        ("route.region_allow", &route.region_allow),
        ("route.region_deny", &route.region_deny),
    ];
    for (field, pattern) in patterns {
        if let Some(pattern) = pattern {
            if let Err(e) = Regex::new(pattern) {
                errors.push(ValidationError::InvalidPattern {
                    field,
                    message: e.to_string(),
                });
            }
        }
    }

    // The path filter also scopes body rewriting, where it is compiled
    // after the backend token.
    if let Some(filter) = route.pathname_filter.as_deref().filter(|f| Regex::new(f).is_ok()) {
        let host = route.proxy_host.as_deref().unwrap_or("backend");
        let token = HostToken::new(host.trim(), route.proxy_port);
        if let Err(e) = TokenPattern::scoped(&token, Some(filter)) {
            errors.push(ValidationError::InvalidPattern {
                field: "route.pathname_filter",
                message: e.to_string(),
            });
        }
    }

    if let Some(target) = &route.fallback_redirect_url {
        match url::Url::parse(target) {
            Ok(u) if u.scheme() == "http" || u.scheme() == "https" => {}
            Ok(u) => errors.push(ValidationError::InvalidRedirect(format!(
                "unsupported scheme '{}'",
                u.scheme()
            ))),
            Err(e) => errors.push(ValidationError::InvalidRedirect(e.to_string())),
        }
    }

    if route.proxy_port == 0 {
        errors.push(ValidationError::ZeroPort);
    }
    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("connect_secs"));
    }
    if config.timeouts.upstream_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("upstream_secs"));
    }
    if config.limits.max_text_body_bytes == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }
    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
