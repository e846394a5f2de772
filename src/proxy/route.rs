//! Route compilation.
//!
//! A `RouteConfig` is compiled once into everything the hot path needs:
//! admission rules and the backend-side token patterns. Compiled routes
//! are immutable and swapped wholesale on reload.

use thiserror::Error;

use crate::admission::AdmissionController;
use crate::config::{ProxyProtocol, RouteConfig};
use crate::rewrite::{HostToken, RewriteError, TokenPattern};

/// Error compiling a route.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("invalid admission pattern: {0}")]
    Admission(#[from] regex::Error),

    #[error("invalid rewrite pattern: {0}")]
    Rewrite(#[from] RewriteError),
}

/// The configured backend and its precompiled patterns.
#[derive(Debug, Clone)]
pub struct Backend {
    pub token: HostToken,
    pub protocol: ProxyProtocol,
    /// Backend token anywhere in a header value.
    pub header_pattern: TokenPattern,
    /// Backend token in body text, restricted by the path filter if one is set.
    pub body_pattern: TokenPattern,
}

impl Backend {
    /// Base URL of the backend, without a trailing slash.
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.protocol, self.token)
    }
}

/// A route ready to serve requests.
#[derive(Debug, Clone)]
pub struct CompiledRoute {
    config: RouteConfig,
    admission: AdmissionController,
    backend: Option<Backend>,
}

impl CompiledRoute {
    pub fn compile(config: RouteConfig) -> Result<Self, RouteError> {
        let admission = AdmissionController::from_config(&config)?;

        let backend = match config.proxy_host.as_deref().map(str::trim) {
            Some(host) if !host.is_empty() => {
                let token = HostToken::new(host.to_ascii_lowercase(), config.proxy_port);
                Some(Backend {
                    header_pattern: TokenPattern::new(&token)?,
                    body_pattern: TokenPattern::scoped(&token, config.pathname_filter.as_deref())?,
                    protocol: config.proxy_protocol,
                    token,
                })
            }
            _ => None,
        };

        Ok(Self {
            config,
            admission,
            backend,
        })
    }

    pub fn config(&self) -> &RouteConfig {
        &self.config
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    /// `None` when no backend host is configured.
    pub fn backend(&self) -> Option<&Backend> {
        self.backend.as_ref()
    }
}
