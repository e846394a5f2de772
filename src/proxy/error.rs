//! Pipeline-level failures.

use axum::http::StatusCode;
use thiserror::Error;

use crate::http::request::RequestError;
use crate::proxy::upstream::UpstreamError;
use crate::rewrite::{BodyError, RewriteError};

/// Anything that ends a request with an error response.
///
/// Clients only ever see the status code; the message goes to the log.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("malformed request: {0}")]
    Request(#[from] RequestError),

    #[error("origin token: {0}")]
    Rewrite(#[from] RewriteError),

    #[error("failed to build outbound request: {0}")]
    Build(#[from] axum::http::Error),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Body(#[from] BodyError),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Request(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::Request(_) => "bad_request",
            ProxyError::Rewrite(_) => "rewrite",
            ProxyError::Build(_) => "build",
            ProxyError::Upstream(e) => e.kind(),
            ProxyError::Body(_) => "body",
        }
    }
}
