//! Outbound fetch.
//!
//! The orchestrator only sees the [`Upstream`] trait; [`HyperUpstream`] is
//! the production implementation over a pooled hyper client with rustls.

use std::future::Future;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, Response},
};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;

use crate::config::TimeoutConfig;

/// Failure of the single outbound request.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream request failed: {0}")]
    Request(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("upstream did not respond within {0:?}")]
    Timeout(Duration),
}

impl UpstreamError {
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::Request(_) => "request",
            UpstreamError::Timeout(_) => "timeout",
        }
    }
}

/// Issues exactly one request to the backend.
pub trait Upstream: Send + Sync + 'static {
    fn fetch(
        &self,
        request: Request<Body>,
    ) -> impl Future<Output = Result<Response<Body>, UpstreamError>> + Send;
}

/// hyper-util client speaking HTTP/1.1 and HTTP/2 over plain TCP or TLS.
#[derive(Clone)]
pub struct HyperUpstream {
    client: Client<hyper_rustls::HttpsConnector<HttpConnector>, Body>,
    timeout: Duration,
}

impl HyperUpstream {
    pub fn new(timeouts: &TimeoutConfig) -> Self {
        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_connect_timeout(Some(Duration::from_secs(timeouts.connect_secs)));

        let https = hyper_rustls::HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .enable_http2()
            .wrap_connector(http);

        Self {
            client: Client::builder(TokioExecutor::new()).build(https),
            timeout: Duration::from_secs(timeouts.upstream_secs),
        }
    }
}

impl Upstream for HyperUpstream {
    async fn fetch(&self, request: Request<Body>) -> Result<Response<Body>, UpstreamError> {
        match tokio::time::timeout(self.timeout, self.client.request(request)).await {
            Ok(Ok(response)) => Ok(response.map(|body: Incoming| Body::new(body))),
            Ok(Err(e)) => Err(UpstreamError::Request(Box::new(e))),
            Err(_) => Err(UpstreamError::Timeout(self.timeout)),
        }
    }
}
