//! Per-request pipeline.
//!
//! ```text
//! Start ──▶ Admitted ──▶ Dispatched ──▶ Transformed ──▶ Done
//!   │
//!   └────▶ Denied ───────────────────────────────────▶ Done
//! ```
//!
//! - Start: build the RequestContext
//! - Denied: 302 to the fallback URL, or the decoy page
//! - Dispatched: rewrite URL and headers, exactly one fetch, no retry
//! - Transformed: rewrite response headers, then the body if textual
//!
//! Every failure after admission becomes a generic 500.

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    body::Body,
    http::{header, HeaderValue, Request, Response},
};

use crate::admission::ProxyVerdict;
use crate::config::{EdgeConfig, LimitsConfig};
use crate::http::request::{self as request_info, RequestContext};
use crate::http::response;
use crate::observability::metrics;
use crate::proxy::error::ProxyError;
use crate::proxy::route::{Backend, CompiledRoute};
use crate::proxy::upstream::Upstream;
use crate::rewrite::{self, headers, TokenPattern};

/// Runs the admission → fetch → rewrite pipeline.
pub struct Orchestrator<U> {
    upstream: U,
    edge: EdgeConfig,
    max_text_body_bytes: usize,
}

impl<U: Upstream> Orchestrator<U> {
    pub fn new(upstream: U, edge: EdgeConfig, limits: &LimitsConfig) -> Self {
        Self {
            upstream,
            edge,
            max_text_body_bytes: limits.max_text_body_bytes,
        }
    }

    /// Handle one inbound request against `route`.
    pub async fn handle(
        &self,
        route: &CompiledRoute,
        request: Request<Body>,
        peer: Option<SocketAddr>,
    ) -> Response<Body> {
        let start_time = Instant::now();
        let (parts, body) = request.into_parts();
        let method = parts.method.to_string();
        let request_id = request_info::request_id(&parts.headers).to_string();

        let ctx = match RequestContext::from_parts(&parts, peer, &self.edge) {
            Ok(ctx) => ctx,
            Err(e) => {
                tracing::warn!(request_id = %request_id, error = %e, "Rejecting malformed request");
                let err = ProxyError::from(e);
                metrics::record_request(&method, err.status().as_u16(), "rejected", start_time);
                return response::bad_request();
            }
        };

        let backend = match (route.admission().evaluate(&ctx), route.backend()) {
            (ProxyVerdict::Allow, Some(backend)) => backend,
            (verdict, _) => {
                let reason = match verdict {
                    ProxyVerdict::Deny(reason) => reason,
                    ProxyVerdict::Allow => crate::admission::DenyReason::MissingBackend,
                };
                tracing::warn!(
                    request_id = %request_id,
                    reason = %reason,
                    client_ip = %ctx.client_ip,
                    user_agent = %ctx.user_agent,
                    url = %ctx.url(),
                    "Request denied"
                );
                metrics::record_denied(reason.as_str());
                let denial = response::denied(route.config().fallback_redirect_url.as_deref());
                metrics::record_request(&method, denial.status().as_u16(), "denied", start_time);
                return denial;
            }
        };

        tracing::debug!(
            request_id = %request_id,
            method = %ctx.method,
            url = %ctx.url(),
            backend = %backend.token,
            "Proxying request"
        );

        match self.forward(backend, route.config().debug, &ctx, body).await {
            Ok(response) => {
                metrics::record_request(&method, response.status().as_u16(), "forwarded", start_time);
                response
            }
            Err(e) => {
                tracing::error!(
                    request_id = %request_id,
                    error = %e,
                    client_ip = %ctx.client_ip,
                    user_agent = %ctx.user_agent,
                    url = %ctx.url(),
                    "Fetch error"
                );
                metrics::record_upstream_error(e.kind());
                metrics::record_request(&method, e.status().as_u16(), "failed", start_time);
                response::internal_error()
            }
        }
    }

    async fn forward(
        &self,
        backend: &Backend,
        debug: bool,
        ctx: &RequestContext,
        body: Body,
    ) -> Result<Response<Body>, ProxyError> {
        let origin = ctx.origin.token();
        let origin_pattern = TokenPattern::new(&origin)?;

        let outbound = build_outbound(backend, ctx, &origin_pattern, body)?;
        let response = self.upstream.fetch(outbound).await?;

        let (mut parts, body) = response.into_parts();
        let mut response_headers =
            headers::to_inbound(&parts.headers, &backend.header_pattern, &origin, debug);
        headers::strip_hop_by_hop(&mut response_headers);

        let body = rewrite::rewrite_body(
            &response_headers,
            body,
            &backend.body_pattern,
            &origin,
            self.max_text_body_bytes,
        )
        .await?;
        if body.is_rewritten() {
            response_headers.remove(header::CONTENT_LENGTH);
            metrics::record_body_rewrite();
        }

        parts.headers = response_headers;
        Ok(Response::from_parts(parts, body.into_body()))
    }
}

/// The request sent to the backend: same method, path, query and body,
/// backend URL, rewritten headers.
fn build_outbound(
    backend: &Backend,
    ctx: &RequestContext,
    origin_pattern: &TokenPattern,
    body: Body,
) -> Result<Request<Body>, ProxyError> {
    let uri = format!("{}{}", backend.base_url(), ctx.path_and_query());

    let mut outbound_headers = headers::to_outbound(&ctx.headers, origin_pattern, &backend.token);
    headers::strip_hop_by_hop(&mut outbound_headers);
    // Derived from the URI by the client.
    outbound_headers.remove(header::HOST);
    // Compressed text cannot be rewritten.
    outbound_headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("identity"));

    let mut request = Request::builder()
        .method(ctx.method.clone())
        .uri(uri)
        .body(body)?;
    *request.headers_mut() = outbound_headers;
    Ok(request)
}
