//! Request handling.
//!
//! # Responsibilities
//! - Generate unique request ID (UUID v4)
//! - Capture edge-supplied client metadata once, at request entry
//! - Derive the public origin (scheme, host, port) of the request
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Transformation code never looks up headers itself; it reads RequestContext
//! - Original request headers preserved; rewritten copy forwarded

use std::net::SocketAddr;
use std::str::FromStr;

use axum::http::{
    header::{self, HeaderMap, HeaderName, HeaderValue},
    request::Parts,
    uri::Authority,
    Method, Request,
};
use thiserror::Error;
use tower_http::request_id::{MakeRequestId, RequestId};

use crate::config::EdgeConfig;
use crate::rewrite::HostToken;

/// Header carrying the request correlation ID.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Generates a UUID v4 request ID when the client did not send one.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = uuid::Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Read the correlation ID of a request, if any.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Why a request could not be turned into a [`RequestContext`].
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request carries no host")]
    MissingHost,

    #[error("invalid host '{0}'")]
    InvalidHost(String),
}

/// The public address a client used to reach us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl Origin {
    /// The origin side of the rewrite, `host:port`.
    pub fn token(&self) -> HostToken {
        HostToken::new(self.host.clone(), self.port)
    }
}

/// Per-request facts, captured once at entry.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub client_ip: String,
    pub user_agent: String,
    pub region: String,
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub origin: Origin,
    pub headers: HeaderMap,
}

impl RequestContext {
    /// Build the context from request parts and the TCP peer address.
    ///
    /// Missing edge headers become empty strings, except the client IP which
    /// falls back to the peer address.
    pub fn from_parts(
        parts: &Parts,
        peer: Option<SocketAddr>,
        edge: &EdgeConfig,
    ) -> Result<Self, RequestError> {
        let headers = &parts.headers;

        let client_ip = header_str(headers, &edge.client_ip_header)
            .map(str::to_string)
            .or_else(|| peer.map(|addr| addr.ip().to_string()))
            .unwrap_or_default();
        let user_agent = header_str(headers, header::USER_AGENT.as_str())
            .unwrap_or_default()
            .to_string();
        let region = header_str(headers, &edge.region_header)
            .unwrap_or_default()
            .to_string();

        let scheme = match parts.uri.scheme_str() {
            Some(scheme) => scheme.to_ascii_lowercase(),
            None => header_str(headers, &edge.forwarded_proto_header)
                .and_then(|v| v.split(',').next())
                .map(|v| v.trim().to_ascii_lowercase())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| "http".to_string()),
        };

        let authority = match parts.uri.authority() {
            Some(authority) => authority.clone(),
            None => {
                let host = header_str(headers, header::HOST.as_str()).ok_or(RequestError::MissingHost)?;
                Authority::from_str(host).map_err(|_| RequestError::InvalidHost(host.to_string()))?
            }
        };
        if authority.host().is_empty() {
            return Err(RequestError::MissingHost);
        }
        let port = authority
            .port_u16()
            .unwrap_or(if scheme == "https" { 443 } else { 80 });

        Ok(Self {
            client_ip,
            user_agent,
            region,
            method: parts.method.clone(),
            path: parts.uri.path().to_string(),
            query: parts.uri.query().map(str::to_string),
            origin: Origin {
                scheme,
                host: authority.host().to_ascii_lowercase(),
                port,
            },
            headers: headers.clone(),
        })
    }

    /// Path plus query, as sent on the request line.
    pub fn path_and_query(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{}", self.path, query),
            None => self.path.clone(),
        }
    }

    /// Full public URL, for logs.
    pub fn url(&self) -> String {
        format!(
            "{}://{}:{}{}",
            self.origin.scheme,
            self.origin.host,
            self.origin.port,
            self.path_and_query()
        )
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn parts(request: Request<Body>) -> Parts {
        request.into_parts().0
    }

    #[test]
    fn absolute_uri_defines_origin() {
        let p = parts(
            Request::builder()
                .uri("https://public.example/page?q=1")
                .header("user-agent", "Mozilla/5.0")
                .header("cf-connecting-ip", "203.0.113.7")
                .header("cf-ipcountry", "DE")
                .body(Body::empty())
                .unwrap(),
        );
        let ctx = RequestContext::from_parts(&p, None, &EdgeConfig::default()).unwrap();

        assert_eq!(ctx.origin.token().to_string(), "public.example:443");
        assert_eq!(ctx.origin.scheme, "https");
        assert_eq!(ctx.path_and_query(), "/page?q=1");
        assert_eq!(ctx.client_ip, "203.0.113.7");
        assert_eq!(ctx.user_agent, "Mozilla/5.0");
        assert_eq!(ctx.region, "DE");
        assert_eq!(ctx.url(), "https://public.example:443/page?q=1");
    }

    #[test]
    fn host_header_and_forwarded_proto() {
        let p = parts(
            Request::builder()
                .uri("/a")
                .header("host", "Public.Example:8443")
                .header("x-forwarded-proto", "https")
                .body(Body::empty())
                .unwrap(),
        );
        let peer: SocketAddr = "198.51.100.2:5555".parse().unwrap();
        let ctx = RequestContext::from_parts(&p, Some(peer), &EdgeConfig::default()).unwrap();

        assert_eq!(ctx.origin.token().to_string(), "public.example:8443");
        assert_eq!(ctx.client_ip, "198.51.100.2");
        assert_eq!(ctx.user_agent, "");
        assert_eq!(ctx.region, "");
    }

    #[test]
    fn plain_http_defaults_to_port_80() {
        let p = parts(
            Request::builder()
                .uri("/")
                .header("host", "public.example")
                .body(Body::empty())
                .unwrap(),
        );
        let ctx = RequestContext::from_parts(&p, None, &EdgeConfig::default()).unwrap();
        assert_eq!(ctx.origin.token().to_string(), "public.example:80");
    }

    #[test]
    fn missing_host_is_rejected() {
        let p = parts(Request::builder().uri("/").body(Body::empty()).unwrap());
        assert!(matches!(
            RequestContext::from_parts(&p, None, &EdgeConfig::default()),
            Err(RequestError::MissingHost)
        ));
    }

    #[test]
    fn generates_request_ids() {
        let request = Request::builder().body(()).unwrap();
        let id = MakeRequestUuid.make_request_id(&request).unwrap();
        assert_eq!(id.header_value().len(), 36);
    }
}
