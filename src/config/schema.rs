//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the rewriting proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// The single proxied route: backend, rewrite scope and admission rules.
    pub route: RouteConfig,

    /// Names of the headers the edge platform populates.
    pub edge: EdgeConfig,

    /// Timeout configuration for the outbound fetch.
    pub timeouts: TimeoutConfig,

    /// Buffering limits.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Scheme used to reach the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProxyProtocol {
    Http,
    #[default]
    Https,
}

impl ProxyProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyProtocol::Http => "http",
            ProxyProtocol::Https => "https",
        }
    }
}

impl std::str::FromStr for ProxyProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Tolerate the "https:" form URL APIs produce.
        match s.trim().trim_end_matches(':').to_ascii_lowercase().as_str() {
            "http" => Ok(ProxyProtocol::Http),
            "https" => Ok(ProxyProtocol::Https),
            other => Err(format!("unsupported proxy protocol '{}'", other)),
        }
    }
}

impl std::fmt::Display for ProxyProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Route configuration: where requests go and who may send them.
///
/// Every pattern is an unanchored regular expression; `None` means the
/// corresponding rule is not enforced.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RouteConfig {
    /// Backend hostname. Without it every request is denied.
    pub proxy_host: Option<String>,

    /// Backend port.
    pub proxy_port: u16,

    /// Backend scheme.
    pub proxy_protocol: ProxyProtocol,

    /// Restricts which request paths are proxied, and which paths inside
    /// textual bodies are eligible for rewriting.
    pub pathname_filter: Option<String>,

    /// User-agent must match (matched against the lower-cased value).
    pub user_agent_allow: Option<String>,

    /// User-agent must not match (matched against the lower-cased value).
    pub user_agent_deny: Option<String>,

    /// Client IP must match.
    pub ip_allow: Option<String>,

    /// Client IP must not match.
    pub ip_deny: Option<String>,

    /// Region code must match.
    pub region_allow: Option<String>,

    /// Region code must not match.
    pub region_deny: Option<String>,

    /// Denied requests are redirected here (302) instead of getting the decoy page.
    pub fallback_redirect_url: Option<String>,

    /// Relaxes response security policy (drops Content-Security-Policy).
    pub debug: bool,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            proxy_host: None,
            proxy_port: 80,
            proxy_protocol: ProxyProtocol::Https,
            pathname_filter: None,
            user_agent_allow: None,
            user_agent_deny: None,
            ip_allow: None,
            ip_deny: None,
            region_allow: None,
            region_deny: None,
            fallback_redirect_url: None,
            debug: false,
        }
    }
}

/// Edge platform metadata headers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EdgeConfig {
    /// Header carrying the connecting client IP.
    pub client_ip_header: String,

    /// Header carrying the client's country/region code.
    pub region_header: String,

    /// Header carrying the scheme the client used to reach the edge.
    pub forwarded_proto_header: String,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            client_ip_header: "cf-connecting-ip".to_string(),
            region_header: "cf-ipcountry".to_string(),
            forwarded_proto_header: "x-forwarded-proto".to_string(),
        }
    }
}

/// Timeout configuration for the outbound fetch.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Time allowed for the backend to produce response headers, in seconds.
    pub upstream_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            upstream_secs: 30,
        }
    }
}

/// Buffering limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest textual response body that will be buffered for rewriting.
    pub max_text_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_text_body_bytes: 16 * 1024 * 1024, // 16MB
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
