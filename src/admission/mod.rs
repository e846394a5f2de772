//! Admission control subsystem.
//!
//! # Data Flow
//! ```text
//! RouteConfig (at load)
//!     → rules.rs (compile ordered allow/deny predicates)
//!     → AdmissionController (immutable)
//!
//! RequestContext (per request)
//!     → evaluate rules in order, stop at first failure
//!     → ProxyVerdict::Allow | ProxyVerdict::Deny(reason)
//! ```
//!
//! # Design Decisions
//! - Fixed order: backend, path, user-agent, IP, region (allow before deny)
//! - Unanchored matching: a match anywhere in the value counts
//! - Missing metadata is evaluated as the empty string
//! - The reason is for logs only

pub mod rules;

pub use rules::{DenyReason, Polarity, Rule, Subject};

use crate::config::RouteConfig;
use crate::http::request::RequestContext;

/// Outcome of admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyVerdict {
    Allow,
    Deny(DenyReason),
}

/// Ordered rule set compiled from a route.
#[derive(Debug, Clone)]
pub struct AdmissionController {
    has_backend: bool,
    rules: Vec<Rule>,
}

impl AdmissionController {
    /// Compile the rules configured on `route`.
    pub fn from_config(route: &RouteConfig) -> Result<Self, regex::Error> {
        let candidates = [
            (Subject::Path, Polarity::Allow, &route.pathname_filter),
            (Subject::UserAgent, Polarity::Allow, &route.user_agent_allow),
            (Subject::UserAgent, Polarity::Deny, &route.user_agent_deny),
            (Subject::ClientIp, Polarity::Allow, &route.ip_allow),
            (Subject::ClientIp, Polarity::Deny, &route.ip_deny),
            (Subject::Region, Polarity::Allow, &route.region_allow),
            (Subject::Region, Polarity::Deny, &route.region_deny),
        ];

        let mut rules = Vec::new();
        for (subject, polarity, pattern) in candidates {
            if let Some(pattern) = pattern {
                rules.push(Rule::new(subject, polarity, pattern)?);
            }
        }

        Ok(Self {
            has_backend: route
                .proxy_host
                .as_deref()
                .is_some_and(|host| !host.trim().is_empty()),
            rules,
        })
    }

    /// Number of enforced pattern rules.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Evaluate the request against every enforced rule.
    pub fn evaluate(&self, ctx: &RequestContext) -> ProxyVerdict {
        if !self.has_backend {
            return ProxyVerdict::Deny(DenyReason::MissingBackend);
        }

        let user_agent = ctx.user_agent.to_lowercase();
        self.rules
            .iter()
            .find(|rule| !rule.passes(ctx, &user_agent))
            .map_or(ProxyVerdict::Allow, |rule| ProxyVerdict::Deny(rule.reason()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::Origin;
    use axum::http::{HeaderMap, Method};

    fn ctx(path: &str, user_agent: &str, ip: &str, region: &str) -> RequestContext {
        RequestContext {
            client_ip: ip.into(),
            user_agent: user_agent.into(),
            region: region.into(),
            method: Method::GET,
            path: path.into(),
            query: None,
            origin: Origin {
                scheme: "https".into(),
                host: "public.example".into(),
                port: 443,
            },
            headers: HeaderMap::new(),
        }
    }

    fn route() -> RouteConfig {
        RouteConfig {
            proxy_host: Some("backend.example".into()),
            ..RouteConfig::default()
        }
    }

    #[test]
    fn curl_denied_only_when_rule_configured() {
        let request = ctx("/", "curl/8.0", "203.0.113.1", "US");

        let open = AdmissionController::from_config(&route()).unwrap();
        assert_eq!(open.evaluate(&request), ProxyVerdict::Allow);

        let strict = AdmissionController::from_config(&RouteConfig {
            user_agent_deny: Some("curl".into()),
            ..route()
        })
        .unwrap();
        assert_eq!(
            strict.evaluate(&request),
            ProxyVerdict::Deny(DenyReason::UserAgentDenied)
        );
    }

    #[test]
    fn missing_backend_always_denies() {
        let controller = AdmissionController::from_config(&RouteConfig::default()).unwrap();
        assert_eq!(
            controller.evaluate(&ctx("/", "", "", "")),
            ProxyVerdict::Deny(DenyReason::MissingBackend)
        );
    }

    #[test]
    fn user_agent_matched_lower_cased() {
        let controller = AdmissionController::from_config(&RouteConfig {
            user_agent_allow: Some("mozilla".into()),
            ..route()
        })
        .unwrap();
        assert_eq!(
            controller.evaluate(&ctx("/", "Mozilla/5.0", "", "")),
            ProxyVerdict::Allow
        );
        assert_eq!(
            controller.evaluate(&ctx("/", "Wget/1.0", "", "")),
            ProxyVerdict::Deny(DenyReason::UserAgentNotAllowed)
        );
    }

    #[test]
    fn path_filter_is_unanchored() {
        let controller = AdmissionController::from_config(&RouteConfig {
            pathname_filter: Some("/api/".into()),
            ..route()
        })
        .unwrap();
        assert_eq!(controller.evaluate(&ctx("/v2/api/x", "", "", "")), ProxyVerdict::Allow);
        assert_eq!(
            controller.evaluate(&ctx("/static/x", "", "", "")),
            ProxyVerdict::Deny(DenyReason::PathNotAllowed)
        );
    }

    #[test]
    fn first_failing_rule_wins() {
        let controller = AdmissionController::from_config(&RouteConfig {
            ip_deny: Some(r"^10\.".into()),
            region_allow: Some("^(DE|FR)$".into()),
            ..route()
        })
        .unwrap();
        assert_eq!(controller.rule_count(), 2);

        assert_eq!(
            controller.evaluate(&ctx("/", "", "10.0.0.1", "US")),
            ProxyVerdict::Deny(DenyReason::IpDenied)
        );
        assert_eq!(
            controller.evaluate(&ctx("/", "", "192.0.2.1", "US")),
            ProxyVerdict::Deny(DenyReason::RegionNotAllowed)
        );
        assert_eq!(
            controller.evaluate(&ctx("/", "", "192.0.2.1", "FR")),
            ProxyVerdict::Allow
        );
    }

    #[test]
    fn missing_metadata_is_empty() {
        let controller = AdmissionController::from_config(&RouteConfig {
            ip_allow: Some("^203\\.".into()),
            region_deny: Some("CN".into()),
            ..route()
        })
        .unwrap();
        assert_eq!(
            controller.evaluate(&ctx("/", "", "", "")),
            ProxyVerdict::Deny(DenyReason::IpNotAllowed)
        );

        let region_only = AdmissionController::from_config(&RouteConfig {
            region_deny: Some("CN".into()),
            ..route()
        })
        .unwrap();
        assert_eq!(region_only.evaluate(&ctx("/", "", "", "")), ProxyVerdict::Allow);
    }
}
