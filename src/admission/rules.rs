//! Named admission predicates.

use std::fmt;

use regex::Regex;

use crate::http::request::RequestContext;

/// Why a request was refused. Logged server-side, never sent to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DenyReason {
    /// No backend host configured.
    MissingBackend,
    PathNotAllowed,
    UserAgentNotAllowed,
    UserAgentDenied,
    IpNotAllowed,
    IpDenied,
    RegionNotAllowed,
    RegionDenied,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::MissingBackend => "missing_backend",
            DenyReason::PathNotAllowed => "path_not_allowed",
            DenyReason::UserAgentNotAllowed => "user_agent_not_allowed",
            DenyReason::UserAgentDenied => "user_agent_denied",
            DenyReason::IpNotAllowed => "ip_not_allowed",
            DenyReason::IpDenied => "ip_denied",
            DenyReason::RegionNotAllowed => "region_not_allowed",
            DenyReason::RegionDenied => "region_denied",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which request fact a rule inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    Path,
    /// Lower-cased user-agent.
    UserAgent,
    ClientIp,
    Region,
}

impl Subject {
    fn value<'a>(&self, ctx: &'a RequestContext, user_agent: &'a str) -> &'a str {
        match self {
            Subject::Path => &ctx.path,
            Subject::UserAgent => user_agent,
            Subject::ClientIp => &ctx.client_ip,
            Subject::Region => &ctx.region,
        }
    }
}

/// Whether a rule requires its pattern to match or to not match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Allow,
    Deny,
}

/// One compiled allow/deny predicate.
#[derive(Debug, Clone)]
pub struct Rule {
    subject: Subject,
    polarity: Polarity,
    pattern: Regex,
    reason: DenyReason,
}

impl Rule {
    pub fn new(subject: Subject, polarity: Polarity, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            subject,
            polarity,
            pattern: Regex::new(pattern)?,
            reason: reason_for(subject, polarity),
        })
    }

    pub fn reason(&self) -> DenyReason {
        self.reason
    }

    /// True when the request passes this rule.
    pub fn passes(&self, ctx: &RequestContext, user_agent: &str) -> bool {
        let matched = self.pattern.is_match(self.subject.value(ctx, user_agent));
        match self.polarity {
            Polarity::Allow => matched,
            Polarity::Deny => !matched,
        }
    }
}

fn reason_for(subject: Subject, polarity: Polarity) -> DenyReason {
    match (subject, polarity) {
        (Subject::Path, _) => DenyReason::PathNotAllowed,
        (Subject::UserAgent, Polarity::Allow) => DenyReason::UserAgentNotAllowed,
        (Subject::UserAgent, Polarity::Deny) => DenyReason::UserAgentDenied,
        (Subject::ClientIp, Polarity::Allow) => DenyReason::IpNotAllowed,
        (Subject::ClientIp, Polarity::Deny) => DenyReason::IpDenied,
        (Subject::Region, Polarity::Allow) => DenyReason::RegionNotAllowed,
        (Subject::Region, Polarity::Deny) => DenyReason::RegionDenied,
    }
}
