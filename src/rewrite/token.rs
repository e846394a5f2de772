//! `host:port` token substitution.
//!
//! # Responsibilities
//! - Replace every occurrence of one `host:port` token with another
//! - Refuse subdomain-qualified matches (`sub.backend.example:443`)
//! - Refuse partial matches inside longer words (`backend.example:4430`)
//! - Optionally restrict replacement to tokens followed by a path pattern
//!
//! # Design Decisions
//! - The `from` token is matched literally (escaped), never as a pattern
//! - Host names compare case-insensitively, ports exactly
//! - Patterns are compiled once per token and reused across values
//! - No match is a no-op and returns the input borrowed
//! - The "not preceded by `.`" rule is checked on each candidate match, since
//!   the regex engine has no look-behind; rejected candidates resume one
//!   character later so overlapping occurrences are still found

use std::borrow::Cow;
use std::fmt;

use regex::Regex;
use thiserror::Error;

/// Error building a token pattern.
#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("invalid path scope pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// A `host:port` pair, the unit of substitution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostToken {
    host: String,
    port: u16,
}

impl HostToken {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

}

impl fmt::Display for HostToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// One rewrite direction: replace `from` with `to`, optionally only where
/// the token is followed by a path matching `path_scope`.
#[derive(Debug, Clone)]
pub struct RewriteSpec {
    pub from: HostToken,
    pub to: HostToken,
    pub path_scope: Option<String>,
}

impl RewriteSpec {
    pub fn new(from: HostToken, to: HostToken) -> Self {
        Self {
            from,
            to,
            path_scope: None,
        }
    }

    pub fn with_path_scope(mut self, scope: impl Into<String>) -> Self {
        self.path_scope = Some(scope.into());
        self
    }
}

/// Rewrite `text` according to `spec`, compiling the pattern on the spot.
///
/// Use [`TokenPattern`] directly when the same `from` token is applied to
/// many values.
pub fn rewrite<'a>(text: &'a str, spec: &RewriteSpec) -> Result<Cow<'a, str>, RewriteError> {
    let pattern = TokenPattern::scoped(&spec.from, spec.path_scope.as_deref())?;
    Ok(pattern.replace_all(text, &spec.to))
}

/// Compiled matcher for one `from` token.
#[derive(Debug, Clone)]
pub struct TokenPattern {
    regex: Regex,
    scoped: bool,
}

impl TokenPattern {
    /// Pattern matching `token` anywhere it stands on its own.
    pub fn new(token: &HostToken) -> Result<Self, RewriteError> {
        Self::scoped(token, None)
    }

    /// Pattern matching `token` only when immediately followed by text
    /// matching `scope`. A leading `^` on the scope is ignored.
    ///
    /// The scope is wrapped in the first capture group, so named groups
    /// inside it cannot collide with anything added here.
    pub fn scoped(token: &HostToken, scope: Option<&str>) -> Result<Self, RewriteError> {
        let port = token.port.to_string();
        let mut pattern = String::with_capacity(token.host.len() + port.len() + 24);
        if token.host.starts_with(is_word_char) {
            pattern.push_str(r"\b");
        }
        pattern.push_str("(?i:");
        pattern.push_str(&regex::escape(&token.host));
        pattern.push(')');
        pattern.push(':');
        pattern.push_str(&port);
        pattern.push_str(r"\b");
        if let Some(scope) = scope {
            pattern.push('(');
            pattern.push_str(scope.strip_prefix('^').unwrap_or(scope));
            pattern.push(')');
        }

        Ok(Self {
            regex: Regex::new(&pattern)?,
            scoped: scope.is_some(),
        })
    }

    pub fn is_scoped(&self) -> bool {
        self.scoped
    }

    /// Replace every eligible occurrence with `to`.
    pub fn replace_all<'a>(&self, text: &'a str, to: &HostToken) -> Cow<'a, str> {
        let replacement = to.to_string();
        let mut out = String::new();
        let mut emitted = 0;
        let mut search = 0;

        while search <= text.len() {
            let Some(caps) = self.regex.captures_at(text, search) else {
                break;
            };
            let Some(whole) = caps.get(0) else {
                break;
            };

            if text[..whole.start()].ends_with('.') {
                search = whole.start()
                    + text[whole.start()..]
                        .chars()
                        .next()
                        .map_or(1, char::len_utf8);
                continue;
            }

            out.push_str(&text[emitted..whole.start()]);
            out.push_str(&replacement);
            if self.scoped {
                if let Some(path) = caps.get(1) {
                    out.push_str(path.as_str());
                }
            }
            emitted = whole.end();
            search = whole.end();
        }

        if emitted == 0 {
            return Cow::Borrowed(text);
        }
        out.push_str(&text[emitted..]);
        Cow::Owned(out)
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
