//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::{ProxyConfig, ProxyProtocol};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable {name}: {message}")]
    Env { name: &'static str, message: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a TOML configuration file. Validation happens in [`resolve_config`],
/// after environment overrides are applied.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Build the effective configuration: file (if any), then environment, then validation.
pub fn resolve_config(path: Option<&Path>) -> Result<ProxyConfig, ConfigError> {
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    apply_env_overrides(&mut config, std::env::vars())?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Overlay route settings from deployment environment variables.
///
/// Empty values are ignored so an unset-but-exported variable does not
/// clear a value from the file.
pub fn apply_env_overrides<I, K, V>(config: &mut ProxyConfig, vars: I) -> Result<(), ConfigError>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
{
    let route = &mut config.route;
    for (key, value) in vars {
        let value: String = value.into();
        if value.trim().is_empty() {
            continue;
        }
        match key.as_ref() {
            "PROXY_HOSTNAME" => route.proxy_host = Some(value),
            "PROXY_PORT" => {
                route.proxy_port = value.trim().parse().map_err(|e| ConfigError::Env {
                    name: "PROXY_PORT",
                    message: format!("{}", e),
                })?;
            }
            "PROXY_PROTOCOL" => {
                route.proxy_protocol = value
                    .parse::<ProxyProtocol>()
                    .map_err(|message| ConfigError::Env { name: "PROXY_PROTOCOL", message })?;
            }
            "PATHNAME_REGEX" => route.pathname_filter = Some(value),
            "UA_WHITELIST_REGEX" => route.user_agent_allow = Some(value),
            "UA_BLACKLIST_REGEX" => route.user_agent_deny = Some(value),
            "IP_WHITELIST_REGEX" => route.ip_allow = Some(value),
            "IP_BLACKLIST_REGEX" => route.ip_deny = Some(value),
            "REGION_WHITELIST_REGEX" => route.region_allow = Some(value),
            "REGION_BLACKLIST_REGEX" => route.region_deny = Some(value),
            "URL302" => route.fallback_redirect_url = Some(value),
            "DEBUG" => route.debug = parse_flag(&value),
            _ => {}
        }
    }
    Ok(())
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_toml() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [route]
            proxy_host = "backend.example"
            proxy_port = 443
            user_agent_deny = "curl"
            "#,
        )
        .unwrap();

        assert_eq!(config.route.proxy_host.as_deref(), Some("backend.example"));
        assert_eq!(config.route.proxy_port, 443);
        assert_eq!(config.route.proxy_protocol, ProxyProtocol::Https);
        assert_eq!(config.route.user_agent_deny.as_deref(), Some("curl"));
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert!(!config.route.debug);
    }

    #[test]
    fn env_overrides_route() {
        let mut config = ProxyConfig::default();
        apply_env_overrides(
            &mut config,
            [
                ("PROXY_HOSTNAME", "backend.example"),
                ("PROXY_PORT", "8443"),
                ("PROXY_PROTOCOL", "http"),
                ("UA_BLACKLIST_REGEX", "curl"),
                ("URL302", "https://example.com/"),
                ("DEBUG", "true"),
                ("REGION_WHITELIST_REGEX", ""),
                ("UNRELATED", "ignored"),
            ],
        )
        .unwrap();

        let route = &config.route;
        assert_eq!(route.proxy_host.as_deref(), Some("backend.example"));
        assert_eq!(route.proxy_port, 8443);
        assert_eq!(route.proxy_protocol, ProxyProtocol::Http);
        assert_eq!(route.user_agent_deny.as_deref(), Some("curl"));
        assert_eq!(route.fallback_redirect_url.as_deref(), Some("https://example.com/"));
        assert!(route.debug);
        assert!(route.region_allow.is_none());
    }

    #[test]
    fn debug_flag_false_string_is_false() {
        let mut config = ProxyConfig::default();
        apply_env_overrides(&mut config, [("DEBUG", "false")]).unwrap();
        assert!(!config.route.debug);
    }

    #[test]
    fn bad_port_is_reported() {
        let mut config = ProxyConfig::default();
        let err = apply_env_overrides(&mut config, [("PROXY_PORT", "http")]).unwrap_err();
        assert!(matches!(err, ConfigError::Env { name: "PROXY_PORT", .. }));
    }

    #[test]
    fn resolved_file_with_invalid_pattern_is_rejected() {
        let path = std::env::temp_dir().join(format!("rewrite-proxy-{}.toml", std::process::id()));
        fs::write(&path, "[route]\nproxy_host = \"b\"\nip_deny = \"(\"\n").unwrap();
        let parsed = load_config(&path);
        let resolved = resolve_config(Some(&path));
        let _ = fs::remove_file(&path);

        assert_eq!(parsed.unwrap().route.ip_deny.as_deref(), Some("("));
        assert!(matches!(resolved, Err(ConfigError::Validation(_))));
    }
}
