use std::io::Read;
use std::path::PathBuf;

use axum::body::Body;
use axum::http::Request;
use clap::{Parser, Subcommand};
use serde_json::json;

use rewrite_proxy::admission::ProxyVerdict;
use rewrite_proxy::config::resolve_config;
use rewrite_proxy::http::RequestContext;
use rewrite_proxy::proxy::CompiledRoute;
use rewrite_proxy::rewrite::{rewrite, HostToken, RewriteSpec};

#[derive(Parser)]
#[command(name = "proxy-cli")]
#[command(about = "Offline tooling for the rewrite proxy", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration and print the resolved route
    Check {
        #[arg(short, long)]
        config: PathBuf,
        /// Print the whole resolved configuration as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rewrite stdin from one host:port token to another
    Rewrite {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        /// Only rewrite tokens followed by a path matching this pattern
        #[arg(long)]
        scope: Option<String>,
    },
    /// Show the admission verdict for a hypothetical request
    Admit {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long, default_value = "/")]
        path: String,
        #[arg(long)]
        user_agent: Option<String>,
        #[arg(long)]
        ip: Option<String>,
        #[arg(long)]
        region: Option<String>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { config, json } => {
            let config = resolve_config(Some(&config))?;
            let route = CompiledRoute::compile(config.route.clone())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                let summary = json!({
                    "backend": route.backend().map(|b| b.base_url()),
                    "admission_rules": route.admission().rule_count(),
                    "on_deny": match &config.route.fallback_redirect_url {
                        Some(url) => format!("302 {}", url),
                        None => "decoy page".to_string(),
                    },
                    "debug": config.route.debug,
                });
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
        }
        Commands::Rewrite { from, to, scope } => {
            let mut spec = RewriteSpec::new(parse_token(&from)?, parse_token(&to)?);
            if let Some(scope) = scope {
                spec = spec.with_path_scope(scope);
            }
            let mut input = String::new();
            std::io::stdin().read_to_string(&mut input)?;
            print!("{}", rewrite(&input, &spec)?);
        }
        Commands::Admit {
            config,
            path,
            user_agent,
            ip,
            region,
        } => {
            let config = resolve_config(Some(&config))?;
            let route = CompiledRoute::compile(config.route.clone())?;

            let mut builder = Request::builder().uri(path).header("host", "localhost");
            if let Some(ua) = user_agent {
                builder = builder.header("user-agent", ua);
            }
            if let Some(ip) = ip {
                builder = builder.header(config.edge.client_ip_header.as_str(), ip);
            }
            if let Some(region) = region {
                builder = builder.header(config.edge.region_header.as_str(), region);
            }
            let (parts, _) = builder.body(Body::empty())?.into_parts();
            let ctx = RequestContext::from_parts(&parts, None, &config.edge)?;

            let verdict = match route.admission().evaluate(&ctx) {
                ProxyVerdict::Allow => json!({ "verdict": "allow" }),
                ProxyVerdict::Deny(reason) => json!({ "verdict": "deny", "reason": reason.as_str() }),
            };
            println!("{}", serde_json::to_string_pretty(&verdict)?);
        }
    }

    Ok(())
}

fn parse_token(value: &str) -> Result<HostToken, Box<dyn std::error::Error>> {
    let (host, port) = value
        .rsplit_once(':')
        .ok_or_else(|| format!("'{}' is not host:port", value))?;
    Ok(HostToken::new(host, port.parse::<u16>()?))
}
