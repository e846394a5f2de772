//! Host-rewriting reverse proxy library.
//!
//! Forwards requests for a public origin to a configured backend and
//! rewrites `backend:port` ↔ `origin:port` in headers and textual bodies,
//! behind user-agent, IP and region admission rules.

pub mod admission;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod proxy;
pub mod rewrite;

pub use config::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
