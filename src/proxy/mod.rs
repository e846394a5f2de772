//! Proxy pipeline subsystem.
//!
//! # Data Flow
//! ```text
//! RouteConfig → route.rs (CompiledRoute, once per config)
//!
//! Request
//!     → orchestrator.rs
//!         → admission (Allow / Deny)
//!         → rewrite::headers (outbound)
//!         → upstream.rs (single fetch)
//!         → rewrite::headers (inbound) + rewrite::body
//!     → Response
//! ```
//!
//! # Design Decisions
//! - The fetch is behind the `Upstream` trait so the pipeline is testable
//!   without a network
//! - No retries: every failure is reported once
//! - error.rs maps failures to generic client responses

pub mod error;
pub mod orchestrator;
pub mod route;
pub mod upstream;

pub use error::ProxyError;
pub use orchestrator::Orchestrator;
pub use route::{Backend, CompiledRoute, RouteError};
pub use upstream::{HyperUpstream, Upstream, UpstreamError};
