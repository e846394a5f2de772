//! Host-token rewriting subsystem.
//!
//! # Data Flow
//! ```text
//! Request headers:   origin:port → backend:port   (headers.rs → token.rs)
//! Response headers:  backend:port → origin:port   (headers.rs → token.rs)
//! Response body:     backend:port → origin:port   (body.rs → token.rs, path scoped)
//! ```
//!
//! # Design Decisions
//! - token.rs is the only place that knows the boundary rules
//! - Backend-side patterns are compiled once per configuration
//! - Non-textual bodies are never decoded

pub mod body;
pub mod headers;
pub mod token;

pub use body::{rewrite_body, BodyError, TransformedBody};
pub use token::{rewrite, HostToken, RewriteError, RewriteSpec, TokenPattern};
