//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → request.rs (RequestContext: client metadata + public origin)
//!     → proxy::Orchestrator (admission, fetch, rewrite)
//!     → response.rs (decoy, redirect, generic errors)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{MakeRequestUuid, RequestContext, X_REQUEST_ID};
pub use server::{build_router, AppState, HttpServer};
