//! HTTP boundary
//!
//! Axum router with:
//! - Request tracing with `x-request-id`
//! - Admission gate (added by the lifecycle)
//! - JSON error responses from classified errors

pub mod extractors;
pub mod routes;
pub mod server;

pub use server::{build_router, run_server, AppState, ServiceConfig};
