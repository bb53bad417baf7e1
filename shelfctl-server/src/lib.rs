//! shelfctl-server: HTTP service for accounts and a book catalogue
//!
//! Owns the process lifecycle: the database pool is opened and probed
//! before the listener is bound, requests are drained on shutdown, and the
//! pool is released last.

pub mod auth;
pub mod db;
pub mod error;
pub mod http;
pub mod lifecycle;

pub use auth::AuthService;
pub use error::{ApiError, ErrorKind};
pub use http::{build_router, run_server, AppState, ServiceConfig};
pub use lifecycle::{DrainOutcome, Lifecycle, LifecycleConfig, LifecycleError, LifecycleState, Shutdown};
