//! Process lifecycle: start, serve, drain, stop
//!
//! ```text
//! Starting --(pool opened, probe ok)--> Serving --(signal)--> Draining
//!          --(idle or deadline)--> Stopped
//! ```
//!
//! The orchestrator owns the pool for the whole run. The HTTP worker only
//! sees two things from it: the listener it is told to serve, and the
//! shutdown token that tells it to stop accepting.

pub mod gate;
pub mod orchestrator;
pub mod shutdown;
pub mod state;

pub use gate::{admission, Gate};
pub use orchestrator::{serve_until_shutdown, DrainOutcome, Lifecycle, LifecycleConfig, LifecycleError};
pub use shutdown::Shutdown;
pub use state::LifecycleState;
