//! Lifecycle state

use std::fmt;

use tokio::sync::watch;

/// Process-wide lifecycle state. Variants are ordered; the state only moves
/// forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LifecycleState {
    Starting,
    Serving,
    Draining,
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Starting => "starting",
            Self::Serving => "serving",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        })
    }
}

/// Move `tx` to `to` if that is a forward step. Returns whether it moved.
pub(crate) fn advance(tx: &watch::Sender<LifecycleState>, to: LifecycleState) -> bool {
    let moved = tx.send_if_modified(|current| {
        if *current < to {
            *current = to;
            true
        } else {
            false
        }
    });
    if moved {
        tracing::info!(state = %to, "lifecycle transition");
    }
    moved
}
