//! Admission gate for request handling
//!
//! Counts accepted requests, refuses new ones once closed, and can cancel
//! the ones still running when the drain deadline passes.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tokio_util::sync::CancellationToken;
use tokio_util::task::task_tracker::TaskTrackerToken;
use tokio_util::task::TaskTracker;

use crate::error::ApiError;

#[derive(Clone, Default)]
pub struct Gate {
    tracker: TaskTracker,
    force: CancellationToken,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit one unit of work, or `None` once the gate is closed.
    ///
    /// The count is taken before the closed check so that `close` followed
    /// by `wait_idle` can never miss a request that slipped in.
    pub fn admit(&self) -> Option<TaskTrackerToken> {
        let token = self.tracker.token();
        if self.tracker.is_closed() {
            return None;
        }
        Some(token)
    }

    /// Stop admitting work. Idempotent.
    pub fn close(&self) {
        self.tracker.close();
    }

    pub fn is_open(&self) -> bool {
        !self.tracker.is_closed()
    }

    /// Requests currently admitted and not finished.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Resolves once the gate is closed and every admitted request is done.
    pub async fn wait_idle(&self) {
        self.tracker.wait().await;
    }

    /// Cancel every admitted request that is still running.
    pub fn force_stop(&self) {
        self.force.cancel();
    }

    pub fn is_forced(&self) -> bool {
        self.force.is_cancelled()
    }

    async fn forced(&self) {
        self.force.cancelled().await;
    }
}

/// Middleware running each request through the gate.
pub async fn admission(State(gate): State<Gate>, req: Request, next: Next) -> Response {
    let Some(_admitted) = gate.admit() else {
        return ApiError::unavailable("server is shutting down").into_response();
    };

    tokio::select! {
        response = next.run(req) => response,
        _ = gate.forced() => {
            tracing::warn!("request cancelled at drain deadline");
            ApiError::unavailable("request terminated by shutdown").into_response()
        }
    }
}
