//! Single-fire shutdown trigger
//!
//! The first trigger (OS signal or programmatic) cancels the token; later
//! ones are logged and ignored.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Cloneable handle to the process shutdown token
#[derive(Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
    fired: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. Returns `true` only for the call that actually
    /// started it.
    pub fn trigger(&self, reason: &str) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            tracing::warn!(reason, "shutdown already in progress; ignoring");
            return false;
        }
        tracing::info!(reason, "shutdown requested");
        self.token.cancel();
        true
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once shutdown has been triggered.
    pub fn triggered(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// Owned token for futures that must be `'static`.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Forward SIGINT/SIGTERM to [`Shutdown::trigger`] for the life of the
    /// process.
    pub fn listen_for_signals(&self) -> JoinHandle<()> {
        let shutdown = self.clone();
        tokio::spawn(async move {
            loop {
                let signal = termination_signal().await;
                shutdown.trigger(signal);
            }
        })
    }
}

/// Wait for Ctrl+C or SIGTERM and name the one that arrived.
async fn termination_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => "SIGINT",
        _ = terminate => "SIGTERM",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn only_first_trigger_is_honoured() {
        let shutdown = Shutdown::new();
        let other = shutdown.clone();

        assert!(!shutdown.is_triggered());
        assert!(shutdown.trigger("test"));
        assert!(!other.trigger("again"));
        assert!(other.is_triggered());

        tokio::time::timeout(Duration::from_millis(100), other.triggered())
            .await
            .expect("clone should observe the trigger");
    }

    #[tokio::test]
    async fn concurrent_triggers_fire_once() {
        let shutdown = Shutdown::new();
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let s = shutdown.clone();
                tokio::spawn(async move { s.trigger(&format!("racer {i}")) })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
