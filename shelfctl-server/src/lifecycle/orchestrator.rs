//! Lifecycle orchestrator
//!
//! Runs the whole process lifecycle on the control path:
//! open pool, probe, verify schema, serve, drain, close pool.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use axum::middleware::from_fn_with_state;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;

use super::gate::{admission, Gate};
use super::shutdown::Shutdown;
use super::state::{advance, LifecycleState};
use crate::db::{schema, DbError, PoolConfig, PoolError, PoolManager, RetryPolicy};

/// Grace period after a forced stop for cancelled requests to unwind.
const FORCE_GRACE: Duration = Duration::from_millis(500);

/// Timing knobs for the lifecycle.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Per-attempt timeout for the startup probe
    pub probe_timeout: Duration,
    /// Retry schedule for the startup probe
    pub probe_retry: RetryPolicy,
    /// How long accepted requests get to finish once draining starts
    pub drain_timeout: Duration,
    /// Upper bound on waiting for the pool to close
    pub close_timeout: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(5),
            probe_retry: RetryPolicy::default(),
            drain_timeout: Duration::from_secs(30),
            close_timeout: Duration::from_secs(5),
        }
    }
}

/// Fatal lifecycle failures. All of them happen before `Serving` except
/// `Serve`, which means the HTTP worker died on its own.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("database pool: {0}")]
    Pool(#[from] PoolError),

    #[error("schema verification failed: {0}")]
    Schema(#[from] DbError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("http server failed: {0}")]
    Serve(#[source] io::Error),
}

/// How draining ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every accepted request finished before the deadline.
    Drained,
    /// The deadline passed; `abandoned` requests were cancelled.
    Forced { abandoned: usize },
}

/// Owner of the lifecycle state and the pool.
pub struct Lifecycle {
    config: LifecycleConfig,
    state: watch::Sender<LifecycleState>,
    shutdown: Shutdown,
}

impl Lifecycle {
    pub fn new(config: LifecycleConfig, shutdown: Shutdown) -> Self {
        let (state, _) = watch::channel(LifecycleState::Starting);
        Self {
            config,
            state,
            shutdown,
        }
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Run to completion.
    ///
    /// `build` turns the ready pool into the application router; it is only
    /// called once the probe and schema check have passed. Startup failures
    /// return an error without ever reaching `Serving`.
    pub async fn run<F>(
        self,
        pool_config: &PoolConfig,
        bind: SocketAddr,
        build: F,
    ) -> Result<DrainOutcome, LifecycleError>
    where
        F: FnOnce(&PoolManager) -> Router,
    {
        let pool = match PoolManager::open(pool_config) {
            Ok(pool) => pool,
            Err(e) => {
                tracing::error!(error = %e, "could not open database pool");
                advance(&self.state, LifecycleState::Stopped);
                return Err(e.into());
            }
        };

        let outcome = self.serve_with_pool(&pool, bind, build).await;

        self.release(&pool).await;
        advance(&self.state, LifecycleState::Stopped);
        outcome
    }

    async fn serve_with_pool<F>(
        &self,
        pool: &PoolManager,
        bind: SocketAddr,
        build: F,
    ) -> Result<DrainOutcome, LifecycleError>
    where
        F: FnOnce(&PoolManager) -> Router,
    {
        if let Err(e) = pool
            .probe(self.config.probe_timeout, &self.config.probe_retry)
            .await
        {
            tracing::error!(error = %e, "database not reachable; refusing to serve");
            return Err(e.into());
        }

        schema::ensure(pool.pool()).await?;

        let listener = TcpListener::bind(bind)
            .await
            .map_err(|source| LifecycleError::Bind { addr: bind, source })?;
        tracing::info!(addr = %bind, "listening");

        let router = build(pool);
        let gate = Gate::new();
        serve_until_shutdown(
            listener,
            router,
            &gate,
            &self.shutdown,
            &self.state,
            self.config.drain_timeout,
        )
        .await
        .map_err(LifecycleError::Serve)
    }

    /// Close the pool, bounded by `close_timeout`. Failures are logged only.
    async fn release(&self, pool: &PoolManager) {
        if tokio::time::timeout(self.config.close_timeout, pool.close())
            .await
            .is_err()
        {
            tracing::warn!(
                timeout = ?self.config.close_timeout,
                "timed out closing database pool; exiting anyway"
            );
        }
    }
}

/// Serve `router` on `listener` until `shutdown` fires, then drain.
///
/// Once shutdown is observed the gate closes before anything waits on
/// in-flight work, so later requests get `503` without reaching a handler.
/// Accepted requests have `drain_timeout` to finish; after that they are
/// cancelled and this returns within a short grace period regardless.
pub async fn serve_until_shutdown(
    listener: TcpListener,
    router: Router,
    gate: &Gate,
    shutdown: &Shutdown,
    state: &watch::Sender<LifecycleState>,
    drain_timeout: Duration,
) -> io::Result<DrainOutcome> {
    let app = router.layer(from_fn_with_state(gate.clone(), admission));
    let stop_accepting = shutdown.token();

    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { stop_accepting.cancelled().await })
            .await
    });

    advance(state, LifecycleState::Serving);

    let early_exit = tokio::select! {
        _ = shutdown.triggered() => None,
        result = &mut server => Some(result),
    };

    gate.close();
    advance(state, LifecycleState::Draining);

    if let Some(result) = early_exit {
        // The worker stopped without being asked to.
        gate.force_stop();
        return match result {
            Ok(Ok(())) => Err(io::Error::new(
                io::ErrorKind::Other,
                "http server exited unexpectedly",
            )),
            Ok(Err(e)) => Err(e),
            Err(join) => Err(io::Error::new(io::ErrorKind::Other, join)),
        };
    }

    tracing::info!(
        in_flight = gate.in_flight(),
        deadline = ?drain_timeout,
        "draining in-flight requests"
    );

    let drained = tokio::time::timeout(drain_timeout, async {
        gate.wait_idle().await;
        let _ = (&mut server).await;
    })
    .await
    .is_ok();

    if drained {
        tracing::info!("all requests finished");
        return Ok(DrainOutcome::Drained);
    }

    let abandoned = gate.in_flight();
    tracing::warn!(abandoned, "drain deadline elapsed; cancelling remaining requests");
    gate.force_stop();
    server.abort();

    if tokio::time::timeout(FORCE_GRACE, gate.wait_idle())
        .await
        .is_err()
    {
        tracing::warn!(
            remaining = gate.in_flight(),
            "requests did not unwind after cancellation"
        );
    }

    Ok(DrainOutcome::Forced { abandoned })
}
