//! Database connection pool management
//!
//! Wraps a sqlx `PgPool` with explicit limits, a bounded-retry liveness
//! probe for startup, and an idempotent close.
//!
//! State machine: `Uninitialized -> Connecting -> Ready -> Closed`, with no
//! way back out of `Closed`. `open` leaves the manager `Uninitialized`; the
//! first probe attempt moves it to `Connecting`.

use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;

/// Pool sizing and connection limits.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// PostgreSQL connection string
    pub url: String,
    /// Maximum connections checked out or idle at once
    pub max_open: u32,
    /// Maximum connections kept in the idle set
    pub max_idle: u32,
    /// Connections older than this are closed instead of reused
    pub max_lifetime: Duration,
    /// Idle connections older than this are closed
    pub max_idle_time: Duration,
    /// How long a checkout waits for a free connection
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_open: 25,
            max_idle: 5,
            max_lifetime: Duration::from_secs(300),
            max_idle_time: Duration::from_secs(60),
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

/// Retry schedule for the startup probe.
///
/// One initial attempt, then up to `retries` more; retry `n` waits
/// `backoff * n` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Single attempt, no waiting.
    pub const fn none() -> Self {
        Self {
            retries: 0,
            backoff: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay(&self, retry: u32) -> Duration {
        self.backoff.saturating_mul(retry)
    }

    /// Sum of all delays when every attempt fails.
    pub fn total_backoff(&self) -> Duration {
        (1..=self.retries).map(|n| self.delay(n)).sum()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

/// Pool error type
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// The URL is never echoed; it may carry a password.
    #[error("invalid database target: {reason}")]
    InvalidTarget { reason: String },

    #[error("invalid pool limits: max_open ({max_open}) must be non-zero and at least max_idle ({max_idle})")]
    InvalidLimits { max_open: u32, max_idle: u32 },

    #[error("database unreachable after {attempts} attempt(s): {last}")]
    Unreachable { attempts: u32, last: String },

    #[error("connection pool is closed")]
    Closed,
}

/// Observable pool state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PoolState {
    Uninitialized = 0,
    Connecting = 1,
    Ready = 2,
    Closed = 3,
}

impl PoolState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Connecting,
            2 => Self::Ready,
            3 => Self::Closed,
            _ => Self::Uninitialized,
        }
    }
}

/// Runtime liveness check used by the health endpoint
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self, timeout: Duration) -> Result<(), PoolError>;
}

/// Single-attempt probe over a pool handle
#[derive(Clone)]
pub struct PgHealth {
    pool: PgPool,
}

#[async_trait]
impl HealthProbe for PgHealth {
    async fn check(&self, timeout: Duration) -> Result<(), PoolError> {
        if self.pool.is_closed() {
            return Err(PoolError::Closed);
        }
        ping(&self.pool, timeout)
            .await
            .map_err(|last| PoolError::Unreachable { attempts: 1, last })
    }
}

/// Owner of the process-wide connection pool.
pub struct PoolManager {
    pool: PgPool,
    state: AtomicU8,
    /// Back-reference read by the release hook to count idle connections.
    /// Cleared on close/drop so the pool can be freed.
    idle_view: Arc<Mutex<Option<PgPool>>>,
}

impl PoolManager {
    /// Build the pool without connecting.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTarget` if the URL does not parse and
    /// `InvalidLimits` if `max_open` is zero or `max_idle > max_open`.
    pub fn open(config: &PoolConfig) -> Result<Self, PoolError> {
        if config.max_open == 0 || config.max_idle > config.max_open {
            return Err(PoolError::InvalidLimits {
                max_open: config.max_open,
                max_idle: config.max_idle,
            });
        }

        let options = PgConnectOptions::from_str(&config.url).map_err(|e| {
            PoolError::InvalidTarget {
                reason: target_reason(&e),
            }
        })?;

        let idle_view: Arc<Mutex<Option<PgPool>>> = Arc::default();
        let hook_view = Arc::clone(&idle_view);
        let max_idle = config.max_idle as usize;
        let max_lifetime = config.max_lifetime;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_open)
            .min_connections(0)
            .max_lifetime(Some(config.max_lifetime))
            .idle_timeout(Some(config.max_idle_time))
            .acquire_timeout(config.acquire_timeout)
            .after_release(move |_conn, meta| {
                let keep = meta.age < max_lifetime && idle_count(&hook_view) < max_idle;
                Box::pin(async move { Ok(keep) })
            })
            .connect_lazy_with(options);

        if let Ok(mut view) = idle_view.lock() {
            *view = Some(pool.clone());
        }

        tracing::debug!(
            max_open = config.max_open,
            max_idle = config.max_idle,
            max_lifetime = ?config.max_lifetime,
            max_idle_time = ?config.max_idle_time,
            "connection pool configured"
        );

        Ok(Self {
            pool,
            state: AtomicU8::new(PoolState::Uninitialized as u8),
            idle_view,
        })
    }

    /// Liveness check with bounded retry.
    ///
    /// Each attempt runs `SELECT 1` within `timeout`. After a failure the
    /// probe sleeps per `policy` and tries again, giving up with
    /// `Unreachable` once the retries are spent.
    pub async fn probe(&self, timeout: Duration, policy: &RetryPolicy) -> Result<(), PoolError> {
        let attempts = policy.retries.saturating_add(1);
        let mut last = String::new();

        for attempt in 1..=attempts {
            if self.state() == PoolState::Closed {
                return Err(PoolError::Closed);
            }
            self.advance(PoolState::Connecting);

            match ping(&self.pool, timeout).await {
                Ok(()) => {
                    self.advance(PoolState::Ready);
                    tracing::info!(attempt, "database reachable");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(attempt, attempts, error = %e, "database probe failed");
                    last = e;
                }
            }

            if attempt < attempts {
                tokio::time::sleep(policy.delay(attempt)).await;
            }
        }

        Err(PoolError::Unreachable { attempts, last })
    }

    /// Release every pooled connection. Calling this again is a no-op.
    ///
    /// Waits for checked-out connections to come back, so callers bound it
    /// with a timeout when in-flight work may still hold one.
    pub async fn close(&self) {
        let previous = self.state.swap(PoolState::Closed as u8, Ordering::AcqRel);
        if PoolState::from_u8(previous) == PoolState::Closed {
            tracing::debug!("connection pool already closed");
            return;
        }

        self.clear_idle_view();
        self.pool.close().await;
        tracing::info!("connection pool closed");
    }

    pub fn state(&self) -> PoolState {
        PoolState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Shared pool handle for repositories.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Probe for the health endpoint; one attempt per call.
    pub fn health(&self) -> PgHealth {
        PgHealth {
            pool: self.pool.clone(),
        }
    }

    fn advance(&self, to: PoolState) {
        // Only move forward; never leave Closed.
        let _ = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| {
                (cur < to as u8).then_some(to as u8)
            });
    }

    fn clear_idle_view(&self) {
        if let Ok(mut view) = self.idle_view.lock() {
            view.take();
        }
    }
}

impl Drop for PoolManager {
    fn drop(&mut self) {
        self.clear_idle_view();
    }
}

async fn ping(pool: &PgPool, timeout: Duration) -> Result<(), String> {
    match tokio::time::timeout(timeout, sqlx::query("SELECT 1").execute(pool)).await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("timed out after {timeout:?}")),
    }
}

fn idle_count(view: &Mutex<Option<PgPool>>) -> usize {
    view.lock()
        .ok()
        .and_then(|guard| guard.as_ref().map(PgPool::num_idle))
        .unwrap_or(0)
}

fn target_reason(err: &sqlx::Error) -> String {
    match err {
        sqlx::Error::Configuration(_) => "malformed connection string".to_owned(),
        _ => "unsupported connection string".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    /// Nothing listens on port 1, so connects fail fast.
    const UNREACHABLE: &str = "postgres://shelfctl:pw@127.0.0.1:1/shelfctl";

    fn config(url: &str) -> PoolConfig {
        PoolConfig {
            url: url.to_owned(),
            acquire_timeout: Duration::from_millis(100),
            ..PoolConfig::default()
        }
    }

    #[test]
    fn retry_delays_grow_linearly() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(1), Duration::from_secs(1));
        assert_eq!(policy.delay(2), Duration::from_secs(2));
        assert_eq!(policy.delay(3), Duration::from_secs(3));
        assert_eq!(policy.total_backoff(), Duration::from_secs(6));
        assert_eq!(RetryPolicy::none().total_backoff(), Duration::ZERO);
    }

    #[tokio::test]
    async fn malformed_target_is_rejected() {
        let err = PoolManager::open(&config("::::not a url")).err().unwrap();
        assert!(matches!(err, PoolError::InvalidTarget { .. }));
        assert!(!err.to_string().contains("not a url"));
    }

    #[tokio::test]
    async fn idle_limit_cannot_exceed_open_limit() {
        let cfg = PoolConfig {
            max_open: 2,
            max_idle: 3,
            ..config(UNREACHABLE)
        };
        let err = PoolManager::open(&cfg).err().unwrap();
        assert!(matches!(err, PoolError::InvalidLimits { max_open: 2, max_idle: 3 }));
    }

    #[tokio::test]
    async fn zero_open_limit_is_rejected() {
        let cfg = PoolConfig {
            max_open: 0,
            max_idle: 0,
            ..config(UNREACHABLE)
        };
        let err = PoolManager::open(&cfg).err().unwrap();
        assert!(matches!(err, PoolError::InvalidLimits { max_open: 0, max_idle: 0 }));
    }

    #[tokio::test]
    async fn open_does_not_connect() {
        let manager = PoolManager::open(&config(UNREACHABLE)).unwrap();
        assert_eq!(manager.state(), PoolState::Uninitialized);
        manager.close().await;
    }

    #[tokio::test]
    async fn probe_gives_up_after_bounded_retries() {
        let manager = PoolManager::open(&config(UNREACHABLE)).unwrap();
        let timeout = Duration::from_millis(100);
        let policy = RetryPolicy {
            retries: 3,
            backoff: Duration::from_millis(50),
        };

        let started = Instant::now();
        let err = manager.probe(timeout, &policy).await.unwrap_err();
        let elapsed = started.elapsed();

        assert!(matches!(err, PoolError::Unreachable { attempts: 4, .. }));
        // Not instant: every backoff was slept.
        assert!(elapsed >= policy.total_backoff(), "{elapsed:?}");
        // Not unbounded: backoffs plus one timeout per attempt, with slack.
        let ceiling = policy.total_backoff() + timeout * 4 + Duration::from_secs(2);
        assert!(elapsed <= ceiling, "{elapsed:?} > {ceiling:?}");
        assert_eq!(manager.state(), PoolState::Connecting);

        manager.close().await;
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let manager = PoolManager::open(&config(UNREACHABLE)).unwrap();
        manager.close().await;
        manager.close().await;
        assert_eq!(manager.state(), PoolState::Closed);
        assert!(manager.pool().is_closed());

        let err = manager
            .probe(Duration::from_millis(10), &RetryPolicy::none())
            .await
            .unwrap_err();
        assert!(matches!(err, PoolError::Closed));
    }

    #[tokio::test]
    async fn health_reports_closed_pool() {
        let manager = PoolManager::open(&config(UNREACHABLE)).unwrap();
        let health = manager.health();
        manager.close().await;
        let err = health.check(Duration::from_millis(10)).await.unwrap_err();
        assert!(matches!(err, PoolError::Closed));
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn probe_succeeds_and_pool_respects_limits() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let cfg = PoolConfig {
            url,
            max_open: 4,
            max_idle: 1,
            ..PoolConfig::default()
        };
        let manager = PoolManager::open(&cfg).unwrap();
        manager
            .probe(Duration::from_secs(5), &RetryPolicy::default())
            .await
            .expect("probe failed");
        assert_eq!(manager.state(), PoolState::Ready);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let pool = manager.pool().clone();
                tokio::spawn(async move {
                    let row: (i32,) = sqlx::query_as("SELECT $1::int")
                        .bind(i)
                        .fetch_one(&pool)
                        .await
                        .expect("concurrent query failed");
                    row.0
                })
            })
            .collect();
        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.await.expect("task panicked"), i as i32);
        }

        assert!(manager.pool().size() <= 4);
        assert!(manager.pool().num_idle() <= 1);
        manager.close().await;
    }
}
