//! Router assembly and service entry point

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::Request;
use axum::http::HeaderName;
use axum::Router;
use shelfctl_core::DEFAULT_WORK_FACTOR;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use super::routes;
use crate::auth::AuthService;
use crate::db::{BookRepo, HealthProbe, PgBookRepo, PgUserRepo, PoolConfig, PoolManager};
use crate::lifecycle::{DrainOutcome, Lifecycle, LifecycleConfig, LifecycleError, Shutdown};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Everything needed to run the service
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to bind to (default: 0.0.0.0:8080)
    pub bind_addr: SocketAddr,
    pub pool: PoolConfig,
    pub lifecycle: LifecycleConfig,
    /// Per-call timeout for `GET /health`
    pub health_timeout: Duration,
    /// PBKDF2 iterations for new credentials
    pub work_factor: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            pool: PoolConfig::default(),
            lifecycle: LifecycleConfig::default(),
            health_timeout: Duration::from_secs(1),
            work_factor: DEFAULT_WORK_FACTOR,
        }
    }
}

/// Shared application state
pub struct AppState {
    pub auth: AuthService,
    pub books: Arc<dyn BookRepo>,
    pub health: Arc<dyn HealthProbe>,
    pub health_timeout: Duration,
}

impl AppState {
    /// Wire PostgreSQL repositories onto a ready pool.
    pub fn for_pool(pool: &PoolManager, work_factor: u32, health_timeout: Duration) -> Self {
        let users = Arc::new(PgUserRepo::new(pool.pool().clone()));
        Self {
            auth: AuthService::new(users, work_factor),
            books: Arc::new(PgBookRepo::new(pool.pool().clone())),
            health: Arc::new(pool.health()),
            health_timeout,
        }
    }

    /// Wire a [`MemoryStore`](crate::db::memory::MemoryStore) into every slot.
    #[cfg(any(test, feature = "test-support"))]
    pub fn in_memory(store: &crate::db::memory::MemoryStore, work_factor: u32) -> Self {
        Self {
            auth: AuthService::new(Arc::new(store.clone()), work_factor),
            books: Arc::new(store.clone()),
            health: Arc::new(store.clone()),
            health_timeout: Duration::from_millis(100),
        }
    }
}

/// Build the application router with all routes
pub fn build_router(state: AppState) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    let trace = TraceLayer::new_for_http().make_span_with(|req: &Request| {
        let id = req
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");
        tracing::info_span!(
            "request",
            method = %req.method(),
            path = %req.uri().path(),
            request_id = %id,
        )
    });

    Router::new()
        .merge(routes::health::router())
        .merge(routes::auth::router())
        .merge(routes::books::router())
        .with_state(Arc::new(state))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
                .layer(trace)
                .layer(PropagateRequestIdLayer::new(request_id)),
        )
}

/// Run the service until a termination signal, then drain and stop.
///
/// # Example
///
/// ```ignore
/// let config = ServiceConfig { pool: PoolConfig { url, ..Default::default() }, ..Default::default() };
/// run_server(config, Shutdown::new()).await?;
/// ```
pub async fn run_server(
    config: ServiceConfig,
    shutdown: Shutdown,
) -> Result<DrainOutcome, LifecycleError> {
    let signals = shutdown.listen_for_signals();
    let lifecycle = Lifecycle::new(config.lifecycle.clone(), shutdown);

    let work_factor = config.work_factor;
    let health_timeout = config.health_timeout;
    let outcome = lifecycle
        .run(&config.pool, config.bind_addr, move |pool| {
            build_router(AppState::for_pool(pool, work_factor, health_timeout))
        })
        .await;

    signals.abort();
    tracing::info!("server shutdown complete");
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServiceConfig::default();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.lifecycle.drain_timeout, Duration::from_secs(30));
        assert_eq!(config.lifecycle.probe_timeout, Duration::from_secs(5));
        assert_eq!(config.work_factor, DEFAULT_WORK_FACTOR);
        assert!(config.pool.max_idle <= config.pool.max_open);
    }
}
