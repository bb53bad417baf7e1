//! Database layer - connection pool, schema and repositories
//!
//! # Design Principles
//!
//! - One pool per process, owned by the lifecycle; repositories hold handles
//! - Rely on DB constraints, handle conflicts - no check-then-insert
//! - Repositories sit behind traits so handlers can run against memory in tests

pub mod pool;
pub mod repos;
pub mod schema;

#[cfg(any(test, feature = "test-support"))]
pub mod memory;

pub use pool::{HealthProbe, PgHealth, PoolConfig, PoolError, PoolManager, PoolState, RetryPolicy};
pub use repos::*;
