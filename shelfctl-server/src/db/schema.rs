//! Table bootstrap run once while starting
//!
//! Idempotent `CREATE TABLE IF NOT EXISTS`; there is no migration history.

use sqlx::PgPool;

use super::DbError;

/// Create the `users` and `books` tables if they are missing.
pub async fn ensure(pool: &PgPool) -> Result<(), DbError> {
    tracing::info!("Verifying database schema...");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id BIGSERIAL PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS books (
            id BIGSERIAL PRIMARY KEY,
            title TEXT NOT NULL,
            author TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database schema ready");
    Ok(())
}
