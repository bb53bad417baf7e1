//! User repository
//!
//! The `users.email` UNIQUE constraint is the only duplicate check.

use async_trait::async_trait;
use shelfctl_core::{CredentialRecord, Email};
use sqlx::{PgPool, Row};

use super::{DbError, StoredUser, UserId, UserRepo};

/// PostgreSQL-backed user repository
#[derive(Clone)]
pub struct PgUserRepo {
    pool: PgPool,
}

impl PgUserRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn create(
        &self,
        email: &Email,
        credential: &CredentialRecord,
    ) -> Result<UserId, DbError> {
        let row = sqlx::query(
            r#"
            INSERT INTO users (email, password_hash)
            VALUES ($1, $2)
            RETURNING id
            "#,
        )
        .bind(email.as_str())
        .bind(credential.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                DbError::Conflict { resource: "user" }
            }
            other => DbError::Sqlx(other),
        })?;

        Ok(UserId(row.get("id")))
    }

    async fn find_by_email(&self, email: &Email) -> Result<StoredUser, DbError> {
        let row = sqlx::query("SELECT id, email, password_hash FROM users WHERE email = $1")
            .bind(email.as_str())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("user", email.as_str()))?;

        Ok(StoredUser {
            id: UserId(row.get("id")),
            email: row.get("email"),
            credential: CredentialRecord::from_stored(row.get::<String, _>("password_hash")),
        })
    }
}
