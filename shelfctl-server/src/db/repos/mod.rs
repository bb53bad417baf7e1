//! Repository traits and their PostgreSQL implementations
//!
//! Each repository follows these patterns:
//! - Parameterized statements only
//! - Unique violations become `DbError::Conflict` (no check-then-insert)
//! - Missing rows become `DbError::NotFound`

pub mod books;
pub mod users;

use async_trait::async_trait;
use serde::Serialize;
use shelfctl_core::{BookDraft, CredentialRecord, Email};

pub use books::PgBookRepo;
pub use users::PgUserRepo;

/// Database error type
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("not found: {resource} '{id}'")]
    NotFound { resource: &'static str, id: String },

    #[error("conflict: {resource} already exists")]
    Conflict { resource: &'static str },
}

impl DbError {
    pub(crate) fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }
}

/// Stable user identifier handed back on login
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

/// User row as needed for credential checks
#[derive(Debug, Clone)]
pub struct StoredUser {
    pub id: UserId,
    pub email: String,
    pub credential: CredentialRecord,
}

/// Book record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: String,
}

/// Account storage
#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Insert a new account. An existing email yields `DbError::Conflict`
    /// and leaves the stored credential untouched.
    async fn create(&self, email: &Email, credential: &CredentialRecord)
        -> Result<UserId, DbError>;

    async fn find_by_email(&self, email: &Email) -> Result<StoredUser, DbError>;
}

/// Book catalogue storage
#[async_trait]
pub trait BookRepo: Send + Sync {
    /// All books ordered by id.
    async fn list(&self) -> Result<Vec<Book>, DbError>;

    async fn get(&self, id: i64) -> Result<Book, DbError>;

    async fn create(&self, draft: &BookDraft) -> Result<Book, DbError>;

    async fn update(&self, id: i64, draft: &BookDraft) -> Result<Book, DbError>;

    async fn delete(&self, id: i64) -> Result<(), DbError>;
}
