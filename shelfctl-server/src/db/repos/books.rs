//! Book repository

use async_trait::async_trait;
use shelfctl_core::BookDraft;
use sqlx::PgPool;

use super::{Book, BookRepo, DbError};

/// PostgreSQL-backed book repository
#[derive(Clone)]
pub struct PgBookRepo {
    pool: PgPool,
}

impl PgBookRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookRepo for PgBookRepo {
    async fn list(&self) -> Result<Vec<Book>, DbError> {
        let books = sqlx::query_as::<_, Book>("SELECT id, title, author FROM books ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(books)
    }

    async fn get(&self, id: i64) -> Result<Book, DbError> {
        sqlx::query_as::<_, Book>("SELECT id, title, author FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("book", id))
    }

    async fn create(&self, draft: &BookDraft) -> Result<Book, DbError> {
        let book = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (title, author)
            VALUES ($1, $2)
            RETURNING id, title, author
            "#,
        )
        .bind(draft.title())
        .bind(draft.author())
        .fetch_one(&self.pool)
        .await?;
        Ok(book)
    }

    async fn update(&self, id: i64, draft: &BookDraft) -> Result<Book, DbError> {
        sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET title = $1, author = $2
            WHERE id = $3
            RETURNING id, title, author
            "#,
        )
        .bind(draft.title())
        .bind(draft.author())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("book", id))
    }

    async fn delete(&self, id: i64) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("book", id));
        }
        Ok(())
    }
}
