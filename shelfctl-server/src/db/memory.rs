//! In-memory repositories for tests
//!
//! Same conflict/not-found behaviour as the PostgreSQL repositories, plus
//! a call counter so tests can assert that a request never reached storage.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use shelfctl_core::{BookDraft, CredentialRecord, Email};
use tokio::sync::Mutex;

use super::{
    Book, BookRepo, DbError, HealthProbe, PoolError, StoredUser, UserId, UserRepo,
};

#[derive(Default)]
struct Tables {
    users: BTreeMap<String, StoredUser>,
    books: BTreeMap<i64, Book>,
    next_user_id: i64,
    next_book_id: i64,
}

/// Shared in-memory store implementing every repository trait
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    calls: Arc<AtomicUsize>,
    down: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of repository calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make health checks fail as if the database were unreachable.
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn create(
        &self,
        email: &Email,
        credential: &CredentialRecord,
    ) -> Result<UserId, DbError> {
        self.touch();
        let mut tables = self.tables.lock().await;
        if tables.users.contains_key(email.as_str()) {
            return Err(DbError::Conflict { resource: "user" });
        }
        tables.next_user_id += 1;
        let id = UserId(tables.next_user_id);
        tables.users.insert(
            email.as_str().to_owned(),
            StoredUser {
                id,
                email: email.as_str().to_owned(),
                credential: credential.clone(),
            },
        );
        Ok(id)
    }

    async fn find_by_email(&self, email: &Email) -> Result<StoredUser, DbError> {
        self.touch();
        self.tables
            .lock()
            .await
            .users
            .get(email.as_str())
            .cloned()
            .ok_or_else(|| DbError::not_found("user", email.as_str()))
    }
}

#[async_trait]
impl BookRepo for MemoryStore {
    async fn list(&self) -> Result<Vec<Book>, DbError> {
        self.touch();
        Ok(self.tables.lock().await.books.values().cloned().collect())
    }

    async fn get(&self, id: i64) -> Result<Book, DbError> {
        self.touch();
        self.tables
            .lock()
            .await
            .books
            .get(&id)
            .cloned()
            .ok_or_else(|| DbError::not_found("book", id))
    }

    async fn create(&self, draft: &BookDraft) -> Result<Book, DbError> {
        self.touch();
        let mut tables = self.tables.lock().await;
        tables.next_book_id += 1;
        let book = Book {
            id: tables.next_book_id,
            title: draft.title().to_owned(),
            author: draft.author().to_owned(),
        };
        tables.books.insert(book.id, book.clone());
        Ok(book)
    }

    async fn update(&self, id: i64, draft: &BookDraft) -> Result<Book, DbError> {
        self.touch();
        let mut tables = self.tables.lock().await;
        let book = tables
            .books
            .get_mut(&id)
            .ok_or_else(|| DbError::not_found("book", id))?;
        book.title = draft.title().to_owned();
        book.author = draft.author().to_owned();
        Ok(book.clone())
    }

    async fn delete(&self, id: i64) -> Result<(), DbError> {
        self.touch();
        self.tables
            .lock()
            .await
            .books
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| DbError::not_found("book", id))
    }
}

#[async_trait]
impl HealthProbe for MemoryStore {
    async fn check(&self, _timeout: Duration) -> Result<(), PoolError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(PoolError::Unreachable {
                attempts: 1,
                last: "memory store marked down".into(),
            });
        }
        Ok(())
    }
}
