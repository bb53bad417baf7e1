//! Registration and login
//!
//! Secrets are hashed and verified on the blocking pool. Login does the same
//! amount of hashing work whether or not the account exists, and every
//! failure collapses to one `Unauthorized` error.

use std::sync::Arc;

use shelfctl_core::{CredentialRecord, Email, Secret};

use crate::db::{DbError, UserId, UserRepo};
use crate::error::ApiError;

/// Account operations over a [`UserRepo`]
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepo>,
    work_factor: u32,
    /// Verified against when the email is unknown. Built at the configured
    /// work factor, so it only matches the cost of records hashed at that
    /// factor.
    dummy: CredentialRecord,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserRepo>, work_factor: u32) -> Self {
        Self {
            users,
            work_factor,
            dummy: CredentialRecord::dummy(work_factor),
        }
    }

    /// Create an account. A second registration of the same email is a
    /// `Conflict` and leaves the first credential in place.
    pub async fn register(&self, email: Email, secret: Secret) -> Result<UserId, ApiError> {
        let work_factor = self.work_factor;
        let record =
            tokio::task::spawn_blocking(move || CredentialRecord::hash(secret.expose(), work_factor))
                .await??;

        match self.users.create(&email, &record).await {
            Ok(id) => {
                tracing::info!(user_id = id.0, "account registered");
                Ok(id)
            }
            Err(DbError::Conflict { .. }) => {
                tracing::debug!("registration rejected: email already registered");
                Err(DbError::Conflict { resource: "email" }.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Check a claimed secret and return the account id.
    pub async fn login(&self, email: Email, secret: Secret) -> Result<UserId, ApiError> {
        let (record, id) = match self.users.find_by_email(&email).await {
            Ok(user) => (user.credential, Some(user.id)),
            Err(DbError::NotFound { .. }) => (self.dummy.clone(), None),
            Err(e) => return Err(e.into()),
        };

        let matched = tokio::task::spawn_blocking(move || record.verify(secret.expose())).await?;

        match (matched, id) {
            (true, Some(id)) => {
                tracing::info!(user_id = id.0, "login succeeded");
                Ok(id)
            }
            _ => {
                tracing::info!("login rejected");
                Err(ApiError::unauthorized())
            }
        }
    }
}
