//! shelfctl-core: credential hashing and validated request input
//!
//! Everything here is synchronous and free of I/O so it can be exercised
//! directly from tests and moved onto a blocking pool by callers.

pub mod credential;
pub mod models;

pub use credential::{
    CredentialError, CredentialRecord, DEFAULT_WORK_FACTOR, MAX_SECRET_LEN, MAX_WORK_FACTOR,
    MIN_WORK_FACTOR,
};
pub use models::{BookDraft, Email, Secret, ValidationError};
