//! Request input validated at construction
//!
//! Invalid input returns ValidationError, not panic.

pub mod book;
pub mod email;
pub mod secret;
pub mod validation;

pub use book::BookDraft;
pub use email::Email;
pub use secret::Secret;
pub use validation::ValidationError;
