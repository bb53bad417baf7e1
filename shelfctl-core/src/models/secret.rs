//! Plaintext secret wrapper
//!
//! Never printed, never serialised, wiped from memory on drop.

use std::fmt;

use zeroize::Zeroize;

use super::ValidationError;
use crate::credential::MAX_SECRET_LEN;

/// Minimum secret length accepted at registration
const MIN_SECRET_CHARS: usize = 6;

/// A plaintext secret supplied by a client
pub struct Secret(String);

impl Secret {
    /// Validate a secret chosen at registration.
    ///
    /// # Rules
    /// - At least 6 characters
    /// - At most `MAX_SECRET_LEN` bytes
    pub fn new(s: String) -> Result<Self, ValidationError> {
        let secret = Self(s);

        if secret.0.is_empty() {
            return Err(ValidationError::Empty { field: "password" });
        }

        if secret.0.chars().count() < MIN_SECRET_CHARS {
            return Err(ValidationError::TooShort {
                field: "password",
                min: MIN_SECRET_CHARS,
            });
        }

        if secret.0.len() > MAX_SECRET_LEN {
            return Err(ValidationError::TooLong {
                field: "password",
                max: MAX_SECRET_LEN,
            });
        }

        Ok(secret)
    }

    /// Wrap a secret claimed at login.
    ///
    /// Only presence is checked; length rules would hint at what a valid
    /// secret looks like, so anything else is left to verification.
    pub fn claimed(s: String) -> Result<Self, ValidationError> {
        if s.is_empty() {
            return Err(ValidationError::Empty { field: "password" });
        }
        Ok(Self(s))
    }

    /// Raw bytes for hashing.
    pub fn expose(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}
