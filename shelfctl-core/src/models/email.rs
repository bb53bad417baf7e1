//! Email address validation
//!
//! Addresses are the registration key, so they are normalised (trimmed,
//! lowercased) before they reach storage or comparison.

use once_cell::sync::Lazy;
use regex::Regex;

use super::ValidationError;

/// Maximum length for an email address (RFC 5321 path limit)
const MAX_EMAIL_LEN: usize = 254;

/// One `@`, non-empty local part, dotted domain, no whitespace.
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@.]+(\.[^\s@.]+)+$").expect("invalid email regex")
});

/// Validated, normalised email address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Email(String);

impl Email {
    /// Parse and normalise an email address.
    ///
    /// # Example
    /// ```
    /// use shelfctl_core::Email;
    ///
    /// assert_eq!(Email::new("  A@X.com ").unwrap().as_str(), "a@x.com");
    /// assert!(Email::new("not-an-email").is_err());
    /// assert!(Email::new("a@localhost").is_err());
    /// ```
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let trimmed = s.trim();

        if trimmed.is_empty() {
            return Err(ValidationError::Empty { field: "email" });
        }

        if trimmed.len() > MAX_EMAIL_LEN {
            return Err(ValidationError::TooLong {
                field: "email",
                max: MAX_EMAIL_LEN,
            });
        }

        if !EMAIL_RE.is_match(trimmed) {
            return Err(ValidationError::InvalidFormat {
                field: "email",
                reason: "must be a valid email address",
            });
        }

        Ok(Self(trimmed.to_lowercase()))
    }

    /// Get the address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
