//! Book field validation

use super::ValidationError;

/// Maximum length for title and author
const MAX_FIELD_LEN: usize = 256;

/// Validated title/author pair for create and update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookDraft {
    title: String,
    author: String,
}

impl BookDraft {
    /// # Rules
    /// - Both fields non-empty after trimming whitespace
    /// - Max 256 characters each
    ///
    /// # Example
    /// ```
    /// use shelfctl_core::BookDraft;
    ///
    /// assert!(BookDraft::new("Dune", "Frank Herbert").is_ok());
    /// assert!(BookDraft::new("  ", "Frank Herbert").is_err());
    /// ```
    pub fn new(title: &str, author: &str) -> Result<Self, ValidationError> {
        Ok(Self {
            title: field("title", title)?,
            author: field("author", author)?,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn author(&self) -> &str {
        &self.author
    }
}

fn field(name: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::Empty { field: name });
    }

    if trimmed.chars().count() > MAX_FIELD_LEN {
        return Err(ValidationError::TooLong {
            field: name,
            max: MAX_FIELD_LEN,
        });
    }

    Ok(trimmed.to_owned())
}
