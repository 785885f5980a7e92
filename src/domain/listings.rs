//! Listing drafts and the rules a draft must satisfy before anything is stored.

use std::fmt;

use thiserror::Error;

pub const MIN_TITLE_CHARS: usize = 5;
pub const MAX_TITLE_CHARS: usize = 100;
pub const MIN_BODY_CHARS: usize = 10;
pub const MAX_BODY_CHARS: usize = 2000;
pub const MIN_PRICE: i64 = 1;
pub const MAX_PRICE: i64 = 1_000_000_000;

const FALLBACK_ATTACHMENT_NAME: &str = "attachment";

/// Metadata describing the file uploaded alongside a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentMeta {
    pub name: String,
    pub mime: String,
}

impl AttachmentMeta {
    pub fn new(name: impl Into<String>, mime: impl Into<String>) -> Self {
        let name = name.into();
        let name = if name.trim().is_empty() {
            FALLBACK_ATTACHMENT_NAME.to_string()
        } else {
            name.trim().to_string()
        };
        Self {
            name,
            mime: mime.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingDraft {
    pub title: String,
    pub body: String,
    pub price: i64,
    pub attachment: AttachmentMeta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftField {
    Title,
    Body,
    Price,
}

impl DraftField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Body => "body",
            Self::Price => "price",
        }
    }
}

impl fmt::Display for DraftField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DraftError {
    #[error(
        "title must be between {} and {} characters",
        MIN_TITLE_CHARS,
        MAX_TITLE_CHARS
    )]
    Title,
    #[error("body must be between {} and {} characters", MIN_BODY_CHARS, MAX_BODY_CHARS)]
    Body,
    #[error("price must be between {} and {}", MIN_PRICE, MAX_PRICE)]
    Price,
}

impl DraftError {
    pub fn field(self) -> DraftField {
        match self {
            Self::Title => DraftField::Title,
            Self::Body => DraftField::Body,
            Self::Price => DraftField::Price,
        }
    }
}

impl ListingDraft {
    /// Checks title, body, then price, reporting the first field that fails.
    ///
    /// Lower bounds apply to the whitespace-trimmed text, upper bounds to the
    /// text as submitted.
    pub fn validate(&self) -> Result<(), DraftError> {
        if !text_within(&self.title, MIN_TITLE_CHARS, MAX_TITLE_CHARS) {
            return Err(DraftError::Title);
        }
        if !text_within(&self.body, MIN_BODY_CHARS, MAX_BODY_CHARS) {
            return Err(DraftError::Body);
        }
        if !(MIN_PRICE..=MAX_PRICE).contains(&self.price) {
            return Err(DraftError::Price);
        }
        Ok(())
    }
}

fn text_within(value: &str, min: usize, max: usize) -> bool {
    value.trim().chars().count() >= min && value.chars().count() <= max
}
