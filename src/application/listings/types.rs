use std::fmt::Write as _;

use thiserror::Error;

use crate::application::repos::BlobStoreError;
use crate::domain::entities::Requester;
use crate::domain::filter::{FilterError, ListingFilter};
use crate::domain::listings::DraftError;

const CACHE_KEY_PREFIX: &str = "listings";
const ANONYMOUS_PARTITION: &str = "anon";

#[derive(Debug, Error)]
pub enum ListingServiceError {
    #[error("invalid {field}: {0}", field = .0.field())]
    Validation(#[from] DraftError),
    #[error("requester identity is missing")]
    MissingRequester,
    #[error("failed to store listing file: {0}")]
    Storage(#[source] BlobStoreError),
    #[error("listing already exists")]
    AlreadyExists,
    #[error("listing not found")]
    NotFound,
    #[error(transparent)]
    InvalidFilter(FilterError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ListingServiceError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

/// Cache key for one page of listings as seen by one requester partition.
///
/// Every input that changes the answer is part of the key, including the
/// requester, since the ownership flag differs between partitions. Absent
/// price bounds render as `0`, matching their "unbounded" meaning.
pub fn listings_cache_key(
    limit: u32,
    offset: u32,
    filter: &ListingFilter,
    requester: Option<&Requester>,
) -> String {
    let mut key = String::with_capacity(96);
    key.push_str(CACHE_KEY_PREFIX);
    key.push(':');
    match requester {
        Some(requester) => {
            let _ = write!(key, "{}", requester.id);
        }
        None => key.push_str(ANONYMOUS_PARTITION),
    }
    let _ = write!(
        key,
        ":{limit}:{offset}:{}:{}:{}:{}",
        filter.sort_by,
        filter.sort_order,
        filter.price_floor().unwrap_or(0),
        filter.price_ceiling().unwrap_or(0),
    );
    key
}
