//! Domain entities mirrored from persistent storage.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// A published listing together with its single attached file.
///
/// `requester_is_owner` is computed per request and never persisted; it is
/// part of the cached payload so a cache hit reproduces the first answer
/// for the same requester partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub owner_login: String,
    pub title: String,
    pub body: String,
    pub price: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub file: FileRecord,
    #[serde(default)]
    pub requester_is_owner: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub name: String,
    pub mime: String,
    /// Opaque token issued by the blob store.
    pub location: String,
    pub size_bytes: i64,
    pub checksum: String,
}

/// Identity of the caller on whose behalf an operation runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub id: Uuid,
    pub login: String,
}

impl Requester {
    pub fn new(id: Uuid, login: impl Into<String>) -> Self {
        Self {
            id,
            login: login.into(),
        }
    }

    pub fn owns(&self, listing: &ListingRecord) -> bool {
        self.id == listing.owner_id
    }
}
