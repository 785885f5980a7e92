//! Repository traits describing persistence adapters.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::{ListingRecord, Requester};
use crate::domain::filter::{FilterError, ListingFilter};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
    #[error(transparent)]
    InvalidFilter(#[from] FilterError),
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[async_trait]
pub trait ListingsRepo: Send + Sync {
    /// Returns one page of listings joined with their owner and file.
    ///
    /// An empty page is reported as [`RepoError::NotFound`].
    async fn filtered_listings(
        &self,
        limit: u32,
        offset: u32,
        filter: Option<&ListingFilter>,
    ) -> Result<Vec<ListingRecord>, RepoError>;
}

#[async_trait]
pub trait ListingsWriteRepo: Send + Sync {
    /// Inserts the listing row and its file row atomically.
    async fn insert_listing_with_file(&self, listing: &ListingRecord) -> Result<(), RepoError>;

    async fn delete_listing(&self, id: Uuid) -> Result<(), RepoError>;
}

#[async_trait]
pub trait OwnersRepo: Send + Sync {
    async fn find_owner(&self, id: Uuid) -> Result<Option<Requester>, RepoError>;
}

/// Byte stream fed into or read out of a [`BlobStore`].
pub type ByteStream = BoxStream<'static, Result<Bytes, std::io::Error>>;

/// What the caller knows about a blob before it is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobDescriptor {
    pub id: Uuid,
    pub name: String,
    pub mime: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub location: String,
    pub size_bytes: i64,
    pub checksum: String,
}

#[derive(Debug, Error)]
pub enum BlobStoreError {
    #[error("blob `{location}` not found")]
    NotFound { location: String },
    #[error("invalid blob location `{location}`")]
    InvalidLocation { location: String },
    #[error("blob payload is empty")]
    EmptyPayload,
    #[error("blob exceeds the {limit} byte limit")]
    TooLarge { limit: u64 },
    #[error("failed to read blob payload: {0}")]
    Stream(#[source] std::io::Error),
    #[error("blob storage io error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Persists the stream and returns the location token identifying it.
    async fn save(
        &self,
        blob: &BlobDescriptor,
        content: ByteStream,
    ) -> Result<StoredBlob, BlobStoreError>;

    async fn load(&self, location: &str) -> Result<ByteStream, BlobStoreError>;

    async fn delete(&self, location: &str) -> Result<(), BlobStoreError>;
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
}

impl CacheError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Key/value store with per-entry expiry.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, keys: &[String]) -> Result<(), CacheError>;
}
