use std::{sync::Arc, time::Duration};

use crate::application::repos::{BlobStore, CacheStore, ListingsRepo, ListingsWriteRepo};

const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);
const DEFAULT_COMPENSATION_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy)]
pub struct ListingServiceSettings {
    /// Lifetime of a cached page of listings.
    pub cache_ttl: Duration,
    /// Upper bound on a single compensating blob delete, and on how long an
    /// abandoned creation waits for its insert to settle.
    pub compensation_timeout: Duration,
}

impl Default for ListingServiceSettings {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            compensation_timeout: DEFAULT_COMPENSATION_TIMEOUT,
        }
    }
}

/// Publishes and retrieves listings across the blob store, the relational
/// store and the cache.
#[derive(Clone)]
pub struct ListingService {
    pub(crate) reader: Arc<dyn ListingsRepo>,
    pub(crate) writer: Arc<dyn ListingsWriteRepo>,
    pub(crate) blobs: Arc<dyn BlobStore>,
    pub(crate) cache: Arc<dyn CacheStore>,
    pub(crate) settings: ListingServiceSettings,
}

impl ListingService {
    pub fn new(
        reader: Arc<dyn ListingsRepo>,
        writer: Arc<dyn ListingsWriteRepo>,
        blobs: Arc<dyn BlobStore>,
        cache: Arc<dyn CacheStore>,
        settings: ListingServiceSettings,
    ) -> Self {
        Self {
            reader,
            writer,
            blobs,
            cache,
            settings,
        }
    }
}
