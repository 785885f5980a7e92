use metrics::counter;
use tracing::{debug, error, warn};

use crate::application::repos::{BlobStoreError, ByteStream, RepoError};
use crate::domain::entities::{FileRecord, ListingRecord, Requester};
use crate::domain::filter::ListingFilter;

use super::service::ListingService;
use super::types::{ListingServiceError, listings_cache_key};

const QUERY_SOURCE: &str = "application::listings::filtered_listings";
const FILE_SOURCE: &str = "application::listings::open_file";

impl ListingService {
    /// Returns one page of listings, consulting the cache first.
    ///
    /// Cache failures never fail the query: an unreadable entry is treated as
    /// a miss and a failed write only costs the next caller a store round-trip.
    pub async fn filtered_listings(
        &self,
        limit: u32,
        offset: u32,
        filter: &ListingFilter,
        requester: Option<&Requester>,
    ) -> Result<Vec<ListingRecord>, ListingServiceError> {
        let key = listings_cache_key(limit, offset, filter, requester);

        if let Some(listings) = self.cached_listings(&key).await {
            counter!("agora_listings_cache_hit_total").increment(1);
            debug!(target = QUERY_SOURCE, key = %key, "served listings from cache");
            return Ok(listings);
        }
        counter!("agora_listings_cache_miss_total").increment(1);

        let mut listings = self
            .reader
            .filtered_listings(limit, offset, Some(filter))
            .await
            .map_err(|err| match err {
                RepoError::NotFound => ListingServiceError::NotFound,
                RepoError::InvalidFilter(err) => {
                    warn!(target = QUERY_SOURCE, error = %err, "listing filter rejected");
                    ListingServiceError::InvalidFilter(err)
                }
                other => {
                    error!(target = QUERY_SOURCE, error = %other, "failed to query listings");
                    ListingServiceError::internal(other.to_string())
                }
            })?;

        mark_ownership(&mut listings, requester);
        self.store_listings(&key, &listings).await;

        Ok(listings)
    }

    /// Opens the stored attachment of a listing for reading.
    pub async fn open_file(&self, file: &FileRecord) -> Result<ByteStream, ListingServiceError> {
        self.blobs
            .load(&file.location)
            .await
            .map_err(|err| match err {
                BlobStoreError::NotFound { .. } => ListingServiceError::NotFound,
                other => {
                    error!(
                        target = FILE_SOURCE,
                        file_id = %file.id,
                        error = %other,
                        "failed to open listing attachment"
                    );
                    ListingServiceError::Storage(other)
                }
            })
    }

    async fn cached_listings(&self, key: &str) -> Option<Vec<ListingRecord>> {
        match self.cache.get(key).await {
            Ok(Some(payload)) if !payload.is_empty() => {
                match serde_json::from_str::<Vec<ListingRecord>>(&payload) {
                    Ok(listings) => Some(listings),
                    Err(err) => {
                        warn!(
                            target = QUERY_SOURCE,
                            key = %key,
                            error = %err,
                            "discarding undecodable cache entry"
                        );
                        None
                    }
                }
            }
            Ok(_) => None,
            Err(err) => {
                warn!(
                    target = QUERY_SOURCE,
                    key = %key,
                    error = %err,
                    "cache lookup failed; querying store"
                );
                None
            }
        }
    }

    async fn store_listings(&self, key: &str, listings: &[ListingRecord]) {
        let payload = match serde_json::to_string(listings) {
            Ok(payload) => payload,
            Err(err) => {
                counter!("agora_listings_cache_store_failed_total").increment(1);
                warn!(target = QUERY_SOURCE, error = %err, "failed to encode listings for cache");
                return;
            }
        };

        if let Err(err) = self.cache.set(key, payload, self.settings.cache_ttl).await {
            counter!("agora_listings_cache_store_failed_total").increment(1);
            warn!(
                target = QUERY_SOURCE,
                key = %key,
                error = %err,
                "failed to cache listings"
            );
        }
    }
}

fn mark_ownership(listings: &mut [ListingRecord], requester: Option<&Requester>) {
    for listing in listings {
        listing.requester_is_owner = requester.is_some_and(|requester| requester.owns(listing));
    }
}
