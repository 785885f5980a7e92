//! In-memory adapters shared by the listing service tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use agora::application::listings::{ListingService, ListingServiceSettings};
use agora::application::repos::{
    BlobDescriptor, BlobStore, BlobStoreError, ByteStream, CacheError, CacheStore, ListingsRepo,
    ListingsWriteRepo, RepoError, StoredBlob,
};
use agora::cache::MemoryCache;
use agora::domain::entities::{ListingRecord, Requester};
use agora::domain::filter::ListingFilter;
use agora::domain::listings::{AttachmentMeta, ListingDraft};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt, stream};
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertBehaviour {
    Succeed,
    Duplicate,
    Fail,
    Hang,
    /// Commits, then answers only after the given delay.
    SlowReply(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryBehaviour {
    Succeed,
    Fail,
}

pub struct InMemoryListings {
    rows: Mutex<Vec<ListingRecord>>,
    insert: Mutex<InsertBehaviour>,
    query: Mutex<QueryBehaviour>,
    pub inserts: AtomicUsize,
    pub queries: AtomicUsize,
}

impl Default for InMemoryListings {
    fn default() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            insert: Mutex::new(InsertBehaviour::Succeed),
            query: Mutex::new(QueryBehaviour::Succeed),
            inserts: AtomicUsize::new(0),
            queries: AtomicUsize::new(0),
        }
    }
}

impl InMemoryListings {
    pub async fn set_insert(&self, behaviour: InsertBehaviour) {
        *self.insert.lock().await = behaviour;
    }

    pub async fn set_query(&self, behaviour: QueryBehaviour) {
        *self.query.lock().await = behaviour;
    }

    pub async fn rows(&self) -> Vec<ListingRecord> {
        self.rows.lock().await.clone()
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ListingsRepo for InMemoryListings {
    async fn filtered_listings(
        &self,
        limit: u32,
        offset: u32,
        filter: Option<&ListingFilter>,
    ) -> Result<Vec<ListingRecord>, RepoError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if *self.query.lock().await == QueryBehaviour::Fail {
            return Err(RepoError::from_persistence("connection refused"));
        }
        if let Some(filter) = filter {
            filter.order()?;
        }

        let mut rows: Vec<ListingRecord> = self
            .rows
            .lock()
            .await
            .iter()
            .filter(|row| {
                filter.is_none_or(|filter| {
                    filter.price_floor().is_none_or(|min| row.price >= min)
                        && filter.price_ceiling().is_none_or(|max| row.price <= max)
                })
            })
            .cloned()
            .map(|mut row| {
                row.requester_is_owner = false;
                row
            })
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        let page: Vec<ListingRecord> = rows
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        if page.is_empty() {
            return Err(RepoError::NotFound);
        }
        Ok(page)
    }
}

#[async_trait]
impl ListingsWriteRepo for InMemoryListings {
    async fn insert_listing_with_file(&self, listing: &ListingRecord) -> Result<(), RepoError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        let behaviour = *self.insert.lock().await;
        match behaviour {
            InsertBehaviour::Succeed => {
                let mut row = listing.clone();
                row.requester_is_owner = false;
                self.rows.lock().await.push(row);
                Ok(())
            }
            InsertBehaviour::Duplicate => Err(RepoError::Duplicate {
                constraint: "listings_pkey".to_string(),
            }),
            InsertBehaviour::Fail => Err(RepoError::from_persistence("connection reset")),
            InsertBehaviour::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
            InsertBehaviour::SlowReply(delay) => {
                let mut row = listing.clone();
                row.requester_is_owner = false;
                self.rows.lock().await.push(row);
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }

    async fn delete_listing(&self, id: Uuid) -> Result<(), RepoError> {
        let mut rows = self.rows.lock().await;
        let before = rows.len();
        rows.retain(|row| row.id != id);
        if rows.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingBlobStore {
    blobs: Mutex<HashMap<String, Bytes>>,
    pub fail_save: AtomicBool,
    pub fail_delete: AtomicBool,
    pub saves: AtomicUsize,
    pub deletes: AtomicUsize,
}

impl RecordingBlobStore {
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub async fn stored(&self) -> usize {
        self.blobs.lock().await.len()
    }
}

#[async_trait]
impl BlobStore for RecordingBlobStore {
    async fn save(
        &self,
        blob: &BlobDescriptor,
        content: ByteStream,
    ) -> Result<StoredBlob, BlobStoreError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if self.fail_save.load(Ordering::SeqCst) {
            return Err(BlobStoreError::Io(std::io::Error::other("disk full")));
        }

        let chunks: Vec<Bytes> = content.try_collect().await.map_err(BlobStoreError::Stream)?;
        let data = Bytes::from(chunks.concat());
        if data.is_empty() {
            return Err(BlobStoreError::EmptyPayload);
        }

        let location = format!("memory/{}", blob.id);
        let size_bytes = data.len() as i64;
        self.blobs.lock().await.insert(location.clone(), data);
        Ok(StoredBlob {
            location,
            size_bytes,
            checksum: "checksum".to_string(),
        })
    }

    async fn load(&self, location: &str) -> Result<ByteStream, BlobStoreError> {
        let data = self
            .blobs
            .lock()
            .await
            .get(location)
            .cloned()
            .ok_or_else(|| BlobStoreError::NotFound {
                location: location.to_string(),
            })?;
        Ok(stream::once(async move { Ok::<_, std::io::Error>(data) }).boxed())
    }

    async fn delete(&self, location: &str) -> Result<(), BlobStoreError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(BlobStoreError::Io(std::io::Error::other("permission denied")));
        }
        self.blobs
            .lock()
            .await
            .remove(location)
            .map(|_| ())
            .ok_or_else(|| BlobStoreError::NotFound {
                location: location.to_string(),
            })
    }
}

/// Memory cache whose reads and writes can be made to fail.
pub struct FlakyCache {
    inner: MemoryCache,
    pub fail_get: AtomicBool,
    pub fail_set: AtomicBool,
    pub corrupt: AtomicBool,
}

impl Default for FlakyCache {
    fn default() -> Self {
        Self {
            inner: MemoryCache::new(NonZeroUsize::new(64).expect("non-zero capacity")),
            fail_get: AtomicBool::new(false),
            fail_set: AtomicBool::new(false),
            corrupt: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl CacheStore for FlakyCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(CacheError::backend("connection refused"));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        if self.fail_set.load(Ordering::SeqCst) {
            return Err(CacheError::backend("read-only replica"));
        }
        let value = if self.corrupt.load(Ordering::SeqCst) {
            "{not json".to_string()
        } else {
            value
        };
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, keys: &[String]) -> Result<(), CacheError> {
        self.inner.delete(keys).await
    }
}

pub struct Harness {
    pub listings: Arc<InMemoryListings>,
    pub blobs: Arc<RecordingBlobStore>,
    pub cache: Arc<FlakyCache>,
    pub service: ListingService,
}

impl Harness {
    pub fn new() -> Self {
        let listings = Arc::new(InMemoryListings::default());
        let blobs = Arc::new(RecordingBlobStore::default());
        let cache = Arc::new(FlakyCache::default());
        let service = ListingService::new(
            listings.clone(),
            listings.clone(),
            blobs.clone(),
            cache.clone(),
            ListingServiceSettings {
                cache_ttl: Duration::from_secs(60),
                compensation_timeout: Duration::from_millis(500),
            },
        );
        Self {
            listings,
            blobs,
            cache,
            service,
        }
    }
}

pub fn requester(login: &str) -> Requester {
    Requester::new(Uuid::new_v4(), login)
}

pub fn draft(title: &str, price: i64) -> ListingDraft {
    ListingDraft {
        title: title.to_string(),
        body: "A perfectly serviceable item, lightly used.".to_string(),
        price,
        attachment: AttachmentMeta::new("photo.jpg", "image/jpeg"),
    }
}

pub fn content(data: &'static [u8]) -> ByteStream {
    stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(data))]).boxed()
}
