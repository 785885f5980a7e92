use std::{sync::Arc, time::Duration};

use metrics::counter;
use time::OffsetDateTime;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::application::repos::{
    BlobDescriptor, BlobStore, BlobStoreError, ByteStream, ListingsWriteRepo, RepoError,
};
use crate::domain::entities::{FileRecord, ListingRecord, Requester};
use crate::domain::listings::ListingDraft;

use super::service::ListingService;
use super::types::ListingServiceError;

const CREATE_SOURCE: &str = "application::listings::create_listing";
const DELETE_SOURCE: &str = "application::listings::delete_listing";
const COMPENSATION_SOURCE: &str = "application::listings::compensation";

impl ListingService {
    /// Stores the attachment, then records the listing and its file.
    ///
    /// When recording fails the stored attachment is deleted again before the
    /// error is returned. Recording continues in the background if this
    /// future is dropped, and the attachment is deleted only if the insert
    /// does not commit.
    pub async fn create_listing(
        &self,
        requester: &Requester,
        draft: ListingDraft,
        content: ByteStream,
    ) -> Result<ListingRecord, ListingServiceError> {
        if let Err(err) = draft.validate() {
            warn!(
                target = CREATE_SOURCE,
                field = err.field().as_str(),
                error = %err,
                "listing draft rejected"
            );
            return Err(err.into());
        }

        if requester.id.is_nil() {
            warn!(target = CREATE_SOURCE, "listing creation without requester");
            return Err(ListingServiceError::MissingRequester);
        }

        let listing_id = Uuid::new_v4();
        let file_id = Uuid::new_v4();
        let created_at = now_truncated();

        let descriptor = BlobDescriptor {
            id: file_id,
            name: draft.attachment.name.clone(),
            mime: draft.attachment.mime.clone(),
        };

        let stored = match self.blobs.save(&descriptor, content).await {
            Ok(stored) => stored,
            Err(err) => {
                error!(
                    target = CREATE_SOURCE,
                    listing_id = %listing_id,
                    file_id = %file_id,
                    error = %err,
                    "failed to store listing attachment"
                );
                return Err(ListingServiceError::Storage(err));
            }
        };

        let listing = ListingRecord {
            id: listing_id,
            owner_id: requester.id,
            owner_login: requester.login.clone(),
            title: draft.title,
            body: draft.body,
            price: draft.price,
            created_at,
            file: FileRecord {
                id: file_id,
                listing_id,
                name: descriptor.name,
                mime: descriptor.mime,
                location: stored.location,
                size_bytes: stored.size_bytes,
                checksum: stored.checksum,
            },
            requester_is_owner: true,
        };

        // Held until the task is joined; dropping it tells the task the caller is gone.
        let (_caller_alive, caller_gone) = oneshot::channel::<()>();
        let task = tokio::spawn(record_listing(
            Arc::clone(&self.writer),
            Arc::clone(&self.blobs),
            listing,
            self.settings.compensation_timeout,
            caller_gone,
        ));

        let (listing, outcome) = task.await.map_err(|err| {
            error!(
                target = CREATE_SOURCE,
                listing_id = %listing_id,
                error = %err,
                "listing recording task failed to complete"
            );
            ListingServiceError::internal(err.to_string())
        })?;

        match outcome {
            Ok(()) => {
                info!(
                    target = CREATE_SOURCE,
                    listing_id = %listing.id,
                    owner_id = %listing.owner_id,
                    file_id = %listing.file.id,
                    "listing created"
                );
                Ok(listing)
            }
            Err(RepoError::Duplicate { .. }) => Err(ListingServiceError::AlreadyExists),
            Err(err) => Err(ListingServiceError::internal(err.to_string())),
        }
    }

    pub async fn delete_listing(&self, id: Uuid) -> Result<(), ListingServiceError> {
        match self.writer.delete_listing(id).await {
            Ok(()) => {
                info!(target = DELETE_SOURCE, listing_id = %id, "listing deleted");
                Ok(())
            }
            Err(RepoError::NotFound) => Err(ListingServiceError::NotFound),
            Err(err) => {
                error!(
                    target = DELETE_SOURCE,
                    listing_id = %id,
                    error = %err,
                    "failed to delete listing"
                );
                Err(ListingServiceError::internal(err.to_string()))
            }
        }
    }
}

/// Records the listing and, when recording fails, deletes its stored blob.
///
/// Runs on its own task so the outcome of the insert decides the delete even
/// when the caller goes away. Once `caller_gone` fires, the insert gets at
/// most `timeout` to settle; an insert still pending after that is treated as
/// failed.
async fn record_listing(
    writer: Arc<dyn ListingsWriteRepo>,
    blobs: Arc<dyn BlobStore>,
    listing: ListingRecord,
    timeout: Duration,
    caller_gone: oneshot::Receiver<()>,
) -> (ListingRecord, Result<(), RepoError>) {
    let outcome = {
        let insert = writer.insert_listing_with_file(&listing);
        tokio::pin!(insert);
        tokio::select! {
            outcome = &mut insert => outcome,
            _ = caller_gone => {
                warn!(
                    target = COMPENSATION_SOURCE,
                    listing_id = %listing.id,
                    "listing creation abandoned; waiting for the insert to settle"
                );
                match tokio::time::timeout(timeout, &mut insert).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(RepoError::Timeout),
                }
            }
        }
    };

    if let Err(err) = &outcome {
        match err {
            RepoError::Duplicate { constraint } => warn!(
                target = CREATE_SOURCE,
                listing_id = %listing.id,
                constraint = %constraint,
                "duplicate listing detected; removing stored attachment"
            ),
            other => error!(
                target = CREATE_SOURCE,
                listing_id = %listing.id,
                error = %other,
                "failed to record listing; removing stored attachment"
            ),
        }
        delete_blob(blobs, listing.file.location.clone(), timeout).await;
    }

    (listing, outcome)
}

async fn delete_blob(blobs: Arc<dyn BlobStore>, location: String, timeout: Duration) {
    counter!("agora_listings_compensation_total").increment(1);

    let failure = match tokio::time::timeout(timeout, blobs.delete(&location)).await {
        Ok(Ok(())) => {
            debug!(
                target = COMPENSATION_SOURCE,
                location = %location,
                "stored attachment removed"
            );
            return;
        }
        Ok(Err(BlobStoreError::NotFound { .. })) => "attachment already missing".to_string(),
        Ok(Err(err)) => err.to_string(),
        Err(_) => format!("delete timed out after {}ms", timeout.as_millis()),
    };

    counter!("agora_listings_compensation_failed_total").increment(1);
    warn!(
        target = COMPENSATION_SOURCE,
        location = %location,
        error = %failure,
        "failed to roll back stored attachment after persistence error"
    );
}

/// Current time at the precision the relational store keeps, so a created
/// listing compares equal to the same listing read back later.
fn now_truncated() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now.replace_nanosecond(now.nanosecond() / 1_000 * 1_000)
        .unwrap_or(now)
}
