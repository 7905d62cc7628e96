//! Submission pipeline
//!
//! `Received → Validated → ImagesProcessed → SiteResolved → Persisted`.
//! Any stage may reject the submission. Validation finishes before any
//! transcoding starts, and the site lookup and review insert commit together.
//! Image files written for a submission that is then rejected are removed
//! again unless another review already references them. File removal is
//! serialized against in-flight submissions through the image store's gate.

use serde::Serialize;
use sqlx::SqlitePool;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::{reviews, sites};
use crate::services::image_store::{to_data_url, ImageStore, StoredImage};
use crate::services::transcoder::{transcode_all, ImageUpload};
use crate::utils::retry_on_lock;
use crate::validators::{
    sanitize_new_review, sanitize_update, validate_review, validate_update, Fields,
};
use sitefeed_common::config::ImageSettings;
use sitefeed_common::db::Review;
use sitefeed_common::{Error, Result};

/// Upper bound on waiting out SQLite writer contention
const LOCK_RETRY_MAX_WAIT_MS: u64 = 5000;

/// Inline result of the standalone image processing endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedImage {
    pub original_name: String,
    /// Transcoded JPEG size in bytes
    pub size: usize,
    /// `data:image/jpeg;base64,…`
    pub base64: String,
}

/// Validate, transcode, and persist one review submission
pub async fn submit_review(
    db: &SqlitePool,
    store: &ImageStore,
    settings: &ImageSettings,
    fields: &Fields,
    uploads: Vec<ImageUpload>,
) -> Result<Review> {
    let started = Instant::now();

    let review = match validate_review(fields) {
        Ok(review) => sanitize_new_review(review),
        Err(e) => {
            debug!(error = %e, "Submission rejected at validation");
            return Err(e);
        }
    };

    let image_count = uploads.len();
    let transcoded = transcode_all(uploads, settings).await?;
    debug!(image_count, "Submission images transcoded");

    // Held until commit so no cleanup unlinks a file this submission reuses
    let pending = if transcoded.is_empty() {
        None
    } else {
        Some(store.begin_writes().await)
    };

    let mut stored = Vec::with_capacity(transcoded.len());
    for image in &transcoded {
        match store.put(&image.bytes).await {
            Ok(saved) => stored.push(saved),
            Err(e) => {
                drop(pending);
                discard_new_images(db, store, &stored).await;
                return Err(e);
            }
        }
    }
    let references: Vec<String> = stored.iter().map(|s| s.reference.clone()).collect();

    let review = &review;
    let references_ref = references.as_slice();
    let persisted = retry_on_lock("review submission", LOCK_RETRY_MAX_WAIT_MS, || async move {
        let mut tx = db.begin().await?;
        let site = sites::resolve_site(
            &mut tx,
            review.latitude,
            review.longitude,
            review.address.as_deref(),
        )
        .await?;
        let created = reviews::create(&mut tx, &site, review, references_ref).await?;
        tx.commit().await?;
        Ok(created)
    })
    .await;
    drop(pending);

    match persisted {
        Ok(created) => {
            info!(
                review_id = %created.id,
                site_id = %created.site_id,
                images = created.images.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Review submitted"
            );
            Ok(created)
        }
        Err(e) => {
            warn!(error = %e, "Submission rejected at persistence");
            discard_new_images(db, store, &stored).await;
            Err(e)
        }
    }
}

/// Validate and apply a partial update
pub async fn update_review(db: &SqlitePool, id: Uuid, fields: &Fields) -> Result<Review> {
    let changes = sanitize_update(validate_update(fields)?);

    let changes = &changes;
    let updated = retry_on_lock("review update", LOCK_RETRY_MAX_WAIT_MS, || async move {
        reviews::update(db, id, changes).await
    })
    .await?;

    info!(review_id = %id, "Review updated");
    Ok(updated)
}

/// Delete a review, then any of its image files no other review uses
pub async fn delete_review(db: &SqlitePool, store: &ImageStore, id: Uuid) -> Result<()> {
    let review = reviews::find_by_id(db, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Review {} not found", id)))?;

    let deleted = retry_on_lock("review delete", LOCK_RETRY_MAX_WAIT_MS, || async move {
        reviews::delete(db, id).await
    })
    .await?;
    if !deleted {
        return Err(Error::NotFound(format!("Review {} not found", id)));
    }

    remove_unreferenced(db, store, review.images.iter().map(String::as_str)).await;

    info!(review_id = %id, "Review deleted");
    Ok(())
}

/// Transcode a batch and return it inline, without storing anything
pub async fn process_images(
    settings: &ImageSettings,
    uploads: Vec<ImageUpload>,
) -> Result<Vec<ProcessedImage>> {
    if uploads.is_empty() {
        return Err(Error::NoFilesProvided);
    }

    let transcoded = transcode_all(uploads, settings).await?;
    let processed: Vec<ProcessedImage> = transcoded
        .into_iter()
        .map(|image| ProcessedImage {
            size: image.bytes.len(),
            base64: to_data_url(&image.bytes),
            original_name: image.original_name,
        })
        .collect();

    debug!(count = processed.len(), "Images processed inline");
    Ok(processed)
}

/// Compensating delete for a rejected submission
///
/// Callers must have dropped their own [`PendingWrites`](crate::services::image_store::PendingWrites)
/// lease first.
async fn discard_new_images(db: &SqlitePool, store: &ImageStore, stored: &[StoredImage]) {
    let created = stored
        .iter()
        .filter(|image| image.newly_created)
        .map(|image| image.reference.as_str())
        .collect::<Vec<&str>>();
    remove_unreferenced(db, store, created.into_iter()).await;
}

/// Unlink each file no review references
///
/// The reference check and the unlink happen under the store's cleanup
/// lease, so a submission that reused a file has either committed (and
/// is seen here) or will `put` the file again afterwards.
async fn remove_unreferenced<'a>(
    db: &SqlitePool,
    store: &ImageStore,
    references: impl Iterator<Item = &'a str>,
) {
    let mut references = references.peekable();
    if references.peek().is_none() {
        return;
    }

    let _cleanup = store.begin_cleanup().await;
    for reference in references {
        remove_if_unreferenced(db, store, reference).await;
    }
}

/// Best-effort cleanup; failures are logged, never surfaced
async fn remove_if_unreferenced(db: &SqlitePool, store: &ImageStore, reference: &str) {
    match reviews::image_referenced(db, reference).await {
        Ok(false) => match store.remove(reference).await {
            Ok(_) => debug!(%reference, "Removed unreferenced image"),
            Err(e) => warn!(%reference, error = %e, "Failed to remove image file"),
        },
        Ok(true) => {}
        Err(e) => warn!(%reference, error = %e, "Could not check image references, keeping file"),
    }
}
