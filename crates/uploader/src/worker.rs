//! Bounded worker pool over a batch's queued items.
//!
//! Dispatch spawns `min(max_concurrent, queued)` workers; each worker
//! atomically claims the next queued item under the batch-list lock and
//! runs it to a terminal state before claiming another. Claiming is the
//! only queue mutation, so two workers can never pick the same item.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use prooflift_protocol::RegisteredPhoto;
use prooflift_transfer::{FileUpload, TransferError, UploadSource, UploadTarget, compress_image};

use crate::manager::Inner;
use crate::types::{CANCELLED_BY_USER, ItemStatus};

pub(crate) fn dispatch(inner: &Arc<Inner>, batch_id: &str) {
    let queued = {
        let batches = inner.batches.lock().unwrap();
        let Some(batch) = batches.iter().find(|b| b.id == batch_id) else {
            return;
        };
        batch
            .items
            .iter()
            .filter(|i| i.status == ItemStatus::Queued)
            .count()
    };
    if queued == 0 {
        return;
    }

    let cancel = {
        let mut cancels = inner.cancels.lock().unwrap();
        cancels
            .entry(batch_id.to_string())
            .or_insert_with(CancellationToken::new)
            .clone()
    };

    let workers = inner.config.max_concurrent.min(queued);
    debug!(batch = %batch_id, workers, queued, "dispatching upload workers");
    for _ in 0..workers {
        let inner = Arc::clone(inner);
        let batch_id = batch_id.to_string();
        let cancel = cancel.clone();
        tokio::spawn(worker_loop(inner, batch_id, cancel));
    }
}

async fn worker_loop(inner: Arc<Inner>, batch_id: String, cancel: CancellationToken) {
    loop {
        if cancel.is_cancelled() {
            return;
        }
        let Some(claim) = claim_next(&inner, &batch_id) else {
            return;
        };
        inner.notify();
        process_item(&inner, &batch_id, claim, &cancel).await;
        inner.notify();
    }
}

/// Everything a worker needs to run one item, copied out under the lock.
struct Claim {
    item_id: String,
    file_name: String,
    content_type: String,
    size: u64,
    path: Option<PathBuf>,
    compress: bool,
    target: UploadTarget,
}

fn claim_next(inner: &Inner, batch_id: &str) -> Option<Claim> {
    let mut batches = inner.batches.lock().unwrap();
    let batch = batches.iter_mut().find(|b| b.id == batch_id)?;
    let target = UploadTarget {
        gallery_id: batch.gallery_id.clone(),
        album_id: batch.album_id.clone(),
    };
    let compress = batch.compress;
    let item = batch
        .items
        .iter_mut()
        .find(|i| i.status == ItemStatus::Queued)?;
    item.status = ItemStatus::Uploading;
    Some(Claim {
        item_id: item.id.clone(),
        file_name: item.file_name.clone(),
        content_type: item.content_type.clone(),
        size: item.size,
        path: item.path.clone(),
        compress,
        target,
    })
}

async fn process_item(inner: &Arc<Inner>, batch_id: &str, claim: Claim, cancel: &CancellationToken) {
    let Some(path) = claim.path.clone() else {
        // Restored from a snapshot: the handle is gone for good.
        inner.update_item(batch_id, &claim.item_id, |item| {
            item.status = ItemStatus::Failed;
            item.error = Some("file no longer available".into());
            item.attempts = item.attempts.max(1);
        });
        return;
    };

    let policy = inner.config.retry.clone();
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        inner.update_item(batch_id, &claim.item_id, |item| {
            item.attempts = attempt;
            item.progress = 0.0;
            item.status = ItemStatus::Uploading;
            item.error = None;
        });
        inner.notify();

        match run_attempt(inner, batch_id, &claim, &path, attempt, cancel).await {
            Ok(photo) => {
                inner.update_item(batch_id, &claim.item_id, |item| {
                    item.status = ItemStatus::Success;
                    item.progress = 100.0;
                    item.photo_id = Some(photo.photo_id.clone());
                    item.error = None;
                });
                info!(file = %claim.file_name, attempt, "file uploaded");
                return;
            }
            Err(err) => {
                let cancelled = matches!(err, TransferError::Cancelled) || cancel.is_cancelled();
                if cancelled || !err.is_retryable() || !policy.allows_retry(attempt) {
                    let message = if cancelled {
                        CANCELLED_BY_USER.to_string()
                    } else {
                        err.to_string()
                    };
                    inner.update_item(batch_id, &claim.item_id, |item| {
                        item.status = ItemStatus::Failed;
                        item.error = Some(message.clone());
                    });
                    error!(file = %claim.file_name, attempt, error = %err, "file failed permanently");
                    return;
                }

                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    file = %claim.file_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "attempt failed, backing off"
                );
                tokio::select! {
                    _ = cancel.cancelled() => {
                        inner.update_item(batch_id, &claim.item_id, |item| {
                            item.status = ItemStatus::Failed;
                            item.error = Some(CANCELLED_BY_USER.into());
                        });
                        return;
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
}

async fn run_attempt(
    inner: &Arc<Inner>,
    batch_id: &str,
    claim: &Claim,
    path: &PathBuf,
    attempt: u32,
    cancel: &CancellationToken,
) -> Result<RegisteredPhoto, TransferError> {
    // Compression runs only on the first attempt of a compress-flagged
    // batch; retries go back to the original bytes.
    let source = if claim.compress && attempt == 1 {
        inner.update_item(batch_id, &claim.item_id, |item| {
            item.status = ItemStatus::Processing;
        });
        inner.notify();

        let opts = inner.config.compression.clone();
        let original = path.clone();
        let compressed = tokio::task::spawn_blocking(move || {
            let data = std::fs::read(&original)?;
            compress_image(&data, &opts).map_err(TransferError::from)
        })
        .await
        .map_err(|e| TransferError::Join(e.to_string()))?;

        match compressed {
            Ok(bytes) => {
                debug!(file = %claim.file_name, bytes = bytes.len(), "image downsampled for upload");
                UploadSource::from_bytes(claim.file_name.clone(), "image/jpeg", bytes)
            }
            Err(e) => {
                warn!(file = %claim.file_name, error = %e, "compression failed, uploading original");
                UploadSource::from_file(
                    claim.file_name.clone(),
                    claim.content_type.clone(),
                    path.clone(),
                    claim.size,
                )
            }
        }
    } else {
        UploadSource::from_file(
            claim.file_name.clone(),
            claim.content_type.clone(),
            path.clone(),
            claim.size,
        )
    };

    inner.update_item(batch_id, &claim.item_id, |item| {
        item.status = ItemStatus::Uploading;
    });
    inner.notify();

    let total = source.size.max(1);
    let on_progress = {
        let inner = Arc::clone(inner);
        let batch_id = batch_id.to_string();
        let item_id = claim.item_id.clone();
        move |bytes: u64| {
            let pct = (bytes as f64 / total as f64 * 100.0).min(100.0);
            inner.update_item(&batch_id, &item_id, |item| item.progress = pct);
            inner.notify();
        }
    };

    let upload = FileUpload::new(
        inner.client.as_ref(),
        inner.resume.as_ref(),
        &inner.config.transfer,
        cancel.clone(),
    );
    upload
        .run(&source, &claim.target, batch_id, &on_progress)
        .await
}
