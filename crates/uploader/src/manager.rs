//! Batch controller: create, observe, cancel, retry, clear.
//!
//! Every state change recomputes batch aggregates, persists a
//! payload-stripped snapshot, and broadcasts the full batch list to
//! subscribers. Item transfer itself happens on the worker pool.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use prooflift_protocol::RegisteredPhoto;
use prooflift_store::{PersistenceBackend, ResumeStore, SnapshotStore};
use prooflift_transfer::{FileUpload, StorageClient, UploadSource};

use crate::progress;
use crate::types::{
    BatchSnapshot, CANCELLED_BY_USER, ItemStatus, NewUpload, UPLOAD_INTERRUPTED, UploadBatch,
    UploadItem,
};
use crate::worker;
use crate::{UploaderConfig, UploaderError};

type SubscriberFn = dyn Fn(&[UploadBatch]) + Send + Sync;

/// Handle for removing a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

pub(crate) struct Inner {
    pub(crate) config: UploaderConfig,
    pub(crate) client: Arc<dyn StorageClient>,
    pub(crate) resume: Arc<ResumeStore>,
    snapshots: SnapshotStore,
    pub(crate) batches: Mutex<Vec<UploadBatch>>,
    pub(crate) cancels: Mutex<HashMap<String, CancellationToken>>,
    subscribers: Mutex<HashMap<u64, Arc<SubscriberFn>>>,
    next_subscription: AtomicU64,
}

impl Inner {
    /// Recomputes aggregates, persists a snapshot, and broadcasts the full
    /// batch list. Listeners run outside every lock.
    pub(crate) fn notify(&self) {
        let (snapshot, broadcast) = {
            let mut batches = self.batches.lock().unwrap();
            for batch in batches.iter_mut() {
                progress::recompute(batch);
            }
            let snapshot: Vec<BatchSnapshot> = batches.iter().map(BatchSnapshot::from).collect();
            (snapshot, batches.clone())
        };

        if let Err(e) = self.snapshots.save(&snapshot) {
            warn!(error = %e, "failed to persist batch snapshot");
        }

        let listeners: Vec<Arc<SubscriberFn>> = {
            let subscribers = self.subscribers.lock().unwrap();
            subscribers.values().cloned().collect()
        };
        for listener in listeners {
            listener(&broadcast);
        }
    }

    /// Mutates one item under the lock. Returns false when the batch or
    /// item no longer exists (e.g. the batch was cancelled meanwhile).
    pub(crate) fn update_item(
        &self,
        batch_id: &str,
        item_id: &str,
        mutate: impl FnOnce(&mut UploadItem),
    ) -> bool {
        let mut batches = self.batches.lock().unwrap();
        let Some(batch) = batches.iter_mut().find(|b| b.id == batch_id) else {
            return false;
        };
        let Some(item) = batch.items.iter_mut().find(|i| i.id == item_id) else {
            return false;
        };
        mutate(item);
        true
    }
}

/// Public entry point for the upload pipeline.
///
/// Must live inside a tokio runtime: `create_batch` spawns worker tasks.
pub struct UploadManager {
    inner: Arc<Inner>,
}

impl UploadManager {
    /// Creates a manager over a storage client and a persistence backend.
    ///
    /// Persisted batches are restored, but any non-terminal item in them is
    /// force-failed: file handles do not survive a restart, so only
    /// file-session resumability (the resume pointers) carries across runs.
    pub fn new(
        client: Arc<dyn StorageClient>,
        backend: Arc<dyn PersistenceBackend>,
        config: UploaderConfig,
    ) -> Self {
        let resume = Arc::new(ResumeStore::new(Arc::clone(&backend)));
        let snapshots = SnapshotStore::new(backend);

        let mut restored: Vec<UploadBatch> = snapshots
            .load::<BatchSnapshot>()
            .into_iter()
            .map(BatchSnapshot::into_batch)
            .collect();
        let mut interrupted = 0usize;
        for batch in &mut restored {
            for item in &mut batch.items {
                if !item.status.is_terminal() {
                    item.status = ItemStatus::Failed;
                    item.error = Some(UPLOAD_INTERRUPTED.into());
                    interrupted += 1;
                }
            }
            progress::recompute(batch);
        }
        if interrupted > 0 {
            info!(
                batches = restored.len(),
                items = interrupted,
                "force-failed interrupted uploads from previous run"
            );
        }

        Self {
            inner: Arc::new(Inner {
                config,
                client,
                resume,
                snapshots,
                batches: Mutex::new(restored),
                cancels: Mutex::new(HashMap::new()),
                subscribers: Mutex::new(HashMap::new()),
                next_subscription: AtomicU64::new(1),
            }),
        }
    }

    /// Queues `files` as one batch against an album and starts processing
    /// asynchronously. Returns the batch id without waiting for any
    /// transfer.
    pub fn create_batch(
        &self,
        gallery_id: &str,
        album_id: &str,
        files: Vec<NewUpload>,
        compress: bool,
    ) -> Result<String, UploaderError> {
        if gallery_id.is_empty() || album_id.is_empty() {
            return Err(UploaderError::MissingTarget);
        }
        if files.is_empty() {
            return Err(UploaderError::EmptyBatch);
        }

        let total_bytes = files.iter().map(|f| f.size).sum();
        let items: Vec<UploadItem> = files
            .into_iter()
            .map(|f| UploadItem {
                id: Uuid::new_v4().to_string(),
                file_name: f.file_name,
                content_type: f.content_type,
                size: f.size,
                path: Some(f.path),
                status: ItemStatus::Queued,
                progress: 0.0,
                attempts: 0,
                error: None,
                photo_id: None,
            })
            .collect();

        let batch_id = Uuid::new_v4().to_string();
        let batch = UploadBatch {
            id: batch_id.clone(),
            gallery_id: gallery_id.to_string(),
            album_id: album_id.to_string(),
            created_at: Utc::now(),
            total_bytes,
            uploaded_bytes: 0,
            completed_files: 0,
            failed_files: 0,
            average_speed: 0.0,
            compress,
            items,
            started_at: Instant::now(),
        };
        info!(
            batch = %batch_id,
            files = batch.items.len(),
            total_bytes,
            compress,
            "batch created"
        );

        self.inner
            .cancels
            .lock()
            .unwrap()
            .insert(batch_id.clone(), CancellationToken::new());
        self.inner.batches.lock().unwrap().push(batch);
        self.inner.notify();
        worker::dispatch(&self.inner, &batch_id);
        Ok(batch_id)
    }

    /// Current batch list, including derived figures.
    pub fn batches(&self) -> Vec<UploadBatch> {
        self.inner.batches.lock().unwrap().clone()
    }

    /// Registers a listener receiving the full batch list on every state
    /// change.
    pub fn subscribe(
        &self,
        listener: impl Fn(&[UploadBatch]) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = self.inner.next_subscription.fetch_add(1, Ordering::Relaxed);
        self.inner
            .subscribers
            .lock()
            .unwrap()
            .insert(id, Arc::new(listener));
        SubscriptionId(id)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.inner.subscribers.lock().unwrap().remove(&id.0);
    }

    /// Cancels a batch: aborts live transfers, fails every pending item
    /// with "cancelled by user", and deletes the batch from the listable
    /// set.
    pub fn cancel_batch(&self, batch_id: &str) -> Result<(), UploaderError> {
        if let Some(token) = self.inner.cancels.lock().unwrap().remove(batch_id) {
            token.cancel();
        }
        {
            let mut batches = self.inner.batches.lock().unwrap();
            let Some(index) = batches.iter().position(|b| b.id == batch_id) else {
                return Err(UploaderError::BatchNotFound(batch_id.to_string()));
            };
            for item in &mut batches[index].items {
                if !item.status.is_terminal() {
                    item.status = ItemStatus::Failed;
                    item.error = Some(CANCELLED_BY_USER.into());
                }
            }
            batches.remove(index);
        }
        info!(batch = %batch_id, "batch cancelled");
        self.inner.notify();
        Ok(())
    }

    /// Re-queues exactly the failed items of a batch and dispatches again.
    /// Succeeded items are untouched.
    pub fn retry_failed(&self, batch_id: &str) -> Result<(), UploaderError> {
        {
            let mut batches = self.inner.batches.lock().unwrap();
            let Some(batch) = batches.iter_mut().find(|b| b.id == batch_id) else {
                return Err(UploaderError::BatchNotFound(batch_id.to_string()));
            };
            let mut reset = 0usize;
            for item in &mut batch.items {
                if item.status == ItemStatus::Failed {
                    item.status = ItemStatus::Queued;
                    item.progress = 0.0;
                    item.attempts = 0;
                    item.error = None;
                    reset += 1;
                }
            }
            batch.failed_files = 0;
            info!(batch = %batch_id, items = reset, "retrying failed items");
        }
        self.inner.notify();
        worker::dispatch(&self.inner, batch_id);
        Ok(())
    }

    /// Drops every batch whose items are all terminal.
    pub fn clear_completed(&self) {
        {
            let mut batches = self.inner.batches.lock().unwrap();
            let mut cancels = self.inner.cancels.lock().unwrap();
            batches.retain(|batch| {
                if batch.is_terminal() {
                    cancels.remove(&batch.id);
                    false
                } else {
                    true
                }
            });
        }
        self.inner.notify();
    }

    /// Uploads one file through the non-chunked fallback, outside any
    /// batch, with the same retry policy and conflict semantics as the
    /// chunked path.
    pub async fn upload_single(
        &self,
        file: NewUpload,
        album_id: &str,
    ) -> Result<RegisteredPhoto, UploaderError> {
        let inner = &self.inner;
        let policy = inner.config.retry.clone();
        let cancel = CancellationToken::new();
        let source = UploadSource::from_file(
            file.file_name.clone(),
            file.content_type.clone(),
            file.path.clone(),
            file.size,
        );

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let upload = FileUpload::new(
                inner.client.as_ref(),
                inner.resume.as_ref(),
                &inner.config.transfer,
                cancel.clone(),
            );
            match upload.run_direct(&source, album_id).await {
                Ok(photo) => {
                    info!(file = %file.file_name, photo = %photo.photo_id, "direct upload complete");
                    return Ok(photo);
                }
                Err(err) if err.is_retryable() && policy.allows_retry(attempt) => {
                    let delay = policy.delay_for_attempt(attempt);
                    warn!(
                        file = %file.file_name,
                        attempt,
                        error = %err,
                        "direct upload failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}
