use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub(crate) const CANCELLED_BY_USER: &str = "cancelled by user";
pub(crate) const UPLOAD_INTERRUPTED: &str = "upload interrupted";

/// Lifecycle of one item. Owned by the worker pool; terminal once
/// `Success` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemStatus {
    Queued,
    Uploading,
    Processing,
    Success,
    Failed,
}

impl ItemStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ItemStatus::Success | ItemStatus::Failed)
    }
}

/// A file handed to `create_batch`.
#[derive(Debug, Clone)]
pub struct NewUpload {
    pub path: PathBuf,
    pub file_name: String,
    pub content_type: String,
    pub size: u64,
}

/// One file's transfer state within a batch.
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub id: String,
    pub file_name: String,
    pub content_type: String,
    pub size: u64,
    /// `None` once restored from a snapshot; file handles do not survive
    /// a restart.
    pub path: Option<PathBuf>,
    pub status: ItemStatus,
    /// 0–100. Not required to be monotonic.
    pub progress: f64,
    pub attempts: u32,
    pub error: Option<String>,
    pub photo_id: Option<String>,
}

/// A set of files submitted together against one album.
#[derive(Debug, Clone)]
pub struct UploadBatch {
    pub id: String,
    pub gallery_id: String,
    pub album_id: String,
    pub created_at: DateTime<Utc>,
    /// Fixed at creation.
    pub total_bytes: u64,
    /// Recomputed from item progress on every change, never incremented.
    pub uploaded_bytes: u64,
    pub completed_files: usize,
    pub failed_files: usize,
    /// Cumulative bytes/second since the batch started.
    pub average_speed: f64,
    pub compress: bool,
    pub items: Vec<UploadItem>,
    pub(crate) started_at: Instant,
}

impl UploadBatch {
    /// True once every item reached `Success` or `Failed`.
    pub fn is_terminal(&self) -> bool {
        self.items.iter().all(|i| i.status.is_terminal())
    }
}

// ---------------------------------------------------------------------------
// Snapshots: what survives a restart (file payloads stripped)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSnapshot {
    pub id: String,
    pub file_name: String,
    pub content_type: String,
    pub size: u64,
    pub status: ItemStatus,
    pub progress: f64,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSnapshot {
    pub id: String,
    pub gallery_id: String,
    pub album_id: String,
    pub created_at: DateTime<Utc>,
    pub total_bytes: u64,
    pub compress: bool,
    pub items: Vec<ItemSnapshot>,
}

impl From<&UploadBatch> for BatchSnapshot {
    fn from(batch: &UploadBatch) -> Self {
        Self {
            id: batch.id.clone(),
            gallery_id: batch.gallery_id.clone(),
            album_id: batch.album_id.clone(),
            created_at: batch.created_at,
            total_bytes: batch.total_bytes,
            compress: batch.compress,
            items: batch
                .items
                .iter()
                .map(|item| ItemSnapshot {
                    id: item.id.clone(),
                    file_name: item.file_name.clone(),
                    content_type: item.content_type.clone(),
                    size: item.size,
                    status: item.status,
                    progress: item.progress,
                    attempts: item.attempts,
                    error: item.error.clone(),
                    photo_id: item.photo_id.clone(),
                })
                .collect(),
        }
    }
}

impl BatchSnapshot {
    /// Rebuilds an in-memory batch. Counters are recomputed by the caller;
    /// items come back without file handles.
    pub(crate) fn into_batch(self) -> UploadBatch {
        UploadBatch {
            id: self.id,
            gallery_id: self.gallery_id,
            album_id: self.album_id,
            created_at: self.created_at,
            total_bytes: self.total_bytes,
            uploaded_bytes: 0,
            completed_files: 0,
            failed_files: 0,
            average_speed: 0.0,
            compress: self.compress,
            items: self
                .items
                .into_iter()
                .map(|item| UploadItem {
                    id: item.id,
                    file_name: item.file_name,
                    content_type: item.content_type,
                    size: item.size,
                    path: None,
                    status: item.status,
                    progress: item.progress,
                    attempts: item.attempts,
                    error: item.error,
                    photo_id: item.photo_id,
                })
                .collect(),
            started_at: Instant::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_terminality() {
        assert!(ItemStatus::Success.is_terminal());
        assert!(ItemStatus::Failed.is_terminal());
        assert!(!ItemStatus::Queued.is_terminal());
        assert!(!ItemStatus::Uploading.is_terminal());
        assert!(!ItemStatus::Processing.is_terminal());
    }

    #[test]
    fn status_serializes_camel_case() {
        assert_eq!(
            serde_json::to_string(&ItemStatus::Uploading).unwrap(),
            "\"uploading\""
        );
    }

    #[test]
    fn snapshot_strips_file_handles() {
        let batch = UploadBatch {
            id: "b1".into(),
            gallery_id: "g1".into(),
            album_id: "a1".into(),
            created_at: Utc::now(),
            total_bytes: 10,
            uploaded_bytes: 5,
            completed_files: 0,
            failed_files: 0,
            average_speed: 1.0,
            compress: false,
            items: vec![UploadItem {
                id: "i1".into(),
                file_name: "photo.jpg".into(),
                content_type: "image/jpeg".into(),
                size: 10,
                path: Some(PathBuf::from("/tmp/photo.jpg")),
                status: ItemStatus::Uploading,
                progress: 50.0,
                attempts: 1,
                error: None,
                photo_id: None,
            }],
            started_at: Instant::now(),
        };

        let snapshot = BatchSnapshot::from(&batch);
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(!json.contains("/tmp/photo.jpg"));

        let restored: BatchSnapshot = serde_json::from_str(&json).unwrap();
        let batch = restored.into_batch();
        assert!(batch.items[0].path.is_none());
        assert_eq!(batch.items[0].status, ItemStatus::Uploading);
        assert_eq!(batch.items[0].progress, 50.0);
    }
}
