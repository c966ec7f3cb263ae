//! Durable local state for the upload pipeline.
//!
//! Two stores share one injectable [`PersistenceBackend`]:
//!
//! - [`ResumeStore`]: per-file pointers to open multipart sessions, keyed
//!   by `(file_name, size)`.
//! - [`SnapshotStore`]: payload-stripped batch snapshots under a single
//!   namespace key.
//!
//! Tests substitute [`MemoryBackend`] for the disk-backed
//! [`JsonFileBackend`].

mod backend;
mod resume;
mod snapshot;

pub use backend::{JsonFileBackend, MemoryBackend, PersistenceBackend};
pub use resume::{ResumePointer, ResumeStore};
pub use snapshot::SnapshotStore;

/// Errors from the local persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
