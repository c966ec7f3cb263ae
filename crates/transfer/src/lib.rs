//! Resumable chunked file transfer to remote photo storage.
//!
//! One [`FileUpload`] drives a single file through the multipart protocol:
//! open (or reuse) a session, upload the missing parts through the relay,
//! complete, then register the photo. Resume pointers come from
//! `prooflift-store`; the remote side is reached through the
//! [`StorageClient`] trait so tests can substitute mocks.

mod chunked;
mod compress;
mod http;
mod remote;
mod upload;

pub use chunked::{ChunkReader, fingerprint_bytes, part_count, prefix_fingerprint};
pub use compress::{CompressError, CompressionOptions, compress_image};
pub use http::HttpClient;
pub use remote::{CredentialProvider, RemoteError, RemoteFuture, StorageClient};
pub use upload::{FileUpload, SourceData, UploadSource, UploadTarget};

use std::time::Duration;

/// Default part size: 10 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 10 * 1024 * 1024;

/// Number of leading bytes hashed into the resume fingerprint.
pub const FINGERPRINT_PREFIX_LEN: usize = 64 * 1024;

/// Tuning for a single file transfer.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Fixed part size in bytes; part count = ceil(size / chunk_size).
    pub chunk_size: usize,
    /// Upper bound on one part transfer (and the direct-upload call). A
    /// timed-out part surfaces as a transient error and re-enters the
    /// normal retry path.
    pub part_timeout: Duration,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            part_timeout: Duration::from_secs(120),
        }
    }
}

/// Errors produced while transferring one file.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("store error: {0}")]
    Store(#[from] prooflift_store::StoreError),

    #[error("image compression failed: {0}")]
    Compress(#[from] CompressError),

    #[error("part {0} missing from committed set")]
    PartGap(u32),

    #[error("cancelled")]
    Cancelled,

    #[error("task join error: {0}")]
    Join(String),
}

impl TransferError {
    /// Whether the worker's attempt loop may retry after this error.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransferError::Remote(e) => e.is_transient(),
            TransferError::Io(_) => true,
            TransferError::Store(_)
            | TransferError::Compress(_)
            | TransferError::PartGap(_)
            | TransferError::Cancelled
            | TransferError::Join(_) => false,
        }
    }

    /// Whether this is the distinct duplicate-content rejection.
    pub fn is_conflict(&self) -> bool {
        matches!(self, TransferError::Remote(RemoteError::Conflict(_)))
    }
}
