//! Batch upload orchestration.
//!
//! [`UploadManager`] is the application-facing entry point: it creates
//! batches, fans work out to a bounded pool of workers, aggregates
//! progress, persists snapshots on every state change, and exposes
//! cancel/retry/clear operations. Per-file transfer mechanics live in
//! `prooflift-transfer`.

mod error;
mod manager;
mod progress;
mod retry;
mod types;
mod worker;

pub use error::UploaderError;
pub use manager::{SubscriptionId, UploadManager};
pub use progress::{Eta, eta};
pub use retry::RetryPolicy;
pub use types::{BatchSnapshot, ItemSnapshot, ItemStatus, NewUpload, UploadBatch, UploadItem};

use prooflift_transfer::{CompressionOptions, TransferConfig};

/// Default bound on concurrently transferring items per batch.
pub const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Knobs for the whole pipeline.
#[derive(Debug, Clone)]
pub struct UploaderConfig {
    pub transfer: TransferConfig,
    pub compression: CompressionOptions,
    pub retry: RetryPolicy,
    /// Upper bound on in-flight items per batch.
    pub max_concurrent: usize,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            transfer: TransferConfig::default(),
            compression: CompressionOptions::default(),
            retry: RetryPolicy::default(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }
}
