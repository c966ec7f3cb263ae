use prooflift_transfer::TransferError;

/// Errors surfaced by batch-level operations.
///
/// Item-level transfer failures never throw out of the manager; they land
/// on the item as status/error text. Only creation-time preconditions and
/// unknown-batch lookups error here.
#[derive(Debug, thiserror::Error)]
pub enum UploaderError {
    #[error("batch must contain at least one file")]
    EmptyBatch,

    #[error("no target folder selected")]
    MissingTarget,

    #[error("batch not found: {0}")]
    BatchNotFound(String),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error("store error: {0}")]
    Store(#[from] prooflift_store::StoreError),
}
