use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::{PersistenceBackend, StoreError};

const NAMESPACE: &str = "upload-batches";

/// Persists the batch list (payloads already stripped by the caller's
/// snapshot types) under a single namespace key.
pub struct SnapshotStore {
    backend: Arc<dyn PersistenceBackend>,
}

impl SnapshotStore {
    pub fn new(backend: Arc<dyn PersistenceBackend>) -> Self {
        Self { backend }
    }

    /// Replaces the persisted batch list.
    pub fn save<T: Serialize>(&self, batches: &[T]) -> Result<(), StoreError> {
        let value = serde_json::to_value(batches)?;
        self.backend.save(NAMESPACE, &value)
    }

    /// Loads the persisted batch list, or an empty list if nothing was
    /// saved or the document is unreadable.
    pub fn load<T: DeserializeOwned>(&self) -> Vec<T> {
        match self.backend.load(NAMESPACE) {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(batches) => batches,
                Err(e) => {
                    warn!(error = %e, "discarding unreadable batch snapshot");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "failed to load batch snapshot");
                Vec::new()
            }
        }
    }
}
