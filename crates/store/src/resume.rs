use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{PersistenceBackend, StoreError};

const NAMESPACE: &str = "upload-sessions";

/// Pointer from a file's identity to its open remote session.
///
/// This is only a pointer: the authoritative committed-part set always comes
/// from a live `list_parts` query at resume time, never from local state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumePointer {
    pub session_id: String,
    pub remote_key: String,
    /// SHA-256 of the file's first 64 KiB, guarding against two distinct
    /// files sharing a name and size. Empty in records written before the
    /// fingerprint existed.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub fingerprint: String,
}

/// Per-file resumability pointers keyed by `(file_name, size)`.
pub struct ResumeStore {
    backend: Arc<dyn PersistenceBackend>,
    entries: Mutex<HashMap<String, ResumePointer>>,
}

impl ResumeStore {
    /// Creates a store over `backend`, loading any persisted pointers.
    ///
    /// An unreadable document is treated as empty rather than fatal; the
    /// pointers are an optimization, not a source of truth.
    pub fn new(backend: Arc<dyn PersistenceBackend>) -> Self {
        let entries = match backend.load(NAMESPACE) {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(map) => map,
                Err(e) => {
                    warn!(error = %e, "discarding unreadable resume pointers");
                    HashMap::new()
                }
            },
            Ok(None) => HashMap::new(),
            Err(e) => {
                warn!(error = %e, "failed to load resume pointers");
                HashMap::new()
            }
        };
        Self {
            backend,
            entries: Mutex::new(entries),
        }
    }

    fn key(file_name: &str, size: u64) -> String {
        format!("{file_name}:{size}")
    }

    /// Returns the pointer for `(file_name, size)`, if any.
    pub fn get(&self, file_name: &str, size: u64) -> Option<ResumePointer> {
        let entries = self.entries.lock().unwrap();
        entries.get(&Self::key(file_name, size)).cloned()
    }

    /// Records a pointer and persists the full map.
    pub fn put(&self, file_name: &str, size: u64, pointer: ResumePointer) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(Self::key(file_name, size), pointer);
        self.persist(&entries)
    }

    /// Removes a pointer and persists the full map. Removing a missing key
    /// is a no-op.
    pub fn delete(&self, file_name: &str, size: u64) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap();
        if entries.remove(&Self::key(file_name, size)).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }

    fn persist(&self, entries: &HashMap<String, ResumePointer>) -> Result<(), StoreError> {
        let value = serde_json::to_value(entries)?;
        self.backend.save(NAMESPACE, &value)
    }
}
