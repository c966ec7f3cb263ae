use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::StoreError;

/// A namespaced key-value area the stores persist into.
///
/// One namespace holds one JSON document. Implementations must be safe to
/// call from multiple tasks.
pub trait PersistenceBackend: Send + Sync {
    /// Loads the document stored under `namespace`, or `None` if absent.
    fn load(&self, namespace: &str) -> Result<Option<serde_json::Value>, StoreError>;

    /// Replaces the document stored under `namespace`.
    fn save(&self, namespace: &str, value: &serde_json::Value) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// JsonFileBackend
// ---------------------------------------------------------------------------

/// Disk-backed backend: one `<namespace>.json` file per namespace under a
/// base directory.
pub struct JsonFileBackend {
    dir: PathBuf,
}

impl JsonFileBackend {
    /// Creates a backend rooted at `dir`, creating the directory if needed.
    pub fn new(dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    fn path_for(&self, namespace: &str) -> PathBuf {
        self.dir.join(format!("{namespace}.json"))
    }
}

impl PersistenceBackend for JsonFileBackend {
    fn load(&self, namespace: &str) -> Result<Option<serde_json::Value>, StoreError> {
        let path = self.path_for(namespace);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn save(&self, namespace: &str, value: &serde_json::Value) -> Result<(), StoreError> {
        let path = self.path_for(namespace);
        // Write via a sibling temp file so a crash mid-write cannot leave a
        // truncated document behind.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(value)?)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryBackend
// ---------------------------------------------------------------------------

/// In-memory backend for tests.
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, serde_json::Value>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistenceBackend for MemoryBackend {
    fn load(&self, namespace: &str) -> Result<Option<serde_json::Value>, StoreError> {
        let entries = self.entries.lock().unwrap();
        Ok(entries.get(namespace).cloned())
    }

    fn save(&self, namespace: &str, value: &serde_json::Value) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(namespace.to_string(), value.clone());
        Ok(())
    }
}
