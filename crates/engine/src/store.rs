//! Persistence handles for the engine.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, error};

use crate::error::{EngineError, Result};
use crate::timeline::TimelineDoc;

/// Where the engine reads its stored document from and writes edits to.
pub trait DocumentStore {
    /// Returns the stored JSON, or `None` when nothing has been stored yet.
    fn load(&mut self) -> Result<Option<Value>>;

    fn persist(&mut self, doc: &TimelineDoc) -> Result<()>;
}

/// In-process store, mostly for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    value: Option<Value>,
    persist_count: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(value: Value) -> Self {
        Self {
            value: Some(value),
            persist_count: 0,
        }
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn persist_count(&self) -> usize {
        self.persist_count
    }
}

impl DocumentStore for MemoryStore {
    fn load(&mut self) -> Result<Option<Value>> {
        Ok(self.value.clone())
    }

    fn persist(&mut self, doc: &TimelineDoc) -> Result<()> {
        let value = serde_json::to_value(doc).map_err(|source| EngineError::Serialization {
            path: PathBuf::from("<memory>"),
            source,
        })?;
        self.value = Some(value);
        self.persist_count += 1;
        Ok(())
    }
}

/// Pretty-printed JSON file, replaced through a temporary sibling on write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DocumentStore for JsonFileStore {
    fn load(&mut self) -> Result<Option<Value>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no stored document");
            return Ok(None);
        }
        let json = std::fs::read_to_string(&self.path).map_err(|source| EngineError::Io {
            context: "failed to read timeline document",
            path: self.path.clone(),
            source,
        })?;
        let value = serde_json::from_str(&json).map_err(|source| EngineError::Serialization {
            path: self.path.clone(),
            source,
        })?;
        Ok(Some(value))
    }

    fn persist(&mut self, doc: &TimelineDoc) -> Result<()> {
        let json =
            serde_json::to_string_pretty(doc).map_err(|source| EngineError::Serialization {
                path: self.path.clone(),
                source,
            })?;

        let temp_path = self.path.with_extension("json.tmp");
        std::fs::write(&temp_path, json.as_bytes()).map_err(|source| {
            error!(path = %temp_path.display(), error = %source, "failed to write temp file");
            EngineError::Io {
                context: "failed to write timeline document",
                path: temp_path.clone(),
                source,
            }
        })?;
        std::fs::rename(&temp_path, &self.path).map_err(|source| {
            let _ = std::fs::remove_file(&temp_path);
            EngineError::Io {
                context: "failed to replace timeline document",
                path: self.path.clone(),
                source,
            }
        })?;

        debug!(path = %self.path.display(), bytes = json.len(), "timeline document persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{DocumentStore, JsonFileStore, MemoryStore};
    use crate::time::Timebase;
    use crate::timeline::{TimelineDoc, create_empty_timeline};

    fn temp_path(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("timeline_engine_store_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).expect("create temp dir");
        dir.join("timeline.json")
    }

    #[test]
    fn memory_store_counts_persists() {
        let mut store = MemoryStore::new();
        assert!(store.load().expect("load").is_none());

        store
            .persist(&create_empty_timeline(Timebase::MILLIS))
            .expect("persist");

        assert_eq!(store.persist_count(), 1);
        assert!(store.load().expect("load").is_some());
    }

    #[test]
    fn file_store_round_trips_a_document() {
        let path = temp_path("round_trip");
        let mut store = JsonFileStore::new(&path);
        assert!(store.load().expect("load").is_none());

        let doc = create_empty_timeline(Timebase::MILLIS);
        store.persist(&doc).expect("persist");

        let value = store.load().expect("load").expect("stored");
        let loaded: TimelineDoc = serde_json::from_value(value).expect("decode");
        assert_eq!(loaded, doc);
        assert!(!path.with_extension("json.tmp").exists());
    }
}
