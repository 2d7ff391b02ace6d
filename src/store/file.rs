//! JSON file backed document store.

use super::{Document, DocumentStore, StoreError};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Stores a document as pretty-printed JSON.
///
/// Before every write the current file is copied to `<file>.bck`; if the
/// write fails the backup is copied back.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    backup: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut backup = path.clone().into_os_string();
        backup.push(".bck");
        Self {
            path,
            backup: PathBuf::from(backup),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

impl DocumentStore for JsonFileStore {
    fn load(&self) -> Result<Option<Document>, StoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Document file does not exist yet");
                return Ok(None);
            }
            Err(e) => return Err(self.io_err(e)),
        };

        let value: Value = serde_json::from_str(&content).map_err(|source| StoreError::Json {
            path: self.path.display().to_string(),
            source,
        })?;
        match value {
            Value::Object(doc) => Ok(Some(doc)),
            _ => Err(StoreError::Shape {
                path: self.path.display().to_string(),
            }),
        }
    }

    fn save(&self, doc: &Document) -> Result<(), StoreError> {
        let has_backup = if self.path.exists() {
            std::fs::copy(&self.path, &self.backup).map_err(|e| self.io_err(e))?;
            true
        } else {
            false
        };

        let body = serde_json::to_string_pretty(doc).map_err(|source| StoreError::Json {
            path: self.path.display().to_string(),
            source,
        })?;

        if let Err(e) = std::fs::write(&self.path, body) {
            if has_backup && let Err(restore) = std::fs::copy(&self.backup, &self.path) {
                warn!(path = %self.path.display(), error = %restore, "Failed to restore backup");
            }
            return Err(self.io_err(e));
        }
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn load_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("settings.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn save_then_load_keeps_values_and_writes_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = JsonFileStore::new(&path);

        let mut doc = Document::new();
        doc.insert("chatbot.maxlen".into(), json!(1024));
        store.save(&doc).unwrap();
        assert!(!dir.path().join("settings.json.bck").exists());

        doc.insert("chatbot.maxlen".into(), json!(500));
        store.save(&doc).unwrap();
        assert!(dir.path().join("settings.json.bck").exists());

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.get("chatbot.maxlen"), Some(&json!(500)));
    }

    #[test]
    fn non_object_document_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();
        let err = JsonFileStore::new(&path).load().unwrap_err();
        assert!(matches!(err, StoreError::Shape { .. }));
    }

    #[test]
    fn invalid_json_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lang.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = JsonFileStore::new(&path).load().unwrap_err();
        assert!(matches!(err, StoreError::Json { .. }));
    }
}
