//! In-memory view of a document with typed accessors.

use super::{Document, DocumentStore, StoreError};
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// A loaded key/value document.
///
/// Reads never touch the backing store; `load` and `save` are explicit.
pub struct Settings {
    store: Arc<dyn DocumentStore>,
    doc: RwLock<Document>,
}

impl Settings {
    /// Create an empty document bound to `store` without reading it.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            doc: RwLock::new(Document::new()),
        }
    }

    /// Create and immediately load.
    pub fn open(store: Arc<dyn DocumentStore>) -> Result<Self, StoreError> {
        let settings = Self::new(store);
        settings.load()?;
        Ok(settings)
    }

    /// Replace the in-memory document with the stored one.
    pub fn load(&self) -> Result<(), StoreError> {
        match self.store.load()? {
            Some(doc) => {
                debug!(store = %self.store.describe(), keys = doc.len(), "Loaded document");
                *self.doc.write() = doc;
            }
            None => {
                info!(store = %self.store.describe(), "No stored document, starting empty");
                self.doc.write().clear();
            }
        }
        Ok(())
    }

    pub fn save(&self) -> Result<(), StoreError> {
        let snapshot = self.doc.read().clone();
        self.store.save(&snapshot)
    }

    pub fn name(&self) -> String {
        self.store.describe()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.doc.read().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.doc.read().contains_key(key)
    }

    pub fn put(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.doc.write().insert(key.into(), value.into())
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.doc.write().remove(key)
    }

    /// Insert `default` when `key` is missing; returns the stored value.
    pub fn get_or_insert(&self, key: &str, default: impl Into<Value>) -> Value {
        if let Some(value) = self.get(key) {
            return value;
        }
        self.doc
            .write()
            .entry(key.to_string())
            .or_insert_with(|| default.into())
            .clone()
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| match v {
            Value::String(s) => s,
            other => other.to_string(),
        })
    }

    /// String value, inserting `default` when missing.
    pub fn string_or(&self, key: &str, default: &str) -> String {
        match self.get_or_insert(key, default) {
            Value::String(s) => s,
            other => other.to_string(),
        }
    }

    /// Integer value; numeric strings are accepted.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Boolean value; the strings "true"/"false" are accepted.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            Value::Bool(b) => Some(b),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.doc.read().keys().cloned().collect()
    }

    pub fn snapshot(&self) -> Document {
        self.doc.read().clone()
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Settings({})", self.store.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn settings() -> (Arc<MemoryStore>, Settings) {
        let store = Arc::new(MemoryStore::new());
        let settings = Settings::new(store.clone());
        (store, settings)
    }

    #[test]
    fn typed_accessors_accept_numeric_strings() {
        let (_, s) = settings();
        s.put("a", "42");
        s.put("b", 1.5);
        s.put("c", "true");
        assert_eq!(s.get_i64("a"), Some(42));
        assert_eq!(s.get_f64("b"), Some(1.5));
        assert_eq!(s.get_bool("c"), Some(true));
        assert_eq!(s.get_i64("missing"), None);
    }

    #[test]
    fn string_or_inserts_default() {
        let (_, s) = settings();
        assert_eq!(s.string_or("general.greeting", "hello"), "hello");
        assert_eq!(s.get("general.greeting"), Some(json!("hello")));
        s.put("general.greeting", "hi");
        assert_eq!(s.string_or("general.greeting", "hello"), "hi");
    }

    #[test]
    fn save_and_reload_round_trip() {
        let (store, s) = settings();
        s.put("chatbot.maxlen", 500);
        s.save().unwrap();
        assert_eq!(store.save_count(), 1);

        s.put("chatbot.maxlen", 1);
        s.load().unwrap();
        assert_eq!(s.get_i64("chatbot.maxlen"), Some(500));
    }

    #[test]
    fn load_without_stored_document_clears() {
        let (_, s) = settings();
        s.put("x", 1);
        s.load().unwrap();
        assert!(s.keys().is_empty());
    }
}
