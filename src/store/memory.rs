//! In-memory document store, used by tests and embedders without a disk.

use super::{Document, DocumentStore, StoreError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct MemoryStore {
    doc: Mutex<Option<Document>>,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(doc: Document) -> Self {
        Self {
            doc: Mutex::new(Some(doc)),
            ..Self::default()
        }
    }

    /// Make every following `save` fail with an io error.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> Option<Document> {
        self.doc.lock().clone()
    }
}

impl DocumentStore for MemoryStore {
    fn load(&self) -> Result<Option<Document>, StoreError> {
        Ok(self.doc.lock().clone())
    }

    fn save(&self, doc: &Document) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Io {
                path: self.describe(),
                source: std::io::Error::other("save disabled"),
            });
        }
        *self.doc.lock() = Some(doc.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "<memory>".to_string()
    }
}
