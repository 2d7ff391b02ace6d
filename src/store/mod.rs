//! Key/value document stores.
//!
//! The bot keeps three documents: runtime settings, the identity set and the
//! language texts. Each one is a flat JSON object behind a [`DocumentStore`];
//! [`Settings`] keeps it in memory and offers typed accessors.

mod file;
mod memory;
mod settings;

pub use file::JsonFileStore;
pub use memory::MemoryStore;
pub use settings::Settings;

use serde_json::{Map, Value};
use thiserror::Error;

/// A JSON object document.
pub type Document = Map<String, Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid json in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{path}: top-level value is not an object")]
    Shape { path: String },
}

/// Backing storage for one document.
pub trait DocumentStore: Send + Sync {
    /// Read the document. `Ok(None)` means nothing has been stored yet.
    fn load(&self) -> Result<Option<Document>, StoreError>;

    /// Replace the stored document.
    fn save(&self, doc: &Document) -> Result<(), StoreError>;

    /// Human readable name for logs.
    fn describe(&self) -> String;
}
