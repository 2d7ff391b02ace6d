//! Read-only world data, queried by path.
//!
//! A path is a chain of map keys separated by dots with optional list
//! indices in brackets, e.g. `players.Steve.Pos[0]`. Keys may not contain
//! dots or brackets.

use parking_lot::RwLock;
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum WorldError {
    #[error("invalid path: {0}")]
    Parse(String),

    #[error("unknown key '{0}'")]
    UnknownKey(String),

    #[error("'{path}' is a {found}, not a {expected}")]
    WrongKind {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("index {index} out of range at '{path}' (length {len})")]
    IndexOutOfRange {
        path: String,
        index: usize,
        len: usize,
    },

    #[error("world data is not available")]
    Unavailable,

    #[error("failed to load world data: {0}")]
    Load(String),
}

/// One step of a [`WorldPath`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// A parsed world path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldPath {
    segments: Vec<Segment>,
}

impl WorldPath {
    pub fn parse(input: &str) -> Result<Self, WorldError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(WorldError::Parse("empty path".into()));
        }

        let mut segments = Vec::new();
        for part in input.split('.') {
            let (key, mut rest) = match part.find('[') {
                Some(open) => part.split_at(open),
                None => (part, ""),
            };
            if key.is_empty() {
                return Err(WorldError::Parse(format!("empty key in '{input}'")));
            }
            if key.contains(']') {
                return Err(WorldError::Parse(format!("stray ']' in '{part}'")));
            }
            segments.push(Segment::Key(key.to_string()));

            while !rest.is_empty() {
                let Some(inner) = rest.strip_prefix('[') else {
                    return Err(WorldError::Parse(format!("expected '[' in '{part}'")));
                };
                let Some(close) = inner.find(']') else {
                    return Err(WorldError::Parse(format!("unclosed '[' in '{part}'")));
                };
                let index = inner[..close]
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| WorldError::Parse(format!("bad index in '{part}'")))?;
                segments.push(Segment::Index(index));
                rest = &inner[close + 1..];
            }
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Walk `root` along this path.
    pub fn resolve<'a>(&self, root: &'a Value) -> Result<&'a Value, WorldError> {
        let mut current = root;
        let mut walked = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Key(key) => {
                    let Value::Object(map) = current else {
                        return Err(WorldError::WrongKind {
                            path: walked,
                            expected: "map",
                            found: kind_of(current),
                        });
                    };
                    if !walked.is_empty() {
                        walked.push('.');
                    }
                    walked.push_str(key);
                    current = map
                        .get(key)
                        .ok_or_else(|| WorldError::UnknownKey(walked.clone()))?;
                }
                Segment::Index(index) => {
                    let Value::Array(list) = current else {
                        return Err(WorldError::WrongKind {
                            path: walked,
                            expected: "list",
                            found: kind_of(current),
                        });
                    };
                    current = list.get(*index).ok_or(WorldError::IndexOutOfRange {
                        path: walked.clone(),
                        index: *index,
                        len: list.len(),
                    })?;
                    walked.push_str(&format!("[{index}]"));
                }
            }
        }
        Ok(current)
    }
}

/// Short kind name of a value, as shown to chat users.
pub fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "double",
        Value::Number(_) => "int",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

/// Read-only access to the game world's data.
pub trait WorldData: Send + Sync {
    fn fetch(&self, path: &str) -> Result<Value, WorldError>;

    /// Re-read the data from its source, if it has one.
    fn reload(&self) -> Result<(), WorldError> {
        Ok(())
    }
}

/// World data held as one JSON document.
#[derive(Debug)]
pub struct JsonWorld {
    source: Option<PathBuf>,
    root: RwLock<Value>,
}

impl JsonWorld {
    pub fn from_value(root: Value) -> Self {
        Self {
            source: None,
            root: RwLock::new(root),
        }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, WorldError> {
        let path = path.as_ref();
        let root = read_document(path)?;
        info!(path = %path.display(), "World data loaded");
        Ok(Self {
            source: Some(path.to_path_buf()),
            root: RwLock::new(root),
        })
    }
}

fn read_document(path: &Path) -> Result<Value, WorldError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| WorldError::Load(format!("{}: {e}", path.display())))?;
    serde_json::from_str(&content).map_err(|e| WorldError::Load(format!("{}: {e}", path.display())))
}

impl WorldData for JsonWorld {
    fn fetch(&self, path: &str) -> Result<Value, WorldError> {
        let path = WorldPath::parse(path)?;
        let root = self.root.read();
        path.resolve(&root).cloned()
    }

    fn reload(&self) -> Result<(), WorldError> {
        let Some(path) = &self.source else {
            return Ok(());
        };
        *self.root.write() = read_document(path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn world() -> JsonWorld {
        JsonWorld::from_value(json!({
            "Data": {"LevelName": "world", "Time": 1200},
            "players": {
                "Steve": {"Pos": [12.4, 64.0, -3.6], "Health": 20}
            }
        }))
    }

    #[test]
    fn parses_keys_and_indices() {
        let path = WorldPath::parse("players.Steve.Pos[2]").unwrap();
        assert_eq!(
            path.segments(),
            &[
                Segment::Key("players".into()),
                Segment::Key("Steve".into()),
                Segment::Key("Pos".into()),
                Segment::Index(2),
            ]
        );
        assert!(WorldPath::parse("a..b").is_err());
        assert!(WorldPath::parse("a[x]").is_err());
        assert!(WorldPath::parse("a[1").is_err());
        assert!(WorldPath::parse("").is_err());
    }

    #[test]
    fn fetch_values() {
        let w = world();
        assert_eq!(w.fetch("Data.LevelName").unwrap(), json!("world"));
        assert_eq!(w.fetch("players.Steve.Pos[2]").unwrap(), json!(-3.6));
    }

    #[test]
    fn fetch_failures() {
        let w = world();
        assert!(matches!(w.fetch("Data.Nope"), Err(WorldError::UnknownKey(k)) if k == "Data.Nope"));
        assert!(matches!(
            w.fetch("Data.Time.x"),
            Err(WorldError::WrongKind { expected: "map", .. })
        ));
        assert!(matches!(
            w.fetch("players.Steve.Pos[3]"),
            Err(WorldError::IndexOutOfRange { index: 3, len: 3, .. })
        ));
        assert!(matches!(
            w.fetch("Data[0]"),
            Err(WorldError::WrongKind { expected: "list", found: "map", .. })
        ));
    }

    #[test]
    fn open_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("level.json");
        std::fs::write(&path, r#"{"Data": {"Time": 5}}"#).unwrap();
        let w = JsonWorld::open(&path).unwrap();
        assert_eq!(w.fetch("Data.Time").unwrap(), json!(5));

        std::fs::write(&path, r#"{"Data": {"Time": 6}}"#).unwrap();
        w.reload().unwrap();
        assert_eq!(w.fetch("Data.Time").unwrap(), json!(6));
    }

    #[test]
    fn kind_names() {
        assert_eq!(kind_of(&json!(1)), "int");
        assert_eq!(kind_of(&json!(1.5)), "double");
        assert_eq!(kind_of(&json!([1])), "list");
    }
}
