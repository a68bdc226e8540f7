//! JSON-backed persistence layer
//!
//! Each domain keeps its records in a named collection, one JSON document
//! per collection. Every mutation is a whole-collection read-modify-write;
//! writes go through a temp file + rename so a crash never leaves a
//! half-written collection behind. Sharing a data directory between
//! processes is not supported.

use crate::error::AssistantError;
use crate::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Handle to a data directory holding named JSON collections.
#[derive(Debug, Clone)]
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Open the store at `ASSISTANT_DATA_DIR`, defaulting to `./data`.
    pub fn open_default() -> Result<Self> {
        let dir = env::var("ASSISTANT_DATA_DIR").unwrap_or_else(|_| "data".to_string());
        Self::new(dir)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{}.json", collection))
    }

    /// Load a whole collection. A missing or empty file is an empty
    /// collection; malformed JSON is an error rather than a silent reset.
    pub fn load<T>(&self, collection: &str) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        let path = self.path(collection);

        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
            Err(e) => return Err(e.into()),
        };

        if raw.trim().is_empty() {
            return Ok(T::default());
        }

        serde_json::from_str(&raw).map_err(|e| {
            AssistantError::Store(format!(
                "Collection '{}' is corrupt at {}: {}",
                collection,
                path.display(),
                e
            ))
        })
    }

    /// Write a whole collection atomically (temp file + rename).
    pub fn save<T>(&self, collection: &str, value: &T) -> Result<()>
    where
        T: Serialize,
    {
        let path = self.path(collection);
        let tmp = self.dir.join(format!(".{}.json.tmp", collection));

        let payload = serde_json::to_string_pretty(value)?;
        fs::write(&tmp, payload)?;
        fs::rename(&tmp, &path)?;

        debug!(collection = %collection, path = %path.display(), "Collection saved");
        Ok(())
    }

    /// Atomic read-modify-write of one collection: load, apply `f`,
    /// persist only when `f` succeeds.
    pub fn update<T, R, F>(&self, collection: &str, f: F) -> Result<R>
    where
        T: DeserializeOwned + Default + Serialize,
        F: FnOnce(&mut T) -> Result<R>,
    {
        let mut value: T = self.load(collection)?;
        let result = f(&mut value)?;
        self.save(collection, &value)?;
        Ok(result)
    }
}
