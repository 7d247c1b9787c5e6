use crate::models::{ArchiveEntry, StickyConfig};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name for the active collection inside the data directory.
const ACTIVE_FILE: &str = "sticky_messages.json";
/// File name for the archive collection inside the data directory.
const ARCHIVE_FILE: &str = "archived_sticky_messages.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Persistence gateway for the two sticky collections. Pure data access;
/// the engine owns all business rules and serializes every mutation.
pub trait StickyStore: Send + Sync {
    fn load_active(&self) -> Result<HashMap<String, StickyConfig>, StoreError>;
    fn save_active(&self, active: &HashMap<String, StickyConfig>) -> Result<(), StoreError>;
    fn load_archive(&self) -> Result<HashMap<String, ArchiveEntry>, StoreError>;
    fn save_archive(&self, archive: &HashMap<String, ArchiveEntry>) -> Result<(), StoreError>;
}

/// JSON-file adapter: one file per collection under a data directory.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn load_map<T: DeserializeOwned>(&self, file: &str) -> Result<HashMap<String, T>, StoreError> {
        let path = self.dir.join(file);
        if !path.exists() {
            return Ok(HashMap::new());
        }
        let contents = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Write to a temp file in the same directory, then rename over the
    /// target so a crash mid-write never leaves a truncated collection.
    fn save_map<T: Serialize>(
        &self,
        file: &str,
        map: &HashMap<String, T>,
    ) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(file);
        let tmp = path.with_extension("json.tmp");
        let contents = serde_json::to_string_pretty(map)?;
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    #[cfg(test)]
    pub fn active_path(&self) -> PathBuf {
        self.dir.join(ACTIVE_FILE)
    }

    #[cfg(test)]
    pub fn archive_path(&self) -> PathBuf {
        self.dir.join(ARCHIVE_FILE)
    }
}

impl StickyStore for JsonFileStore {
    fn load_active(&self) -> Result<HashMap<String, StickyConfig>, StoreError> {
        self.load_map(ACTIVE_FILE)
    }

    fn save_active(&self, active: &HashMap<String, StickyConfig>) -> Result<(), StoreError> {
        self.save_map(ACTIVE_FILE, active)
    }

    fn load_archive(&self) -> Result<HashMap<String, ArchiveEntry>, StoreError> {
        self.load_map(ARCHIVE_FILE)
    }

    fn save_archive(&self, archive: &HashMap<String, ArchiveEntry>) -> Result<(), StoreError> {
        self.save_map(ARCHIVE_FILE, archive)
    }
}

/// In-memory store used by engine tests and as a stand-in when no data
/// directory is configured.
#[derive(Default)]
pub struct MemoryStore {
    active: std::sync::Mutex<HashMap<String, StickyConfig>>,
    archive: std::sync::Mutex<HashMap<String, ArchiveEntry>>,
}

impl StickyStore for MemoryStore {
    fn load_active(&self) -> Result<HashMap<String, StickyConfig>, StoreError> {
        Ok(self.active.lock().unwrap().clone())
    }

    fn save_active(&self, active: &HashMap<String, StickyConfig>) -> Result<(), StoreError> {
        *self.active.lock().unwrap() = active.clone();
        Ok(())
    }

    fn load_archive(&self) -> Result<HashMap<String, ArchiveEntry>, StoreError> {
        Ok(self.archive.lock().unwrap().clone())
    }

    fn save_archive(&self, archive: &HashMap<String, ArchiveEntry>) -> Result<(), StoreError> {
        *self.archive.lock().unwrap() = archive.clone();
        Ok(())
    }
}
