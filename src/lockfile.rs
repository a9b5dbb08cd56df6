//! Lock file generation and parsing
//!
//! The lock file (`<modlist>-lock.json`) records exactly which file was
//! installed for each declared mod: its name on disk, release timestamp,
//! SHA-1 hash and download URL. It is a plain JSON array and should be
//! committed next to the mod list.
//!
//! # Examples
//!
//! ```no_run
//! use mmm::{LockFile, Metadata};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let meta = Metadata::new("modlist.json");
//! let lock = LockFile::ensure(&meta)?;
//! for entry in &lock.entries {
//!     println!("{} -> {}", entry.id, entry.file_name);
//! }
//! # Ok(())
//! # }
//! ```

use crate::atomic::write_atomic;
use crate::manifest::{Metadata, Platform};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Information about one installed mod
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockEntry {
    #[serde(rename = "type")]
    pub platform: Platform,

    pub id: String,

    pub name: String,

    /// File name inside the mods folder
    pub file_name: String,

    /// Release timestamp (RFC 3339)
    pub released_on: String,

    /// SHA-1 of the installed file
    pub hash: String,

    pub download_url: String,
}

impl LockEntry {
    pub fn is_same_mod(&self, platform: Platform, project_id: &str) -> bool {
        self.platform == platform && self.id == project_id
    }
}

/// The whole lock file, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockFile {
    pub entries: Vec<LockEntry>,
}

impl LockFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the lock file, writing an empty one first if it does not exist
    pub fn ensure(meta: &Metadata) -> Result<Self> {
        let path = meta.lock_path();
        match Self::load_from(&path)? {
            Some(lock) => Ok(lock),
            None => {
                let lock = Self::new();
                lock.save_to(&path)?;
                Ok(lock)
            }
        }
    }

    /// Load the lock file next to the mod list
    pub fn load(meta: &Metadata) -> Result<Option<Self>> {
        Self::load_from(meta.lock_path())
    }

    /// Load a lock file from a specific path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref();
        let contents = match fs::read(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::io(path, e)),
        };

        let lock = serde_json::from_slice(&contents).map_err(|source| Error::LockInvalid {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Some(lock))
    }

    pub fn save(&self, meta: &Metadata) -> Result<()> {
        self.save_to(meta.lock_path())
    }

    /// Write the lock file atomically as 2-space indented JSON
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut contents = serde_json::to_vec_pretty(self)?;
        contents.push(b'\n');
        write_atomic(path.as_ref(), &contents)
    }

    pub fn find(&self, platform: Platform, project_id: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.is_same_mod(platform, project_id))
    }

    pub fn get(&self, platform: Platform, project_id: &str) -> Option<&LockEntry> {
        self.find(platform, project_id).map(|i| &self.entries[i])
    }

    /// True when some entry owns exactly this file name
    pub fn has_file(&self, file_name: &str) -> bool {
        self.entries.iter().any(|e| e.file_name == file_name)
    }

    /// Replace the entry for the same mod, or append a new one
    pub fn upsert(&mut self, entry: LockEntry) {
        match self.find(entry.platform, &entry.id) {
            Some(index) => self.entries[index] = entry,
            None => self.entries.push(entry),
        }
    }
}
