//! Persisted moderator list.
//!
//! A sorted set of lower-cased usernames stored as a JSON array. Command
//! executors consult it for authorization; the engine itself never does.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Moderator list I/O errors.
#[derive(Debug, Error)]
pub enum ModeratorError {
    #[error("moderator list I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("moderator list is not a JSON array of names: {0}")]
    Json(#[from] serde_json::Error),
}

/// Sorted, file-backed set of moderator names.
pub struct ModeratorList {
    path: PathBuf,
    names: RwLock<BTreeSet<String>>,
}

impl ModeratorList {
    /// Open the list at `path`, creating it as `[]` if missing.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ModeratorError> {
        let path = path.into();
        if !path.exists() {
            fs::write(&path, "[]")?;
            info!(path = %path.display(), "Created moderator list");
        }

        let list = Self {
            path,
            names: RwLock::new(BTreeSet::new()),
        };
        list.reload()?;
        Ok(list)
    }

    /// An empty list that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            path: PathBuf::new(),
            names: RwLock::new(BTreeSet::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the in-memory set with the file's contents.
    pub fn reload(&self) -> Result<(), ModeratorError> {
        let loaded = load(&self.path)?;
        debug!(count = loaded.len(), "Loaded moderator list");
        *self.names.write() = loaded;
        Ok(())
    }

    /// Add a name. Returns false if it was already present.
    ///
    /// A failed save is logged and the change kept in memory.
    pub fn add(&self, name: &str) -> bool {
        let name = normalize(name);
        if name.is_empty() {
            return false;
        }
        let added = self.names.write().insert(name);
        if added {
            self.persist();
        }
        added
    }

    /// Remove a name. Returns false if it was not present.
    pub fn remove(&self, name: &str) -> bool {
        let removed = self.names.write().remove(&normalize(name));
        if removed {
            self.persist();
        }
        removed
    }

    pub fn is_moderator(&self, name: &str) -> bool {
        self.names.read().contains(&normalize(name))
    }

    /// Names in sorted order.
    pub fn list(&self) -> Vec<String> {
        self.names.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.names.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.read().is_empty()
    }

    /// Write the list to disk now.
    pub fn save(&self) -> Result<(), ModeratorError> {
        if self.path.as_os_str().is_empty() {
            return Ok(());
        }
        let snapshot = self.list();
        save(&self.path, &snapshot)
    }

    fn persist(&self) {
        if let Err(e) = self.save() {
            warn!(path = %self.path.display(), error = %e, "Could not save the moderator list");
        }
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

fn load(path: &Path) -> Result<BTreeSet<String>, ModeratorError> {
    if path.as_os_str().is_empty() {
        return Ok(BTreeSet::new());
    }
    let reader = BufReader::new(File::open(path)?);
    let names: Vec<String> = serde_json::from_reader(reader)?;
    Ok(names
        .iter()
        .map(|n| normalize(n))
        .filter(|n| !n.is_empty())
        .collect())
}

/// Write via a temp file and rename so a crash never leaves half a list.
fn save(path: &Path, names: &[String]) -> Result<(), ModeratorError> {
    let temp_path = path.with_extension("json.tmp");
    let writer = BufWriter::new(File::create(&temp_path)?);
    serde_json::to_writer_pretty(writer, names)?;
    fs::rename(&temp_path, path)?;
    debug!(path = %path.display(), count = names.len(), "Moderator list saved");
    Ok(())
}
