/*
    on-repeat-rs | Rust CLI tool to archive Spotify's On Repeat into monthly playlists.
    Copyright (C) 2025  Israel Alberto Roldan Vega

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

//! Keyed storage that survives the authorization redirect.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to access session file: {0}")]
    Io(#[from] io::Error),
    #[error("Session file is not valid JSON: {0}")]
    Format(#[from] serde_json::Error),
}

/// A small string key-value store.
///
/// The PKCE verifier is written here before the user leaves for the provider's
/// consent page and read back by the process that receives the code.
pub trait SessionStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    /// Removes the key, returning the value it held.
    fn remove(&mut self, key: &str) -> Result<Option<String>, StoreError>;
}

/// JSON object on disk, one entry per key. A missing file is an empty store.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HashMap<String, String>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(HashMap::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, entries: &HashMap<String, String>) -> Result<(), StoreError> {
        if entries.is_empty() {
            return match fs::remove_file(&self.path) {
                Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
                _ => Ok(()),
            };
        }
        let json = serde_json::to_string_pretty(entries)?;
        let mut file = Self::open_private(&self.path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }

    /// Truncating open, readable by the owner only on Unix.
    #[cfg(unix)]
    fn open_private(path: &Path) -> io::Result<fs::File> {
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)?;
        // `mode` only applies on creation; tighten files left by older runs.
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
        Ok(file)
    }

    #[cfg(not(unix))]
    fn open_private(path: &Path) -> io::Result<fs::File> {
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.load()?.remove(key))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.load()?;
        entries.insert(key.to_string(), value.to_string());
        debug!("Writing key '{}' to {}", key, self.path.display());
        self.save(&entries)
    }

    fn remove(&mut self, key: &str) -> Result<Option<String>, StoreError> {
        let mut entries = self.load()?;
        let value = entries.remove(key);
        if value.is_some() {
            debug!("Removing key '{}' from {}", key, self.path.display());
            self.save(&entries)?;
        }
        Ok(value)
    }
}

/// Process-local store, used when both halves of the flow run in one process.
#[derive(Debug, Default, Clone)]
pub struct MemorySessionStore {
    entries: HashMap<String, String>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.remove(key))
    }
}
