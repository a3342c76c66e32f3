//! Persisted install state.
//!
//! The lockfile (`packwright.lock`) records, per component, the version that
//! was last installed into the pack together with its update timestamp and
//! artifact checksum. The planner reads it to decide between skip, install and
//! update; the installer rewrites it after every successful install.
//!
//! The planner never touches the file directly. It is handed an
//! [`InstallState`] store, which is either a [`LockfileStore`] backed by the
//! file on disk or an [`InMemoryState`] in tests.
//!
//! # Format
//!
//! ```toml
//! version = 1
//!
//! [[components]]
//! name = "DFHack"
//! version = "0.47.05-r1"
//! updated = "2021-03-28T12:00:00Z"
//! filename = "dfhack-0.47.05-r1-Windows-64bit.zip"
//! checksum = "sha256:…"
//! installed_at = "2021-04-01T09:30:00Z"
//! ```

mod io;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use io::LockfileStore;

/// The on-disk state document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockFile {
    /// Format version for compatibility checks.
    pub version: u32,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<LockedComponent>,
}

/// What was last installed for one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedComponent {
    pub name: String,
    pub version: String,
    pub updated: DateTime<Utc>,
    pub filename: String,

    /// `sha256:<hex>` of the cached artifact.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,

    pub installed_at: DateTime<Utc>,
}

impl LockFile {
    pub const CURRENT_VERSION: u32 = 1;

    #[must_use]
    pub const fn new() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            components: Vec::new(),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&LockedComponent> {
        self.components.iter().find(|c| c.name == name)
    }

    /// Insert or replace the record for `entry.name`, keeping names sorted.
    pub fn upsert(&mut self, entry: LockedComponent) {
        match self.components.binary_search_by(|c| c.name.as_str().cmp(&entry.name)) {
            Ok(idx) => self.components[idx] = entry,
            Err(idx) => self.components.insert(idx, entry),
        }
    }

    /// Versions that are still referenced, keyed by component name.
    #[must_use]
    pub fn referenced_versions(&self) -> BTreeMap<&str, &str> {
        self.components.iter().map(|c| (c.name.as_str(), c.version.as_str())).collect()
    }
}

impl Default for LockFile {
    fn default() -> Self {
        Self::new()
    }
}

/// Store of last-installed versions consulted by the planner.
pub trait InstallState: Send {
    /// The record for `name`, if that component was ever installed.
    fn installed(&self, name: &str) -> Option<&LockedComponent>;

    /// Record a successful install and persist it.
    fn record(&mut self, entry: LockedComponent) -> Result<()>;

    /// Snapshot of every record.
    fn snapshot(&self) -> LockFile;
}

/// A state store that lives only in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryState {
    lockfile: LockFile,
}

impl InMemoryState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with `name` installed at `version`.
    #[must_use]
    pub fn with(mut self, name: &str, version: &str) -> Self {
        let now = Utc::now();
        self.lockfile.upsert(LockedComponent {
            name: name.to_string(),
            version: version.to_string(),
            updated: now,
            filename: String::new(),
            checksum: None,
            installed_at: now,
        });
        self
    }
}

impl InstallState for InMemoryState {
    fn installed(&self, name: &str) -> Option<&LockedComponent> {
        self.lockfile.get(name)
    }

    fn record(&mut self, entry: LockedComponent) -> Result<()> {
        self.lockfile.upsert(entry);
        Ok(())
    }

    fn snapshot(&self) -> LockFile {
        self.lockfile.clone()
    }
}
