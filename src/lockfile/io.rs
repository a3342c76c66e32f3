//! Reading and writing the lockfile.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{InstallState, LockFile, LockedComponent};
use crate::utils::fs::atomic_write;

impl LockFile {
    /// Load a lockfile, treating a missing or empty file as no state.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = fs::read_to_string(path).with_context(|| {
            format!(
                "Cannot read lockfile: {}\n\n\
                    Possible causes:\n\
                    - Permission denied (check file ownership)\n\
                    - File is locked by another process",
                path.display()
            )
        })?;

        if content.trim().is_empty() {
            return Ok(Self::new());
        }

        let lockfile: Self = toml::from_str(&content).with_context(|| {
            format!(
                "Invalid TOML syntax in lockfile: {}\n\n\
                    Delete the file to rebuild every component from scratch",
                path.display()
            )
        })?;

        if lockfile.version > Self::CURRENT_VERSION {
            anyhow::bail!(
                "Lockfile version {} is newer than supported version {}. \
                 Update packwright to use this lockfile.",
                lockfile.version,
                Self::CURRENT_VERSION
            );
        }

        Ok(lockfile)
    }

    /// Write the lockfile atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut content = String::from(
            "# Auto-generated lockfile - DO NOT EDIT\n# Records the last installed version of each component\n\n",
        );
        content.push_str(&toml::to_string_pretty(self).context("Failed to serialize lockfile")?);

        atomic_write(path, content.as_bytes())
            .with_context(|| format!("Cannot write lockfile: {}", path.display()))?;
        Ok(())
    }
}

/// A state store persisted to a lockfile after every change.
#[derive(Debug)]
pub struct LockfileStore {
    path: PathBuf,
    lockfile: LockFile,
}

impl LockfileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let lockfile = LockFile::load(&path)?;
        debug!("Loaded {} lockfile record(s) from {}", lockfile.components.len(), path.display());
        Ok(Self {
            path,
            lockfile,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl InstallState for LockfileStore {
    fn installed(&self, name: &str) -> Option<&LockedComponent> {
        self.lockfile.get(name)
    }

    fn record(&mut self, entry: LockedComponent) -> Result<()> {
        self.lockfile.upsert(entry);
        self.lockfile.save(&self.path)
    }

    fn snapshot(&self) -> LockFile {
        self.lockfile.clone()
    }
}
