//! Cross-process locks for cache entries.
//!
//! Two packwright processes sharing a cache directory must not download the
//! same artifact into the same place at once. Each `(name, version)` entry is
//! guarded by an exclusive `fs4` lock on `{cache_dir}/.locks/{key}.lock`,
//! released when the [`CacheLock`] is dropped.

use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug)]
pub struct CacheLock {
    file: File,
    path: PathBuf,
}

impl CacheLock {
    /// Block (on a blocking thread) until the lock for `key` is held.
    pub async fn acquire(cache_dir: &Path, key: &str) -> Result<Self> {
        let locks_dir = cache_dir.join(".locks");
        tokio::fs::create_dir_all(&locks_dir).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::PermissionDenied {
                anyhow::anyhow!(
                    "Permission denied: cannot create locks directory at {}",
                    locks_dir.display()
                )
            } else {
                anyhow::anyhow!("Failed to create directory {}: {}", locks_dir.display(), e)
            }
        })?;

        let lock_path = locks_dir.join(format!("{key}.lock"));
        let open_path = lock_path.clone();
        let key = key.to_string();

        let file = tokio::task::spawn_blocking(move || -> Result<File> {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&open_path)
                .with_context(|| format!("Failed to open lock file: {}", open_path.display()))?;
            file.lock_exclusive().with_context(|| format!("Failed to acquire lock for: {key}"))?;
            Ok(file)
        })
        .await
        .context("Lock acquisition task panicked")??;

        debug!("Acquired cache lock {}", lock_path.display());
        Ok(Self {
            file,
            path: lock_path,
        })
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!("Failed to unlock {}: {}", self.path.display(), e);
        }
    }
}

/// Remove lock files older than `ttl_seconds`. Returns how many were removed.
pub async fn cleanup_stale_locks(cache_dir: &Path, ttl_seconds: u64) -> Result<usize> {
    use std::time::{Duration, SystemTime};

    let locks_dir = cache_dir.join(".locks");
    if !locks_dir.exists() {
        return Ok(0);
    }

    let mut removed = 0;
    let now = SystemTime::now();
    let ttl = Duration::from_secs(ttl_seconds);
    let mut entries =
        tokio::fs::read_dir(&locks_dir).await.context("Failed to read locks directory")?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("lock") {
            continue;
        }
        let Ok(modified) = entry.metadata().await.and_then(|m| m.modified()) else {
            continue;
        };
        if let Ok(age) = now.duration_since(modified)
            && age > ttl
            && tokio::fs::remove_file(&path).await.is_ok()
        {
            removed += 1;
        }
    }

    Ok(removed)
}
