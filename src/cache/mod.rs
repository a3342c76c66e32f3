//! Local artifact cache.
//!
//! Downloaded artifacts are stored by component name and resolved version:
//!
//! ```text
//! .packwright/cache/
//! ├── artifacts/
//! │   ├── DFHack/
//! │   │   └── 0.47.05-r1/
//! │   │       └── dfhack-0.47.05-r1-Linux-64bit-gcc-7.tar.bz2
//! │   └── Dwarf_Therapist-1c8e07b2/    # sanitised names carry a digest
//! │       └── v41.2.2/
//! │           └── DwarfTherapist-v41.2.2-linux-x86_64.AppImage
//! ├── metadata.json        # resolver metadata cache
//! └── .locks/              # per-entry cross-process locks
//! ```
//!
//! An entry is either absent or a complete file. Downloads go to a
//! `.partial-*` temporary file next to the final name and are renamed into
//! place only once the body has been fully written; a cancelled or failed
//! download drops the temporary file, which deletes it.

pub mod lock;

use crate::core::DownloadError;
use crate::resolver::ResolvedVersion;
use crate::utils::fs::{sanitize_segment, sha256_file};
use crate::utils::http::{HttpClient, HttpError};
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub use lock::{CacheLock, cleanup_stale_locks};

/// Hex digits of the digest appended to sanitised key segments.
const KEY_DIGEST_LEN: usize = 8;

/// An artifact present in the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedArtifact {
    pub path: PathBuf,
    /// Hex SHA-256 of the file.
    pub sha256: String,
    /// `true` when no transfer was needed.
    pub from_cache: bool,
}

/// Artifact store keyed by `(component name, version)`.
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    root: PathBuf,
    http: HttpClient,
}

impl ArtifactCache {
    #[must_use]
    pub const fn new(root: PathBuf, http: HttpClient) -> Self {
        Self {
            root,
            http,
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn artifacts_dir(&self) -> PathBuf {
        self.root.join("artifacts")
    }

    /// Final location of an artifact.
    #[must_use]
    pub fn artifact_path(&self, name: &str, version: &str, filename: &str) -> PathBuf {
        let filename = match filename.trim() {
            "" => "artifact".to_string(),
            f => sanitize_segment(f),
        };
        self.artifacts_dir().join(key_segment(name)).join(key_segment(version)).join(filename)
    }

    /// Make sure the artifact for `name` at `resolved` is in the cache.
    ///
    /// A non-empty file under the final name is a hit. Otherwise `dl_link` is
    /// fetched: `file://` URLs and plain paths are copied, anything else is
    /// downloaded with retries.
    pub async fn fetch(
        &self,
        name: &str,
        resolved: &ResolvedVersion,
    ) -> Result<CachedArtifact, DownloadError> {
        let url = resolved.dl_link.as_str();
        let target = self.artifact_path(name, &resolved.version, &resolved.filename);
        let io_error = |path: &Path, e: &dyn std::fmt::Display| DownloadError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        };

        let lock_key =
            format!("{}-{}", key_segment(name), key_segment(&resolved.version));
        let _lock = CacheLock::acquire(&self.root, &lock_key)
            .await
            .map_err(|e| io_error(&self.root, &e))?;

        if is_complete(&target).await {
            debug!("'{}' {} served from cache", name, resolved.version);
            let sha256 = checksum(target.clone()).await?;
            return Ok(CachedArtifact {
                path: target,
                sha256,
                from_cache: true,
            });
        }

        let dir = target.parent().map_or_else(|| self.artifacts_dir(), Path::to_path_buf);
        tokio::fs::create_dir_all(&dir).await.map_err(|e| io_error(&dir, &e))?;

        let partial = tempfile::Builder::new()
            .prefix(".partial-")
            .tempfile_in(&dir)
            .map_err(|e| io_error(&dir, &e))?
            .into_temp_path();

        let bytes = if let Some(source) = local_source(url) {
            debug!("Copying '{}' artifact from {}", name, source.display());
            tokio::fs::copy(&source, &partial).await.map_err(|e| io_error(&source, &e))?
        } else {
            let (bytes, attempts) =
                self.http.download_to(url, &partial).await.map_err(|e| self.download_error(url, e))?;
            debug!("Downloaded '{}' ({} bytes, {} attempt(s))", name, bytes, attempts);
            bytes
        };

        if bytes == 0 {
            return Err(DownloadError::Empty {
                url: url.to_string(),
            });
        }

        partial.persist(&target).map_err(|e| io_error(&target, &e.error))?;
        let sha256 = checksum(target.clone()).await?;
        info!("Cached '{}' {} at {}", name, resolved.version, target.display());

        Ok(CachedArtifact {
            path: target,
            sha256,
            from_cache: false,
        })
    }

    fn download_error(&self, url: &str, error: HttpError) -> DownloadError {
        match error {
            HttpError::Status {
                status,
            } => DownloadError::Status {
                url: url.to_string(),
                status,
            },
            HttpError::Write {
                path,
                reason,
            } => DownloadError::Io {
                path,
                reason,
            },
            other => DownloadError::Network {
                url: url.to_string(),
                attempts: if other.is_transient() {
                    self.http.retry_policy().attempts
                } else {
                    1
                },
                reason: other.to_string(),
            },
        }
    }

    /// Remove cached versions that `referenced` (name → version) no longer
    /// points at, along with stale lock files.
    ///
    /// Returns the number of version directories removed.
    pub async fn clean(&self, referenced: &BTreeMap<&str, &str>) -> Result<usize> {
        let keep: HashSet<(String, String)> = referenced
            .iter()
            .map(|(name, version)| (key_segment(name), key_segment(version)))
            .collect();

        let artifacts = self.artifacts_dir();
        let mut removed = 0;
        if artifacts.exists() {
            let mut names = tokio::fs::read_dir(&artifacts)
                .await
                .with_context(|| format!("Failed to read {}", artifacts.display()))?;

            while let Some(name_entry) = names.next_entry().await? {
                if !name_entry.file_type().await?.is_dir() {
                    continue;
                }
                let name = name_entry.file_name().to_string_lossy().to_string();
                let name_dir = name_entry.path();
                let mut versions = tokio::fs::read_dir(&name_dir).await?;
                let mut remaining = 0;

                while let Some(version_entry) = versions.next_entry().await? {
                    let version = version_entry.file_name().to_string_lossy().to_string();
                    if keep.contains(&(name.clone(), version.clone())) {
                        remaining += 1;
                        continue;
                    }
                    let path = version_entry.path();
                    info!("Removing unused artifact {}/{}", name, version);
                    let result = if version_entry.file_type().await?.is_dir() {
                        tokio::fs::remove_dir_all(&path).await
                    } else {
                        tokio::fs::remove_file(&path).await
                    };
                    result.with_context(|| format!("Failed to remove {}", path.display()))?;
                    removed += 1;
                }

                if remaining == 0 {
                    tokio::fs::remove_dir(&name_dir)
                        .await
                        .with_context(|| format!("Failed to remove {}", name_dir.display()))?;
                }
            }
        }

        let locks = cleanup_stale_locks(&self.root, crate::constants::STALE_LOCK_TTL_SECS).await?;
        if locks > 0 {
            debug!("Removed {} stale lock file(s)", locks);
        }
        Ok(removed)
    }

    /// Total size of cached artifacts in bytes.
    pub async fn size(&self) -> Result<u64> {
        let artifacts = self.artifacts_dir();
        tokio::task::spawn_blocking(move || {
            walkdir::WalkDir::new(&artifacts)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file())
                .filter_map(|e| e.metadata().ok())
                .map(|m| m.len())
                .sum::<u64>()
        })
        .await
        .context("Cache size task panicked")
    }
}

/// `file://` URLs and scheme-less links name a local file.
/// Path segment for a cache key part.
///
/// Values that are already safe are used verbatim. Others are sanitised and
/// suffixed with a digest of the raw value, so `1.0 beta` and `1.0_beta`
/// never share an entry.
fn key_segment(value: &str) -> String {
    let sanitized = sanitize_segment(value);
    if sanitized == value {
        return sanitized;
    }
    let digest = hex::encode(Sha256::digest(value.as_bytes()));
    format!("{sanitized}-{}", &digest[..KEY_DIGEST_LEN])
}

fn local_source(url: &str) -> Option<PathBuf> {
    if let Some(path) = url.strip_prefix("file://") {
        return Some(PathBuf::from(path));
    }
    (!url.contains("://")).then(|| PathBuf::from(url))
}

async fn is_complete(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok_and(|m| m.is_file() && m.len() > 0)
}

async fn checksum(path: PathBuf) -> Result<String, DownloadError> {
    let display = path.display().to_string();
    tokio::task::spawn_blocking(move || sha256_file(&path))
        .await
        .map_err(|e| DownloadError::Io {
            path: display.clone(),
            reason: e.to_string(),
        })?
        .map_err(|e| DownloadError::Io {
            path: display,
            reason: format!("{e:#}"),
        })
}
