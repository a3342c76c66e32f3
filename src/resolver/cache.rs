//! Persistent cache of host metadata.
//!
//! Each host answer is stored under a key such as `github:owner/repo` with
//! the time it was fetched. Entries younger than the TTL are served without
//! a network call; older ones are still available so GitHub can be asked
//! with `If-Modified-Since`.
//!
//! The cache lives in memory during a run (a [`DashMap`], since resolution
//! runs concurrently) and is written to `metadata.json` once resolution ends.

use crate::utils::fs::{read_json_file, write_json_file};
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedEntry {
    fetched_at: DateTime<Utc>,
    data: serde_json::Value,
}

#[derive(Debug)]
pub struct MetadataCache {
    path: Option<PathBuf>,
    ttl: Duration,
    entries: DashMap<String, CachedEntry>,
}

impl MetadataCache {
    /// Load the cache file at `path`. A missing or unreadable file starts an
    /// empty cache.
    #[must_use]
    pub fn load(path: &Path, ttl_secs: u64) -> Self {
        let entries = DashMap::new();
        if path.exists() {
            match read_json_file::<BTreeMap<String, CachedEntry>>(path) {
                Ok(saved) => {
                    debug!("Loaded {} metadata record(s) from {}", saved.len(), path.display());
                    for (key, entry) in saved {
                        entries.insert(key, entry);
                    }
                }
                Err(e) => warn!("Ignoring unreadable metadata cache {}: {:#}", path.display(), e),
            }
        }
        Self {
            path: Some(path.to_path_buf()),
            ttl: ttl_duration(ttl_secs),
            entries,
        }
    }

    /// A cache that is never written to disk.
    #[must_use]
    pub fn in_memory(ttl_secs: u64) -> Self {
        Self {
            path: None,
            ttl: ttl_duration(ttl_secs),
            entries: DashMap::new(),
        }
    }

    /// The record for `key` if it is younger than the TTL.
    #[must_use]
    pub fn fresh<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entry = self.entries.get(key)?;
        if Utc::now() - entry.fetched_at > self.ttl {
            return None;
        }
        serde_json::from_value(entry.data.clone()).ok()
    }

    /// The record for `key` regardless of age, with its fetch time.
    #[must_use]
    pub fn stale<T: DeserializeOwned>(&self, key: &str) -> Option<(T, DateTime<Utc>)> {
        let entry = self.entries.get(key)?;
        let value = serde_json::from_value(entry.data.clone()).ok()?;
        Some((value, entry.fetched_at))
    }

    pub fn store<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_value(value) {
            Ok(data) => {
                self.entries.insert(
                    key.to_string(),
                    CachedEntry {
                        fetched_at: Utc::now(),
                        data,
                    },
                );
            }
            Err(e) => warn!("Cannot cache metadata for {}: {}", key, e),
        }
    }

    /// Mark `key` as fetched now without changing its data.
    pub fn touch(&self, key: &str) {
        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.fetched_at = Utc::now();
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the cache file, sorted by key.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let sorted: BTreeMap<String, CachedEntry> =
            self.entries.iter().map(|e| (e.key().clone(), e.value().clone())).collect();
        write_json_file(path, &sorted)
    }
}

fn ttl_duration(secs: u64) -> Duration {
    Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX / 1_000))
}
