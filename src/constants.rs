//! Global constants used throughout the pipeline.
//!
//! Timeouts, retry parameters, default file names and parallelism bounds.

use std::time::Duration;

/// Maximum attempts for a single HTTP request (first try included).
pub const MAX_ATTEMPTS: usize = 3;

/// First retry delay; doubled on every further attempt.
pub const STARTING_BACKOFF_DELAY_MS: u64 = 250;

/// Upper bound for a single retry delay.
pub const MAX_BACKOFF_DELAY_MS: u64 = 4_000;

/// Per-request timeout for resolver API calls.
pub const API_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-request timeout for artifact downloads.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);

/// Default limit on the whole run.
pub const DEFAULT_RUN_TIMEOUT_SECS: u64 = 30 * 60;

/// Default lifetime of cached resolver metadata.
pub const DEFAULT_METADATA_TTL_SECS: u64 = 30 * 60;

/// Minimum number of concurrent network operations.
pub const MIN_PARALLELISM: usize = 10;

/// Multiplier applied to the core count for the default parallelism.
pub const PARALLELISM_CORE_MULTIPLIER: usize = 2;

/// Used when `std::thread::available_parallelism()` fails.
pub const FALLBACK_CORE_COUNT: usize = 4;

/// Lock files older than this are considered abandoned.
pub const STALE_LOCK_TTL_SECS: u64 = 60 * 60;

pub const DEFAULT_COMPONENTS_FILE: &str = "components.yml";
pub const DEFAULT_SETTINGS_FILE: &str = "packwright.toml";
pub const DEFAULT_STATE_FILE: &str = "packwright.lock";
pub const DEFAULT_MANIFEST_FILE: &str = "manifest.json";
pub const DEFAULT_BUILD_DIR: &str = "build";
pub const DEFAULT_CACHE_DIR: &str = ".packwright/cache";
pub const METADATA_CACHE_FILE: &str = "metadata.json";

pub const DEFAULT_DFFD_URL: &str = "https://dffd.bay12games.com";
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
pub const DEFAULT_BITBUCKET_API_URL: &str = "https://api.bitbucket.org/2.0";
pub const FORUM_TOPIC_URL: &str = "http://www.bay12forums.com/smf/index.php?topic=";

/// Name of the component whose presence enables `needs_dfhack` components.
pub const DFHACK_COMPONENT: &str = "DFHack";

/// Name of the game component; its resolved version is the game version
/// when none is configured.
pub const GAME_COMPONENT: &str = "Dwarf Fortress";

pub const USER_AGENT: &str = concat!("packwright/", env!("CARGO_PKG_VERSION"));

/// Default concurrency: `max(10, 2 × cores)`.
#[must_use]
pub fn default_max_parallel() -> usize {
    let cores = std::thread::available_parallelism()
        .map(std::num::NonZero::get)
        .unwrap_or(FALLBACK_CORE_COUNT);
    (cores * PARALLELISM_CORE_MULTIPLIER).max(MIN_PARALLELISM)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_max_parallel_has_floor() {
        assert!(default_max_parallel() >= MIN_PARALLELISM);
    }
}
