//! Project settings.
//!
//! A project directory may contain a `packwright.toml`; every key is optional
//! and falls back to a default:
//!
//! ```toml
//! components = "components.yml"
//! build_dir = "build"
//! cache_dir = "~/.cache/packwright"
//! state_file = "packwright.lock"
//! manifest_file = "manifest.json"
//! max_parallel = 8
//! timeout_secs = 1800
//! metadata_ttl_secs = 1800
//! include_prereleases = false
//!
//! [target]
//! os = "linux"
//! bits = 64
//! dfhack = true
//! game_version = "0.47.05"
//!
//! [layout]
//! utilities = "LNP/Utilities"
//! graphics = "LNP/Graphics"
//!
//! [roots]
//! df = "Dwarf Fortress"
//!
//! [endpoints]
//! github_api = "https://api.github.com"
//! ```
//!
//! Precedence, lowest first: defaults, the file, `PACKWRIGHT_*` environment
//! variables, command-line flags. Relative paths are taken relative to the
//! project directory and `~` is expanded.

use crate::constants::{
    DEFAULT_BUILD_DIR, DEFAULT_CACHE_DIR, DEFAULT_COMPONENTS_FILE, DEFAULT_MANIFEST_FILE,
    DEFAULT_METADATA_TTL_SECS, DEFAULT_RUN_TIMEOUT_SECS, DEFAULT_STATE_FILE, default_max_parallel,
};
use crate::core::{Bits, ConfigError, Os, TargetPlatform};
use crate::registry::Layout;
use crate::resolver::Endpoints;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const ENV_GITHUB_TOKEN: &str = "PACKWRIGHT_GITHUB_TOKEN";
pub const ENV_CACHE_DIR: &str = "PACKWRIGHT_CACHE_DIR";
pub const ENV_MAX_PARALLEL: &str = "PACKWRIGHT_MAX_PARALLEL";

/// `[target]` table; unset fields describe the host machine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TargetSettings {
    pub os: Option<Os>,
    pub bits: Option<Bits>,
    pub dfhack: Option<bool>,
    /// Game version DFHack and manifest version bounds are checked against.
    pub game_version: Option<String>,
}

/// Contents of `packwright.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub components: Option<String>,
    pub build_dir: Option<String>,
    pub cache_dir: Option<String>,
    pub state_file: Option<String>,
    pub manifest_file: Option<String>,
    pub max_parallel: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub metadata_ttl_secs: Option<u64>,
    pub include_prereleases: bool,
    pub github_token: Option<String>,
    pub target: TargetSettings,
    pub layout: Layout,
    pub roots: BTreeMap<String, String>,
    pub endpoints: Endpoints,
}

impl Settings {
    /// Load settings, treating a missing file as all defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read settings file: {}", path.display()))?;
        Self::parse(&content, path)
    }

    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let settings: Self = toml::from_str(content)
            .with_context(|| format!("Invalid settings in {}", path.display()))?;
        if settings.max_parallel == Some(0) {
            return Err(ConfigError::Settings {
                file: path.display().to_string(),
                reason: "max_parallel must be at least 1".to_string(),
            }
            .into());
        }
        Ok(settings)
    }

    /// Apply `PACKWRIGHT_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, which maps variable names to values.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(token) = lookup(ENV_GITHUB_TOKEN).filter(|t| !t.trim().is_empty()) {
            self.github_token = Some(token);
        }
        if let Some(dir) = lookup(ENV_CACHE_DIR).filter(|d| !d.trim().is_empty()) {
            self.cache_dir = Some(dir);
        }
        if let Some(value) = lookup(ENV_MAX_PARALLEL) {
            let parsed: usize = value
                .trim()
                .parse()
                .ok()
                .filter(|n| *n > 0)
                .with_context(|| format!("{ENV_MAX_PARALLEL} must be a positive integer, got '{value}'"))?;
            self.max_parallel = Some(parsed);
        }
        Ok(())
    }

    /// Fill in defaults and make every path absolute against `project_dir`.
    #[must_use]
    pub fn resolve(self, project_dir: &Path) -> ProjectConfig {
        let path = |value: Option<String>, default: &str| {
            expand_path(project_dir, value.as_deref().unwrap_or(default))
        };
        let build_dir = path(self.build_dir, DEFAULT_BUILD_DIR);
        let manifest_path =
            build_dir.join(self.manifest_file.as_deref().unwrap_or(DEFAULT_MANIFEST_FILE));
        let host = TargetPlatform::host();

        ProjectConfig {
            components_file: path(self.components, DEFAULT_COMPONENTS_FILE),
            cache_dir: path(self.cache_dir, DEFAULT_CACHE_DIR),
            state_file: path(self.state_file, DEFAULT_STATE_FILE),
            manifest_path,
            build_dir,
            max_parallel: self.max_parallel.unwrap_or_else(default_max_parallel),
            timeout: Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_RUN_TIMEOUT_SECS)),
            metadata_ttl_secs: self.metadata_ttl_secs.unwrap_or(DEFAULT_METADATA_TTL_SECS),
            include_prereleases: self.include_prereleases,
            github_token: self.github_token,
            target: TargetPlatform::new(
                self.target.os.unwrap_or(host.os),
                self.target.bits.unwrap_or(host.bits),
                self.target.dfhack.unwrap_or(host.dfhack),
            ),
            game_version: self.target.game_version,
            layout: self.layout,
            roots: self.roots,
            endpoints: self.endpoints,
        }
    }
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectConfig {
    pub components_file: PathBuf,
    /// Pack root; extraction destinations are relative to it.
    pub build_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub state_file: PathBuf,
    pub manifest_path: PathBuf,
    pub max_parallel: usize,
    pub timeout: Duration,
    pub metadata_ttl_secs: u64,
    pub include_prereleases: bool,
    pub github_token: Option<String>,
    pub target: TargetPlatform,
    pub game_version: Option<String>,
    pub layout: Layout,
    pub roots: BTreeMap<String, String>,
    pub endpoints: Endpoints,
}

impl ProjectConfig {
    /// Load `packwright.toml` from `project_dir` with environment overrides.
    pub fn load(project_dir: &Path, settings_file: Option<&Path>) -> Result<Self> {
        let settings_path = settings_file.map_or_else(
            || project_dir.join(crate::constants::DEFAULT_SETTINGS_FILE),
            Path::to_path_buf,
        );
        let mut settings = Settings::load(&settings_path)?;
        settings.apply_env()?;
        Ok(settings.resolve(project_dir))
    }
}

fn expand_path(base: &Path, value: &str) -> PathBuf {
    let expanded = PathBuf::from(shellexpand::tilde(value).as_ref());
    if expanded.is_absolute() { expanded } else { base.join(expanded) }
}
