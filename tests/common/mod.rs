//! Common test utilities and fixtures for packwright integration tests
//!
//! A [`TestPack`] is a throwaway project directory with its own
//! `components.yml`, `packwright.toml`, cache and build tree. Upstream
//! artifacts are written under `upstream/` and referenced by `file://` URL,
//! or served from a `mockito` server when a host API is involved.

// Allow dead code because these utilities are used across different test files
// and not all utilities are used in every test file
#![allow(dead_code)]

use anyhow::{Context, Result};
use packwright::cli::GlobalOptions;
use packwright::cli::common::{Project, TargetArgs};
use packwright::installer::RunReport;
use packwright::lockfile::{InstallState, LockFile, LockfileStore};
use packwright::test_utils::write_zip;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Settings shared by every test pack: Linux 64-bit with DFHack.
const BASE_SETTINGS: &str = r#"
max_parallel = 4
timeout_secs = 120

[target]
os = "linux"
bits = 64
dfhack = true
"#;

pub struct TestPack {
    _temp: TempDir,
    root: PathBuf,
}

impl TestPack {
    pub fn new() -> Result<Self> {
        packwright::test_utils::init_test_logging(None);
        let temp = TempDir::new()?;
        let root = temp.path().to_path_buf();
        fs::write(root.join("packwright.toml"), BASE_SETTINGS)?;
        Ok(Self {
            _temp: temp,
            root,
        })
    }

    /// A pack whose host endpoints all point at `server_url`.
    pub fn with_endpoints(server_url: &str) -> Result<Self> {
        let pack = Self::new()?;
        pack.append_settings(&format!(
            "\n[endpoints]\ndffd = \"{server_url}\"\ngithub_api = \"{server_url}\"\nbitbucket_api = \"{server_url}\"\n"
        ))?;
        Ok(pack)
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn build_dir(&self) -> PathBuf {
        self.root.join("build")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join(".packwright/cache")
    }

    pub fn append_settings(&self, extra: &str) -> Result<()> {
        let path = self.root.join("packwright.toml");
        let mut content = fs::read_to_string(&path)?;
        content.push_str(extra);
        fs::write(path, content)?;
        Ok(())
    }

    pub fn write_components(&self, yaml: &str) -> Result<()> {
        fs::write(self.root.join("components.yml"), yaml).context("writing components.yml")
    }

    /// Write a zip under `upstream/` and return its `file://` URL.
    pub fn upstream_zip(&self, name: &str, entries: &[(&str, &[u8])]) -> Result<String> {
        let path = self.root.join("upstream").join(name);
        fs::create_dir_all(self.root.join("upstream"))?;
        write_zip(&path, entries)?;
        Ok(format!("file://{}", path.display()))
    }

    pub fn global(&self) -> GlobalOptions {
        GlobalOptions {
            project_dir: self.root.clone(),
            settings: None,
            show_progress: false,
            verbose: false,
        }
    }

    pub fn project(&self, args: &TargetArgs) -> Result<Project> {
        Project::load(&self.global(), args)
    }

    /// Run a full build with the settings on disk.
    pub async fn build(&self) -> Result<RunReport> {
        self.build_with(&TargetArgs::default(), false).await
    }

    pub async fn build_with(&self, args: &TargetArgs, force: bool) -> Result<RunReport> {
        let project = self.project(args)?;
        let mut state = LockfileStore::open(&project.config.state_file)?;
        let pipeline = project.pipeline(force, false)?;
        pipeline.run(&project.registry, &mut state).await
    }

    pub fn lockfile(&self) -> Result<LockFile> {
        Ok(LockfileStore::open(self.root.join("packwright.lock"))?.snapshot())
    }

    pub fn manifest(&self) -> Result<serde_json::Value> {
        let content = fs::read_to_string(self.build_dir().join("manifest.json"))?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn read_built(&self, relative: &str) -> Result<String> {
        fs::read_to_string(self.build_dir().join(relative))
            .with_context(|| format!("reading build/{relative}"))
    }
}

/// Installed names and versions in report order.
pub fn installed(report: &RunReport) -> Vec<(&str, &str)> {
    report.installed.iter().map(|(n, v)| (n.as_str(), v.as_str())).collect()
}

/// A manual component definition for `components.yml`.
///
/// `extra` holds further keys, indented relative to the component.
pub fn manual(name: &str, version: &str, dl_link: &str, extra: &str) -> String {
    let mut yaml = format!(
        "  {name}:\n    bay12: 1\n    host: manual\n    version: '{version}'\n    updated: 2021-01-01\n    dl_link: '{dl_link}'\n"
    );
    for line in extra.lines().filter(|l| !l.trim().is_empty()) {
        yaml.push_str("    ");
        yaml.push_str(line);
        yaml.push('\n');
    }
    yaml
}
