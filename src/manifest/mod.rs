//! Pack-wide manifest assembly.
//!
//! Every component in the run contributes one entry (keyed by its name, or by
//! its fragment's `entry` key) to the manifest written next to the pack:
//!
//! ```json
//! {
//!   "Dwarf Therapist": {
//!     "title": "Dwarf Therapist",
//!     "content_version": "v41.2.2",
//!     "tooltip": "Manage your dwarves' labours and skills",
//!     "linux_exe": "DwarfTherapist.AppImage"
//!   }
//! }
//! ```
//!
//! Components are merged in plan order. Defaults (`title`, `content_version`,
//! `needs_dfhack`) and detected executables only fill fields nobody set.
//! A configured field that a different component already set is overwritten
//! and reported as a [`ManifestConflict`], so the last component in plan order
//! wins.
//!
//! Utilities and graphics packs may ship their own `manifest.json`. Its fields
//! override the configured ones, and each configured field it shadows is
//! reported. When the game version is known, `df_min_version` and
//! `df_max_version` bounds that exclude it are dropped.

use crate::core::{ManifestConflict, Os};
use crate::registry::{Category, Component};
use crate::utils::fs::{read_json_file, write_json_file};
use anyhow::Result;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Field holding the selected manifest entry inside a fragment.
const ENTRY_KEY: &str = "entry";

/// Manifest a component may ship in its own install directory.
const UPSTREAM_MANIFEST: &str = "manifest.json";

/// One manifest entry: field name → value, in insertion order.
pub type ManifestEntry = IndexMap<String, Value>;

/// The merged pack manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PackManifest {
    pub entries: BTreeMap<String, ManifestEntry>,
}

impl PackManifest {
    #[must_use]
    pub fn get(&self, entry: &str) -> Option<&ManifestEntry> {
        self.entries.get(entry)
    }

    /// Copy without empty or `false` values, the shape that is written out.
    #[must_use]
    pub fn pruned(&self) -> Self {
        let entries = self
            .entries
            .iter()
            .map(|(name, fields)| {
                let fields =
                    fields.iter().filter(|(_, v)| !is_empty(v)).map(|(k, v)| (k.clone(), v.clone()));
                (name.clone(), fields.collect())
            })
            .collect();
        Self {
            entries,
        }
    }

    /// Write as pretty JSON, atomically.
    pub fn write(&self, path: &Path) -> Result<()> {
        write_json_file(path, &self.pruned())
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Bool(true) | Value::Number(_) => false,
    }
}

/// Merges component fragments into a [`PackManifest`].
#[derive(Debug, Clone)]
pub struct ManifestMerger {
    os: Os,
    manifest: PackManifest,
    owners: HashMap<(String, String), String>,
    conflicts: Vec<ManifestConflict>,
    warnings: Vec<String>,
    game_version: Option<String>,
}

impl ManifestMerger {
    #[must_use]
    pub fn new(os: Os) -> Self {
        Self {
            os,
            manifest: PackManifest::default(),
            owners: HashMap::new(),
            conflicts: Vec::new(),
            warnings: Vec::new(),
            game_version: None,
        }
    }

    /// Game version that `df_min_version`/`df_max_version` are checked against.
    #[must_use]
    pub fn with_game_version(mut self, version: Option<String>) -> Self {
        self.game_version = version;
        self
    }

    fn exe_key(&self) -> String {
        format!("{}_exe", self.os.key())
    }

    /// Merge one component.
    ///
    /// `version` is its resolved version. `install_dir` is where a utility's
    /// files live, searched for an executable when none is configured.
    pub fn merge(&mut self, component: &Component, version: &str, install_dir: Option<&Path>) {
        let entry_name = component.manifest_entry().to_string();
        let exe_key = self.exe_key();
        let entry = self.manifest.entries.entry(entry_name.clone()).or_default();

        entry.entry("title".to_string()).or_insert_with(|| Value::from(component.name.as_str()));
        entry.entry("content_version".to_string()).or_insert_with(|| Value::from(version));
        entry.entry("needs_dfhack".to_string()).or_insert(Value::Bool(component.needs_dfhack));

        if let Some(fragment) = &component.manifest {
            for (field, value) in &fragment.fields {
                if field == ENTRY_KEY {
                    continue;
                }
                let value = match (field.as_str(), value) {
                    ("tooltip", Value::String(text)) => Value::from(text.trim()),
                    _ => value.clone(),
                };

                let key = (entry_name.clone(), field.clone());
                if let Some(previous) = self.owners.get(&key)
                    && *previous != component.name
                {
                    let conflict = ManifestConflict {
                        entry: entry_name.clone(),
                        field: field.clone(),
                        previous: previous.clone(),
                        component: component.name.clone(),
                    };
                    warn!("{}", conflict);
                    self.conflicts.push(conflict);
                }
                self.owners.insert(key, component.name.clone());
                entry.insert(field.clone(), value);
            }
        }

        if matches!(component.category, Category::Utility | Category::Graphics)
            && let Some(dir) = install_dir
        {
            let path = dir.join(UPSTREAM_MANIFEST);
            if path.is_file() {
                match read_json_file::<IndexMap<String, Value>>(&path) {
                    Ok(upstream) => {
                        for (field, value) in upstream {
                            if component.manifest.as_ref().is_some_and(|f| f.fields.contains_key(&field)) {
                                self.warnings.push(format!("{}: {field} is provided upstream", path.display()));
                            }
                            let value = match (field.as_str(), value) {
                                ("tooltip", Value::String(text)) => Value::from(text.trim()),
                                (_, value) => value,
                            };
                            entry.insert(field, value);
                        }
                    }
                    Err(e) => self.warnings.push(format!("Ignoring {}: {e:#}", path.display())),
                }
            }
        }

        if let Some(game) = &self.game_version {
            for (field, excludes) in [("df_min_version", Ordering::Greater), ("df_max_version", Ordering::Less)] {
                let Some(bound) = entry.get(field).and_then(version_text) else {
                    continue;
                };
                if compare_versions(&bound, game) == excludes {
                    self.warnings.push(format!(
                        "Dropping {field} {bound} of '{entry_name}': incompatible with game version {game}"
                    ));
                    entry.shift_remove(field);
                }
            }
        }

        if component.category == Category::Utility && !entry.contains_key(&exe_key) {
            match install_dir.and_then(|dir| detect_executable(self.os, dir)) {
                Some(exe) => {
                    debug!("Detected {} '{}' for '{}'", exe_key, exe, component.name);
                    entry.insert(exe_key.clone(), Value::from(exe));
                }
                None => self.warnings.push(format!("{exe_key} for '{}' is not set", component.name)),
            }
        }

        if !entry.contains_key("tooltip") {
            self.warnings.push(format!("No tooltip in manifest entry '{entry_name}'"));
        }
    }

    #[must_use]
    pub fn manifest(&self) -> &PackManifest {
        &self.manifest
    }

    #[must_use]
    pub fn conflicts(&self) -> &[ManifestConflict] {
        &self.conflicts
    }

    /// Non-fatal problems other than conflicts.
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    #[must_use]
    pub fn into_manifest(self) -> PackManifest {
        self.manifest
    }
}

fn version_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Compare dotted versions by their leading numeric segments, so `0.47.05`
/// equals `0.47.5` and sorts after `0.47`.
fn compare_versions(a: &str, b: &str) -> Ordering {
    let parts = |v: &str| -> Vec<u64> {
        v.trim_start_matches(['v', 'V']).split(['.', '-']).map_while(|p| p.parse().ok()).collect()
    };
    parts(a).cmp(&parts(b))
}

/// Pick the launcher of a utility unpacked under `dir`.
///
/// Windows prefers the first `.exe`, then the first `.bat`. Linux prefers a
/// `.jar`, then a `.sh`. macOS is like Linux except that an `.app` bundle
/// wins. The result is relative to `dir`, with `/` separators.
#[must_use]
pub fn detect_executable(os: Os, dir: &Path) -> Option<String> {
    let mut files: Vec<PathBuf> = Vec::new();
    let mut bundles: Vec<PathBuf> = Vec::new();
    for entry in walkdir::WalkDir::new(dir).min_depth(1).sort_by_file_name().into_iter().filter_map(Result::ok) {
        let Ok(rel) = entry.path().strip_prefix(dir) else {
            continue;
        };
        let name = entry.file_name().to_string_lossy().to_lowercase();
        if entry.file_type().is_dir() && name.ends_with(".app") {
            bundles.push(rel.to_path_buf());
        } else if entry.file_type().is_file() {
            files.push(rel.to_path_buf());
        }
    }

    let with_ext = |ext: &str| {
        files
            .iter()
            .find(|p| p.extension().is_some_and(|e| e.eq_ignore_ascii_case(ext)))
            .cloned()
    };
    let found = match os {
        Os::Win => with_ext("exe").or_else(|| with_ext("bat")),
        Os::Linux => with_ext("jar").or_else(|| with_ext("sh")),
        Os::Osx => bundles.first().cloned().or_else(|| with_ext("jar")).or_else(|| with_ext("sh")),
    };
    found.map(|p| p.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Category;
    use crate::test_utils::ComponentBuilder;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_and_trimmed_tooltip() {
        let component = ComponentBuilder::new("Tiles")
            .category(Category::Graphics)
            .manifest(None, "tooltip", json!("  Pretty tiles \n"))
            .build();
        let mut merger = ManifestMerger::new(Os::Linux);
        merger.merge(&component, "1.4", None);

        let entry = merger.manifest().get("Tiles").unwrap();
        assert_eq!(entry["title"], json!("Tiles"));
        assert_eq!(entry["content_version"], json!("1.4"));
        assert_eq!(entry["tooltip"], json!("Pretty tiles"));
        assert!(merger.conflicts().is_empty());
        assert!(merger.warnings().is_empty());
    }

    #[test]
    fn test_conflict_is_reported_and_last_write_wins() {
        let a = ComponentBuilder::new("A").category(Category::File).manifest(Some("shared"), "tooltip", json!("t")).build();
        let b = ComponentBuilder::new("B").category(Category::File).manifest(Some("shared"), "tooltip", json!("u")).build();

        let mut merger = ManifestMerger::new(Os::Linux);
        merger.merge(&a, "1", None);
        merger.merge(&b, "1", None);

        assert_eq!(
            merger.conflicts(),
            &[ManifestConflict {
                entry: "shared".into(),
                field: "tooltip".into(),
                previous: "A".into(),
                component: "B".into(),
            }]
        );
        let entry = merger.manifest().get("shared").unwrap();
        assert_eq!(entry["tooltip"], json!("u"));
        // Defaults come from the first component and are never conflicts.
        assert_eq!(entry["title"], json!("A"));
    }

    #[test]
    fn test_unrelated_fields_are_kept() {
        let a = ComponentBuilder::new("A").category(Category::File).manifest(Some("shared"), "tooltip", json!("t")).build();
        let b = ComponentBuilder::new("B").category(Category::File).manifest(Some("shared"), "readme", json!("README.txt")).build();

        let mut merger = ManifestMerger::new(Os::Win);
        merger.merge(&a, "1", None);
        merger.merge(&b, "2", None);

        let entry = merger.manifest().get("shared").unwrap();
        assert_eq!(entry["tooltip"], json!("t"));
        assert_eq!(entry["readme"], json!("README.txt"));
        assert!(merger.conflicts().is_empty());
    }

    #[test]
    fn test_missing_tooltip_is_a_warning() {
        let component = ComponentBuilder::new("Bare").category(Category::File).build();
        let mut merger = ManifestMerger::new(Os::Linux);
        merger.merge(&component, "1", None);
        assert_eq!(merger.warnings().len(), 1);
        assert!(merger.warnings()[0].contains("tooltip"));
    }

    #[test]
    fn test_utility_executable_detection() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path();
        std::fs::create_dir_all(dir.join("bin")).unwrap();
        std::fs::create_dir_all(dir.join("Tool.app/Contents")).unwrap();
        std::fs::write(dir.join("run.bat"), "").unwrap();
        std::fs::write(dir.join("bin/tool.exe"), "").unwrap();
        std::fs::write(dir.join("start.sh"), "").unwrap();
        std::fs::write(dir.join("Tool.app/Contents/Info.plist"), "").unwrap();

        assert_eq!(detect_executable(Os::Win, dir).as_deref(), Some("bin/tool.exe"));
        assert_eq!(detect_executable(Os::Linux, dir).as_deref(), Some("start.sh"));
        assert_eq!(detect_executable(Os::Osx, dir).as_deref(), Some("Tool.app"));

        let component =
            ComponentBuilder::new("Tool").manifest(None, "tooltip", json!("A tool")).build();
        let mut merger = ManifestMerger::new(Os::Linux);
        merger.merge(&component, "1", Some(dir));
        assert_eq!(merger.manifest().get("Tool").unwrap()["linux_exe"], json!("start.sh"));
    }

    #[test]
    fn test_configured_executable_is_not_replaced() {
        let component = ComponentBuilder::new("Tool")
            .manifest(None, "tooltip", json!("t"))
            .manifest(None, "win_exe", json!("Launch.exe"))
            .build();
        let mut merger = ManifestMerger::new(Os::Win);
        merger.merge(&component, "1", None);
        assert_eq!(merger.manifest().get("Tool").unwrap()["win_exe"], json!("Launch.exe"));
        assert!(merger.warnings().is_empty());
    }

    #[test]
    fn test_upstream_manifest_wins_over_configured_fields() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("manifest.json"),
            r#"{"tooltip": " From upstream ", "author": "someone"}"#,
        )
        .unwrap();
        let component = ComponentBuilder::new("Tiles")
            .category(Category::Graphics)
            .manifest(None, "tooltip", json!("Configured"))
            .build();

        let mut merger = ManifestMerger::new(Os::Linux);
        merger.merge(&component, "1", Some(temp.path()));

        let entry = merger.manifest().get("Tiles").unwrap();
        assert_eq!(entry["tooltip"], json!("From upstream"));
        assert_eq!(entry["author"], json!("someone"));
        assert_eq!(merger.warnings().len(), 1);
        assert!(merger.warnings()[0].ends_with("tooltip is provided upstream"));
    }

    #[test]
    fn test_broken_upstream_manifest_is_a_warning() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("manifest.json"), "{not json").unwrap();
        let component = ComponentBuilder::new("Tiles")
            .category(Category::Graphics)
            .manifest(None, "tooltip", json!("Configured"))
            .build();

        let mut merger = ManifestMerger::new(Os::Linux);
        merger.merge(&component, "1", Some(temp.path()));

        assert_eq!(merger.manifest().get("Tiles").unwrap()["tooltip"], json!("Configured"));
        assert_eq!(merger.warnings().len(), 1);
        assert!(merger.warnings()[0].starts_with("Ignoring"));
    }

    #[test]
    fn test_incompatible_version_bounds_are_dropped() {
        let component = ComponentBuilder::new("Tiles")
            .category(Category::Graphics)
            .manifest(None, "tooltip", json!("t"))
            .manifest(None, "df_min_version", json!("0.47.5"))
            .manifest(None, "df_max_version", json!("0.44.12"))
            .build();
        let fitting = ComponentBuilder::new("Other")
            .category(Category::Graphics)
            .manifest(None, "tooltip", json!("t"))
            .manifest(None, "df_min_version", json!("0.47.04"))
            .manifest(None, "df_max_version", json!("0.47.05"))
            .build();

        let mut merger = ManifestMerger::new(Os::Linux).with_game_version(Some("0.47.05".into()));
        merger.merge(&component, "1", None);
        merger.merge(&fitting, "1", None);

        let dropped = merger.manifest().get("Tiles").unwrap();
        assert_eq!(dropped["df_min_version"], json!("0.47.5"));
        assert!(!dropped.contains_key("df_max_version"));
        let kept = merger.manifest().get("Other").unwrap();
        assert_eq!(kept["df_min_version"], json!("0.47.04"));
        assert_eq!(kept["df_max_version"], json!("0.47.05"));
        assert_eq!(merger.warnings().len(), 1);
        assert!(merger.warnings()[0].contains("df_max_version 0.44.12"));
    }

    #[test]
    fn test_version_bounds_kept_without_game_version() {
        let component = ComponentBuilder::new("Tiles")
            .category(Category::Graphics)
            .manifest(None, "tooltip", json!("t"))
            .manifest(None, "df_max_version", json!("0.28"))
            .build();
        let mut merger = ManifestMerger::new(Os::Linux);
        merger.merge(&component, "1", None);
        assert_eq!(merger.manifest().get("Tiles").unwrap()["df_max_version"], json!("0.28"));
    }

    #[test]
    fn test_compare_versions_is_numeric() {
        assert_eq!(compare_versions("0.47.05", "0.47.5"), Ordering::Equal);
        assert_eq!(compare_versions("0.47.10", "0.47.9"), Ordering::Greater);
        assert_eq!(compare_versions("0.47", "0.47.01"), Ordering::Less);
        assert_eq!(compare_versions("v0.44.12", "0.44.12"), Ordering::Equal);
        assert_eq!(compare_versions("0.44.12-1", "0.44.12"), Ordering::Greater);
    }

    #[test]
    fn test_written_manifest_omits_empty_values() {
        let temp = TempDir::new().unwrap();
        let component = ComponentBuilder::new("Tiles")
            .category(Category::Graphics)
            .manifest(None, "tooltip", json!("t"))
            .manifest(None, "readme", json!(""))
            .build();
        let mut merger = ManifestMerger::new(Os::Linux);
        merger.merge(&component, "1", None);

        let path = temp.path().join("build/manifest.json");
        merger.manifest().write(&path).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, json!({"Tiles": {"title": "Tiles", "content_version": "1", "tooltip": "t"}}));
    }
}
