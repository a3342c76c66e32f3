//! Extraction: placing a component's artifact into the pack tree.
//!
//! For each component the OS-appropriate `extract_to` rule is parsed into
//! [`RuleLine`]s, the version placeholders in each side are rendered against
//! the run's resolved versions, the artifact is unpacked once into a scratch
//! directory and the requested entries are copied into place under the pack
//! root.
//!
//! Failures are [`ExtractionError`]s for that one component; the caller
//! decides what to do with the rest of the run.

pub mod archive;
pub mod rule;
pub mod template;

use crate::core::{ExtractionError, Os};
use crate::registry::Component;
use crate::utils::fs::safe_join;
use archive::{ArchiveKind, least_nested_root};
use rule::{RuleLine, is_dir_destination, parse_rule};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use template::TemplateValues;
use tracing::{debug, info};

pub use template::referenced_components;

/// Files written for one component.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionOutcome {
    /// Written files, relative to the pack root.
    pub files: Vec<PathBuf>,
}

/// Applies extraction rules for one target OS under one pack root.
#[derive(Debug, Clone)]
pub struct Extractor {
    pack_root: PathBuf,
    os: Os,
    roots: BTreeMap<String, String>,
}

impl Extractor {
    #[must_use]
    pub const fn new(pack_root: PathBuf, os: Os) -> Self {
        Self {
            pack_root,
            os,
            roots: BTreeMap::new(),
        }
    }

    /// Named path roots available to templates as `roots.<name>`.
    #[must_use]
    pub fn with_roots(mut self, roots: BTreeMap<String, String>) -> Self {
        self.roots = roots;
        self
    }

    #[must_use]
    pub fn pack_root(&self) -> &Path {
        &self.pack_root
    }

    /// Components whose resolved versions this component's rule needs.
    #[must_use]
    pub fn version_dependencies(&self, component: &Component) -> Vec<String> {
        component.extract_rule(self.os).map(referenced_components).unwrap_or_default()
    }

    /// Where `component`'s files land, for executable detection.
    ///
    /// The first whole-archive destination wins, then the first directory
    /// destination of a path pair. `None` when the rule has neither or cannot
    /// be rendered with `versions`.
    #[must_use]
    pub fn install_dir(
        &self,
        component: &Component,
        versions: &HashMap<String, String>,
    ) -> Option<PathBuf> {
        let lines = parse_rule(component.extract_rule(self.os)?).ok()?;
        let chosen = lines
            .iter()
            .find(|line| matches!(line, RuleLine::Unpack { .. }))
            .or_else(|| lines.iter().find(|line| is_dir_destination(line.destination())))?;
        let values = TemplateValues {
            versions,
            roots: &self.roots,
        };
        let rendered = template::render(chosen.destination(), &values).ok()?;
        self.destination(&rendered).ok()
    }

    /// Apply `component`'s rule to `artifact`.
    ///
    /// `versions` holds the resolved version of every component in the run.
    pub fn extract(
        &self,
        component: &Component,
        artifact: &Path,
        versions: &HashMap<String, String>,
    ) -> Result<ExtractionOutcome, ExtractionError> {
        let rule = component.extract_rule(self.os).ok_or_else(|| ExtractionError::Template {
            reason: format!("no extraction rule for {}", self.os),
        })?;
        let values = TemplateValues {
            versions,
            roots: &self.roots,
        };

        let mut lines = Vec::new();
        for line in parse_rule(rule)? {
            lines.push(match line {
                RuleLine::Unpack {
                    destination,
                } => RuleLine::Unpack {
                    destination: template::render(&destination, &values)?,
                },
                RuleLine::Pair {
                    source,
                    destination,
                } => RuleLine::Pair {
                    source: template::render(&source, &values)?,
                    destination: template::render(&destination, &values)?,
                },
            });
        }

        let kind = ArchiveKind::detect(artifact)?;
        let scratch = tempfile::TempDir::new().map_err(|e| io_error(artifact, &e))?;
        archive::unpack(artifact, kind, scratch.path())?;
        let stripped = least_nested_root(scratch.path());
        let archive_name =
            artifact.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();

        let mut outcome = ExtractionOutcome::default();
        for line in &lines {
            match line {
                RuleLine::Unpack {
                    destination,
                } => {
                    let target = self.destination(destination)?;
                    self.place_tree(&stripped, &target, &mut outcome)?;
                }
                RuleLine::Pair {
                    source,
                    destination,
                } => {
                    let matches = find_entries(&stripped, scratch.path(), source)?;
                    if matches.is_empty() {
                        return Err(ExtractionError::MissingEntry {
                            source_path: source.clone(),
                            archive: archive_name.clone(),
                        });
                    }
                    let dir_destination = is_dir_destination(destination);
                    if matches.len() > 1 && !dir_destination {
                        return Err(ExtractionError::Template {
                            reason: format!(
                                "'{source}' matches {} entries but '{destination}' is a single file",
                                matches.len()
                            ),
                        });
                    }
                    let base = self.destination(destination)?;
                    for entry in matches {
                        let target = if dir_destination {
                            base.join(entry.file_name().unwrap_or_default())
                        } else {
                            base.clone()
                        };
                        if entry.is_dir() {
                            self.place_tree(&entry, &target, &mut outcome)?;
                        } else {
                            self.place_file(&entry, &target, &mut outcome)?;
                        }
                    }
                }
            }
        }

        info!(
            "Extracted '{}' ({} file(s)) into {}",
            component.name,
            outcome.files.len(),
            self.pack_root.display()
        );
        Ok(outcome)
    }

    fn destination(&self, destination: &str) -> Result<PathBuf, ExtractionError> {
        let trimmed = destination.trim_end_matches(['/', '\\']);
        safe_join(&self.pack_root, Path::new(trimmed)).ok_or_else(|| ExtractionError::UnsafePath {
            path: destination.to_string(),
        })
    }

    fn place_tree(
        &self,
        source: &Path,
        target: &Path,
        outcome: &mut ExtractionOutcome,
    ) -> Result<(), ExtractionError> {
        for entry in walkdir::WalkDir::new(source).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| ExtractionError::Io {
                path: source.display().to_string(),
                reason: e.to_string(),
            })?;
            let Ok(rel) = entry.path().strip_prefix(source) else {
                continue;
            };
            let dest = target.join(rel);
            if entry.file_type().is_dir() {
                std::fs::create_dir_all(&dest).map_err(|e| io_error(&dest, &e))?;
            } else if entry.file_type().is_file() {
                self.place_file(entry.path(), &dest, outcome)?;
            }
        }
        Ok(())
    }

    fn place_file(
        &self,
        source: &Path,
        target: &Path,
        outcome: &mut ExtractionOutcome,
    ) -> Result<(), ExtractionError> {
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_error(parent, &e))?;
        }
        std::fs::copy(source, target).map_err(|e| io_error(target, &e))?;
        debug!("Placed {}", target.display());
        if let Ok(rel) = target.strip_prefix(&self.pack_root) {
            outcome.files.push(rel.to_path_buf());
        }
        Ok(())
    }
}

/// Entries matching `pattern` under the stripped root, falling back to the
/// raw unpack root.
fn find_entries(stripped: &Path, raw: &Path, pattern: &str) -> Result<Vec<PathBuf>, ExtractionError> {
    if safe_join(raw, Path::new(pattern)).is_none() {
        return Err(ExtractionError::UnsafePath {
            path: pattern.to_string(),
        });
    }

    for root in [stripped, raw] {
        let full = format!("{}/{}", glob::Pattern::escape(&root.to_string_lossy()), pattern);
        let paths = glob::glob(&full).map_err(|e| ExtractionError::Template {
            reason: format!("invalid pattern '{pattern}': {e}"),
        })?;
        let mut found: Vec<PathBuf> = paths.filter_map(Result::ok).collect();
        if !found.is_empty() {
            found.sort();
            return Ok(found);
        }
        if stripped == raw {
            break;
        }
    }
    Ok(Vec::new())
}

fn io_error(path: &Path, error: &std::io::Error) -> ExtractionError {
    ExtractionError::Io {
        path: path.display().to_string(),
        reason: error.to_string(),
    }
}
