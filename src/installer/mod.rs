//! The install pipeline.
//!
//! A run goes through these phases:
//!
//! 1. **Plan**: order the eligible components, resolve every version
//!    concurrently and decide an [`Action`] per component. Configuration
//!    errors abort here, before any download.
//! 2. **Download**: every `install`/`update` entry is fetched into the
//!    artifact cache by a task gated on a shared semaphore.
//! 3. **Extract and merge**: in plan order, each entry waits for its own
//!    download only, is extracted on the blocking pool, recorded in the state
//!    store and merged into the pack manifest. A component that needs a
//!    sibling's version for its templates reads it from the plan's resolved
//!    version table, so it never waits on the sibling's extraction.
//!
//! Per-component failures end up in the [`RunReport`]; everything that did
//! install stays installed. The whole run is bounded by a timeout and can be
//! interrupted with Ctrl-C, which drops the download tasks and with them any
//! partial cache files.

pub mod report;

use crate::cache::{ArtifactCache, CachedArtifact};
use crate::constants::GAME_COMPONENT;
use crate::core::{DownloadError, ExtractionError, TargetPlatform};
use crate::extractor::Extractor;
use crate::lockfile::{InstallState, LockedComponent};
use crate::manifest::ManifestMerger;
use crate::planner::{Action, Plan, Planner};
use crate::registry::{Component, Registry};
use crate::resolver::VersionResolver;
use crate::utils::progress::ProgressBar;
use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

pub use report::{FailedComponent, RunReport, Stage, UpdatedComponent};

type DownloadResult = (usize, Result<CachedArtifact, DownloadError>);

/// A decided plan plus what was left out of it.
struct Prepared {
    plan: Plan,
    excluded: Vec<(String, String)>,
    game_version: Option<String>,
}

/// Knobs for one run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub target: TargetPlatform,
    /// Reinstall every component regardless of recorded state.
    pub force: bool,
    /// Concurrent downloads.
    pub max_parallel: usize,
    /// Limit on the whole run.
    pub timeout: Duration,
    pub show_progress: bool,
    /// Where the merged manifest is written.
    pub manifest_path: PathBuf,
    /// Game version DFHack must match; defaults to the resolved version of
    /// the game component when it is part of the run.
    pub game_version: Option<String>,
    /// Utilities directory relative to the pack root, searched for
    /// executables when a utility configures none.
    pub utilities_dir: String,
}

/// Plans and executes a run.
#[derive(Debug)]
pub struct Pipeline {
    resolver: VersionResolver,
    cache: ArtifactCache,
    extractor: Extractor,
    options: PipelineOptions,
}

impl Pipeline {
    #[must_use]
    pub const fn new(
        resolver: VersionResolver,
        cache: ArtifactCache,
        extractor: Extractor,
        options: PipelineOptions,
    ) -> Self {
        Self {
            resolver,
            cache,
            extractor,
            options,
        }
    }

    #[must_use]
    pub const fn cache(&self) -> &ArtifactCache {
        &self.cache
    }

    /// Order, resolve and decide, without touching the cache or the pack.
    pub async fn plan(&self, registry: &Registry, state: &dyn InstallState) -> Result<Plan> {
        Ok(self.prepare(registry, state).await?.plan)
    }

    /// Like [`Pipeline::plan`], also returning each component left out of the
    /// run with the reason.
    pub async fn plan_with_excluded(
        &self,
        registry: &Registry,
        state: &dyn InstallState,
    ) -> Result<(Plan, Vec<(String, String)>)> {
        let prepared = self.prepare(registry, state).await?;
        Ok((prepared.plan, prepared.excluded))
    }

    async fn prepare(&self, registry: &Registry, state: &dyn InstallState) -> Result<Prepared> {
        let planner = Planner::new(registry, self.options.target).force(self.options.force);
        let order = planner.order()?;

        let resolved = self.resolver.resolve_all(order.components.iter().copied()).await;
        if let Err(e) = self.resolver.cache().save() {
            warn!("Cannot save resolver metadata cache: {e:#}");
        }

        let game_version = self.options.game_version.clone().or_else(|| {
            resolved.get(GAME_COMPONENT).and_then(|r| r.as_ref().ok()).map(|r| r.version.clone())
        });
        let order = planner.check_dfhack(order, &resolved, game_version.as_deref());
        let excluded = order
            .excluded
            .iter()
            .map(|(component, reason)| (component.name.clone(), reason.to_string()))
            .collect();

        Ok(Prepared {
            plan: planner.decide(&order, &resolved, state),
            excluded,
            game_version,
        })
    }

    /// Execute a full run.
    ///
    /// Returns `Err` only for fatal problems: configuration errors, the run
    /// timing out or being interrupted, or the manifest not being writable.
    pub async fn run(&self, registry: &Registry, state: &mut dyn InstallState) -> Result<RunReport> {
        let timeout = self.options.timeout;
        tokio::select! {
            report = self.run_inner(registry, state) => report,
            () = interrupted() => {
                warn!("Interrupted, abandoning in-flight downloads");
                anyhow::bail!("Run interrupted")
            }
            () = tokio::time::sleep(timeout) => {
                warn!("Run exceeded {}s, abandoning in-flight downloads", timeout.as_secs());
                anyhow::bail!("Run timed out after {}s", timeout.as_secs())
            }
        }
    }

    async fn run_inner(
        &self,
        registry: &Registry,
        state: &mut dyn InstallState,
    ) -> Result<RunReport> {
        let Prepared {
            plan,
            excluded,
            game_version,
        } = self.prepare(registry, state).await?;
        let mut report = RunReport {
            excluded,
            ..RunReport::default()
        };

        let versions = Arc::new(plan.versions());
        let mut blocked = self.unresolved_placeholders(&plan, &versions);

        let progress = ProgressBar::new(
            (plan.entries.iter().filter(|e| e.needs_download()).count() - blocked.len()) as u64,
            self.options.show_progress,
        );
        let mut downloads = self.spawn_downloads(&plan, &blocked, &progress);
        let mut finished = HashMap::new();

        let mut merger = ManifestMerger::new(self.options.target.os).with_game_version(game_version);

        for (index, entry) in plan.entries.iter().enumerate() {
            let name = entry.name();
            let resolved = match (&entry.resolved, entry.action) {
                (Err(e), _) => {
                    report.fail(name, Stage::Resolve, e.to_string());
                    continue;
                }
                (Ok(resolved), Action::Skip) => {
                    debug!("'{}' is up to date at {}", name, resolved.version);
                    report.skipped.push(name.to_string());
                    let dir = self.install_dir(&entry.component, &versions);
                    merger.merge(&entry.component, &resolved.version, Some(&dir));
                    continue;
                }
                (Ok(resolved), _) => resolved,
            };
            if let Some(e) = blocked.remove(&index) {
                report.fail(name, Stage::Extract, e.to_string());
                continue;
            }

            let artifact = match wait_for(index, &mut downloads, &mut finished).await {
                Ok(artifact) => artifact,
                Err(e) => {
                    report.fail(name, Stage::Download, e.to_string());
                    continue;
                }
            };

            let extractor = self.extractor.clone();
            let component = entry.component.clone();
            let archive = artifact.path.clone();
            let table = Arc::clone(&versions);
            let extracted =
                tokio::task::spawn_blocking(move || extractor.extract(&component, &archive, &table))
                    .await;
            match extracted {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    report.fail(name, Stage::Extract, e.to_string());
                    continue;
                }
                Err(e) => {
                    report.fail(name, Stage::Extract, format!("extraction task failed: {e}"));
                    continue;
                }
            }

            let record = LockedComponent {
                name: name.to_string(),
                version: resolved.version.clone(),
                updated: resolved.updated,
                filename: resolved.filename.clone(),
                checksum: Some(format!("sha256:{}", artifact.sha256)),
                installed_at: Utc::now(),
            };
            if let Err(e) = state.record(record) {
                report.fail(name, Stage::Record, format!("{e:#}"));
            } else if let Some(previous) = &entry.installed_version {
                info!("Updated '{}' {} -> {}", name, previous, resolved.version);
                report.updated.push(UpdatedComponent {
                    name: name.to_string(),
                    from: previous.clone(),
                    to: resolved.version.clone(),
                });
            } else {
                info!("Installed '{}' {}", name, resolved.version);
                report.installed.push((name.to_string(), resolved.version.clone()));
            }

            let dir = self.install_dir(&entry.component, &versions);
            merger.merge(&entry.component, &resolved.version, Some(&dir));
        }
        progress.finish_and_clear();

        report.warnings.extend(merger.conflicts().iter().map(ToString::to_string));
        report.warnings.extend(merger.warnings().iter().cloned());
        merger.into_manifest().write(&self.options.manifest_path).with_context(|| {
            format!("Cannot write manifest: {}", self.options.manifest_path.display())
        })?;

        info!(
            "Run finished: {} installed, {} updated, {} skipped, {} failed",
            report.installed.len(),
            report.updated.len(),
            report.skipped.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Start one download task per entry that needs an artifact.
    fn spawn_downloads(
        &self,
        plan: &Plan,
        blocked: &HashMap<usize, ExtractionError>,
        progress: &ProgressBar,
    ) -> JoinSet<DownloadResult> {
        let semaphore = Arc::new(Semaphore::new(self.options.max_parallel.max(1)));
        let mut downloads = JoinSet::new();

        for (index, entry) in plan.entries.iter().enumerate() {
            if !entry.needs_download() || blocked.contains_key(&index) {
                continue;
            }
            let Ok(resolved) = entry.resolved.clone() else {
                continue;
            };
            let cache = self.cache.clone();
            let semaphore = Arc::clone(&semaphore);
            let progress = progress.clone();
            let name = entry.name().to_string();

            downloads.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => {
                        progress.set_message(name.clone());
                        cache.fetch(&name, &resolved).await
                    }
                    Err(_) => Err(DownloadError::Cancelled {
                        url: resolved.dl_link.clone(),
                    }),
                };
                progress.inc(1);
                (index, result)
            });
        }

        debug!("Spawned {} download(s)", downloads.len());
        downloads
    }

    /// Entries whose rules need a version no component resolved to.
    ///
    /// These fail before their artifact is downloaded.
    fn unresolved_placeholders(
        &self,
        plan: &Plan,
        versions: &HashMap<String, String>,
    ) -> HashMap<usize, ExtractionError> {
        plan.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.needs_download())
            .filter_map(|(index, entry)| {
                self.extractor
                    .version_dependencies(&entry.component)
                    .into_iter()
                    .find(|name| !versions.contains_key(name))
                    .map(|referenced| {
                        debug!(
                            "'{}' needs the version of '{}', which did not resolve",
                            entry.name(),
                            referenced
                        );
                        (index, ExtractionError::UnresolvedPlaceholder {
                            referenced,
                        })
                    })
            })
            .collect()
    }

    /// Directory searched for executables and an upstream manifest.
    fn install_dir(&self, component: &Component, versions: &HashMap<String, String>) -> PathBuf {
        self.extractor.install_dir(component, versions).unwrap_or_else(|| {
            self.extractor.pack_root().join(&self.options.utilities_dir).join(&component.name)
        })
    }
}

/// Completes on Ctrl-C; never, if the signal cannot be watched.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        debug!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Wait until the download for plan entry `index` has finished.
///
/// Results of other downloads completing first are kept in `finished`.
async fn wait_for(
    index: usize,
    downloads: &mut JoinSet<DownloadResult>,
    finished: &mut HashMap<usize, Result<CachedArtifact, DownloadError>>,
) -> Result<CachedArtifact, DownloadError> {
    loop {
        if let Some(result) = finished.remove(&index) {
            return result;
        }
        match downloads.join_next().await {
            Some(Ok((done, result))) => {
                finished.insert(done, result);
            }
            Some(Err(e)) => warn!("Download task failed: {}", e),
            None => {
                return Err(DownloadError::Cancelled {
                    url: format!("download #{index}"),
                });
            }
        }
    }
}
