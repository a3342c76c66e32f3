//! Install planning.
//!
//! Planning happens in two steps around version resolution:
//!
//! 1. [`Planner::order`] filters the registry down to the components eligible
//!    for the target platform, builds the `install_after` graph and produces a
//!    deterministic install order. Configuration problems (dangling
//!    references, cycles, no extraction rule for this OS) surface here, before
//!    any network activity.
//!
//!    Once versions are known, [`Planner::check_dfhack`] drops DFHack and
//!    everything needing it when DFHack's version does not mention the game
//!    version.
//! 2. [`Planner::decide`] compares each ordered component's resolved version
//!    with the installed version recorded in the [`InstallState`] store and
//!    picks an [`Action`].

pub mod dependency_graph;

use crate::constants::DFHACK_COMPONENT;
use crate::core::{ConfigError, ResolutionError, TargetPlatform};
use crate::lockfile::InstallState;
use crate::registry::{Component, Registry};
use crate::resolver::ResolvedVersion;
use chrono::{DateTime, Utc};
use dependency_graph::InstallGraph;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info, warn};

/// Why a component is not part of this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ineligible {
    Os,
    Bits,
    NoDfhack,
    DfhackIncompatible {
        dfhack: String,
        game: String,
    },
}

impl fmt::Display for Ineligible {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Os => f.write_str("requires another operating system"),
            Self::Bits => f.write_str("requires another bit-width"),
            Self::NoDfhack => f.write_str("needs DFHack, which is not part of this run"),
            Self::DfhackIncompatible {
                dfhack,
                game,
            } => write!(f, "DFHack {dfhack} does not support game version {game}"),
        }
    }
}

/// Eligible components in install order, plus what was filtered out.
#[derive(Debug, Clone)]
pub struct InstallOrder<'a> {
    pub components: Vec<&'a Component>,
    pub excluded: Vec<(&'a Component, Ineligible)>,
}

impl InstallOrder<'_> {
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.components.iter().map(|c| c.name.as_str()).collect()
    }
}

/// What to do with a component in this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Installed version equals the resolved one.
    Skip,
    /// Never installed before.
    Install,
    /// Installed at a different version.
    Update,
    /// Resolution failed; nothing will be installed.
    Failed,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Skip => "skip",
            Self::Install => "install",
            Self::Update => "update",
            Self::Failed => "failed",
        })
    }
}

/// One step of the plan.
#[derive(Debug, Clone)]
pub struct PlanEntry {
    pub component: Component,
    pub action: Action,
    pub resolved: Result<ResolvedVersion, ResolutionError>,
    /// Version recorded in the state store before this run.
    pub installed_version: Option<String>,
}

impl PlanEntry {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.component.name
    }

    #[must_use]
    pub const fn needs_download(&self) -> bool {
        matches!(self.action, Action::Install | Action::Update)
    }
}

/// Ordered, filtered install list with per-component actions.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub entries: Vec<PlanEntry>,
}

impl Plan {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PlanEntry> {
        self.entries.iter().find(|e| e.component.name == name)
    }

    /// Resolved version of every component that resolved in this run.
    ///
    /// This is the table extraction templates read sibling versions from.
    #[must_use]
    pub fn versions(&self) -> HashMap<String, String> {
        self.entries
            .iter()
            .filter_map(|e| e.resolved.as_ref().ok().map(|r| (e.name().to_string(), r.version.clone())))
            .collect()
    }

    #[must_use]
    pub fn count(&self, action: Action) -> usize {
        self.entries.iter().filter(|e| e.action == action).count()
    }

    /// Age, version and file name of every resolved component, newest first.
    #[must_use]
    pub fn status_report(&self, now: DateTime<Utc>) -> Vec<StatusRow> {
        let mut rows: Vec<StatusRow> = self
            .entries
            .iter()
            .filter_map(|e| {
                let resolved = e.resolved.as_ref().ok()?;
                Some(StatusRow {
                    name: e.name().to_string(),
                    age_days: resolved.days_since_update(now),
                    version: resolved.version.clone(),
                    filename: resolved.filename.clone(),
                    action: e.action,
                })
            })
            .collect();
        rows.sort_by(|a, b| a.age_days.cmp(&b.age_days).then_with(|| a.name.cmp(&b.name)));
        rows
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRow {
    pub name: String,
    pub age_days: i64,
    pub version: String,
    pub filename: String,
    pub action: Action,
}

/// Builds install plans for one target platform.
#[derive(Debug)]
pub struct Planner<'a> {
    registry: &'a Registry,
    target: TargetPlatform,
    force: bool,
}

impl<'a> Planner<'a> {
    #[must_use]
    pub const fn new(registry: &'a Registry, target: TargetPlatform) -> Self {
        Self {
            registry,
            target,
            force: false,
        }
    }

    /// Plan every resolved component for (re)installation.
    #[must_use]
    pub const fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Whether DFHack takes part in this run.
    #[must_use]
    pub fn dfhack_in_run(&self) -> bool {
        self.target.dfhack
            && self
                .registry
                .get(DFHACK_COMPONENT)
                .is_some_and(|c| self.platform_mismatch(c).is_none())
    }

    fn platform_mismatch(&self, component: &Component) -> Option<Ineligible> {
        if component.requires_os.is_some_and(|os| os != self.target.os) {
            return Some(Ineligible::Os);
        }
        if component.requires_bits.is_some_and(|bits| bits != self.target.bits) {
            return Some(Ineligible::Bits);
        }
        None
    }

    fn eligibility(&self, component: &Component, dfhack_in_run: bool) -> Option<Ineligible> {
        if let Some(reason) = self.platform_mismatch(component) {
            return Some(reason);
        }
        let is_dfhack = component.name == DFHACK_COMPONENT;
        if (is_dfhack && !self.target.dfhack) || (component.needs_dfhack && !dfhack_in_run) {
            return Some(Ineligible::NoDfhack);
        }
        None
    }

    /// Eligible components in a deterministic, dependency-respecting order.
    pub fn order(&self) -> Result<InstallOrder<'a>, ConfigError> {
        let dfhack_in_run = self.dfhack_in_run();
        let mut eligible = Vec::new();
        let mut excluded = Vec::new();

        for component in self.registry.iter() {
            let unknown = component.install_after.iter().find(|d| !self.registry.contains(d));

            match self.eligibility(component, dfhack_in_run) {
                Some(reason) => {
                    if let Some(dependency) = unknown {
                        warn!(
                            "'{}' names unknown install_after '{}'; ignored since it is excluded",
                            component.name, dependency
                        );
                    }
                    debug!("Excluding '{}': {}", component.name, reason);
                    excluded.push((component, reason));
                }
                None => {
                    if let Some(dependency) = unknown {
                        return Err(ConfigError::DanglingReference {
                            component: component.name.clone(),
                            missing: dependency.clone(),
                            suggestion: self.registry.suggest(dependency),
                        });
                    }
                    if component.extract_rule(self.target.os).is_none() {
                        return Err(ConfigError::NoExtractRule {
                            component: component.name.clone(),
                            os: self.target.os.to_string(),
                        });
                    }
                    eligible.push(component);
                }
            }
        }

        let mut graph = InstallGraph::new();
        for component in &eligible {
            graph.add_component(&component.name, component.index);
        }
        for component in &eligible {
            for dependency in &component.install_after {
                // References to ineligible components are already satisfied.
                if !graph.add_edge(dependency, &component.name) {
                    debug!(
                        "'{}' ignores install_after '{}', which is not in this run",
                        component.name, dependency
                    );
                }
            }
        }

        let names = graph.topological_order()?;
        let components = names.iter().filter_map(|name| self.registry.get(name)).collect();

        info!(
            "Planned {} component(s) for {}, {} excluded",
            eligible.len(),
            self.target,
            excluded.len()
        );
        Ok(InstallOrder {
            components,
            excluded,
        })
    }

    /// Leave DFHack and every `needs_dfhack` component out of `order` when
    /// DFHack resolved to a version that does not contain `game_version`.
    ///
    /// Without a game version, or without a resolved DFHack, `order` is
    /// returned unchanged.
    #[must_use]
    pub fn check_dfhack(
        &self,
        order: InstallOrder<'a>,
        resolved: &HashMap<String, Result<ResolvedVersion, ResolutionError>>,
        game_version: Option<&str>,
    ) -> InstallOrder<'a> {
        let (Some(game), Some(Ok(dfhack))) = (game_version, resolved.get(DFHACK_COMPONENT)) else {
            return order;
        };
        if dfhack.version.contains(game) {
            return order;
        }

        warn!(
            "DFHack {} does not support game version {}; leaving it and its dependents out",
            dfhack.version, game
        );
        let InstallOrder {
            components,
            mut excluded,
        } = order;
        let (components, dropped): (Vec<_>, Vec<_>) = components
            .into_iter()
            .partition(|c| c.name != DFHACK_COMPONENT && !c.needs_dfhack);
        excluded.extend(dropped.into_iter().map(|c| {
            (c, Ineligible::DfhackIncompatible {
                dfhack: dfhack.version.clone(),
                game: game.to_string(),
            })
        }));
        InstallOrder {
            components,
            excluded,
        }
    }

    /// Choose an action for every ordered component.
    ///
    /// Components missing from `resolved` are treated as failed resolutions.
    #[must_use]
    pub fn decide(
        &self,
        order: &InstallOrder<'_>,
        resolved: &HashMap<String, Result<ResolvedVersion, ResolutionError>>,
        state: &dyn InstallState,
    ) -> Plan {
        let entries = order
            .components
            .iter()
            .map(|component| {
                let installed_version =
                    state.installed(&component.name).map(|record| record.version.clone());
                let resolved = resolved.get(&component.name).cloned().unwrap_or_else(|| {
                    Err(ResolutionError::UnexpectedResponse {
                        host: component.host.to_string(),
                        ident: component.name.clone(),
                        reason: "component was not resolved".to_string(),
                    })
                });
                let action = match (&resolved, &installed_version) {
                    (Err(_), _) => Action::Failed,
                    (Ok(_), None) => Action::Install,
                    (Ok(_), Some(_)) if self.force => Action::Update,
                    (Ok(r), Some(installed)) if *installed == r.version => Action::Skip,
                    (Ok(_), Some(_)) => Action::Update,
                };
                debug!("'{}': {}", component.name, action);
                PlanEntry {
                    component: (*component).clone(),
                    action,
                    resolved,
                    installed_version,
                }
            })
            .collect();

        Plan {
            entries,
        }
    }
}
