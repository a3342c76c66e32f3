//! Version resolution across hosting services.
//!
//! Given a component's [`Host`] and identifier, the resolver produces a
//! [`ResolvedVersion`]: the latest version string, when it was published,
//! where to download it and the file name to cache it under.
//!
//! Each host kind has its own module and algorithm; [`VersionResolver`]
//! dispatches on the host tag:
//!
//! | Host            | Module        | Source of truth                               |
//! |-----------------|---------------|-----------------------------------------------|
//! | `dffd`          | [`dffd`]      | `file_data/{id}.json`                          |
//! | `github-asset`  | [`github`]    | latest release, best-matching asset           |
//! | `github-source` | [`github`]    | latest release, source zipball                |
//! | `bitbucket`     | [`bitbucket`] | repository downloads, best-matching file      |
//! | `manual`        | (inline)      | `version` / `updated` / `dl_link` from config |
//!
//! Resolutions are independent: [`VersionResolver::resolve_all`] runs them on
//! a bounded concurrent pool and returns one result per component, so an
//! outage of one host only fails the components on that host.

pub mod asset;
pub mod bitbucket;
pub mod cache;
pub mod dffd;
pub mod github;

use crate::constants::{DEFAULT_BITBUCKET_API_URL, DEFAULT_DFFD_URL, DEFAULT_GITHUB_API_URL};
use crate::core::{ResolutionError, TargetPlatform};
use crate::registry::{Component, Host};
use crate::utils::http::{HttpClient, HttpError};
use chrono::{DateTime, NaiveTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

pub use cache::MetadataCache;

/// The `(version, updated, dl_link)` triple for one component in this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedVersion {
    /// Opaque, host-defined; only compared for equality.
    pub version: String,
    pub updated: DateTime<Utc>,
    pub dl_link: String,
    /// Name to store the artifact under in the cache.
    pub filename: String,
}

impl ResolvedVersion {
    /// Whole days between the release and `now`.
    #[must_use]
    pub fn days_since_update(&self, now: DateTime<Utc>) -> i64 {
        (now - self.updated).num_days()
    }
}

/// Base URLs of the host APIs. Overridable so tests can point at a local server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub dffd: String,
    pub github_api: String,
    pub bitbucket_api: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            dffd: DEFAULT_DFFD_URL.to_string(),
            github_api: DEFAULT_GITHUB_API_URL.to_string(),
            bitbucket_api: DEFAULT_BITBUCKET_API_URL.to_string(),
        }
    }
}

/// Resolves components to their latest versions.
#[derive(Debug)]
pub struct VersionResolver {
    http: HttpClient,
    cache: MetadataCache,
    endpoints: Endpoints,
    target: TargetPlatform,
    include_prereleases: bool,
    max_parallel: usize,
}

impl VersionResolver {
    #[must_use]
    pub fn new(
        http: HttpClient,
        cache: MetadataCache,
        endpoints: Endpoints,
        target: TargetPlatform,
    ) -> Self {
        Self {
            http,
            cache,
            endpoints,
            target,
            include_prereleases: false,
            max_parallel: crate::constants::default_max_parallel(),
        }
    }

    /// Consider GitHub prereleases as the latest release.
    #[must_use]
    pub const fn with_prereleases(mut self, include: bool) -> Self {
        self.include_prereleases = include;
        self
    }

    #[must_use]
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    #[must_use]
    pub const fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    pub(crate) const fn http(&self) -> &HttpClient {
        &self.http
    }

    pub(crate) const fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub(crate) const fn target(&self) -> TargetPlatform {
        self.target
    }

    pub(crate) const fn include_prereleases(&self) -> bool {
        self.include_prereleases
    }

    /// Resolve one component.
    pub async fn resolve(&self, component: &Component) -> Result<ResolvedVersion, ResolutionError> {
        match &component.host {
            Host::Manual => resolve_manual(component),
            Host::Dffd => dffd::resolve(self, require_ident(component)?).await,
            Host::GithubAsset => github::resolve_asset(self, require_ident(component)?).await,
            Host::GithubSource => github::resolve_source(self, require_ident(component)?).await,
            Host::Bitbucket => bitbucket::resolve(self, require_ident(component)?).await,
            Host::Unknown(name) => Err(ResolutionError::UnknownHost(name.clone())),
        }
    }

    /// Resolve many components concurrently, at most `max_parallel` at once.
    ///
    /// Every component gets an entry in the result, success or failure.
    pub async fn resolve_all<'a, I>(
        &self,
        components: I,
    ) -> HashMap<String, Result<ResolvedVersion, ResolutionError>>
    where
        I: IntoIterator<Item = &'a Component>,
    {
        let results: Vec<_> = stream::iter(components)
            .map(|component| async move {
                let result = self.resolve(component).await;
                match &result {
                    Ok(resolved) => debug!(
                        "Resolved '{}' to {} ({})",
                        component.name, resolved.version, resolved.filename
                    ),
                    Err(e) => warn!("Cannot resolve '{}': {}", component.name, e),
                }
                (component.name.clone(), result)
            })
            .buffer_unordered(self.max_parallel)
            .collect()
            .await;

        let failed = results.iter().filter(|(_, r)| r.is_err()).count();
        info!("Resolved {} component(s), {} failed", results.len() - failed, failed);
        results.into_iter().collect()
    }
}

fn require_ident(component: &Component) -> Result<&str, ResolutionError> {
    component.ident.as_deref().ok_or_else(|| ResolutionError::MissingIdent {
        host: component.host.to_string(),
    })
}

/// Manual components carry their resolved fields in configuration.
fn resolve_manual(component: &Component) -> Result<ResolvedVersion, ResolutionError> {
    let manual = component.manual.as_ref().ok_or_else(|| ResolutionError::UnexpectedResponse {
        host: "manual".to_string(),
        ident: component.name.clone(),
        reason: "no version configured".to_string(),
    })?;
    Ok(ResolvedVersion {
        version: manual.version.clone(),
        updated: manual.updated.and_time(NaiveTime::MIN).and_utc(),
        dl_link: manual.dl_link.clone(),
        filename: asset::file_name(&manual.dl_link).to_string(),
    })
}

/// Map a transport failure onto the resolution taxonomy.
pub(crate) fn http_failure(host: &Host, ident: &str, error: HttpError) -> ResolutionError {
    match error {
        HttpError::Body(reason) => ResolutionError::UnexpectedResponse {
            host: host.to_string(),
            ident: ident.to_string(),
            reason,
        },
        other => ResolutionError::Unreachable {
            host: host.to_string(),
            ident: ident.to_string(),
            reason: other.to_string(),
        },
    }
}

pub(crate) fn unexpected(host: &Host, ident: &str, reason: impl Into<String>) -> ResolutionError {
    ResolutionError::UnexpectedResponse {
        host: host.to_string(),
        ident: ident.to_string(),
        reason: reason.into(),
    }
}
