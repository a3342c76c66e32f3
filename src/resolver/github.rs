//! GitHub releases.
//!
//! Both GitHub host kinds read the same release record:
//!
//! - `github-asset` downloads the release asset best matching the target
//!   platform (see [`super::asset::best_asset`]);
//! - `github-source` downloads the release's source zipball.
//!
//! Stable runs ask for `/releases/latest`; with prereleases enabled the first
//! entry of `/releases` is used. When an expired cache record exists the
//! request carries `If-Modified-Since`, and a `304` reuses that record.

use super::asset::{best_asset, file_name};
use super::{ResolvedVersion, VersionResolver, http_failure, unexpected};
use crate::core::ResolutionError;
use crate::registry::Host;
use crate::utils::fs::sanitize_segment;
use crate::utils::http::JsonResponse;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubRelease {
    pub tag: String,
    pub published_at: DateTime<Utc>,
    /// `browser_download_url` of every asset, in API order.
    pub assets: Vec<String>,
    pub zipball_url: String,
}

pub async fn resolve_asset(
    resolver: &VersionResolver,
    repo: &str,
) -> Result<ResolvedVersion, ResolutionError> {
    let release = release(resolver, repo, &Host::GithubAsset).await?;
    let target = resolver.target();
    let url = best_asset(&release.assets, target.os, target.bits, true)
        .ok_or_else(|| ResolutionError::NoAssets {
            ident: repo.to_string(),
        })?
        .to_string();

    Ok(ResolvedVersion {
        filename: file_name(&url).to_string(),
        version: release.tag,
        updated: release.published_at,
        dl_link: url,
    })
}

pub async fn resolve_source(
    resolver: &VersionResolver,
    repo: &str,
) -> Result<ResolvedVersion, ResolutionError> {
    let release = release(resolver, repo, &Host::GithubSource).await?;
    let filename = format!("{}_{}.zip", repo.replace('/', "_"), sanitize_segment(&release.tag));

    Ok(ResolvedVersion {
        version: release.tag,
        updated: release.published_at,
        dl_link: release.zipball_url,
        filename,
    })
}

async fn release(
    resolver: &VersionResolver,
    repo: &str,
    host: &Host,
) -> Result<GithubRelease, ResolutionError> {
    let prerelease = resolver.include_prereleases();
    let key = if prerelease { format!("github-pre:{repo}") } else { format!("github:{repo}") };

    if let Some(record) = resolver.cache().fresh::<GithubRelease>(&key) {
        return Ok(record);
    }
    let stale = resolver.cache().stale::<GithubRelease>(&key);

    let base = resolver.endpoints().github_api.trim_end_matches('/');
    let url = if prerelease {
        format!("{base}/repos/{repo}/releases")
    } else {
        format!("{base}/repos/{repo}/releases/latest")
    };

    let response = resolver
        .http()
        .get_json(&url, stale.as_ref().map(|(_, fetched)| *fetched), true)
        .await
        .map_err(|e| http_failure(host, repo, e))?;

    match (response, stale) {
        (JsonResponse::NotModified, Some((record, _))) => {
            debug!("Release of {} not modified, reusing cached record", repo);
            resolver.cache().touch(&key);
            Ok(record)
        }
        (JsonResponse::NotModified, None) => {
            Err(unexpected(host, repo, "304 Not Modified without a cached record"))
        }
        (JsonResponse::Fresh(body), _) => {
            let release_json = if prerelease {
                body.get(0).cloned().ok_or_else(|| unexpected(host, repo, "no releases"))?
            } else {
                body
            };
            let record =
                parse_release(&release_json).map_err(|reason| unexpected(host, repo, reason))?;
            resolver.cache().store(&key, &record);
            Ok(record)
        }
    }
}

pub fn parse_release(body: &Value) -> Result<GithubRelease, String> {
    let tag = body
        .get("tag_name")
        .and_then(Value::as_str)
        .map(|t| t.trim().to_string())
        .ok_or("missing 'tag_name'")?;
    let published_at = body
        .get("published_at")
        .and_then(Value::as_str)
        .ok_or("missing 'published_at'")?;
    let published_at = DateTime::parse_from_rfc3339(published_at)
        .map_err(|e| format!("invalid 'published_at': {e}"))?
        .with_timezone(&Utc);
    let assets = body
        .get("assets")
        .and_then(Value::as_array)
        .map(|assets| {
            assets
                .iter()
                .filter_map(|a| a.get("browser_download_url").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let zipball_url = body
        .get("zipball_url")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or("missing 'zipball_url'")?;

    Ok(GithubRelease {
        tag,
        published_at,
        assets,
        zipball_url,
    })
}
