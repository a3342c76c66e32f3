//! Bitbucket repository downloads.
//!
//! Bitbucket has no release API; the files uploaded to a repository's
//! downloads area are listed instead, the best one for the target platform is
//! picked, and the version is read from its file name.

use super::asset::{best_asset, file_name};
use super::{ResolvedVersion, VersionResolver, http_failure, unexpected};
use crate::core::ResolutionError;
use crate::registry::Host;
use crate::utils::http::JsonResponse;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitbucketDownload {
    pub href: String,
    pub created_on: String,
}

pub async fn resolve(resolver: &VersionResolver, repo: &str) -> Result<ResolvedVersion, ResolutionError> {
    let key = format!("bitbucket:{repo}");
    let downloads = match resolver.cache().fresh::<Vec<BitbucketDownload>>(&key) {
        Some(downloads) => downloads,
        None => {
            let downloads = fetch(resolver, repo).await?;
            resolver.cache().store(&key, &downloads);
            downloads
        }
    };

    let hrefs: Vec<String> = downloads.iter().map(|d| d.href.clone()).collect();
    let target = resolver.target();
    let href = best_asset(&hrefs, target.os, target.bits, false).ok_or_else(|| {
        ResolutionError::NoAssets {
            ident: repo.to_string(),
        }
    })?;
    let created_on = downloads
        .iter()
        .find(|d| d.href == href)
        .map(|d| d.created_on.as_str())
        .unwrap_or_default();
    let updated = parse_created_on(created_on)
        .ok_or_else(|| unexpected(&Host::Bitbucket, repo, format!("invalid created_on '{created_on}'")))?;

    let filename = file_name(href).to_string();
    Ok(ResolvedVersion {
        version: version_from_filename(&filename),
        updated,
        dl_link: href.to_string(),
        filename,
    })
}

async fn fetch(resolver: &VersionResolver, repo: &str) -> Result<Vec<BitbucketDownload>, ResolutionError> {
    let base = resolver.endpoints().bitbucket_api.trim_end_matches('/');
    let url = format!("{base}/repositories/{repo}/downloads?pagelen=100");
    let body = match resolver
        .http()
        .get_json(&url, None, false)
        .await
        .map_err(|e| http_failure(&Host::Bitbucket, repo, e))?
    {
        JsonResponse::Fresh(body) => body,
        JsonResponse::NotModified => {
            return Err(unexpected(&Host::Bitbucket, repo, "unexpected 304 Not Modified"));
        }
    };

    let values = body
        .get("values")
        .and_then(Value::as_array)
        .ok_or_else(|| unexpected(&Host::Bitbucket, repo, "missing 'values'"))?;

    Ok(values
        .iter()
        .filter_map(|v| {
            let href = v.pointer("/links/self/href")?.as_str()?;
            let created_on = v.get("created_on")?.as_str()?;
            Some(BitbucketDownload {
                href: href.to_string(),
                created_on: created_on.to_string(),
            })
        })
        .collect())
}

/// `PyLNP_0.14a-linux.tar.xz` → `0.14a`.
#[must_use]
pub fn version_from_filename(filename: &str) -> String {
    let base = filename.replace("PyLNP_", "").replace("tar.", "");
    let stem = match base.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => base.as_str(),
    };
    stem.split('-').next().unwrap_or(stem).to_string()
}

/// Bitbucket timestamps carry fractional seconds and an offset; only the
/// whole-second part is significant.
fn parse_created_on(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    let whole = value.split('.').next()?;
    NaiveDateTime::parse_from_str(whole, "%Y-%m-%dT%H:%M:%S").ok().map(|n| n.and_utc())
}
