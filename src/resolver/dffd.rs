//! Dwarf Fortress File Depot.
//!
//! `GET {dffd}/file_data/{id}.json` describes the current upload of a file:
//! its version string, upload time as unix seconds, and usually its file
//! name. Downloads always go through `download.php`, which redirects to the
//! current upload.

use super::{ResolvedVersion, VersionResolver, http_failure, unexpected};
use crate::core::ResolutionError;
use crate::registry::Host;
use crate::utils::http::JsonResponse;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DffdRecord {
    pub version: String,
    pub updated_timestamp: i64,
    pub filename: Option<String>,
}

pub async fn resolve(resolver: &VersionResolver, id: &str) -> Result<ResolvedVersion, ResolutionError> {
    let key = format!("dffd:{id}");
    let record = match resolver.cache().fresh::<DffdRecord>(&key) {
        Some(record) => record,
        None => {
            let record = fetch(resolver, id).await?;
            resolver.cache().store(&key, &record);
            record
        }
    };

    let base = resolver.endpoints().dffd.trim_end_matches('/');
    let updated = DateTime::<Utc>::from_timestamp(record.updated_timestamp, 0)
        .ok_or_else(|| unexpected(&Host::Dffd, id, "updated_timestamp out of range"))?;
    let filename = record
        .filename
        .clone()
        .filter(|f| !f.trim().is_empty())
        .unwrap_or_else(|| format!("dffd_{id}_{}", record.version));

    Ok(ResolvedVersion {
        version: record.version,
        updated,
        dl_link: format!("{base}/download.php?id={id}&f=b"),
        filename,
    })
}

async fn fetch(resolver: &VersionResolver, id: &str) -> Result<DffdRecord, ResolutionError> {
    let base = resolver.endpoints().dffd.trim_end_matches('/');
    let url = format!("{base}/file_data/{id}.json");
    let body = match resolver
        .http()
        .get_json(&url, None, false)
        .await
        .map_err(|e| http_failure(&Host::Dffd, id, e))?
    {
        JsonResponse::Fresh(body) => body,
        JsonResponse::NotModified => {
            return Err(unexpected(&Host::Dffd, id, "unexpected 304 Not Modified"));
        }
    };
    parse_record(&body).map_err(|reason| unexpected(&Host::Dffd, id, reason))
}

#[allow(clippy::cast_precision_loss)]
const I64_BOUND: f64 = i64::MAX as f64;

/// Both fields appear as strings or numbers depending on the file.
pub fn parse_record(body: &Value) -> Result<DffdRecord, String> {
    let version = match body.get("version") {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => return Err("missing 'version'".to_string()),
    };
    let updated_timestamp = match body.get("updated_timestamp") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|t| t.is_finite() && t.abs() < I64_BOUND)
    .ok_or("missing or invalid 'updated_timestamp'")?;
    let filename = body.get("filename").and_then(Value::as_str).map(str::to_string);

    #[allow(clippy::cast_possible_truncation)]
    let updated_timestamp = updated_timestamp as i64;
    Ok(DffdRecord {
        version,
        updated_timestamp,
        filename,
    })
}
