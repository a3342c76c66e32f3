//! Loading `components.yml` into a [`Registry`].
//!
//! The file has three top-level groups, `files`, `utilities` and `graphics`,
//! each mapping component names to their definition. Declaration order is
//! preserved across groups and becomes [`Component::index`].
//!
//! Before a definition is parsed, the architecture variant block matching the
//! target bit-width (`32bit` or `64bit`) is merged over it; the other block is
//! dropped.

use super::{
    Category, Component, ExtractTo, Host, ManifestFragment, ManualRelease, Registry,
};
use crate::core::{Bits, ConfigError, Os};
use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::path::Path;
use tracing::debug;

/// Pack-relative directories used for default extraction targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Layout {
    pub utilities: String,
    pub graphics: String,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            utilities: "LNP/Utilities".to_string(),
            graphics: "LNP/Graphics".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawComponent {
    bay12: Option<Value>,
    host: Option<String>,
    ident: Option<Value>,
    dl_link: Option<String>,
    version: Option<Value>,
    updated: Option<Value>,
    extract_to: Option<RawExtractTo>,
    install_after: Option<OneOrMany>,
    requires_os: Option<Os>,
    requires_bits: Option<Bits>,
    #[serde(default)]
    needs_dfhack: bool,
    manifest: Option<IndexMap<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawExtractTo {
    Rule(String),
    PerOs(IndexMap<String, String>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_names(self) -> Vec<String> {
        let names = match self {
            Self::One(name) => vec![name],
            Self::Many(names) => names,
        };
        names.into_iter().map(|n| n.trim().to_string()).filter(|n| !n.is_empty()).collect()
    }
}

/// Read and parse a components file.
pub fn load(path: &Path, bits: Bits, layout: &Layout) -> Result<Registry, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::NotFound {
                path: path.display().to_string(),
            }
        } else {
            ConfigError::Parse {
                file: path.display().to_string(),
                reason: e.to_string(),
            }
        }
    })?;
    parse(&content, &path.display().to_string(), bits, layout)
}

/// Parse components YAML. `file` only labels error messages.
pub fn parse(content: &str, file: &str, bits: Bits, layout: &Layout) -> Result<Registry, ConfigError> {
    let parse_error = |reason: String| ConfigError::Parse {
        file: file.to_string(),
        reason,
    };

    let root: IndexMap<String, Option<IndexMap<String, Value>>> =
        serde_yaml::from_str(content).map_err(|e| parse_error(e.to_string()))?;

    let mut components = Vec::new();
    for (group, entries) in root {
        let category = Category::from_yaml_key(&group).ok_or_else(|| {
            parse_error(format!(
                "unknown top-level key '{group}' (expected files, utilities or graphics)"
            ))
        })?;

        for (name, value) in entries.unwrap_or_default() {
            let index = components.len();
            let component = parse_component(&name, category, value, index, bits, layout)?;
            debug!("Loaded component '{}' ({}, host {})", name, category, component.host);
            components.push(component);
        }
    }

    Registry::new(components)
}

fn parse_component(
    name: &str,
    category: Category,
    value: Value,
    index: usize,
    bits: Bits,
    layout: &Layout,
) -> Result<Component, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidComponent {
        component: name.to_string(),
        reason,
    };

    let mapping = match value {
        Value::Mapping(m) => m,
        Value::Null => Mapping::new(),
        _ => return Err(invalid("definition must be a mapping".to_string())),
    };
    let merged = merge_variant(mapping, bits);
    let raw: RawComponent =
        serde_yaml::from_value(Value::Mapping(merged)).map_err(|e| invalid(e.to_string()))?;

    let bay12 = raw
        .bay12
        .as_ref()
        .and_then(scalar_to_string)
        .ok_or_else(|| invalid("missing required key 'bay12'".to_string()))?;

    let ident = raw.ident.as_ref().and_then(scalar_to_string);
    let host = match raw.host.as_deref() {
        Some(explicit) => Host::parse(explicit),
        None => infer_host(ident.as_deref(), category),
    };

    let manual = if host == Host::Manual {
        Some(parse_manual(&raw).map_err(invalid)?)
    } else {
        if ident.is_none() && !matches!(host, Host::Unknown(_)) {
            return Err(invalid(format!("missing required key 'ident' for host {host}")));
        }
        None
    };

    let extract_to = match raw.extract_to {
        Some(RawExtractTo::Rule(rule)) => ExtractTo::Single(rule),
        Some(RawExtractTo::PerOs(rules)) => {
            let mut per_os = IndexMap::new();
            for (key, rule) in rules {
                let os = key
                    .strip_prefix("os-")
                    .and_then(|k| k.parse::<Os>().ok())
                    .ok_or_else(|| invalid(format!("unknown extract_to key '{key}'")))?;
                per_os.insert(os, rule);
            }
            ExtractTo::PerOs(per_os)
        }
        None => match category {
            Category::File => return Err(invalid("files must set extract_to".to_string())),
            Category::Utility => ExtractTo::Single(format!("{}/{name}/", layout.utilities)),
            Category::Graphics => ExtractTo::Single(format!("{}/{name}/", layout.graphics)),
        },
    };

    let manifest = raw.manifest.map(|mut fields| {
        let entry = fields.shift_remove("entry").and_then(|v| v.as_str().map(str::to_string));
        ManifestFragment {
            entry,
            fields,
        }
    });

    Ok(Component {
        name: name.to_string(),
        category,
        bay12,
        host,
        ident,
        manual,
        extract_to,
        install_after: raw.install_after.map(OneOrMany::into_names).unwrap_or_default(),
        requires_os: raw.requires_os,
        requires_bits: raw.requires_bits,
        needs_dfhack: raw.needs_dfhack,
        manifest,
        index,
    })
}

/// Merge the variant block for `bits` over the base keys and drop both blocks.
fn merge_variant(mut mapping: Mapping, bits: Bits) -> Mapping {
    let wanted = mapping.remove(Value::String(bits.variant_key()));
    mapping.remove(Value::String(bits.opposite().variant_key()));
    if let Some(Value::Mapping(overrides)) = wanted {
        for (key, value) in overrides {
            mapping.insert(key, value);
        }
    }
    mapping
}

/// `dffd` for numeric identifiers, `github-source` for graphics, else `github-asset`.
#[must_use]
pub fn infer_host(ident: Option<&str>, category: Category) -> Host {
    let numeric = ident.is_some_and(|i| !i.is_empty() && i.chars().all(|c| c.is_ascii_digit()));
    if numeric {
        Host::Dffd
    } else if category == Category::Graphics {
        Host::GithubSource
    } else {
        Host::GithubAsset
    }
}

fn parse_manual(raw: &RawComponent) -> Result<ManualRelease, String> {
    let version = raw
        .version
        .as_ref()
        .and_then(scalar_to_string)
        .ok_or("manual components must set 'version'")?;
    let updated_text = raw
        .updated
        .as_ref()
        .and_then(scalar_to_string)
        .ok_or("manual components must set 'updated'")?;
    let updated = NaiveDate::parse_from_str(updated_text.trim(), "%Y-%m-%d")
        .map_err(|e| format!("'updated' must be YYYY-MM-DD ({e})"))?;
    let dl_link = raw.dl_link.clone().ok_or("manual components must set 'dl_link'")?;
    Ok(ManualRelease {
        version,
        updated,
        dl_link,
    })
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
