//! Component registry.
//!
//! The registry holds the declarative definition of every component in the
//! pack, in declaration order. It is built once per run from
//! `components.yml` (see [`loader`]) and is immutable afterwards; resolved
//! versions live in the resolver's output, never on the [`Component`].

pub mod loader;

use crate::constants::FORUM_TOPIC_URL;
use crate::core::{Bits, Os};
use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub use loader::Layout;

/// Top-level group a component is declared under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    File,
    Utility,
    Graphics,
}

impl Category {
    /// The YAML key this category is declared under.
    #[must_use]
    pub const fn yaml_key(self) -> &'static str {
        match self {
            Self::File => "files",
            Self::Utility => "utilities",
            Self::Graphics => "graphics",
        }
    }

    #[must_use]
    pub fn from_yaml_key(key: &str) -> Option<Self> {
        match key {
            "files" => Some(Self::File),
            "utilities" => Some(Self::Utility),
            "graphics" => Some(Self::Graphics),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.yaml_key())
    }
}

/// Service a component's artifact is fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Host {
    Dffd,
    GithubAsset,
    GithubSource,
    Bitbucket,
    Manual,
    /// A host name nothing knows how to resolve. Kept so the failure is
    /// reported against the component instead of aborting the load.
    Unknown(String),
}

impl Host {
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "dffd" => Self::Dffd,
            "github-asset" => Self::GithubAsset,
            "github-source" => Self::GithubSource,
            "bitbucket" => Self::Bitbucket,
            "manual" => Self::Manual,
            other => Self::Unknown(other.to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Dffd => "dffd",
            Self::GithubAsset => "github-asset",
            Self::GithubSource => "github-source",
            Self::Bitbucket => "bitbucket",
            Self::Manual => "manual",
            Self::Unknown(name) => name,
        }
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a component's files go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractTo {
    /// One rule for every OS.
    Single(String),
    /// Rules keyed by OS (`os-win`, `os-linux`, `os-osx`).
    PerOs(IndexMap<Os, String>),
}

impl ExtractTo {
    /// The rule text that applies on `os`, if any.
    #[must_use]
    pub fn rule_for(&self, os: Os) -> Option<&str> {
        match self {
            Self::Single(rule) => Some(rule.as_str()),
            Self::PerOs(rules) => rules.get(&os).map(String::as_str),
        }
    }
}

/// Version information configured by hand for `host: manual` components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualRelease {
    pub version: String,
    pub updated: NaiveDate,
    pub dl_link: String,
}

/// A component's contribution to the pack-wide manifest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManifestFragment {
    /// Manifest entry the fields belong to. Defaults to the component name.
    pub entry: Option<String>,
    pub fields: IndexMap<String, serde_json::Value>,
}

/// One independently versioned, independently downloadable unit of the pack.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub name: String,
    pub category: Category,
    /// Forum thread identifier.
    pub bay12: String,
    pub host: Host,
    pub ident: Option<String>,
    pub manual: Option<ManualRelease>,
    pub extract_to: ExtractTo,
    pub install_after: Vec<String>,
    pub requires_os: Option<Os>,
    pub requires_bits: Option<Bits>,
    pub needs_dfhack: bool,
    pub manifest: Option<ManifestFragment>,
    /// Position in the configuration file; the planner's tie-break key.
    pub index: usize,
}

impl Component {
    #[must_use]
    pub fn forum_url(&self) -> String {
        format!("{FORUM_TOPIC_URL}{}", self.bay12)
    }

    #[must_use]
    pub fn extract_rule(&self, os: Os) -> Option<&str> {
        self.extract_to.rule_for(os)
    }

    /// Manifest entry this component writes to.
    #[must_use]
    pub fn manifest_entry(&self) -> &str {
        self.manifest.as_ref().and_then(|m| m.entry.as_deref()).unwrap_or(&self.name)
    }
}

/// All components of a pack, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    components: Vec<Component>,
    by_name: HashMap<String, usize>,
}

impl Registry {
    /// Build a registry, rejecting duplicate names.
    pub fn new(components: Vec<Component>) -> Result<Self, crate::core::ConfigError> {
        let mut by_name = HashMap::with_capacity(components.len());
        for (idx, component) in components.iter().enumerate() {
            if by_name.insert(component.name.clone(), idx).is_some() {
                return Err(crate::core::ConfigError::DuplicateName {
                    name: component.name.clone(),
                });
            }
        }
        Ok(Self {
            components,
            by_name,
        })
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Component> {
        self.by_name.get(name).map(|&idx| &self.components[idx])
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Component> {
        self.components.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.components.iter().map(|c| c.name.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Closest known component name, for "did you mean" hints.
    #[must_use]
    pub fn suggest(&self, unknown: &str) -> Option<String> {
        let lowered = unknown.to_lowercase();
        self.names()
            .map(|name| (name, strsim::levenshtein(&lowered, &name.to_lowercase())))
            .filter(|(_, distance)| *distance <= 3)
            .min_by_key(|(_, distance)| *distance)
            .map(|(name, _)| name.to_string())
    }
}
