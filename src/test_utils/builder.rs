//! Builder for registry components in tests.

use crate::core::{Bits, Os};
use crate::registry::{
    Category, Component, ExtractTo, Host, ManifestFragment, ManualRelease, Registry,
};
use chrono::NaiveDate;
use indexmap::IndexMap;

/// Fluent builder for a [`Component`].
///
/// Defaults to a `utility` hosted on `github-asset` with ident `owner/<name>`
/// and the default utility extraction rule.
#[derive(Debug, Clone)]
pub struct ComponentBuilder {
    component: Component,
}

impl ComponentBuilder {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            component: Component {
                name: name.to_string(),
                category: Category::Utility,
                bay12: "1".to_string(),
                host: Host::GithubAsset,
                ident: Some(format!("owner/{}", name.to_lowercase().replace(' ', "-"))),
                manual: None,
                extract_to: ExtractTo::Single(format!("LNP/Utilities/{name}/")),
                install_after: Vec::new(),
                requires_os: None,
                requires_bits: None,
                needs_dfhack: false,
                manifest: None,
                index: 0,
            },
        }
    }

    #[must_use]
    pub fn category(mut self, category: Category) -> Self {
        self.component.category = category;
        self
    }

    #[must_use]
    pub fn host(mut self, host: Host, ident: &str) -> Self {
        self.component.host = host;
        self.component.ident = Some(ident.to_string());
        self
    }

    /// A `manual` component downloading from `dl_link`.
    #[must_use]
    pub fn manual(mut self, version: &str, dl_link: &str) -> Self {
        self.component.host = Host::Manual;
        self.component.ident = None;
        self.component.manual = Some(ManualRelease {
            version: version.to_string(),
            updated: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default(),
            dl_link: dl_link.to_string(),
        });
        self
    }

    #[must_use]
    pub fn extract_to(mut self, rule: &str) -> Self {
        self.component.extract_to = ExtractTo::Single(rule.to_string());
        self
    }

    #[must_use]
    pub fn extract_to_os(mut self, os: Os, rule: &str) -> Self {
        let mut rules = match std::mem::replace(
            &mut self.component.extract_to,
            ExtractTo::PerOs(IndexMap::new()),
        ) {
            ExtractTo::PerOs(rules) => rules,
            ExtractTo::Single(_) => IndexMap::new(),
        };
        rules.insert(os, rule.to_string());
        self.component.extract_to = ExtractTo::PerOs(rules);
        self
    }

    #[must_use]
    pub fn after(mut self, names: &[&str]) -> Self {
        self.component.install_after = names.iter().map(|n| (*n).to_string()).collect();
        self
    }

    #[must_use]
    pub fn requires_os(mut self, os: Os) -> Self {
        self.component.requires_os = Some(os);
        self
    }

    #[must_use]
    pub fn requires_bits(mut self, bits: Bits) -> Self {
        self.component.requires_bits = Some(bits);
        self
    }

    #[must_use]
    pub fn needs_dfhack(mut self) -> Self {
        self.component.needs_dfhack = true;
        self
    }

    /// Add a manifest field, optionally targeting a shared entry.
    #[must_use]
    pub fn manifest(mut self, entry: Option<&str>, key: &str, value: serde_json::Value) -> Self {
        let fragment = self.component.manifest.get_or_insert_with(ManifestFragment::default);
        if let Some(entry) = entry {
            fragment.entry = Some(entry.to_string());
        }
        fragment.fields.insert(key.to_string(), value);
        self
    }

    #[must_use]
    pub fn build(self) -> Component {
        self.component
    }
}

/// Build a registry from builders, numbering them in order.
pub fn registry(builders: Vec<ComponentBuilder>) -> Registry {
    let components = builders
        .into_iter()
        .enumerate()
        .map(|(index, b)| {
            let mut component = b.build();
            component.index = index;
            component
        })
        .collect();
    Registry::new(components).unwrap_or_else(|e| panic!("invalid test registry: {e}"))
}
