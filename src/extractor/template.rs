//! Version placeholders in extraction rules.
//!
//! Rules are Tera templates rendered with two maps:
//!
//! - `versions`: resolved version of every component in the run, e.g.
//!   `hack/plugins/{{ versions["DFHack"] }}/`
//! - `roots`: configured path roots, e.g. `{{ roots.df }}/data/`
//!
//! The legacy token `{DFHACK_VER}` is shorthand for DFHack's version.
//! References are scanned before rendering so a missing version fails with
//! [`ExtractionError::UnresolvedPlaceholder`] naming the component.

use crate::constants::DFHACK_COMPONENT;
use crate::core::ExtractionError;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use tera::{Context as TeraContext, Tera};

const LEGACY_DFHACK_TOKEN: &str = "{DFHACK_VER}";

const VERSION_REFERENCE: &str =
    r#"versions\s*(?:\[\s*["']([^"']+)["']\s*\]|\.([A-Za-z_][A-Za-z0-9_]*))"#;

/// Values available to extraction templates.
#[derive(Debug, Clone, Copy)]
pub struct TemplateValues<'a> {
    pub versions: &'a HashMap<String, String>,
    pub roots: &'a BTreeMap<String, String>,
}

/// Components whose versions `text` refers to, in order of first mention.
#[must_use]
pub fn referenced_components(text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    if text.contains(LEGACY_DFHACK_TOKEN) {
        names.push(DFHACK_COMPONENT.to_string());
    }
    if let Ok(pattern) = Regex::new(VERSION_REFERENCE) {
        for caps in pattern.captures_iter(text) {
            if let Some(name) = caps.get(1).or_else(|| caps.get(2))
                && !names.iter().any(|n| n == name.as_str())
            {
                names.push(name.as_str().to_string());
            }
        }
    }
    names
}

/// Render `text` against `values`.
pub fn render(text: &str, values: &TemplateValues<'_>) -> Result<String, ExtractionError> {
    for referenced in referenced_components(text) {
        if !values.versions.contains_key(&referenced) {
            return Err(ExtractionError::UnresolvedPlaceholder {
                referenced,
            });
        }
    }

    let text = text.replace(LEGACY_DFHACK_TOKEN, &format!("{{{{ versions[\"{DFHACK_COMPONENT}\"] }}}}"));
    if !text.contains("{{") && !text.contains("{%") {
        return Ok(text);
    }

    let mut context = TeraContext::new();
    context.insert("versions", values.versions);
    context.insert("roots", values.roots);

    let mut tera = Tera::default();
    tera.render_str(&text, &context).map_err(|e| {
        let mut reason = e.to_string();
        let mut source = std::error::Error::source(&e);
        while let Some(inner) = source {
            reason.push_str(": ");
            reason.push_str(&inner.to_string());
            source = inner.source();
        }
        ExtractionError::Template {
            reason,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn versions() -> HashMap<String, String> {
        HashMap::from([
            ("DFHack".to_string(), "0.47.05-r1".to_string()),
            ("Dwarf Fortress".to_string(), "0.47.05".to_string()),
        ])
    }

    #[test]
    fn test_scans_both_syntaxes() {
        let refs = referenced_components(
            r#"{{ versions["Dwarf Fortress"] }}/{{ versions.DFHack }}/{{ versions.DFHack }}"#,
        );
        assert_eq!(refs, vec!["Dwarf Fortress", "DFHack"]);
        assert_eq!(referenced_components("hack/{DFHACK_VER}/"), vec!["DFHack"]);
        assert!(referenced_components("LNP/Utilities/x/").is_empty());
    }

    #[test]
    fn test_render_versions_and_roots() {
        let versions = versions();
        let roots = BTreeMap::from([("df".to_string(), "Dwarf Fortress".to_string())]);
        let values = TemplateValues {
            versions: &versions,
            roots: &roots,
        };

        let out = render(r#"{{ roots.df }}/hack/{{ versions["DFHack"] }}/"#, &values).unwrap();
        assert_eq!(out, "Dwarf Fortress/hack/0.47.05-r1/");
    }

    #[test]
    fn test_legacy_token() {
        let versions = versions();
        let roots = BTreeMap::new();
        let values = TemplateValues {
            versions: &versions,
            roots: &roots,
        };
        assert_eq!(render("plugins/{DFHACK_VER}/", &values).unwrap(), "plugins/0.47.05-r1/");
    }

    #[test]
    fn test_plain_text_is_untouched() {
        let versions = HashMap::new();
        let roots = BTreeMap::new();
        let values = TemplateValues {
            versions: &versions,
            roots: &roots,
        };
        assert_eq!(render("LNP/Utilities/x/", &values).unwrap(), "LNP/Utilities/x/");
    }

    #[test]
    fn test_missing_reference_names_component() {
        let versions = HashMap::new();
        let roots = BTreeMap::new();
        let values = TemplateValues {
            versions: &versions,
            roots: &roots,
        };
        let err = render("hack/{{ versions.DFHack }}/", &values).unwrap_err();
        assert_eq!(
            err,
            ExtractionError::UnresolvedPlaceholder {
                referenced: "DFHack".into()
            }
        );
    }

    #[test]
    fn test_unknown_root_is_template_error() {
        let versions = HashMap::new();
        let roots = BTreeMap::new();
        let values = TemplateValues {
            versions: &versions,
            roots: &roots,
        };
        let err = render("{{ roots.nowhere }}/", &values).unwrap_err();
        assert!(matches!(err, ExtractionError::Template { .. }));
    }
}
