//! Extraction rule parsing.
//!
//! A rule is one instruction per line:
//!
//! ```text
//! LNP/Utilities/Dwarf Therapist/          # unpack everything here
//! hack/plugins/*.so:hack/plugins/         # glob into a directory
//! dfhack-run:dfhack-run                   # single file, exact name
//! ```
//!
//! Lines are split on the first `:`. Blank lines are ignored.

use crate::core::ExtractionError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleLine {
    /// Unpack the whole artifact into this directory.
    Unpack {
        destination: String,
    },
    /// Place the entries matching `source` at `destination`.
    Pair {
        source: String,
        destination: String,
    },
}

impl RuleLine {
    #[must_use]
    pub fn destination(&self) -> &str {
        match self {
            Self::Unpack {
                destination,
            }
            | Self::Pair {
                destination,
                ..
            } => destination,
        }
    }
}

/// A trailing separator marks a directory destination.
#[must_use]
pub fn is_dir_destination(destination: &str) -> bool {
    destination.ends_with('/') || destination.ends_with('\\')
}

pub fn parse_rule(text: &str) -> Result<Vec<RuleLine>, ExtractionError> {
    let mut lines = Vec::new();
    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        match line.split_once(':') {
            None => lines.push(RuleLine::Unpack {
                destination: line.to_string(),
            }),
            Some((source, destination)) => {
                let (source, destination) = (source.trim(), destination.trim());
                if source.is_empty() || destination.is_empty() {
                    return Err(ExtractionError::Template {
                        reason: format!("'{line}' needs both a source and a destination"),
                    });
                }
                lines.push(RuleLine::Pair {
                    source: source.to_string(),
                    destination: destination.to_string(),
                });
            }
        }
    }

    if lines.is_empty() {
        return Err(ExtractionError::Template {
            reason: "extraction rule is empty".to_string(),
        });
    }
    Ok(lines)
}
