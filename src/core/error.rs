//! Error types for the pack pipeline.
//!
//! Errors are split by pipeline stage. Only [`ConfigError`] is fatal: it
//! aborts the run before any network activity. [`ResolutionError`],
//! [`DownloadError`] and [`ExtractionError`] are recorded against the one
//! component they concern and the run carries on. [`ManifestConflict`] is a
//! warning and never fails anything.
//!
//! [`ErrorContext`] wraps a fatal error with an optional suggestion and
//! details for display in the terminal, and [`user_friendly_error`] builds one
//! from any `anyhow::Error`.

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// Malformed configuration or an impossible install order.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Component configuration not found: {path}")]
    NotFound {
        path: String,
    },

    #[error("Invalid component configuration in {file}: {reason}")]
    Parse {
        file: String,
        reason: String,
    },

    #[error("Component '{component}' is invalid: {reason}")]
    InvalidComponent {
        component: String,
        reason: String,
    },

    #[error("Component name '{name}' is declared more than once")]
    DuplicateName {
        name: String,
    },

    #[error("Component '{component}' must be installed after '{missing}', which does not exist")]
    DanglingReference {
        component: String,
        missing: String,
        suggestion: Option<String>,
    },

    #[error("Circular install order between components: {}", members.join(" -> "))]
    Cycle {
        members: Vec<String>,
    },

    #[error("Component '{component}' has no extraction rule for {os}")]
    NoExtractRule {
        component: String,
        os: String,
    },

    #[error("Invalid settings in {file}: {reason}")]
    Settings {
        file: String,
        reason: String,
    },
}

/// Failure to determine the latest version of one component.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("{host} request for '{ident}' failed: {reason}")]
    Unreachable {
        host: String,
        ident: String,
        reason: String,
    },

    #[error("Unexpected {host} response for '{ident}': {reason}")]
    UnexpectedResponse {
        host: String,
        ident: String,
        reason: String,
    },

    #[error("Release of '{ident}' has no downloadable assets")]
    NoAssets {
        ident: String,
    },

    #[error("Unknown host type '{0}'")]
    UnknownHost(String),

    #[error("No identifier configured for {host} component")]
    MissingIdent {
        host: String,
    },
}

/// Failure to place an artifact in the local cache.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DownloadError {
    #[error("Download of {url} failed after {attempts} attempt(s): {reason}")]
    Network {
        url: String,
        attempts: usize,
        reason: String,
    },

    #[error("Download of {url} returned HTTP {status}")]
    Status {
        url: String,
        status: u16,
    },

    #[error("Cache write to {path} failed: {reason}")]
    Io {
        path: String,
        reason: String,
    },

    #[error("Download of {url} was cancelled")]
    Cancelled {
        url: String,
    },

    #[error("Downloaded artifact is empty: {url}")]
    Empty {
        url: String,
    },
}

/// Failure to apply an extraction rule.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("Unsupported archive format: {file}")]
    UnsupportedFormat {
        file: String,
    },

    #[error("Archive {file} is unreadable: {reason}")]
    Corrupt {
        file: String,
        reason: String,
    },

    #[error("'{source_path}' not found in {archive}")]
    MissingEntry {
        source_path: String,
        archive: String,
    },

    #[error("Extraction rule needs the version of '{referenced}', which was not resolved")]
    UnresolvedPlaceholder {
        referenced: String,
    },

    #[error("Invalid extraction rule: {reason}")]
    Template {
        reason: String,
    },

    #[error("Refusing to write outside the pack: {path}")]
    UnsafePath {
        path: String,
    },

    #[error("I/O error at {path}: {reason}")]
    Io {
        path: String,
        reason: String,
    },

    #[error("Artifact for this component was never downloaded")]
    MissingArtifact,
}

/// Two components wrote the same manifest field. Reported, never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestConflict {
    pub entry: String,
    pub field: String,
    pub previous: String,
    pub component: String,
}

impl fmt::Display for ManifestConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Manifest field '{}' of entry '{}' set by '{}' was overwritten by '{}'",
            self.field, self.entry, self.previous, self.component
        )
    }
}

/// A fatal error with an optional suggestion and details for the user.
#[derive(Debug)]
pub struct ErrorContext {
    pub error: anyhow::Error,
    pub suggestion: Option<String>,
    pub details: Option<String>,
}

impl ErrorContext {
    pub fn new(error: impl Into<anyhow::Error>) -> Self {
        Self {
            error: error.into(),
            suggestion: None,
            details: None,
        }
    }

    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr with colour.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);
        for cause in self.error.chain().skip(1) {
            eprintln!("  {} {}", "caused by:".dimmed(), cause);
        }
        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }
        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

/// Attach a suggestion to a fatal error based on what went wrong.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(config_error) = error.downcast_ref::<ConfigError>() {
        let (suggestion, details) = config_suggestion(config_error);
        let mut ctx = ErrorContext::new(error);
        if let Some(s) = suggestion {
            ctx = ctx.with_suggestion(s);
        }
        if let Some(d) = details {
            ctx = ctx.with_details(d);
        }
        return ctx;
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        let suggestion = match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                Some("Check ownership of the build and cache directories")
            }
            std::io::ErrorKind::NotFound => {
                Some("Check that the file or directory exists and the path is correct")
            }
            _ => None,
        };
        let ctx = ErrorContext::new(error);
        return match suggestion {
            Some(s) => ctx.with_suggestion(s),
            None => ctx,
        };
    }

    if error.downcast_ref::<toml::de::Error>().is_some() {
        return ErrorContext::new(error)
            .with_suggestion("Check the TOML syntax of packwright.toml")
            .with_details("Settings are optional; delete the file to use defaults");
    }

    ErrorContext::new(error)
}

fn config_suggestion(error: &ConfigError) -> (Option<String>, Option<String>) {
    match error {
        ConfigError::NotFound {
            ..
        } => (
            Some("Pass --components <FILE> or set `components` in packwright.toml".to_string()),
            None,
        ),
        ConfigError::Parse {
            ..
        } => (
            Some("Check the YAML syntax: components live under files, utilities or graphics"
                .to_string()),
            None,
        ),
        ConfigError::DanglingReference {
            suggestion,
            ..
        } => (
            suggestion.as_ref().map(|s| format!("Did you mean '{s}'?")),
            Some("install_after may only name components declared in the same file".to_string()),
        ),
        ConfigError::Cycle {
            ..
        } => (
            Some("Remove one of the install_after entries that form the loop".to_string()),
            None,
        ),
        ConfigError::DuplicateName {
            ..
        } => (Some("Component names must be unique across all categories".to_string()), None),
        ConfigError::NoExtractRule {
            ..
        } => (
            Some("Add an os-keyed extract_to rule for this platform or a requires_os filter"
                .to_string()),
            None,
        ),
        ConfigError::InvalidComponent {
            ..
        }
        | ConfigError::Settings {
            ..
        } => (None, None),
    }
}
