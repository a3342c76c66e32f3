//! Test utilities for packwright
//!
//! Helpers shared by unit tests and the integration suite:
//! - [`init_test_logging`] to see `tracing` output from a failing test
//! - [`ComponentBuilder`] for registry entries without YAML
//! - archive fixtures in [`fixtures`] for extraction and download tests

pub mod builder;
pub mod fixtures;

pub use builder::{ComponentBuilder, registry};
pub use fixtures::{write_tar_bz2, write_tar_gz, write_tar_xz, write_zip, write_zip_with_modes};

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Initialise a test-writer subscriber once per process.
///
/// With no level, logging is only enabled when `RUST_LOG` is set.
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}
