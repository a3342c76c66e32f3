//! packwright - assemble a distribution pack from third-party components
//!
//! A pack is built from dozens of independently versioned components hosted
//! on DFFD, GitHub and Bitbucket or placed manually. packwright finds the
//! latest version of each, decides which are missing or outdated, downloads
//! them into a local cache and extracts them into the pack tree following
//! per-component rules, then writes the pack-wide manifest.
//!
//! # Architecture Overview
//!
//! ```text
//! components.yml ─► registry ─► planner ◄─ resolver (dffd, github, bitbucket, manual)
//!                                  │
//!                                  ▼
//!                 cache (download) ─► extractor ─► manifest
//!                                  │
//!                                  ▼
//!                        lockfile (installed versions)
//! ```
//!
//! # Core Modules
//!
//! - [`registry`] - component definitions loaded from `components.yml`
//! - [`resolver`] - latest version lookup per hosting service
//! - [`planner`] - eligibility, install order and per-component action
//! - [`cache`] - artifact downloads keyed by component and version
//! - [`extractor`] - archive unpacking and placement rules
//! - [`manifest`] - the merged pack manifest
//! - [`lockfile`] - persisted record of installed versions
//! - [`installer`] - the pipeline tying the stages together
//!
//! ## Supporting Modules
//! - [`config`] - `packwright.toml` settings and environment overrides
//! - [`cli`] - the command-line front end
//! - [`core`] - error taxonomy and target platform
//! - [`utils`] - file system and HTTP helpers

// Core functionality modules
pub mod cache;
pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod resolver;

// Pack assembly
pub mod extractor;
pub mod installer;
pub mod lockfile;
pub mod manifest;
pub mod planner;
pub mod registry;

// Supporting modules
pub mod utils;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
