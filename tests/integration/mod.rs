//! Integration test suite for packwright
//!
//! End-to-end runs of the pipeline against throwaway project directories.
//! Artifacts come from `file://` URLs or a local `mockito` server, so the
//! suite never touches the network.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **build**: full builds from `components.yml`, ordering and filtering
//! - **hosts**: resolution and download through the host APIs
//! - **placeholders**: cross-component version substitution
//! - **idempotence**: rebuilds, updates and forced reinstalls
//! - **errors**: fatal configuration errors and per-component failures
//! - **cache**: cache reuse and cleanup

// Shared test utilities (from parent tests/ directory)
#[path = "../common/mod.rs"]
mod common;

mod build;
mod cache;
mod errors;
mod hosts;
mod idempotence;
mod placeholders;
