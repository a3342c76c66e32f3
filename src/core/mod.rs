//! Core types shared by every pipeline stage.
//!
//! - [`error`]: the per-stage error taxonomy and user-facing error display
//! - [`platform`]: the target platform a run builds for

pub mod error;
pub mod platform;

pub use error::{
    ConfigError, DownloadError, ErrorContext, ExtractionError, ManifestConflict, ResolutionError,
    user_friendly_error,
};
pub use platform::{Bits, Os, TargetPlatform};
