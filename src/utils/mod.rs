//! Utility modules shared across the pipeline.
//!
//! - [`fs`]: atomic writes, safe path joins, checksums
//! - [`http`]: HTTP client with bounded retries
//! - [`progress`]: download progress bars

pub mod fs;
pub mod http;
pub mod progress;

pub use fs::{atomic_write, ensure_dir, safe_join, sanitize_segment, sha256_file};
pub use http::{HttpClient, HttpError, JsonResponse, RetryPolicy};
pub use progress::ProgressBar;
