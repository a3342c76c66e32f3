//! Progress indicators for downloads.
//!
//! Bars are hidden when `--no-progress` is given or `PACKWRIGHT_NO_PROGRESS`
//! is set, so scripted runs get clean output.

use indicatif::{ProgressBar as IndicatifBar, ProgressStyle};

fn is_progress_disabled() -> bool {
    std::env::var_os("PACKWRIGHT_NO_PROGRESS").is_some()
}

/// A progress bar counting finished components.
#[derive(Clone)]
pub struct ProgressBar {
    inner: IndicatifBar,
}

impl ProgressBar {
    /// Create a bar of `len` steps; hidden when `enabled` is false.
    #[must_use]
    pub fn new(len: u64, enabled: bool) -> Self {
        let inner = if !enabled || is_progress_disabled() {
            IndicatifBar::hidden()
        } else {
            let bar = IndicatifBar::new(len);
            bar.set_style(default_style());
            bar
        };
        Self {
            inner,
        }
    }

    pub fn set_message(&self, msg: impl Into<String>) {
        self.inner.set_message(msg.into());
    }

    pub fn inc(&self, delta: u64) {
        self.inner.inc(delta);
    }

    pub fn finish_and_clear(&self) {
        self.inner.finish_and_clear();
    }
}

fn default_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}
