//! Progress indicators for long-running resolution steps.
//!
//! Wraps `indicatif` with pawnpm styling. Indicators are hidden when:
//!
//! - `PAWNPM_NO_PROGRESS` is set to any value
//! - `--no-progress` (or `--quiet`) was passed, see [`disable_progress`]
//!
//! ```rust,no_run
//! use pawnpm_cli::utils::progress::ProgressBar;
//!
//! let progress = ProgressBar::new(3);
//! progress.set_message("Ensuring dependencies");
//! progress.inc(1);
//! progress.finish_with_message("Dependencies ensured");
//! ```

use indicatif::{ProgressBar as IndicatifBar, ProgressStyle as IndicatifStyle};
use std::sync::atomic::{AtomicBool, Ordering};

/// Environment variable that hides every progress indicator.
pub const NO_PROGRESS_ENV: &str = "PAWNPM_NO_PROGRESS";

static PROGRESS_DISABLED: AtomicBool = AtomicBool::new(false);

/// Hides every progress indicator created afterwards.
pub fn disable_progress() {
    PROGRESS_DISABLED.store(true, Ordering::Relaxed);
}

fn is_progress_disabled() -> bool {
    PROGRESS_DISABLED.load(Ordering::Relaxed) || std::env::var_os(NO_PROGRESS_ENV).is_some()
}

/// A progress bar with consistent styling.
pub struct ProgressBar {
    inner: IndicatifBar,
}

impl ProgressBar {
    /// A bar for `len` discrete steps.
    pub fn new(len: u64) -> Self {
        let bar = if is_progress_disabled() {
            IndicatifBar::hidden()
        } else {
            let bar = IndicatifBar::new(len);
            bar.set_style(default_style());
            bar
        };
        Self { inner: bar }
    }

    pub fn set_message(&self, msg: impl Into<String>) {
        self.inner.set_message(msg.into());
    }

    pub fn inc(&self, delta: u64) {
        self.inner.inc(delta);
    }

    pub fn finish_with_message(&self, msg: impl Into<String>) {
        self.inner.finish_with_message(msg.into());
    }

    pub fn finish_and_clear(&self) {
        self.inner.finish_and_clear();
    }

    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.inner.is_hidden()
    }
}

fn default_style() -> IndicatifStyle {
    IndicatifStyle::default_bar()
        .template("[{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| IndicatifStyle::default_bar())
        .progress_chars("━╸━")
}
