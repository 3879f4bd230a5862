//! Completion tracking for bulk downloads.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};

/// Snapshot passed to progress callbacks after each finished file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkProgress {
    /// Files finished so far, successful or not.
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
}

pub type ProgressCallback = Arc<dyn Fn(BulkProgress) + Send + Sync>;

/// Counts finished tasks and fans each update out to the optional bar and
/// callback. It only observes; outcomes are collected elsewhere.
pub(crate) struct ProgressTracker {
    total: usize,
    completed: AtomicUsize,
    failed: AtomicUsize,
    bar: Option<ProgressBar>,
    callback: Option<ProgressCallback>,
}

impl ProgressTracker {
    pub(crate) fn new(total: usize, show_bar: bool, callback: Option<ProgressCallback>) -> Self {
        let bar = show_bar.then(|| {
            let bar = ProgressBar::new(total as u64);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            {
                bar.set_style(style.progress_chars("=> "));
            }
            bar
        });

        Self {
            total,
            completed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            bar,
            callback,
        }
    }

    pub(crate) fn record(&self, success: bool) {
        let failed = if success {
            self.failed.load(Ordering::SeqCst)
        } else {
            self.failed.fetch_add(1, Ordering::SeqCst) + 1
        };
        let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(bar) = &self.bar {
            bar.inc(1);
            if failed > 0 {
                bar.set_message(format!("{} failed", failed));
            }
        }

        if let Some(callback) = &self.callback {
            callback(BulkProgress {
                completed,
                failed,
                total: self.total,
            });
        }
    }

    pub(crate) fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish();
        }
    }
}
