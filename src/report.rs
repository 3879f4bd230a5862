//! Per-file outcomes of bulk operations.

use crate::error::{DriveError, Result};
use crate::models::FileRef;

/// What happened to one file during a bulk operation.
#[derive(Debug)]
pub struct ItemOutcome<T> {
    pub file: FileRef,
    pub result: Result<T>,
}

impl<T> ItemOutcome<T> {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Outcomes of a bulk operation, in listing order.
///
/// A report is returned even when some files failed; call
/// [`BatchReport::into_result`] to treat any failure as fatal.
#[derive(Debug)]
pub struct BatchReport<T> {
    pub outcomes: Vec<ItemOutcome<T>>,
}

impl<T> Default for BatchReport<T> {
    fn default() -> Self {
        Self {
            outcomes: Vec::new(),
        }
    }
}

impl<T> BatchReport<T> {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> impl Iterator<Item = (&FileRef, &T)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().map(|v| (&o.file, v)))
    }

    pub fn failed(&self) -> impl Iterator<Item = (&FileRef, &DriveError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (&o.file, e)))
    }

    pub fn failure_count(&self) -> usize {
        self.failed().count()
    }

    /// True when no file failed (an empty report is complete).
    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(ItemOutcome::is_ok)
    }

    /// `Err(PartialFailure)` if any file failed, otherwise the report.
    pub fn into_result(self) -> Result<Self> {
        let failed = self.failure_count();
        if failed == 0 {
            Ok(self)
        } else {
            Err(DriveError::PartialFailure {
                failed,
                total: self.total(),
            })
        }
    }
}

impl<T> FromIterator<ItemOutcome<T>> for BatchReport<T> {
    fn from_iter<I: IntoIterator<Item = ItemOutcome<T>>>(iter: I) -> Self {
        Self {
            outcomes: iter.into_iter().collect(),
        }
    }
}
