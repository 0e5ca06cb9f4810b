use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::dimred::lda::LdaError;

/// Hook through which a host observes a long running computation.
///
/// Both methods have no-op defaults, so a host only overrides what it needs.
pub trait ExecutionMonitor: Send + Sync {
    fn is_cancelled(&self) -> bool {
        false
    }

    /// `fraction` is within `[0, 1]` for the named stage.
    fn set_progress(&self, _fraction: f64, _stage: &str) {}
}

/// Monitor that never cancels and ignores progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMonitor;

impl ExecutionMonitor for NoopMonitor {}

/// Cloneable cancellation flag. All clones observe the same flag.
#[derive(Debug, Default, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

impl ExecutionMonitor for CancellationToken {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

pub(crate) fn check_cancelled(monitor: &dyn ExecutionMonitor) -> Result<(), LdaError> {
    if monitor.is_cancelled() {
        Err(LdaError::Cancelled)
    } else {
        Ok(())
    }
}

pub(crate) fn report_row_progress(monitor: &dyn ExecutionMonitor, row: usize, n_rows: usize, stage: &str) {
    if n_rows > 0 {
        monitor.set_progress((row + 1) as f64 / n_rows as f64, stage);
    }
}

/// Returns `base` if it is not taken yet, otherwise `base (#n)` with the smallest free `n`.
pub(crate) fn unique_name(taken: &HashSet<String>, base: &str) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    (1..)
        .map(|n| format!("{base} (#{n})"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}
