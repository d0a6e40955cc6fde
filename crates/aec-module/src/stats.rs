//! Module statistics.

use std::time::Duration;

/// Counters kept by the audio context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleStats {
    /// Periods that completed the full streaming loop.
    pub periods_processed: u64,
    /// Tuning blobs applied successfully.
    pub reconfigurations_applied: u64,
    /// Reconfiguration attempts that failed and stay pending.
    pub reconfiguration_failures: u64,
    /// Periods aborted by a stream failure.
    pub stream_failures: u64,
    /// Wall time of the last completed period.
    pub last_period: Option<Duration>,
    /// Longest period seen so far.
    pub max_period: Option<Duration>,
}

impl ModuleStats {
    pub(crate) fn record_period(&mut self, elapsed: Duration) {
        self.periods_processed += 1;
        self.last_period = Some(elapsed);
        self.max_period = Some(self.max_period.map_or(elapsed, |max| max.max(elapsed)));
    }
}
