//! Outward signals of a run: status lines and materialization progress.

use tracing::{debug, info};

/// Sink for the pipeline's status lines and 0-100 progress values.
///
/// The pipeline never depends on how these are displayed.
pub trait RunObserver: Send + Sync {
    /// One line per notable step or error.
    fn status(&self, message: &str);

    /// Fraction of the current course's items processed, 0-100.
    fn progress(&self, percent: u8);
}

/// Forwards status lines to `tracing` at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl RunObserver for TracingObserver {
    fn status(&self, message: &str) {
        info!("{message}");
    }

    fn progress(&self, percent: u8) {
        debug!(percent, "progress");
    }
}

/// Percentage of `total` reached after `done` items, rounded down.
#[must_use]
pub fn percent_of(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let pct = done.min(total).saturating_mul(100) / total;
    u8::try_from(pct).unwrap_or(100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_of_bounds() {
        assert_eq!(percent_of(0, 4), 0);
        assert_eq!(percent_of(1, 3), 33);
        assert_eq!(percent_of(3, 3), 100);
        assert_eq!(percent_of(9, 3), 100);
        assert_eq!(percent_of(0, 0), 100);
    }
}
