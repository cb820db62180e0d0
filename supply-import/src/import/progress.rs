//! Progress reporting for running jobs

use log::{info, warn};

use super::report::ImportResult;

/// Receives job progress; irrelevant to the outcome of the import
pub trait ProgressSink: Send + Sync {
    /// Completed groups as a percentage of all groups (0-100)
    fn on_progress(&self, percent: u8);

    fn on_group_result(&self, result: &ImportResult);
}

/// Logs every group outcome and each progress step
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn on_progress(&self, percent: u8) {
        info!("Import progress: {}%", percent);
    }

    fn on_group_result(&self, result: &ImportResult) {
        if result.success {
            info!("[ok] {}: {}", result.group_key, result.message);
        } else {
            warn!(
                "[failed at {}] {}: {}",
                result.stage, result.group_key, result.message
            );
        }
    }
}

/// Percentage of `completed` out of `total`; an empty job is complete
pub fn percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((completed.min(total) * 100) / total) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent() {
        assert_eq!(percent(0, 4), 0);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(4, 4), 100);
        assert_eq!(percent(0, 0), 100);
    }
}
