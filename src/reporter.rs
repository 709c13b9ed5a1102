//! Progress and summary reporting capabilities.
//!
//! The engine never renders anything itself: progress ticks, phase labels
//! and the final run summary all flow through a [`SyncReporter`] handed to
//! the driver. A foreground host routes these to its progress surface; a
//! background host typically keeps only the labels as log lines.
//!
//! Reporter implementations must not block the sync worker.

use std::sync::Mutex;

use log::info;

use crate::sync::SyncStats;

/// Receives progress ticks, labels and the final run summary.
pub trait SyncReporter: Send + Sync {
    /// Progress within the current phase: `step` of `out_of` units done.
    fn tick(&self, step: usize, out_of: usize);

    /// Short description of what the engine is doing right now.
    fn label(&self, text: &str);

    /// Final statistics and the plaintext change log for the run.
    fn summary(&self, provider: &str, stats: &SyncStats, log: &str);
}

/// Reporter that routes everything through the `log` facade.
///
/// In background mode progress ticks are dropped, matching a host that has
/// no progress surface to update.
#[derive(Debug, Default)]
pub struct LogReporter {
    background: bool,
}

impl LogReporter {
    pub fn new(background: bool) -> Self {
        Self { background }
    }
}

impl SyncReporter for LogReporter {
    fn tick(&self, step: usize, out_of: usize) {
        if !self.background && out_of > 0 {
            log::debug!("sync progress: {}/{}", step, out_of);
        }
    }

    fn label(&self, text: &str) {
        info!("{text}");
    }

    fn summary(&self, provider: &str, stats: &SyncStats, log: &str) {
        match stats.render_summary(provider, log) {
            Some(text) => {
                for line in text.lines() {
                    info!("{line}");
                }
            }
            None => info!("{provider} sync: up to date"),
        }
    }
}

/// Reporter that accumulates everything in memory.
///
/// Useful for hosts that surface sync activity in their own UI afterwards,
/// and for tests asserting on reported progress.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    labels: Mutex<Vec<String>>,
    ticks: Mutex<Vec<(usize, usize)>>,
    summaries: Mutex<Vec<String>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Labels reported so far, oldest first.
    pub fn labels(&self) -> Vec<String> {
        self.labels.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// Progress ticks reported so far.
    pub fn ticks(&self) -> Vec<(usize, usize)> {
        self.ticks.lock().map(|t| t.clone()).unwrap_or_default()
    }

    /// Rendered summaries reported so far.
    pub fn summaries(&self) -> Vec<String> {
        self.summaries.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl SyncReporter for MemoryReporter {
    fn tick(&self, step: usize, out_of: usize) {
        if let Ok(mut ticks) = self.ticks.lock() {
            ticks.push((step, out_of));
        }
    }

    fn label(&self, text: &str) {
        if let Ok(mut labels) = self.labels.lock() {
            labels.push(text.to_string());
        }
    }

    fn summary(&self, provider: &str, stats: &SyncStats, log: &str) {
        if let Some(text) = stats.render_summary(provider, log) {
            if let Ok(mut summaries) = self.summaries.lock() {
                summaries.push(text);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_reporter_accumulates() {
        let reporter = MemoryReporter::new();
        reporter.label("Checking authorization");
        reporter.tick(1, 4);
        reporter.label("Sending local task: Buy milk");

        assert_eq!(reporter.labels().len(), 2);
        assert_eq!(reporter.ticks(), vec![(1, 4)]);
        assert!(reporter.labels()[1].contains("Buy milk"));
    }

    #[test]
    fn noop_summary_is_not_recorded() {
        let reporter = MemoryReporter::new();
        reporter.summary("Example Service", &SyncStats::default(), "");
        assert!(reporter.summaries().is_empty());
    }
}
