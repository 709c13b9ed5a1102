//! Per-category statistics for one synchronization run.

use serde::{Deserialize, Serialize};

/// Counts of what a run changed, split by side.
///
/// `local_created_tasks` and `local_updated_tasks` are disjoint: a task
/// materialized from a remote create counts only as created, even though
/// the remote state was also written into it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    pub local_created_tasks: u32,
    pub local_updated_tasks: u32,
    pub local_deleted_tasks: u32,

    pub merged_tasks: u32,

    pub remote_created_tasks: u32,
    pub remote_updated_tasks: u32,
    pub remote_deleted_tasks: u32,
}

impl SyncStats {
    /// Whether the run changed nothing on either side.
    pub fn is_noop(&self) -> bool {
        self.local_created_tasks
            + self.local_updated_tasks
            + self.local_deleted_tasks
            + self.merged_tasks
            + self.remote_created_tasks
            + self.remote_updated_tasks
            + self.remote_deleted_tasks
            == 0
    }

    /// Render the human-readable run summary, or `None` when the run was a
    /// no-op and the summary is suppressed entirely.
    pub fn render_summary(&self, provider: &str, log: &str) -> Option<String> {
        if self.is_noop() {
            return None;
        }

        let mut out = String::new();
        out.push_str(&format!("{provider} synchronization results\n\n"));
        out.push_str(log);
        out.push('\n');

        if self.local_created_tasks + self.local_updated_tasks + self.local_deleted_tasks > 0 {
            out.push_str("locally:\n");
            append_count(&mut out, "created", self.local_created_tasks);
            append_count(&mut out, "updated", self.local_updated_tasks);
            append_count(&mut out, "deleted", self.local_deleted_tasks);
        }

        if self.merged_tasks > 0 {
            out.push_str(&format!("\nmerged: {}\n", self.merged_tasks));
        }

        if self.remote_created_tasks + self.remote_updated_tasks + self.remote_deleted_tasks > 0 {
            out.push_str("\non the remote server:\n");
            append_count(&mut out, "created", self.remote_created_tasks);
            append_count(&mut out, "updated", self.remote_updated_tasks);
            append_count(&mut out, "deleted", self.remote_deleted_tasks);
        }

        Some(out)
    }
}

fn append_count(out: &mut String, label: &str, count: u32) {
    if count > 0 {
        out.push_str(&format!("  {label}: {count}\n"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_run_renders_nothing() {
        let stats = SyncStats::default();
        assert!(stats.is_noop());
        assert!(stats.render_summary("Example Service", "").is_none());
    }

    #[test]
    fn summary_lists_only_nonzero_counts() {
        let stats = SyncStats {
            remote_created_tasks: 2,
            merged_tasks: 1,
            ..Default::default()
        };
        let text = stats
            .render_summary("Example Service", ">> on remote server:\nadded 'Buy milk'\n")
            .unwrap();

        assert!(text.starts_with("Example Service synchronization results"));
        assert!(text.contains("added 'Buy milk'"));
        assert!(text.contains("merged: 1"));
        assert!(text.contains("on the remote server:\n  created: 2"));
        assert!(!text.contains("locally:"));
        assert!(!text.contains("deleted:"));
    }
}
