//! Field-level merge policy for tasks that changed on both sides.
//!
//! The policy is deterministic and idempotent: merging the same remote
//! snapshot into a task twice yields the same result as merging it once.
//! There is no per-field modification history to consult, so the rules
//! resolve each field from its values alone:
//!
//! - fields only one side has set keep the set side
//! - datetimes present on both sides keep the later instant
//! - notes keep the longer non-empty text
//! - completion and deletion flags stay set once either side set them
//! - everything else set on both sides takes the remote value
//! - tag sets are unioned, case-insensitively by name

use crate::adapter::TaskProxy;

impl TaskProxy {
    /// Merge a remote snapshot into this (local) proxy, field by field.
    ///
    /// The result is always one side's value per field, never a composite.
    pub fn merge_from(&mut self, remote: &TaskProxy) {
        if !remote.name.is_empty() {
            self.name = remote.name.clone();
        }

        self.notes = merge_notes(self.notes.take(), remote.notes.clone());

        if remote.priority.is_some() {
            self.priority = remote.priority;
        }

        self.due_date = merge_instant(self.due_date, remote.due_date);
        self.completion_date = merge_instant(self.completion_date, remote.completion_date);

        if remote.reminder_seconds.is_some() {
            self.reminder_seconds = remote.reminder_seconds;
        }

        self.is_completed |= remote.is_completed;
        self.is_deleted |= remote.is_deleted;

        merge_tags(&mut self.tags, &remote.tags);
    }
}

/// Later instant wins when both sides carry one.
fn merge_instant<T: Ord>(local: Option<T>, remote: Option<T>) -> Option<T> {
    match (local, remote) {
        (Some(l), Some(r)) => Some(std::cmp::max(l, r)),
        (l, r) => l.or(r),
    }
}

/// Longer non-empty text wins; the remote side wins length ties.
fn merge_notes(local: Option<String>, remote: Option<String>) -> Option<String> {
    let local = local.filter(|s| !s.is_empty());
    let remote = remote.filter(|s| !s.is_empty());
    match (local, remote) {
        (Some(l), Some(r)) => {
            if l.len() > r.len() {
                Some(l)
            } else {
                Some(r)
            }
        }
        (l, r) => l.or(r),
    }
}

/// Union the remote tags into the local set, comparing names
/// case-insensitively and keeping the local casing for names both sides
/// carry.
fn merge_tags(local: &mut Vec<String>, remote: &[String]) {
    for tag in remote {
        let lower = tag.to_lowercase();
        if !local.iter().any(|t| t.to_lowercase() == lower) {
            local.push(tag.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::adapter::TaskProxy;
    use chrono::{TimeZone, Utc};

    fn proxy(remote_id: &str) -> TaskProxy {
        TaskProxy::new(1, remote_id)
    }

    #[test]
    fn longer_notes_win() {
        let mut local = proxy("r1");
        local.notes = Some("filed".to_string());
        let mut remote = proxy("r1");
        remote.notes = Some("filed 2024".to_string());

        local.merge_from(&remote);
        assert_eq!(local.notes.as_deref(), Some("filed 2024"));

        // the longer local text survives the reverse situation
        let mut local = proxy("r1");
        local.notes = Some("filed with the county office".to_string());
        remote.notes = Some("filed".to_string());
        local.merge_from(&remote);
        assert_eq!(local.notes.as_deref(), Some("filed with the county office"));
    }

    #[test]
    fn empty_notes_never_beat_text() {
        let mut local = proxy("r1");
        local.notes = Some(String::new());
        let mut remote = proxy("r1");
        remote.notes = Some("remember the receipts".to_string());

        local.merge_from(&remote);
        assert_eq!(local.notes.as_deref(), Some("remember the receipts"));
    }

    #[test]
    fn completion_flags_prefer_true() {
        let mut local = proxy("r1");
        local.is_completed = true;
        let remote = proxy("r1");

        local.merge_from(&remote);
        assert!(local.is_completed);

        let mut local = proxy("r1");
        let mut remote = proxy("r1");
        remote.is_deleted = true;
        local.merge_from(&remote);
        assert!(local.is_deleted);
    }

    #[test]
    fn later_due_date_wins() {
        let earlier = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 3, 8, 9, 0, 0).unwrap();

        let mut local = proxy("r1");
        local.due_date = Some(later);
        let mut remote = proxy("r1");
        remote.due_date = Some(earlier);

        local.merge_from(&remote);
        assert_eq!(local.due_date, Some(later));
    }

    #[test]
    fn tags_union_case_insensitively() {
        let mut local = proxy("r1");
        local.tags = vec!["Home".to_string()];
        let mut remote = proxy("r1");
        remote.tags = vec!["home".to_string(), "Errands".to_string()];

        local.merge_from(&remote);
        assert_eq!(local.tags, vec!["Home".to_string(), "Errands".to_string()]);
    }

    #[test]
    fn remote_scalar_wins_when_both_set() {
        let mut local = proxy("r1");
        local.priority = Some(1);
        local.name = "Taxes".to_string();
        let mut remote = proxy("r1");
        remote.priority = Some(3);
        remote.name = "Taxes 2024".to_string();

        local.merge_from(&remote);
        assert_eq!(local.priority, Some(3));
        assert_eq!(local.name, "Taxes 2024");
    }

    #[test]
    fn merge_is_idempotent() {
        let mut local = proxy("r1");
        local.name = "Taxes".to_string();
        local.notes = Some("filed".to_string());
        local.priority = Some(1);
        local.tags = vec!["Money".to_string()];

        let mut remote = proxy("r1");
        remote.name = "Taxes".to_string();
        remote.notes = Some("filed 2024".to_string());
        remote.priority = Some(2);
        remote.is_completed = true;
        remote.tags = vec!["money".to_string(), "paperwork".to_string()];

        local.merge_from(&remote);
        let once = local.clone();
        local.merge_from(&remote);
        assert_eq!(local, once);
    }
}
