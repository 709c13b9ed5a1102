//! Synchronization engine.
//!
//! This module provides the [`SyncService`] driver that runs one
//! reconciliation pass between the local store and a remote provider. The
//! heavy lifting lives in the submodules: the snapshot builder joins the
//! local store with the mapping table, the reconciler walks the four
//! phases, and the merge policy resolves tasks that changed on both sides.
//!
//! A run is strictly sequential on one worker: the snapshot indices are
//! mutated in place as phases make progress, so there is no intra-run
//! parallelism across tasks. The driver guarantees at most one in-flight
//! run per service instance.

mod data;
mod engine;
mod merge;
mod stats;

pub use stats::SyncStats;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::info;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::adapter::RemoteAdapter;
use crate::config::{Config, SyncConfig};
use crate::entities::task;
use crate::error::SyncError;
use crate::reporter::{LogReporter, SyncReporter};
use crate::repositories::MappingRepository;
use crate::storage::LocalStorage;

use data::SyncData;
use engine::Reconciler;

/// Re-arms host-side reminders for a task the engine touched.
///
/// Scheduling alarms belongs to the hosting application; the engine only
/// signals which tasks need their reminders recomputed.
pub trait ReminderScheduler: Send + Sync {
    fn reschedule(&self, task_id: &Uuid);
}

/// Scheduler for hosts without reminders.
#[derive(Debug, Default)]
pub struct NoopReminderScheduler;

impl ReminderScheduler for NoopReminderScheduler {
    fn reschedule(&self, _task_id: &Uuid) {}
}

/// What one finished run produced.
#[derive(Clone, Debug)]
pub struct SyncReport {
    pub stats: SyncStats,
    /// Plaintext change log, one line per reconciled task.
    pub log: String,
    /// Set when the run was cancelled; partial progress is durable and the
    /// next run reconciles the remainder.
    pub cancelled: bool,
}

/// Result of asking the service for a run.
#[derive(Clone, Debug)]
pub enum RunOutcome {
    /// Another run is still in flight; nothing was done.
    AlreadyRunning,
    /// The run finished (possibly cancelled partway).
    Completed(SyncReport),
}

/// Drives one provider's synchronization runs.
///
/// The service owns the collaborators a run needs: the remote adapter, the
/// storage handle, the reporter and the reminder scheduler. Collaborators
/// are shared handles so the hosting application can keep using them
/// between runs.
pub struct SyncService {
    adapter: Arc<dyn RemoteAdapter>,
    storage: Arc<Mutex<LocalStorage>>,
    config: Config,
    reporter: Arc<dyn SyncReporter>,
    reminders: Arc<dyn ReminderScheduler>,
    sync_in_progress: Arc<Mutex<bool>>,
    cancel_requested: Arc<AtomicBool>,
}

impl SyncService {
    /// Create a service for one provider.
    ///
    /// Reporting defaults to the `log` facade and reminders to a no-op;
    /// use [`with_reporter`](Self::with_reporter) and
    /// [`with_reminder_scheduler`](Self::with_reminder_scheduler) to plug
    /// in host capabilities.
    pub fn new(adapter: Arc<dyn RemoteAdapter>, storage: Arc<Mutex<LocalStorage>>, config: Config) -> Self {
        let reporter = Arc::new(LogReporter::new(config.sync.background_mode));
        Self {
            adapter,
            storage,
            config,
            reporter,
            reminders: Arc::new(NoopReminderScheduler),
            sync_in_progress: Arc::new(Mutex::new(false)),
            cancel_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Replace the progress/summary reporter.
    pub fn with_reporter(mut self, reporter: Arc<dyn SyncReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Replace the reminder scheduler.
    pub fn with_reminder_scheduler(mut self, reminders: Arc<dyn ReminderScheduler>) -> Self {
        self.reminders = reminders;
        self
    }

    /// Whether a run is currently in flight.
    pub async fn is_syncing(&self) -> bool {
        *self.sync_in_progress.lock().await
    }

    /// Ask the in-flight run to stop at the next task boundary.
    pub fn request_cancel(&self) {
        self.cancel_requested.store(true, Ordering::Relaxed);
    }

    /// Handle a host thread can keep to cancel a run without holding the
    /// service itself.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel_requested.clone()
    }

    /// Run one synchronization pass.
    ///
    /// Fetches the remote state, builds the snapshot, walks the four
    /// reconciliation phases, clears the per-provider dirty flags and
    /// emits the run summary. At most one run executes at a time; a
    /// concurrent call returns [`RunOutcome::AlreadyRunning`].
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Auth`] when the provider rejects credentials,
    /// [`SyncError::Remote`] when the fetch fails, and
    /// [`SyncError::Store`] when the snapshot cannot be built or the run
    /// cannot be finalized. Failures on individual tasks inside a phase
    /// never abort the run.
    pub async fn sync(&self) -> Result<RunOutcome, SyncError> {
        {
            let mut guard = self.sync_in_progress.lock().await;
            if *guard {
                return Ok(RunOutcome::AlreadyRunning);
            }
            *guard = true;
        }
        self.cancel_requested.store(false, Ordering::Relaxed);

        let result = self.perform_sync().await;

        {
            let mut guard = self.sync_in_progress.lock().await;
            *guard = false;
        }

        result.map(RunOutcome::Completed)
    }

    /// Internal sync implementation
    async fn perform_sync(&self) -> Result<SyncReport, SyncError> {
        info!("starting sync with {}", self.adapter.display_name());
        self.reporter.label("Checking authorization...");

        let remote_tasks = self
            .adapter
            .fetch_tasks()
            .await
            .map_err(SyncError::from_fetch)?;
        info!("fetched {} remote tasks", remote_tasks.len());

        // the storage handle is held for the whole run: the engine is the
        // only writer while phases execute
        let storage = self.storage.lock().await;

        let data = SyncData::build(&storage.conn, self.adapter.provider_id(), remote_tasks)
            .await
            .map_err(SyncError::store)?;

        let reconciler = Reconciler::new(
            &storage.conn,
            self.adapter.as_ref(),
            self.reporter.as_ref(),
            self.reminders.as_ref(),
            &self.config.sync,
            &self.cancel_requested,
            data,
        );
        let outcome = reconciler.run().await;

        if !outcome.cancelled {
            // only post-run mutations should carry the dirty flag forward
            MappingRepository::clear_updated(&storage.conn, self.adapter.provider_id())
                .await
                .map_err(SyncError::store)?;
        }
        drop(storage);

        if !outcome.cancelled && !self.config.sync.suppress_summary {
            self.reporter
                .summary(self.adapter.display_name(), &outcome.stats, &outcome.log);
        }

        info!("sync with {} finished", self.adapter.display_name());
        Ok(SyncReport {
            stats: outcome.stats,
            log: outcome.log,
            cancelled: outcome.cancelled,
        })
    }
}

/// Fill a task materialized from a remote create with the user's
/// preference defaults. This is the only place default policy appears.
pub(crate) fn apply_task_defaults(config: &SyncConfig, task: &mut task::Model) {
    if let Some(seconds) = config.default_reminder_seconds {
        task.reminder_seconds = Some(seconds as i32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn blank() -> task::Model {
        task::Model {
            uuid: Uuid::new_v4(),
            name: String::new(),
            notes: None,
            priority: 0,
            due_date: None,
            completion_date: None,
            creation_date: Utc::now(),
            reminder_seconds: None,
            is_completed: false,
            is_deleted: false,
        }
    }

    #[test]
    fn defaults_fill_reminder_from_preferences() {
        let config = SyncConfig {
            default_reminder_seconds: Some(86_400),
            ..Default::default()
        };
        let mut task = blank();
        apply_task_defaults(&config, &mut task);
        assert_eq!(task.reminder_seconds, Some(86_400));
    }

    #[test]
    fn defaults_leave_reminder_unset_without_preference() {
        let config = SyncConfig::default();
        let mut task = blank();
        apply_task_defaults(&config, &mut task);
        assert_eq!(task.reminder_seconds, None);
    }
}
