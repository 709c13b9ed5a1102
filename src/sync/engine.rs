//! The reconciler: executes the four-phase synchronization algorithm.
//!
//! Phase order is load-bearing and must not change:
//!
//! 1. CREATE - local tasks the provider has never seen are created remotely
//! 2. DELETE - locally purged tasks are deleted remotely
//! 3. UPDATE - locally changed tasks are pushed, merging on conflict
//! 4. APPLY  - the remote fetch is written into the local store
//!
//! A failure while handling one task is logged and that task is skipped;
//! the phase keeps going. Store writes are per task, never batched across
//! tasks, so a cancelled or failed run leaves durable partial progress
//! that the next run picks up.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use log::{error, warn};
use sea_orm::{ActiveValue, DatabaseConnection, IntoActiveModel};
use uuid::Uuid;

use crate::adapter::{RemoteAdapter, TaskProxy};
use crate::config::SyncConfig;
use crate::entities::{sync_mapping, task};
use crate::reporter::SyncReporter;
use crate::repositories::{MappingRepository, TagRepository, TaskRepository};

use super::data::SyncData;
use super::stats::SyncStats;
use super::{apply_task_defaults, ReminderScheduler};

/// What a reconciler pass produced.
pub(crate) struct ReconcileOutcome {
    pub stats: SyncStats,
    pub log: String,
    pub cancelled: bool,
}

/// Walks the four phases against one provider's snapshot.
///
/// Holds only borrows; every piece of durable state lives in the store,
/// and the snapshot indices are run-scoped.
pub(crate) struct Reconciler<'a> {
    conn: &'a DatabaseConnection,
    adapter: &'a dyn RemoteAdapter,
    reporter: &'a dyn SyncReporter,
    reminders: &'a dyn ReminderScheduler,
    config: &'a SyncConfig,
    cancel: &'a AtomicBool,
    data: SyncData,
    stats: SyncStats,
    log: String,
    cancelled: bool,
}

impl<'a> Reconciler<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        conn: &'a DatabaseConnection,
        adapter: &'a dyn RemoteAdapter,
        reporter: &'a dyn SyncReporter,
        reminders: &'a dyn ReminderScheduler,
        config: &'a SyncConfig,
        cancel: &'a AtomicBool,
        data: SyncData,
    ) -> Self {
        Self {
            conn,
            adapter,
            reporter,
            reminders,
            config,
            cancel,
            data,
            stats: SyncStats::default(),
            log: String::new(),
            cancelled: false,
        }
    }

    pub(crate) async fn run(mut self) -> ReconcileOutcome {
        self.create_remote().await;
        self.delete_remote().await;
        self.update_remote().await;
        self.apply_remote().await;

        ReconcileOutcome {
            stats: self.stats,
            log: self.log,
            cancelled: self.cancelled,
        }
    }

    /// Cancellation is only honored between tasks, never mid-task.
    fn check_cancel(&mut self) -> bool {
        if !self.cancelled && self.cancel.load(Ordering::Relaxed) {
            self.cancelled = true;
            warn!("sync cancelled; remaining work is deferred to the next run");
        }
        self.cancelled
    }

    // --- phase 1: CREATE (local -> remote)

    async fn create_remote(&mut self) {
        self.log.push_str(">> on remote server:\n");
        let pending = self.data.newly_created_tasks.clone();
        let out_of = pending.len();
        for local_id in pending {
            if self.check_cancel() {
                return;
            }
            if let Err(e) = self.create_one(&local_id, out_of).await {
                error!("failed to send new task {local_id}: {e:#}");
            }
        }
    }

    async fn create_one(&mut self, local_id: &Uuid, out_of: usize) -> anyhow::Result<()> {
        let Some(task) = TaskRepository::fetch_for_sync(self.conn, local_id).await? else {
            return Ok(());
        };
        self.reporter.label(&format!("Sending local task: {}", task.name));
        self.reporter.tick(self.stats.remote_created_tasks as usize, out_of);

        // An unmapped incoming remote task with the same name is this task
        // seen from the other side: map the two instead of creating a
        // duplicate remote record, and let the update phase push the merge.
        if let Some(remote) = self.data.new_remote_tasks.get(&task.name).cloned() {
            let mapping = sync_mapping::Model {
                provider_id: self.adapter.provider_id(),
                task_uuid: *local_id,
                remote_id: remote.remote_id.clone(),
                is_updated: false,
            };
            MappingRepository::save(self.conn, &mapping).await?;
            self.data.local_changes.insert(*local_id, mapping.clone());
            self.data.remote_change_map.insert(*local_id, remote);
            self.data.local_id_to_mapping.insert(*local_id, mapping);
            return Ok(());
        }

        let remote_id = self.adapter.create_task(&task).await?;
        let mapping = sync_mapping::Model {
            provider_id: self.adapter.provider_id(),
            task_uuid: *local_id,
            remote_id: remote_id.clone(),
            is_updated: false,
        };
        MappingRepository::save(self.conn, &mapping).await?;
        self.data.local_id_to_mapping.insert(*local_id, mapping.clone());

        let tags = self.tag_names_for(local_id).await?;
        let proxy = TaskProxy::from_model(self.adapter.provider_id(), remote_id, &task, tags);
        self.adapter.push_task(&proxy, None, &mapping).await?;

        self.log.push_str(&format!("added '{}'\n", task.name));
        self.stats.remote_created_tasks += 1;
        Ok(())
    }

    // --- phase 2: DELETE (local -> remote)

    async fn delete_remote(&mut self) {
        if self.check_cancel() {
            return;
        }
        self.reporter.label("Sending locally deleted tasks");
        let pending = self.data.deleted_tasks.clone();
        let out_of = pending.len();
        for local_id in pending {
            if self.check_cancel() {
                return;
            }
            if let Err(e) = self.delete_one(&local_id, out_of).await {
                error!("failed to delete remote record for {local_id}: {e:#}");
            }
        }
    }

    async fn delete_one(&mut self, local_id: &Uuid, out_of: usize) -> anyhow::Result<()> {
        let Some(mapping) = self.data.local_id_to_mapping.get(local_id).cloned() else {
            return Ok(());
        };
        self.adapter.delete_task(&mapping).await?;
        MappingRepository::delete(self.conn, &mapping).await?;

        // drop every trace of the pair so later phases treat it as done
        self.data.local_changes.shift_remove(local_id);
        self.data.local_id_to_mapping.remove(local_id);
        self.data.remote_id_to_mapping.remove(&mapping.remote_id);
        self.data.remote_change_map.remove(local_id);
        self.data.remote_tasks.shift_remove(&mapping.remote_id);

        self.log.push_str(&format!("deleted id #{local_id}\n"));
        self.stats.remote_deleted_tasks += 1;
        self.reporter.tick(self.stats.remote_deleted_tasks as usize, out_of);
        Ok(())
    }

    // --- phase 3: UPDATE (local -> remote, merging on conflict)

    async fn update_remote(&mut self) {
        if self.check_cancel() {
            return;
        }
        let pending: Vec<sync_mapping::Model> = self.data.local_changes.values().cloned().collect();
        let out_of = pending.len();
        for mapping in pending {
            if self.check_cancel() {
                return;
            }
            if let Err(e) = self.push_one(&mapping, out_of).await {
                error!("failed to push task {}: {e:#}", mapping.task_uuid);
            }
        }
    }

    async fn push_one(&mut self, mapping: &sync_mapping::Model, out_of: usize) -> anyhow::Result<()> {
        let Some(task) = TaskRepository::fetch_for_sync(self.conn, &mapping.task_uuid).await? else {
            return Ok(());
        };
        let tags = self.tag_names_for(&mapping.task_uuid).await?;
        let mut local = TaskProxy::from_model(mapping.provider_id, mapping.remote_id.clone(), &task, tags);

        self.reporter.label(&format!("Sending local task: {}", task.name));
        self.reporter.tick(self.stats.remote_updated_tasks as usize, out_of);

        let conflict = self.data.remote_change_map.get(&mapping.task_uuid).cloned();
        if let Some(remote) = &conflict {
            local.merge_from(remote);
            self.stats.merged_tasks += 1;
        }

        if let Err(e) = self.adapter.push_task(&local, conflict.as_ref(), mapping).await {
            error!("error pushing '{}': {e}", task.name);
            self.log.push_str(&format!("error sending '{}'\n", task.name));
            return Ok(());
        }

        if conflict.is_some() {
            self.log.push_str(&format!("merged '{}'\n", task.name));
        } else {
            self.log.push_str(&format!("updated '{}'\n", task.name));
            self.stats.remote_updated_tasks += 1;
        }

        if let Some(remote) = conflict {
            // the apply phase must see what the server stored after the
            // merged push, not the pre-merge snapshot
            match self.adapter.refetch_task(&remote).await {
                Ok(fresh) => {
                    self.data.remote_tasks.insert(fresh.remote_id.clone(), fresh);
                }
                Err(e) => {
                    warn!("refetch after merged push failed for '{}': {e}", task.name);
                    self.data.remote_tasks.shift_remove(&remote.remote_id);
                }
            }
        }
        Ok(())
    }

    // --- phase 4: APPLY (remote -> local)

    async fn apply_remote(&mut self) {
        if self.check_cancel() {
            return;
        }
        self.log.push_str("\n>> on taskbridge:\n");
        self.reporter.tick(0, 1);
        let remote_tasks: Vec<TaskProxy> = self.data.remote_tasks.values().cloned().collect();
        let out_of = remote_tasks.len();
        for remote in remote_tasks {
            if self.check_cancel() {
                return;
            }
            if let Err(e) = self.apply_one(&remote, out_of).await {
                error!("failed to apply remote task {}: {e:#}", remote.remote_id);
            }
        }
    }

    async fn apply_one(&mut self, remote: &TaskProxy, out_of: usize) -> anyhow::Result<()> {
        if remote.name.is_empty() {
            self.reporter.label("Updating local tasks");
        } else {
            self.reporter.label(&format!("Updating local tasks: {}", remote.name));
        }

        let mut mapping = self.data.remote_id_to_mapping.get(&remote.remote_id).cloned();
        let task_uuid;

        if let Some(known) = &mapping {
            if remote.is_deleted {
                TaskRepository::delete_by_id(self.conn, &known.task_uuid).await?;
                MappingRepository::delete(self.conn, known).await?;
                self.data.local_id_to_mapping.remove(&known.task_uuid);
                self.data.remote_id_to_mapping.remove(&remote.remote_id);
                self.log.push_str(&format!("deleted {}\n", remote.name));
                self.stats.local_deleted_tasks += 1;
                return Ok(());
            }

            let Some(task) = TaskRepository::fetch_for_sync(self.conn, &known.task_uuid).await? else {
                warn!("mapping for remote {} points at a missing task", remote.remote_id);
                return Ok(());
            };
            self.log.push_str(&format!("updated '{}'\n", remote.name));
            task_uuid = task.uuid;

            let mut model = task.into_active_model();
            remote.write_to_model(&mut model);
            TaskRepository::update(self.conn, model).await?;
        } else {
            // brand new and already gone remotely: nothing to do
            if remote.is_deleted {
                return Ok(());
            }

            match TaskRepository::search_for_sync(self.conn, &remote.name).await? {
                Some(found) => {
                    mapping = self.data.local_id_to_mapping.get(&found.uuid).cloned();
                    self.log.push_str(&format!("merged {}\n", remote.name));
                    task_uuid = found.uuid;

                    let mut model = found.into_active_model();
                    remote.write_to_model(&mut model);
                    TaskRepository::update(self.conn, model).await?;
                }
                None => {
                    let mut blank = blank_task();
                    apply_task_defaults(self.config, &mut blank);
                    self.log.push_str(&format!("added {}\n", remote.name));
                    task_uuid = blank.uuid;

                    let mut model = active_from_model(&blank);
                    remote.write_to_model(&mut model);
                    TaskRepository::insert(self.conn, model).await?;
                }
            }
        }

        self.reconcile_tags(&task_uuid, remote).await?;

        // a pair still untracked after the rescue lookups counts as a
        // local create; everything else is an update of a known pair
        let newly_tracked = mapping.is_none();
        if mapping.is_none() {
            mapping = self.data.local_id_to_mapping.get(&task_uuid).cloned();
            if mapping.is_none() {
                let fresh = sync_mapping::Model {
                    provider_id: self.adapter.provider_id(),
                    task_uuid,
                    remote_id: remote.remote_id.clone(),
                    is_updated: false,
                };
                match MappingRepository::save(self.conn, &fresh).await {
                    Ok(()) => {
                        self.data.local_id_to_mapping.insert(task_uuid, fresh);
                    }
                    // unique violation: another pair claimed this remote id;
                    // the next run's name-based rescue sorts it out
                    Err(e) => {
                        warn!("could not record mapping for remote {}: {e:#}", remote.remote_id);
                    }
                }
            }
        }

        if newly_tracked {
            self.stats.local_created_tasks += 1;
        } else {
            self.stats.local_updated_tasks += 1;
        }

        self.reminders.reschedule(&task_uuid);
        self.reporter.tick(
            (self.stats.local_created_tasks + self.stats.local_updated_tasks) as usize,
            out_of,
        );
        Ok(())
    }

    /// Bring the task's tag links in line with the remote tag names,
    /// creating tags the store has never seen. Comparison is by lowercased
    /// name; the in-run index is authoritative.
    async fn reconcile_tags(&mut self, task_uuid: &Uuid, remote: &TaskProxy) -> anyhow::Result<()> {
        let mut remote_ids = HashSet::new();
        for name in &remote.tags {
            let lower = name.to_lowercase();
            let tag_id = match self.data.tags_by_lowercase_name.get(&lower) {
                Some(id) => *id,
                None => {
                    let tag = TagRepository::create(self.conn, name).await?;
                    self.data.tags_by_lowercase_name.insert(lower, tag.uuid);
                    let id = tag.uuid;
                    self.data.tags.insert(id, tag);
                    id
                }
            };
            remote_ids.insert(tag_id);
        }

        let current: HashSet<Uuid> = TagRepository::get_task_tags(self.conn, task_uuid)
            .await?
            .into_iter()
            .collect();

        for tag_id in current.difference(&remote_ids) {
            TagRepository::remove_tag(self.conn, task_uuid, tag_id).await?;
        }
        for tag_id in remote_ids.difference(&current) {
            TagRepository::add_tag(self.conn, task_uuid, tag_id).await?;
        }
        Ok(())
    }

    /// Resolve a task's tag links to names through the run's tag index.
    async fn tag_names_for(&self, local_id: &Uuid) -> anyhow::Result<Vec<String>> {
        let ids = TagRepository::get_task_tags(self.conn, local_id).await?;
        Ok(ids
            .iter()
            .filter_map(|id| self.data.tags.get(id).map(|t| t.name.clone()))
            .collect())
    }
}

fn blank_task() -> task::Model {
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

fn active_from_model(model: &task::Model) -> task::ActiveModel {
    task::ActiveModel {
        uuid: ActiveValue::Set(model.uuid),
        name: ActiveValue::Set(model.name.clone()),
        notes: ActiveValue::Set(model.notes.clone()),
        priority: ActiveValue::Set(model.priority),
        due_date: ActiveValue::Set(model.due_date),
        completion_date: ActiveValue::Set(model.completion_date),
        creation_date: ActiveValue::Set(model.creation_date),
        reminder_seconds: ActiveValue::Set(model.reminder_seconds),
        is_completed: ActiveValue::Set(model.is_completed),
        is_deleted: ActiveValue::Set(model.is_deleted),
    }
}
