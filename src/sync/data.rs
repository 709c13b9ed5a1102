//! Run-scoped snapshot of everything the reconciler works from.
//!
//! Built once at the start of a run and never shared across runs. The
//! derived indices are mutated in place as phases make progress, so the
//! construction order below is fixed: mappings first, then the indices
//! derived from them, then the remote-task maps, then the work sets.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use indexmap::IndexMap;
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::adapter::{ProviderId, TaskProxy};
use crate::entities::{sync_mapping, tag};
use crate::repositories::{MappingRepository, TagRepository, TaskRepository};

/// Snapshot joining the local store, the mapping table and the remote
/// fetch for one provider.
pub(crate) struct SyncData {
    /// Tasks that are not soft-deleted.
    pub active_tasks: HashSet<Uuid>,
    /// Every task row, soft-deleted ones included.
    pub all_tasks: HashSet<Uuid>,

    pub remote_id_to_mapping: HashMap<String, sync_mapping::Model>,
    pub local_id_to_mapping: HashMap<Uuid, sync_mapping::Model>,

    /// Mappings whose task changed locally since the last push.
    pub local_changes: IndexMap<Uuid, sync_mapping::Model>,
    pub mapped_tasks: HashSet<Uuid>,

    /// Remote tasks that already have a mapping, keyed by local id.
    pub remote_change_map: HashMap<Uuid, TaskProxy>,
    /// Remote tasks with no mapping, keyed by name for the rescue join.
    pub new_remote_tasks: HashMap<String, TaskProxy>,

    pub tags: HashMap<Uuid, tag::Model>,
    pub tags_by_lowercase_name: HashMap<String, Uuid>,

    /// Active tasks the provider has never seen.
    pub newly_created_tasks: Vec<Uuid>,
    /// Mapped tasks whose local row is gone.
    pub deleted_tasks: Vec<Uuid>,

    /// The remote fetch, keyed by remote id in fetch order. The update
    /// phase replaces entries here after a merged push so the apply phase
    /// sees what the server actually stored.
    pub remote_tasks: IndexMap<String, TaskProxy>,
}

impl SyncData {
    pub(crate) async fn build(
        conn: &DatabaseConnection,
        provider_id: ProviderId,
        remote_tasks: Vec<TaskProxy>,
    ) -> Result<Self> {
        // 1. read everything we need out of the database
        let mappings = MappingRepository::get_for_provider(conn, provider_id).await?;
        let active_ids = TaskRepository::get_active_identifiers(conn).await?;
        let active_tasks: HashSet<Uuid> = active_ids.iter().copied().collect();
        let all_tasks: HashSet<Uuid> = TaskRepository::get_all_identifiers(conn)
            .await?
            .into_iter()
            .collect();
        let tags = TagRepository::get_all_as_map(conn).await?;

        // 2. indices derived from the mapping table
        let mut remote_id_to_mapping = HashMap::new();
        let mut local_id_to_mapping = HashMap::new();
        let mut local_changes = IndexMap::new();
        let mut mapped_tasks = HashSet::new();
        for mapping in &mappings {
            if mapping.is_updated {
                local_changes.insert(mapping.task_uuid, mapping.clone());
            }
            remote_id_to_mapping.insert(mapping.remote_id.clone(), mapping.clone());
            local_id_to_mapping.insert(mapping.task_uuid, mapping.clone());
            mapped_tasks.insert(mapping.task_uuid);
        }

        let mut tags_by_lowercase_name = HashMap::new();
        for tag in tags.values() {
            tags_by_lowercase_name.insert(tag.name.to_lowercase(), tag.uuid);
        }

        // 3. split the remote fetch into already-mapped and brand-new
        let mut remote_change_map = HashMap::new();
        let mut new_remote_tasks = HashMap::new();
        let mut remote_by_id = IndexMap::new();
        for remote in remote_tasks {
            if let Some(mapping) = remote_id_to_mapping.get(&remote.remote_id) {
                remote_change_map.insert(mapping.task_uuid, remote.clone());
            } else if !remote.name.is_empty() {
                new_remote_tasks.insert(remote.name.clone(), remote.clone());
            }
            remote_by_id.insert(remote.remote_id.clone(), remote);
        }

        // 4. the work sets
        let newly_created_tasks: Vec<Uuid> = active_ids
            .into_iter()
            .filter(|id| !mapped_tasks.contains(id))
            .collect();
        let deleted_tasks: Vec<Uuid> = mappings
            .iter()
            .map(|m| m.task_uuid)
            .filter(|id| !all_tasks.contains(id))
            .collect();

        Ok(Self {
            active_tasks,
            all_tasks,
            remote_id_to_mapping,
            local_id_to_mapping,
            local_changes,
            mapped_tasks,
            remote_change_map,
            new_remote_tasks,
            tags,
            tags_by_lowercase_name,
            newly_created_tasks,
            deleted_tasks,
            remote_tasks: remote_by_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::task;
    use crate::storage::LocalStorage;
    use chrono::Utc;
    use sea_orm::ActiveValue;

    const PROVIDER: ProviderId = 7;

    async fn insert_task(conn: &DatabaseConnection, name: &str, deleted: bool) -> Uuid {
        let uuid = Uuid::new_v4();
        let task = task::ActiveModel {
            uuid: ActiveValue::Set(uuid),
            name: ActiveValue::Set(name.to_string()),
            notes: ActiveValue::Set(None),
            priority: ActiveValue::Set(0),
            due_date: ActiveValue::Set(None),
            completion_date: ActiveValue::Set(None),
            creation_date: ActiveValue::Set(Utc::now()),
            reminder_seconds: ActiveValue::Set(None),
            is_completed: ActiveValue::Set(false),
            is_deleted: ActiveValue::Set(deleted),
        };
        TaskRepository::insert(conn, task).await.unwrap();
        uuid
    }

    async fn insert_mapping(conn: &DatabaseConnection, task_uuid: Uuid, remote_id: &str, updated: bool) {
        let mapping = sync_mapping::Model {
            provider_id: PROVIDER,
            task_uuid,
            remote_id: remote_id.to_string(),
            is_updated: updated,
        };
        MappingRepository::save(conn, &mapping).await.unwrap();
    }

    fn remote(remote_id: &str, name: &str) -> TaskProxy {
        let mut proxy = TaskProxy::new(PROVIDER, remote_id);
        proxy.name = name.to_string();
        proxy
    }

    #[tokio::test]
    async fn work_sets_partition_the_local_store() {
        let storage = LocalStorage::new_in_memory().await.unwrap();
        let conn = &storage.conn;

        let mapped = insert_task(conn, "Mapped", false).await;
        let unmapped = insert_task(conn, "Unmapped", false).await;
        let soft_deleted = insert_task(conn, "Soft deleted", true).await;

        insert_mapping(conn, mapped, "r-mapped", true).await;
        // mapping whose task row is gone entirely
        let purged = Uuid::new_v4();
        insert_mapping(conn, purged, "r-purged", false).await;

        let data = SyncData::build(conn, PROVIDER, vec![]).await.unwrap();

        assert_eq!(data.newly_created_tasks, vec![unmapped]);
        assert_eq!(data.deleted_tasks, vec![purged]);
        assert!(data.mapped_tasks.contains(&mapped));
        assert!(data.active_tasks.contains(&mapped));
        assert!(!data.active_tasks.contains(&soft_deleted));
        assert!(data.all_tasks.contains(&soft_deleted));
        assert_eq!(data.local_changes.len(), 1);
        assert!(data.local_changes.contains_key(&mapped));
    }

    #[tokio::test]
    async fn remote_fetch_splits_on_mapping_presence() {
        let storage = LocalStorage::new_in_memory().await.unwrap();
        let conn = &storage.conn;

        let mapped = insert_task(conn, "Known", false).await;
        insert_mapping(conn, mapped, "r1", false).await;

        let fetched = vec![remote("r1", "Known"), remote("r2", "Brand new")];
        let data = SyncData::build(conn, PROVIDER, fetched).await.unwrap();

        assert!(data.remote_change_map.contains_key(&mapped));
        assert!(data.new_remote_tasks.contains_key("Brand new"));
        assert!(!data.new_remote_tasks.contains_key("Known"));
        assert_eq!(data.remote_tasks.len(), 2);
        // fetch order is preserved for the apply phase
        let ids: Vec<&String> = data.remote_tasks.keys().collect();
        assert_eq!(ids, vec!["r1", "r2"]);
    }

    #[tokio::test]
    async fn unnamed_remote_tasks_are_not_rescue_candidates() {
        let storage = LocalStorage::new_in_memory().await.unwrap();
        let conn = &storage.conn;

        let data = SyncData::build(conn, PROVIDER, vec![remote("r9", "")]).await.unwrap();

        assert!(data.new_remote_tasks.is_empty());
        assert!(data.remote_tasks.contains_key("r9"));
    }
}
