//! Sync-mapping repository for database operations.

use anyhow::Result;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ActiveValue, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};
use uuid::Uuid;

use crate::adapter::ProviderId;
use crate::entities::sync_mapping;

/// Repository for the persisted local/remote correspondence table.
pub struct MappingRepository;

impl MappingRepository {
    /// All mappings for one provider.
    pub async fn get_for_provider<C>(conn: &C, provider_id: ProviderId) -> Result<Vec<sync_mapping::Model>>
    where
        C: ConnectionTrait,
    {
        Ok(sync_mapping::Entity::find()
            .filter(sync_mapping::Column::ProviderId.eq(provider_id))
            .order_by_asc(sync_mapping::Column::TaskUuid)
            .all(conn)
            .await?)
    }

    /// Upsert a mapping row.
    ///
    /// Conflicts on the `(provider_id, task_uuid)` key update the row in
    /// place; a collision on the `(provider_id, remote_id)` unique index is
    /// surfaced as an error for the caller to resolve.
    pub async fn save<C>(conn: &C, mapping: &sync_mapping::Model) -> Result<()>
    where
        C: ConnectionTrait,
    {
        let active = sync_mapping::ActiveModel {
            provider_id: ActiveValue::Set(mapping.provider_id),
            task_uuid: ActiveValue::Set(mapping.task_uuid),
            remote_id: ActiveValue::Set(mapping.remote_id.clone()),
            is_updated: ActiveValue::Set(mapping.is_updated),
        };
        sync_mapping::Entity::insert(active)
            .on_conflict(
                OnConflict::columns([
                    sync_mapping::Column::ProviderId,
                    sync_mapping::Column::TaskUuid,
                ])
                .update_columns([
                    sync_mapping::Column::RemoteId,
                    sync_mapping::Column::IsUpdated,
                ])
                .to_owned(),
            )
            .exec(conn)
            .await?;
        Ok(())
    }

    /// Remove a mapping row.
    pub async fn delete<C>(conn: &C, mapping: &sync_mapping::Model) -> Result<()>
    where
        C: ConnectionTrait,
    {
        sync_mapping::Entity::delete_many()
            .filter(sync_mapping::Column::ProviderId.eq(mapping.provider_id))
            .filter(sync_mapping::Column::TaskUuid.eq(mapping.task_uuid))
            .exec(conn)
            .await?;
        Ok(())
    }

    /// Flag a task as changed since the last successful push.
    ///
    /// Called by the hosting application whenever it mutates a mapped task.
    pub async fn mark_updated<C>(conn: &C, provider_id: ProviderId, task_uuid: &Uuid) -> Result<()>
    where
        C: ConnectionTrait,
    {
        sync_mapping::Entity::update_many()
            .col_expr(sync_mapping::Column::IsUpdated, Expr::value(true))
            .filter(sync_mapping::Column::ProviderId.eq(provider_id))
            .filter(sync_mapping::Column::TaskUuid.eq(*task_uuid))
            .exec(conn)
            .await?;
        Ok(())
    }

    /// Clear the updated flag on every mapping of a provider, so only
    /// post-run mutations carry the dirty flag into the next run.
    pub async fn clear_updated<C>(conn: &C, provider_id: ProviderId) -> Result<()>
    where
        C: ConnectionTrait,
    {
        sync_mapping::Entity::update_many()
            .col_expr(sync_mapping::Column::IsUpdated, Expr::value(false))
            .filter(sync_mapping::Column::ProviderId.eq(provider_id))
            .exec(conn)
            .await?;
        Ok(())
    }
}
