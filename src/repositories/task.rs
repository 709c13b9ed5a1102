//! Task repository for database operations.

use anyhow::Result;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use uuid::Uuid;

use crate::entities::task;

/// Repository for task-related database operations.
///
/// Exposes the handful of semantic operations the sync engine needs; the
/// hosting application owns everything else about the task table.
pub struct TaskRepository;

impl TaskRepository {
    /// Load the sync view of one task.
    pub async fn fetch_for_sync<C>(conn: &C, uuid: &Uuid) -> Result<Option<task::Model>>
    where
        C: ConnectionTrait,
    {
        Ok(task::Entity::find()
            .filter(task::Column::Uuid.eq(*uuid))
            .one(conn)
            .await?)
    }

    /// Find a live task by exact name, used for name-based rescue of
    /// unmapped remote tasks.
    pub async fn search_for_sync<C>(conn: &C, name: &str) -> Result<Option<task::Model>>
    where
        C: ConnectionTrait,
    {
        Ok(task::Entity::find()
            .filter(task::Column::Name.eq(name))
            .filter(task::Column::IsDeleted.eq(false))
            .order_by_asc(task::Column::CreationDate)
            .one(conn)
            .await?)
    }

    /// Identifiers of tasks that are not soft-deleted.
    pub async fn get_active_identifiers<C>(conn: &C) -> Result<Vec<Uuid>>
    where
        C: ConnectionTrait,
    {
        Ok(task::Entity::find()
            .filter(task::Column::IsDeleted.eq(false))
            .order_by_asc(task::Column::CreationDate)
            .select_only()
            .column(task::Column::Uuid)
            .into_tuple()
            .all(conn)
            .await?)
    }

    /// Identifiers of every task row, soft-deleted ones included.
    pub async fn get_all_identifiers<C>(conn: &C) -> Result<Vec<Uuid>>
    where
        C: ConnectionTrait,
    {
        Ok(task::Entity::find()
            .order_by_asc(task::Column::CreationDate)
            .select_only()
            .column(task::Column::Uuid)
            .into_tuple()
            .all(conn)
            .await?)
    }

    /// Insert a freshly materialized task.
    pub async fn insert<C>(conn: &C, task: task::ActiveModel) -> Result<()>
    where
        C: ConnectionTrait,
    {
        task::Entity::insert(task).exec(conn).await?;
        Ok(())
    }

    /// Update a task in the database.
    pub async fn update<C>(conn: &C, task: task::ActiveModel) -> Result<task::Model>
    where
        C: ConnectionTrait,
    {
        Ok(task.update(conn).await?)
    }

    /// Remove a task row entirely.
    pub async fn delete_by_id<C>(conn: &C, uuid: &Uuid) -> Result<()>
    where
        C: ConnectionTrait,
    {
        task::Entity::delete_many()
            .filter(task::Column::Uuid.eq(*uuid))
            .exec(conn)
            .await?;
        Ok(())
    }
}
