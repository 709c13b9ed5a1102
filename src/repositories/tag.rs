//! Tag repository for database operations.

use std::collections::HashMap;

use anyhow::Result;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveValue, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QuerySelect};
use uuid::Uuid;

use crate::entities::{tag, task_tag};

/// Repository for tag-related database operations.
pub struct TagRepository;

impl TagRepository {
    /// All tags keyed by identifier.
    pub async fn get_all_as_map<C>(conn: &C) -> Result<HashMap<Uuid, tag::Model>>
    where
        C: ConnectionTrait,
    {
        Ok(tag::Entity::find()
            .all(conn)
            .await?
            .into_iter()
            .map(|t| (t.uuid, t))
            .collect())
    }

    /// Identifiers of the tags attached to a task.
    pub async fn get_task_tags<C>(conn: &C, task_uuid: &Uuid) -> Result<Vec<Uuid>>
    where
        C: ConnectionTrait,
    {
        Ok(task_tag::Entity::find()
            .filter(task_tag::Column::TaskUuid.eq(*task_uuid))
            .select_only()
            .column(task_tag::Column::TagUuid)
            .into_tuple()
            .all(conn)
            .await?)
    }

    /// Create a tag with the given name, preserving its casing.
    pub async fn create<C>(conn: &C, name: &str) -> Result<tag::Model>
    where
        C: ConnectionTrait,
    {
        let model = tag::Model {
            uuid: Uuid::new_v4(),
            name: name.to_string(),
        };
        let active = tag::ActiveModel {
            uuid: ActiveValue::Set(model.uuid),
            name: ActiveValue::Set(model.name.clone()),
        };
        tag::Entity::insert(active).exec(conn).await?;
        Ok(model)
    }

    /// Attach a tag to a task; attaching twice is a no-op.
    pub async fn add_tag<C>(conn: &C, task_uuid: &Uuid, tag_uuid: &Uuid) -> Result<()>
    where
        C: ConnectionTrait,
    {
        let link = task_tag::ActiveModel {
            task_uuid: ActiveValue::Set(*task_uuid),
            tag_uuid: ActiveValue::Set(*tag_uuid),
        };
        let insert = task_tag::Entity::insert(link).on_conflict(
            OnConflict::columns([task_tag::Column::TaskUuid, task_tag::Column::TagUuid])
                .do_nothing()
                .to_owned(),
        );
        match insert.exec(conn).await {
            Ok(_) | Err(DbErr::RecordNotInserted) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Detach a tag from a task.
    pub async fn remove_tag<C>(conn: &C, task_uuid: &Uuid, tag_uuid: &Uuid) -> Result<()>
    where
        C: ConnectionTrait,
    {
        task_tag::Entity::delete_many()
            .filter(task_tag::Column::TaskUuid.eq(*task_uuid))
            .filter(task_tag::Column::TagUuid.eq(*tag_uuid))
            .exec(conn)
            .await?;
        Ok(())
    }
}
