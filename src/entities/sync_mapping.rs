use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persisted correspondence between a local task and a provider's remote
/// record.
///
/// One row per `(provider_id, task_uuid)`; `(provider_id, remote_id)` is
/// unique as well. There is deliberately no foreign key to `tasks`: a
/// mapping whose task row is gone is exactly how a local deletion is
/// detected on the next run.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sync_mappings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub provider_id: i32,
    #[sea_orm(primary_key, auto_increment = false)]
    pub task_uuid: Uuid,
    pub remote_id: String,
    /// Set when the local task changed after the last successful push.
    pub is_updated: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
