//! Remote adapter boundary.
//!
//! This module defines the interface the engine uses to talk to a remote
//! task service, along with the wire-neutral task shape and the error type
//! adapters report. The adapter is the only component that ever touches the
//! network; everything else in the crate operates on [`TaskProxy`] values
//! and the persisted sync mappings.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::ActiveValue;
use serde::{Deserialize, Serialize};

use crate::entities::{sync_mapping, task};

/// Stable integer identifying a remote provider.
pub type ProviderId = i32;

/// Errors reported by remote adapter operations.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("remote error: {0}")]
    Other(String),
}

impl RemoteError {
    /// Whether this error means the provider rejected our credentials.
    pub fn is_auth(&self) -> bool {
        matches!(self, RemoteError::Auth(_))
    }
}

/// Wire-neutral task representation exchanged with the adapter.
///
/// Built per run from either the local store or the remote fetch, and
/// discarded when the run ends. Optional fields distinguish "not set" from
/// a concrete value so the merge policy can resolve them per field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskProxy {
    pub provider_id: ProviderId,
    pub remote_id: String,
    /// Task name; empty means the remote record carries no usable name.
    pub name: String,
    pub notes: Option<String>,
    pub priority: Option<i32>,
    pub due_date: Option<DateTime<Utc>>,
    pub completion_date: Option<DateTime<Utc>>,
    pub reminder_seconds: Option<i32>,
    pub is_completed: bool,
    pub is_deleted: bool,
    pub tags: Vec<String>,
}

impl TaskProxy {
    /// An empty proxy for the given remote identity.
    pub fn new(provider_id: ProviderId, remote_id: impl Into<String>) -> Self {
        Self {
            provider_id,
            remote_id: remote_id.into(),
            name: String::new(),
            notes: None,
            priority: None,
            due_date: None,
            completion_date: None,
            reminder_seconds: None,
            is_completed: false,
            is_deleted: false,
            tags: Vec::new(),
        }
    }

    /// Build a proxy from a local task model and its resolved tag names.
    pub fn from_model(
        provider_id: ProviderId,
        remote_id: impl Into<String>,
        task: &task::Model,
        tags: Vec<String>,
    ) -> Self {
        Self {
            provider_id,
            remote_id: remote_id.into(),
            name: task.name.clone(),
            notes: task.notes.clone(),
            priority: Some(task.priority),
            due_date: task.due_date,
            completion_date: task.completion_date,
            reminder_seconds: task.reminder_seconds,
            is_completed: task.is_completed,
            is_deleted: task.is_deleted,
            tags,
        }
    }

    /// Write this proxy's state into a local task model.
    ///
    /// Fields the remote side left unset keep their local value; flags are
    /// always authoritative because the remote fetch reports them for every
    /// record. Tags are reconciled separately through the tag store.
    pub fn write_to_model(&self, model: &mut task::ActiveModel) {
        if !self.name.is_empty() {
            model.name = ActiveValue::Set(self.name.clone());
        }
        if self.notes.is_some() {
            model.notes = ActiveValue::Set(self.notes.clone());
        }
        if let Some(priority) = self.priority {
            model.priority = ActiveValue::Set(priority);
        }
        if self.due_date.is_some() {
            model.due_date = ActiveValue::Set(self.due_date);
        }
        if self.completion_date.is_some() {
            model.completion_date = ActiveValue::Set(self.completion_date);
        }
        if self.reminder_seconds.is_some() {
            model.reminder_seconds = ActiveValue::Set(self.reminder_seconds);
        }
        model.is_completed = ActiveValue::Set(self.is_completed);
        model.is_deleted = ActiveValue::Set(self.is_deleted);
    }
}

/// Interface to a remote task service for one provider.
///
/// The engine drives one adapter per run. Every call may suspend; per-call
/// timeouts and internal retries are the adapter's responsibility, and a
/// failure is reported as a [`RemoteError`] for the task at hand.
#[async_trait]
pub trait RemoteAdapter: Send + Sync {
    /// Stable identity of the provider this adapter talks to.
    fn provider_id(&self) -> ProviderId;

    /// Human-readable provider name used in the run summary.
    fn display_name(&self) -> &str;

    /// Fetch the remote tasks relevant for this run.
    ///
    /// Providers with change tracking should return only records that
    /// changed since the last run; returning unchanged records is legal but
    /// makes the run re-apply them locally.
    async fn fetch_tasks(&self) -> Result<Vec<TaskProxy>, RemoteError>;

    /// Create a remote record for a local task and return its remote id.
    ///
    /// The engine immediately follows a successful create with
    /// [`push_task`](Self::push_task) on the returned id.
    async fn create_task(&self, task: &task::Model) -> Result<String, RemoteError>;

    /// Write full task state to the remote record named by `mapping`.
    ///
    /// When `merged_against` is present the caller guarantees `task` was
    /// produced by merging against that remote snapshot.
    async fn push_task(
        &self,
        task: &TaskProxy,
        merged_against: Option<&TaskProxy>,
        mapping: &sync_mapping::Model,
    ) -> Result<(), RemoteError>;

    /// Re-read a remote record, canonicalizing what the service stored
    /// after a merged push.
    async fn refetch_task(&self, task: &TaskProxy) -> Result<TaskProxy, RemoteError>;

    /// Delete the remote record named by `mapping`.
    ///
    /// Must be idempotent: deleting an id the service no longer knows
    /// succeeds.
    async fn delete_task(&self, mapping: &sync_mapping::Model) -> Result<(), RemoteError>;
}
