//! Taskbridge - two-way synchronization between a local task store and
//! remote task services.
//!
//! This library reconciles tasks cached in a local SQLite database against
//! the state of an external task service. It detects creates, updates and
//! deletions on both sides, merges tasks that changed on both sides, and
//! keeps a persistent mapping between local and remote identities so that
//! consecutive runs are incremental.
//!
//! The transport to any concrete service is out of scope: the engine is
//! written once and parameterized by a [`adapter::RemoteAdapter`]
//! implementation and the provider identity it reports.
//!
//! # Modules
//!
//! * [`adapter`] - the remote service boundary: wire shape and adapter trait
//! * [`config`] - application configuration management
//! * [`entities`] - SeaORM entity models for the local store
//! * [`error`] - run-fatal error kinds
//! * [`reporter`] - progress and summary reporting capabilities
//! * [`repositories`] - database access layer
//! * [`storage`] - local database and schema management
//! * [`sync`] - the synchronization engine itself

/// Remote adapter boundary: `TaskProxy` wire shape and the adapter trait
pub mod adapter;

/// Configuration module for managing engine settings
pub mod config;

/// SeaORM entity models for tasks, tags and sync mappings
pub mod entities;

/// Error types surfaced by a synchronization run
pub mod error;

/// Progress and summary reporting capabilities
pub mod reporter;

/// Repository layer for database operations
pub mod repositories;

/// Local storage layer backing the engine
pub mod storage;

/// Synchronization engine: snapshot builder, reconciler, merge policy
pub mod sync;
