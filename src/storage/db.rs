use std::path::Path;

use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};

/// Local storage manager for the task data the engine reconciles.
///
/// Wraps a single SQLite connection. The connection pool is capped at one
/// connection so that a sync run is the only writer while it holds the
/// storage handle, and so pragmas apply to every statement.
pub struct LocalStorage {
    pub conn: DatabaseConnection,
}

impl LocalStorage {
    /// Initialize storage backed by an in-memory `SQLite` database.
    pub async fn new_in_memory() -> Result<Self> {
        Self::open("sqlite::memory:").await
    }

    /// Initialize storage backed by a `SQLite` database file, creating it
    /// when absent.
    pub async fn new_with_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let url = format!("sqlite://{}?mode=rwc", path.as_ref().display());
        Self::open(&url).await
    }

    async fn open(url: &str) -> Result<Self> {
        let mut options = ConnectOptions::new(url.to_string());
        options.max_connections(1).sqlx_logging(false);

        let conn = Database::connect(options).await?;
        conn.execute_unprepared("PRAGMA foreign_keys = ON").await?;

        let storage = LocalStorage { conn };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Initialize database schema
    async fn init_schema(&self) -> Result<()> {
        self.conn
            .execute_unprepared(
                r"
                CREATE TABLE IF NOT EXISTS tasks (
                    uuid TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    notes TEXT,
                    priority INTEGER NOT NULL DEFAULT 0,
                    due_date TEXT,
                    completion_date TEXT,
                    creation_date TEXT NOT NULL,
                    reminder_seconds INTEGER,
                    is_completed BOOLEAN NOT NULL DEFAULT 0,
                    is_deleted BOOLEAN NOT NULL DEFAULT 0
                )
                ",
            )
            .await?;

        self.conn
            .execute_unprepared(
                r"
                CREATE TABLE IF NOT EXISTS tags (
                    uuid TEXT PRIMARY KEY,
                    name TEXT NOT NULL
                )
                ",
            )
            .await?;

        self.conn
            .execute_unprepared(
                r"
                CREATE TABLE IF NOT EXISTS task_tags (
                    task_uuid TEXT NOT NULL,
                    tag_uuid TEXT NOT NULL,
                    PRIMARY KEY (task_uuid, tag_uuid),
                    FOREIGN KEY (task_uuid) REFERENCES tasks(uuid) ON DELETE CASCADE,
                    FOREIGN KEY (tag_uuid) REFERENCES tags(uuid) ON DELETE CASCADE
                )
                ",
            )
            .await?;

        // No foreign key from sync_mappings to tasks: a mapping that
        // outlives its task row is how a local deletion is detected.
        self.conn
            .execute_unprepared(
                r"
                CREATE TABLE IF NOT EXISTS sync_mappings (
                    provider_id INTEGER NOT NULL,
                    task_uuid TEXT NOT NULL,
                    remote_id TEXT NOT NULL,
                    is_updated BOOLEAN NOT NULL DEFAULT 0,
                    PRIMARY KEY (provider_id, task_uuid)
                )
                ",
            )
            .await?;

        self.conn
            .execute_unprepared(
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_sync_mappings_remote ON sync_mappings(provider_id, remote_id)",
            )
            .await?;

        self.conn
            .execute_unprepared("CREATE INDEX IF NOT EXISTS idx_task_tags_task_uuid ON task_tags(task_uuid)")
            .await?;

        self.conn
            .execute_unprepared("CREATE INDEX IF NOT EXISTS idx_task_tags_tag_uuid ON task_tags(tag_uuid)")
            .await?;

        self.conn
            .execute_unprepared("CREATE INDEX IF NOT EXISTS idx_tasks_name ON tasks(name)")
            .await?;

        Ok(())
    }

    /// Check if the database has any data
    pub async fn has_data(&self) -> Result<bool> {
        use sea_orm::{EntityTrait, PaginatorTrait};
        let count = crate::entities::Task::find().count(&self.conn).await?;
        Ok(count > 0)
    }

    /// Clear all data from the database
    pub async fn clear_all_data(&self) -> Result<()> {
        self.conn.execute_unprepared("DELETE FROM task_tags").await?;
        self.conn.execute_unprepared("DELETE FROM sync_mappings").await?;
        self.conn.execute_unprepared("DELETE FROM tasks").await?;
        self.conn.execute_unprepared("DELETE FROM tags").await?;
        Ok(())
    }
}
