//! Run-fatal error kinds.
//!
//! Per-task failures inside a run are logged and skipped; only conditions
//! that would leave the snapshot or the mapping table inconsistent surface
//! as a [`SyncError`].

use crate::adapter::RemoteError;

/// Errors that abort a synchronization run.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The provider rejected our credentials; the run aborts before any
    /// phase executes.
    #[error("provider authentication failed: {0}")]
    Auth(String),

    /// The remote fetch failed before the snapshot was built.
    #[error("remote service failure: {0}")]
    Remote(#[from] RemoteError),

    /// The local store failed while building the snapshot or finalizing
    /// the run.
    #[error("local store failure: {0}")]
    Store(String),
}

impl SyncError {
    /// Wrap a store-layer failure.
    pub fn store(err: impl std::fmt::Display) -> Self {
        SyncError::Store(err.to_string())
    }

    /// Classify a fetch-time remote failure, promoting credential problems
    /// to [`SyncError::Auth`].
    pub fn from_fetch(err: RemoteError) -> Self {
        if err.is_auth() {
            SyncError::Auth(err.to_string())
        } else {
            SyncError::Remote(err)
        }
    }
}
