//! The desired-state store seam.
//!
//! The controller never caches instances across passes: every pass reads a
//! fresh snapshot through [`ResourceStore::get`] and writes status through
//! [`ResourceStore::update_status`] guarded by the snapshot's version token.

use async_trait::async_trait;
use thiserror::Error;

use crate::resource::{AcrDeployment, ResourceKey};
use crate::status::AcrDeploymentStatus;

/// Errors returned by a [`ResourceStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// The stored instance changed since the version token was read.
    #[error("version conflict updating {key}: expected version {expected_version}")]
    Conflict {
        /// Instance being written.
        key: ResourceKey,
        /// Version token the write was conditioned on.
        expected_version: String,
    },

    /// The instance disappeared between read and write.
    #[error("{key} no longer exists")]
    Gone {
        /// Instance being written.
        key: ResourceKey,
    },

    /// The store could not be reached or rejected the request.
    #[error("store unavailable while {operation} {key}: {reason}")]
    Unavailable {
        /// Instance being accessed.
        key: ResourceKey,
        /// What was being done (`reading`, `updating status of`).
        operation: &'static str,
        /// Underlying failure.
        reason: String,
    },
}

/// Read access to desired state and versioned write access to status.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Reads the current snapshot of an instance, or `None` if it does not exist.
    async fn get(&self, key: &ResourceKey) -> Result<Option<AcrDeployment>, StoreError>;

    /// Replaces the status of an instance if its version still equals `expected_version`.
    async fn update_status(
        &self,
        key: &ResourceKey,
        status: &AcrDeploymentStatus,
        expected_version: &str,
    ) -> Result<(), StoreError>;
}
