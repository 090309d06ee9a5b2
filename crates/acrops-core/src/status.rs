//! Observed state of an `AcrDeployment`.
//!
//! The status is the only part of the resource the controller writes. It
//! carries the last complete repository summary and, when the most recent
//! pass ended in a permanent failure, a classified [`StatusError`].

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Observed state of an `AcrDeployment`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AcrDeploymentStatus {
    /// Current phase.
    #[serde(default)]
    pub phase: Phase,

    /// When the status content last changed (RFC 3339).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_time: Option<String>,

    /// Repository names from the last complete enumeration, in registry order.
    #[serde(default)]
    pub repositories: Vec<String>,

    /// Number of entries in `repositories`.
    #[serde(default)]
    pub repository_count: u32,

    /// Classified error from the last pass, if it failed permanently.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<StatusError>,

    /// Spec generation this status was computed from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl AcrDeploymentStatus {
    /// Status for a pass that enumerated the registry completely.
    #[must_use]
    pub fn synced(repositories: Vec<String>, generation: Option<i64>, now: DateTime<Utc>) -> Self {
        Self {
            phase: Phase::Ready,
            last_sync_time: Some(format_time(now)),
            repository_count: u32::try_from(repositories.len()).unwrap_or(u32::MAX),
            repositories,
            last_error: None,
            observed_generation: generation,
        }
    }

    /// Status for a pass that ended in a permanent failure.
    ///
    /// The previous repository summary is kept: it is still the last complete
    /// view of the registry.
    #[must_use]
    pub fn failed(
        previous: Option<&Self>,
        error: StatusError,
        generation: Option<i64>,
        now: DateTime<Utc>,
    ) -> Self {
        let (repositories, repository_count) = previous
            .map(|p| (p.repositories.clone(), p.repository_count))
            .unwrap_or_default();
        Self {
            phase: Phase::Failed,
            last_sync_time: Some(format_time(now)),
            repositories,
            repository_count,
            last_error: Some(error),
            observed_generation: generation,
        }
    }

    /// Returns true if both statuses carry the same content, ignoring `lastSyncTime`.
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self.phase == other.phase
            && self.repositories == other.repositories
            && self.repository_count == other.repository_count
            && self.last_error == other.last_error
            && self.observed_generation == other.observed_generation
    }
}

fn format_time(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Phase of an `AcrDeployment`.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum Phase {
    /// Not reconciled yet.
    #[default]
    Pending,
    /// Last pass enumerated the registry completely.
    Ready,
    /// Last pass failed permanently; needs operator action.
    Failed,
}

/// A classified error as recorded in status.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusError {
    /// Stable error category.
    pub category: ErrorCategory,
    /// Human-readable, sanitized message.
    pub message: String,
}

impl StatusError {
    /// Creates a status error.
    #[must_use]
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}

/// Stable error categories surfaced by the reconciler.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The instance no longer exists.
    NotFound,
    /// The spec cannot be turned into a registry endpoint.
    MalformedSpec,
    /// The credential provider permanently refused the identity.
    CredentialDenied,
    /// The credential provider failed in a way that may succeed on retry.
    CredentialTransient,
    /// A page fetch failed during enumeration.
    EnumerationTransient,
    /// Enumeration stopped before the registry reported the last page.
    EnumerationTruncated,
    /// The status write kept losing optimistic-concurrency races.
    StatusConflict,
    /// The desired-state store could not be reached.
    StoreUnavailable,
    /// The invocation deadline expired during a network call.
    Cancelled,
}

impl ErrorCategory {
    /// Returns true if the category is retried through a requeue.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(
            self,
            Self::CredentialTransient
                | Self::EnumerationTransient
                | Self::EnumerationTruncated
                | Self::StoreUnavailable
                | Self::Cancelled
        )
    }

    /// Returns the category name as written into status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "NotFound",
            Self::MalformedSpec => "MalformedSpec",
            Self::CredentialDenied => "CredentialDenied",
            Self::CredentialTransient => "CredentialTransient",
            Self::EnumerationTransient => "EnumerationTransient",
            Self::EnumerationTruncated => "EnumerationTruncated",
            Self::StatusConflict => "StatusConflict",
            Self::StoreUnavailable => "StoreUnavailable",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
