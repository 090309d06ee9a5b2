//! Error types for the controller crate.
//!
//! Every failure of a pass maps onto one [`ErrorCategory`]. The category,
//! not the raw error, decides whether the pass is requeued and is what ends
//! up in status.

use std::time::Duration;

use acrops_core::{ErrorCategory, RegistryEndpoint, ResourceKey, StoreError};
use acrops_registry::RegistryError;
use thiserror::Error;

/// Result type alias for controller operations.
pub type Result<T> = std::result::Result<T, ReconcileError>;

/// Errors that can end a reconciliation pass.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// The spec cannot be turned into a registry endpoint.
    #[error("invalid spec for '{key}': {source}")]
    MalformedSpec {
        /// Instance being reconciled.
        key: ResourceKey,
        /// Validation failure.
        #[source]
        source: acrops_core::Error,
    },

    /// The credential provider refused the identity.
    #[error("credential denied for '{endpoint}': {message}")]
    CredentialDenied {
        /// Registry endpoint.
        endpoint: RegistryEndpoint,
        /// Provider message.
        message: String,
    },

    /// The credential provider failed in a way that may clear up.
    #[error("credential unavailable for '{endpoint}': {message}")]
    CredentialTransient {
        /// Registry endpoint.
        endpoint: RegistryEndpoint,
        /// Provider message.
        message: String,
    },

    /// A catalog page could not be fetched.
    #[error("enumeration of '{endpoint}' failed: {source}")]
    Enumeration {
        /// Registry endpoint.
        endpoint: RegistryEndpoint,
        /// Page failure.
        #[source]
        source: RegistryError,
    },

    /// The status write kept losing optimistic concurrency races.
    #[error("status of '{key}' still conflicting after {attempts} write attempt(s)")]
    StatusConflict {
        /// Instance being reconciled.
        key: ResourceKey,
        /// Writes attempted.
        attempts: u32,
    },

    /// The desired-state store failed.
    #[error("store error: {0}")]
    Store(#[source] StoreError),

    /// The pass deadline expired during a network call.
    #[error("deadline exceeded while {operation} for '{key}'")]
    Cancelled {
        /// Instance being reconciled.
        key: ResourceKey,
        /// Operation in flight.
        operation: &'static str,
    },
}

impl ReconcileError {
    /// The stable category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MalformedSpec { .. } => ErrorCategory::MalformedSpec,
            Self::CredentialDenied { .. } => ErrorCategory::CredentialDenied,
            Self::CredentialTransient { .. } => ErrorCategory::CredentialTransient,
            Self::Enumeration {
                source: RegistryError::Truncated { .. } | RegistryError::ForeignPageLink { .. },
                ..
            } => ErrorCategory::EnumerationTruncated,
            Self::Enumeration { .. } => ErrorCategory::EnumerationTransient,
            Self::StatusConflict { .. } => ErrorCategory::StatusConflict,
            Self::Store(_) => ErrorCategory::StoreUnavailable,
            Self::Cancelled { .. } => ErrorCategory::Cancelled,
        }
    }

    /// Returns true if the pass should be requeued with backoff.
    pub fn is_transient(&self) -> bool {
        self.category().is_transient()
    }

    /// Minimum delay requested by the registry, if it throttled the pass.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Enumeration { source, .. } => source.retry_after(),
            _ => None,
        }
    }

    /// Message suitable for the status subresource.
    ///
    /// Provider and transport details stay in the logs.
    pub fn status_message(&self) -> String {
        match self {
            Self::MalformedSpec { source, .. } => source.to_string(),
            Self::CredentialDenied { endpoint, .. } => {
                format!("registry {} refused the controller identity", endpoint.host())
            }
            Self::CredentialTransient { endpoint, .. } => {
                format!("credential for registry {} is temporarily unavailable", endpoint.host())
            }
            Self::Enumeration {
                endpoint,
                source: RegistryError::Truncated { pages, .. },
            } => format!(
                "repository listing of {} stopped after {pages} page(s)",
                endpoint.host()
            ),
            Self::Enumeration { endpoint, .. } => {
                format!("repository listing of {} failed", endpoint.host())
            }
            Self::StatusConflict { attempts, .. } => {
                format!("status update lost {attempts} concurrent modification race(s)")
            }
            Self::Store(_) => "resource store unavailable".to_string(),
            Self::Cancelled { operation, .. } => format!("deadline exceeded while {operation}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> RegistryEndpoint {
        RegistryEndpoint::parse("https://myregistry.azurecr.io").unwrap()
    }

    #[test]
    fn test_enumeration_categories() {
        let err = ReconcileError::Enumeration {
            endpoint: endpoint(),
            source: RegistryError::HttpError {
                status: 503,
                message: "unavailable".to_string(),
            },
        };
        assert_eq!(err.category(), ErrorCategory::EnumerationTransient);
        assert!(err.is_transient());

        let err = ReconcileError::Enumeration {
            endpoint: endpoint(),
            source: RegistryError::Truncated {
                pages: 4,
                reason: "cursor repeated".to_string(),
            },
        };
        assert_eq!(err.category(), ErrorCategory::EnumerationTruncated);
        assert!(err.is_transient());
        assert_eq!(
            err.status_message(),
            "repository listing of myregistry.azurecr.io stopped after 4 page(s)"
        );
    }

    #[test]
    fn test_foreign_page_link_is_never_success() {
        let err = ReconcileError::Enumeration {
            endpoint: endpoint(),
            source: RegistryError::ForeignPageLink {
                url: "https://evil.example/harvest".to_string(),
                registry: "https://myregistry.azurecr.io".to_string(),
            },
        };
        assert_eq!(err.category(), ErrorCategory::EnumerationTruncated);
        assert!(err.is_transient());
        assert!(!err.status_message().contains("evil.example"));
    }

    #[test]
    fn test_terminal_categories() {
        let err = ReconcileError::CredentialDenied {
            endpoint: endpoint(),
            message: "401 {\"details\":\"secret body\"}".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::CredentialDenied);
        assert!(!err.is_transient());
        assert!(!err.status_message().contains("secret body"));

        let err = ReconcileError::StatusConflict {
            key: ResourceKey::new("default", "app"),
            attempts: 3,
        };
        assert_eq!(err.category(), ErrorCategory::StatusConflict);
        assert!(!err.is_transient());
    }

    #[test]
    fn test_store_and_cancel_are_transient() {
        let key = ResourceKey::new("default", "app");
        let err = ReconcileError::Store(StoreError::Unavailable {
            key: key.clone(),
            operation: "reading",
            reason: "connection reset".to_string(),
        });
        assert_eq!(err.category(), ErrorCategory::StoreUnavailable);
        assert!(err.is_transient());

        let err = ReconcileError::Cancelled {
            key,
            operation: "listing repositories",
        };
        assert_eq!(err.category(), ErrorCategory::Cancelled);
        assert!(err.is_transient());
        assert_eq!(err.status_message(), "deadline exceeded while listing repositories");
    }

    #[test]
    fn test_retry_after_from_rate_limit() {
        let err = ReconcileError::Enumeration {
            endpoint: endpoint(),
            source: RegistryError::RateLimited {
                retry_after: Some(Duration::from_secs(20)),
            },
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(20)));
        assert!(ReconcileError::Cancelled {
            key: ResourceKey::new("a", "b"),
            operation: "reading"
        }
        .retry_after()
        .is_none());
    }
}
