//! Error types for acrops core operations.
//!
//! This module defines the error types used throughout the `acrops-core` crate.

use thiserror::Error;

use crate::validation::ValidationErrors;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in acrops core operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The resource spec failed validation.
    #[error("Invalid spec: {0}")]
    InvalidSpec(#[from] ValidationErrors),

    /// The derived registry endpoint is not a valid URL.
    #[error("Invalid registry endpoint '{endpoint}': {reason}")]
    InvalidEndpoint {
        /// The endpoint string that failed to parse.
        endpoint: String,
        /// Reason the endpoint is invalid.
        reason: String,
    },

    /// The embedded workload template could not be decoded.
    #[error("Invalid workload template: {0}")]
    InvalidWorkloadTemplate(#[source] serde_json::Error),

    /// A resource is missing its name or namespace.
    #[error("Resource is missing {field}")]
    MissingIdentity {
        /// Metadata field that is missing.
        field: &'static str,
    },
}
