//! Error types for registry operations.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Failed to connect to registry.
    #[error("Failed to connect to registry at {url}: {source}")]
    ConnectionFailed {
        /// Registry URL.
        url: String,
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },

    /// The request did not complete within the client timeout.
    #[error("Request to {url} timed out")]
    Timeout {
        /// Request URL.
        url: String,
    },

    /// The registry rejected the credential.
    #[error("Authentication failed ({status}): {message}")]
    AuthenticationFailed {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
    },

    /// The registry is throttling requests.
    #[error("Rate limited by registry{}", retry_hint(.retry_after))]
    RateLimited {
        /// Delay requested through `Retry-After`, if any.
        retry_after: Option<Duration>,
    },

    /// HTTP error from registry.
    #[error("HTTP error from registry: {status} - {message}")]
    HttpError {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
    },

    /// Invalid URL.
    #[error("Invalid URL: {url}")]
    InvalidUrl {
        /// URL string.
        url: String,
    },

    /// A `Link` header pointed the next page at another origin.
    #[error("Next page link {url} leaves registry {registry}")]
    ForeignPageLink {
        /// Resolved link target.
        url: String,
        /// Origin of the registry being listed.
        registry: String,
    },

    /// Pagination stopped before the registry reported the last page.
    #[error("Catalog listing truncated after {pages} page(s): {reason}")]
    Truncated {
        /// Pages fetched before giving up.
        pages: u32,
        /// Why the listing cannot be completed.
        reason: String,
    },

    /// The credential cannot be turned into a request header.
    #[error("Invalid credential: {message}")]
    InvalidCredential {
        /// Error message.
        message: String,
    },

    /// File I/O error.
    #[error("File I/O error at {path}: {source}")]
    IoError {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// TLS material could not be loaded.
    #[error("Invalid TLS configuration: {message}")]
    TlsConfig {
        /// Error message.
        message: String,
    },
}

fn retry_hint(retry_after: &Option<Duration>) -> String {
    retry_after.map_or_else(String::new, |d| format!(", retry after {}s", d.as_secs()))
}

impl RegistryError {
    /// Returns the delay the registry asked for, if it asked for one.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Returns the HTTP status associated with the error, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::AuthenticationFailed { status, .. } | Self::HttpError { status, .. } => {
                Some(*status)
            }
            Self::RateLimited { .. } => Some(429),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RegistryError {
    fn from(err: reqwest::Error) -> Self {
        let url = err
            .url()
            .map_or_else(|| "unknown".to_string(), ToString::to_string);
        if err.is_timeout() {
            Self::Timeout { url }
        } else if err.is_connect() {
            Self::ConnectionFailed { url, source: err }
        } else if err.is_decode() {
            Self::HttpError {
                status: 0,
                message: format!("malformed response body: {err}"),
            }
        } else {
            let status = err.status().map_or(0, |s| s.as_u16());
            Self::HttpError {
                status,
                message: err.to_string(),
            }
        }
    }
}
