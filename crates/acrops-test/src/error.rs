//! Error types for the acrops test helpers.

use thiserror::Error;

/// Result type alias for fixture loading.
pub type Result<T> = std::result::Result<T, TestError>;

/// Errors that can occur while loading fixtures.
#[derive(Error, Debug)]
pub enum TestError {
    /// The fixture is not valid YAML for an `AcrDeployment`.
    #[error("Failed to parse fixture: {source}")]
    FixtureParse {
        /// Underlying YAML error.
        #[source]
        source: serde_yaml::Error,
    },

    /// The fixture parsed but lacks required metadata.
    #[error("Fixture is missing {field}")]
    IncompleteFixture {
        /// Missing field.
        field: &'static str,
    },
}
