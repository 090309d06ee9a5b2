//! Registry endpoint derivation.

use std::fmt;

use url::Url;

use crate::error::{Error, Result};
use crate::resource::AcrDeploymentSpec;
use crate::validation::Validate;

/// Registry domain of the Azure public cloud.
pub const DEFAULT_REGISTRY_DOMAIN: &str = "azurecr.io";

/// Base URL of a registry, e.g. `https://myregistry.azurecr.io`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RegistryEndpoint {
    url: Url,
}

impl RegistryEndpoint {
    /// Derives the endpoint for a spec.
    ///
    /// Derivation is pure: it validates the spec and formats
    /// `https://<identifier>.<domain>` with the identifier lowercased.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSpec`] if the spec does not validate, or
    /// [`Error::InvalidEndpoint`] if the resulting string is not a URL
    /// (only possible with a malformed `domain`).
    pub fn from_spec(spec: &AcrDeploymentSpec, domain: &str) -> Result<Self> {
        spec.validate()?;
        let host = format!(
            "{}.{}",
            spec.registry_identifier.to_ascii_lowercase(),
            domain.trim_matches('.')
        );
        Self::parse(&format!("https://{host}"))
    }

    /// Parses an explicit endpoint URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEndpoint`] if `endpoint` is not an absolute
    /// `http`/`https` URL with a host.
    pub fn parse(endpoint: &str) -> Result<Self> {
        let url = Url::parse(endpoint).map_err(|e| Error::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(Error::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                reason: "expected an http(s) URL with a host".to_string(),
            });
        }
        Ok(Self { url })
    }

    /// Returns the registry host (the token `service` name).
    #[must_use]
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// Returns the endpoint without a trailing slash.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.url.as_str().trim_end_matches('/')
    }

    /// Returns the underlying URL.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Resolves a path (or a path with query) against the endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEndpoint`] if the reference cannot be joined.
    pub fn join(&self, reference: &str) -> Result<Url> {
        self.url.join(reference).map_err(|e| Error::InvalidEndpoint {
            endpoint: format!("{}{reference}", self.as_str()),
            reason: e.to_string(),
        })
    }
}

impl fmt::Display for RegistryEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
