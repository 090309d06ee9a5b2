//! Configuration types for registry client.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::credential::{AcrTokenExchangeProvider, CredentialProvider, StaticCredentialProvider};

/// Configuration for the registry client.
///
/// The client talks to whatever endpoint it is handed; the registry domain
/// used to derive endpoints lives in the reconciler configuration.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Repositories requested per catalog page (`n` query parameter).
    pub page_size: u32,

    /// Upper bound on pages fetched in one enumeration.
    pub max_pages: u32,

    /// Request timeout.
    pub timeout: Duration,

    /// TLS configuration for private endpoints.
    pub tls: Option<TlsConfig>,

    /// User agent string.
    pub user_agent: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryConfig {
    /// Creates a registry configuration with default limits.
    ///
    /// # Examples
    ///
    /// ```
    /// use acrops_registry::RegistryConfig;
    ///
    /// let config = RegistryConfig::new();
    /// assert_eq!(config.page_size, 100);
    /// assert!(config.tls.is_none());
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self {
            page_size: 100,
            max_pages: 1000,
            timeout: Duration::from_secs(30),
            tls: None,
            user_agent: format!("acrops/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Sets the catalog page size.
    #[must_use]
    pub const fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Sets the maximum number of pages per enumeration.
    #[must_use]
    pub const fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the TLS configuration.
    #[must_use]
    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }
}

/// How the controller authenticates to registries.
#[derive(Debug, Clone)]
pub enum RegistryAuth {
    /// No authentication (local registries).
    None,

    /// Basic authentication (username/password or admin user).
    Basic {
        /// Username.
        username: String,
        /// Password or token.
        password: String,
    },

    /// A fixed bearer token.
    Bearer {
        /// Token value.
        token: String,
    },

    /// Exchange an Entra ID access token for an ACR access token.
    AcrTokenExchange {
        /// File holding an Entra ID access token (not a federated assertion);
        /// re-read on every acquisition.
        token_file: PathBuf,
        /// Tenant of the identity, if the registry needs it spelled out.
        tenant: Option<String>,
    },
}

impl RegistryAuth {
    /// Creates basic authentication.
    #[must_use]
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Creates bearer token authentication.
    #[must_use]
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer {
            token: token.into(),
        }
    }

    /// Creates token-exchange authentication reading the Entra ID token from `token_file`.
    #[must_use]
    pub fn token_exchange(token_file: impl Into<PathBuf>) -> Self {
        Self::AcrTokenExchange {
            token_file: token_file.into(),
            tenant: None,
        }
    }

    /// Builds the credential provider for this authentication method.
    ///
    /// `http` is shared with the token exchange so it inherits timeouts and TLS settings.
    #[must_use]
    pub fn into_provider(self, http: reqwest::Client) -> Arc<dyn CredentialProvider> {
        match self {
            Self::None => Arc::new(StaticCredentialProvider::anonymous()),
            Self::Basic { username, password } => {
                Arc::new(StaticCredentialProvider::basic(username, password))
            }
            Self::Bearer { token } => Arc::new(StaticCredentialProvider::bearer(token)),
            Self::AcrTokenExchange { token_file, tenant } => {
                let provider = AcrTokenExchangeProvider::new(http, token_file);
                Arc::new(match tenant {
                    Some(tenant) => provider.with_tenant(tenant),
                    None => provider,
                })
            }
        }
    }
}

/// TLS configuration for registry connections.
#[derive(Debug, Clone, Default)]
pub struct TlsConfig {
    /// Path to an extra CA certificate file.
    pub ca_cert: Option<PathBuf>,

    /// Whether to skip certificate verification (NOT recommended for production).
    pub insecure_skip_verify: bool,
}

impl TlsConfig {
    /// Creates a new TLS configuration with default settings.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ca_cert: None,
            insecure_skip_verify: false,
        }
    }

    /// Sets the CA certificate path.
    #[must_use]
    pub fn with_ca_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_cert = Some(path.into());
        self
    }

    /// Enables insecure mode (skips certificate verification).
    ///
    /// # Warning
    ///
    /// This should only be used for testing. Never use in production.
    #[must_use]
    pub const fn insecure(mut self) -> Self {
        self.insecure_skip_verify = true;
        self
    }
}
