//! Registry connection and authentication flags shared by commands.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Args;

use acrops_core::DEFAULT_REGISTRY_DOMAIN;
use acrops_registry::{RegistryAuth, RegistryConfig, TlsConfig};

/// How to reach registries.
#[derive(Args, Debug, Clone)]
pub struct RegistryArgs {
    /// Registry domain appended to the registry identifier
    #[arg(long, env = "ACROPS_REGISTRY_DOMAIN", default_value = DEFAULT_REGISTRY_DOMAIN)]
    pub registry_domain: String,

    /// Repositories requested per catalog page
    #[arg(long, env = "ACROPS_PAGE_SIZE", default_value = "100")]
    pub page_size: u32,

    /// Catalog pages per enumeration before giving up
    #[arg(long, env = "ACROPS_MAX_PAGES", default_value = "1000")]
    pub max_pages: u32,

    /// Request timeout in seconds
    #[arg(long, env = "ACROPS_REQUEST_TIMEOUT", default_value = "30")]
    pub request_timeout: u64,

    /// Extra CA certificate for private registry endpoints
    #[arg(long, env = "ACROPS_CA_CERT")]
    pub ca_cert: Option<PathBuf>,

    /// Skip TLS certificate verification (test registries only)
    #[arg(long, env = "ACROPS_INSECURE_SKIP_TLS_VERIFY")]
    pub insecure_skip_tls_verify: bool,
}

impl RegistryArgs {
    /// Builds the registry client configuration.
    pub fn config(&self) -> RegistryConfig {
        let config = RegistryConfig::new()
            .with_page_size(self.page_size)
            .with_max_pages(self.max_pages)
            .with_timeout(Duration::from_secs(self.request_timeout));
        if self.ca_cert.is_none() && !self.insecure_skip_tls_verify {
            return config;
        }

        let mut tls = TlsConfig::new();
        if let Some(path) = &self.ca_cert {
            tls = tls.with_ca_cert(path);
        }
        if self.insecure_skip_tls_verify {
            tls = tls.insecure();
        }
        config.with_tls(tls)
    }
}

/// How to authenticate to registries.
#[derive(Args, Debug, Clone, Default)]
pub struct AuthArgs {
    /// File holding an Entra ID access token (not a federated token) to exchange for registry tokens
    #[arg(long, env = "ACROPS_AAD_TOKEN_FILE")]
    pub aad_token_file: Option<PathBuf>,

    /// Tenant sent with the token exchange
    #[arg(long, env = "ACROPS_TENANT_ID")]
    pub tenant: Option<String>,

    /// Bearer token for the registry
    #[arg(long, env = "ACROPS_REGISTRY_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Username for basic authentication
    #[arg(long, env = "ACROPS_REGISTRY_USERNAME")]
    pub username: Option<String>,

    /// Password for basic authentication
    #[arg(long, env = "ACROPS_REGISTRY_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

impl AuthArgs {
    /// Picks the authentication method: token exchange, then bearer, then basic, then none.
    ///
    /// # Errors
    ///
    /// Returns an error if only one half of the basic credentials is given.
    pub fn auth(&self) -> Result<RegistryAuth> {
        if let Some(ref token_file) = self.aad_token_file {
            return Ok(RegistryAuth::AcrTokenExchange {
                token_file: token_file.clone(),
                tenant: self.tenant.clone(),
            });
        }

        if let Some(ref token) = self.token {
            return Ok(RegistryAuth::bearer(token));
        }

        if let (Some(ref username), Some(ref password)) = (&self.username, &self.password) {
            return Ok(RegistryAuth::basic(username, password));
        }

        if self.username.is_some() || self.password.is_some() {
            anyhow::bail!("Both --username and --password are required for basic authentication");
        }

        Ok(RegistryAuth::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_none() {
        let auth = AuthArgs::default().auth().unwrap();
        assert!(matches!(auth, RegistryAuth::None));
    }

    #[test]
    fn test_auth_token_exchange_wins() {
        let args = AuthArgs {
            aad_token_file: Some(PathBuf::from("/var/run/acrops/aad-access-token")),
            tenant: Some("contoso".to_string()),
            token: Some("ignored".to_string()),
            ..AuthArgs::default()
        };
        match args.auth().unwrap() {
            RegistryAuth::AcrTokenExchange { token_file, tenant } => {
                assert_eq!(token_file, PathBuf::from("/var/run/acrops/aad-access-token"));
                assert_eq!(tenant.as_deref(), Some("contoso"));
            }
            other => panic!("unexpected auth: {other:?}"),
        }
    }

    #[test]
    fn test_auth_bearer() {
        let args = AuthArgs {
            token: Some("test-token".to_string()),
            ..AuthArgs::default()
        };
        assert!(matches!(
            args.auth().unwrap(),
            RegistryAuth::Bearer { token } if token == "test-token"
        ));
    }

    #[test]
    fn test_auth_basic_requires_both() {
        let args = AuthArgs {
            username: Some("user".to_string()),
            ..AuthArgs::default()
        };
        assert!(args.auth().is_err());

        let args = AuthArgs {
            username: Some("user".to_string()),
            password: Some("pass".to_string()),
            ..AuthArgs::default()
        };
        assert!(matches!(args.auth().unwrap(), RegistryAuth::Basic { .. }));
    }

    fn registry_args() -> RegistryArgs {
        RegistryArgs {
            registry_domain: "azurecr.us".to_string(),
            page_size: 50,
            max_pages: 10,
            request_timeout: 5,
            ca_cert: None,
            insecure_skip_tls_verify: false,
        }
    }

    #[test]
    fn test_registry_config() {
        let config = registry_args().config();
        assert_eq!(config.page_size, 50);
        assert_eq!(config.max_pages, 10);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(config.tls.is_none());
    }

    #[test]
    fn test_registry_config_tls() {
        let config = RegistryArgs {
            ca_cert: Some(PathBuf::from("/etc/ssl/ca.pem")),
            ..registry_args()
        }
        .config();
        let tls = config.tls.unwrap();
        assert_eq!(tls.ca_cert, Some(PathBuf::from("/etc/ssl/ca.pem")));
        assert!(!tls.insecure_skip_verify);

        let config = RegistryArgs {
            insecure_skip_tls_verify: true,
            ..registry_args()
        }
        .config();
        let tls = config.tls.unwrap();
        assert!(tls.ca_cert.is_none());
        assert!(tls.insecure_skip_verify);
    }
}
