//! Credential acquisition for registry access.
//!
//! A [`CredentialProvider`] turns a [`CredentialScope`] into a [`Credential`]
//! usable on catalog requests. Failures are split into transient ones, which
//! are worth retrying later, and permanent denials.

use std::fmt;
use std::path::{Path, PathBuf};

use acrops_core::RegistryEndpoint;
use async_trait::async_trait;
use reqwest::header::HeaderValue;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::error::RegistryError;

/// Scope granting read access to the registry catalog.
pub const CATALOG_SCOPE: &str = "registry:catalog:*";

/// What a credential is requested for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialScope {
    /// Registry base URL; token endpoints are resolved against it.
    pub realm: Url,
    /// Service name (the registry host).
    pub service: String,
    /// Requested access scope.
    pub scope: String,
}

impl CredentialScope {
    /// Creates a scope for an arbitrary access request.
    #[must_use]
    pub fn new(endpoint: &RegistryEndpoint, scope: impl Into<String>) -> Self {
        Self {
            realm: endpoint.url().clone(),
            service: endpoint.host().to_string(),
            scope: scope.into(),
        }
    }

    /// Creates the scope needed to enumerate repositories.
    #[must_use]
    pub fn catalog(endpoint: &RegistryEndpoint) -> Self {
        Self::new(endpoint, CATALOG_SCOPE)
    }
}

/// A credential attached to registry requests.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// No `Authorization` header.
    Anonymous,
    /// HTTP basic authentication.
    Basic {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
    /// Bearer token.
    Bearer {
        /// Access token.
        token: String,
    },
}

impl Credential {
    /// Creates a bearer credential.
    #[must_use]
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer {
            token: token.into(),
        }
    }

    /// Creates a basic credential.
    #[must_use]
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Renders the `Authorization` header value, if the credential has one.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidCredential`] if the secret contains
    /// bytes that are not valid in a header.
    pub fn authorization(&self) -> Result<Option<HeaderValue>, RegistryError> {
        let value = match self {
            Self::Anonymous => return Ok(None),
            Self::Basic { username, password } => {
                let encoded = base64::Engine::encode(
                    &base64::engine::general_purpose::STANDARD,
                    format!("{username}:{password}"),
                );
                format!("Basic {encoded}")
            }
            Self::Bearer { token } => format!("Bearer {token}"),
        };

        let mut header =
            HeaderValue::from_str(&value).map_err(|_| RegistryError::InvalidCredential {
                message: "credential contains characters not allowed in a header".to_string(),
            })?;
        header.set_sensitive(true);
        Ok(Some(header))
    }

    /// Returns a short label for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Basic { .. } => "basic",
            Self::Bearer { .. } => "bearer",
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => f.write_str("Anonymous"),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::Bearer { .. } => f
                .debug_struct("Bearer")
                .field("token", &"<redacted>")
                .finish(),
        }
    }
}

/// Failure to acquire a credential.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Worth retrying later (network, throttling, unreadable token file).
    #[error("Credential temporarily unavailable: {message}")]
    Transient {
        /// Error message.
        message: String,
    },

    /// The identity was refused; retrying will not help.
    #[error("Credential denied: {message}")]
    Permanent {
        /// Error message.
        message: String,
    },
}

impl CredentialError {
    /// Creates a transient error.
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Creates a permanent error.
    #[must_use]
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent {
            message: message.into(),
        }
    }

    /// Returns true if the failure may clear up on its own.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Returns the error message without the classification prefix.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Transient { message } | Self::Permanent { message } => message,
        }
    }
}

/// Source of registry credentials.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Acquires a credential for `scope`.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Transient`] or [`CredentialError::Permanent`].
    async fn acquire(&self, scope: &CredentialScope) -> Result<Credential, CredentialError>;
}

/// Provider that always hands out the same credential.
#[derive(Debug, Clone)]
pub struct StaticCredentialProvider {
    credential: Credential,
}

impl StaticCredentialProvider {
    /// Creates a provider for `credential`.
    #[must_use]
    pub const fn new(credential: Credential) -> Self {
        Self { credential }
    }

    /// Creates a provider returning a bearer token.
    #[must_use]
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::new(Credential::bearer(token))
    }

    /// Creates a provider returning basic credentials.
    #[must_use]
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::new(Credential::basic(username, password))
    }

    /// Creates a provider that sends no credentials.
    #[must_use]
    pub const fn anonymous() -> Self {
        Self::new(Credential::Anonymous)
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn acquire(&self, _scope: &CredentialScope) -> Result<Credential, CredentialError> {
        Ok(self.credential.clone())
    }
}

#[derive(Debug, Deserialize)]
struct RefreshTokenResponse {
    refresh_token: String,
}

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: String,
}

/// Provider exchanging an Entra ID access token for an ACR access token.
///
/// The file must hold an Entra ID *access token* for the registry, as kept
/// fresh by a token-refreshing sidecar or `az account get-access-token`. A
/// workload identity federated token (`AZURE_FEDERATED_TOKEN_FILE`) is a
/// client assertion, not an access token, and `/oauth2/exchange` rejects it
/// with 401. The file is re-read on every call, so rotated tokens are
/// picked up.
#[derive(Debug, Clone)]
pub struct AcrTokenExchangeProvider {
    http: reqwest::Client,
    token_file: PathBuf,
    tenant: Option<String>,
}

impl AcrTokenExchangeProvider {
    /// Creates a provider reading the Entra ID token from `token_file`.
    #[must_use]
    pub fn new(http: reqwest::Client, token_file: impl Into<PathBuf>) -> Self {
        Self {
            http,
            token_file: token_file.into(),
            tenant: None,
        }
    }

    /// Sends `tenant` along with the exchange request.
    #[must_use]
    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    /// Path of the Entra ID token file.
    #[must_use]
    pub fn token_file(&self) -> &Path {
        &self.token_file
    }

    async fn read_aad_token(&self) -> Result<String, CredentialError> {
        let raw = tokio::fs::read_to_string(&self.token_file)
            .await
            .map_err(|e| {
                CredentialError::transient(format!(
                    "cannot read token file {}: {e}",
                    self.token_file.display()
                ))
            })?;
        let token = raw.trim();
        if token.is_empty() {
            return Err(CredentialError::transient(format!(
                "token file {} is empty",
                self.token_file.display()
            )));
        }
        Ok(token.to_string())
    }

    async fn post_form<T: for<'de> Deserialize<'de>>(
        &self,
        realm: &Url,
        path: &str,
        form: &[(&str, &str)],
    ) -> Result<T, CredentialError> {
        let url = realm.join(path).map_err(|e| {
            CredentialError::permanent(format!("invalid token endpoint {realm}{path}: {e}"))
        })?;

        let response = self
            .http
            .post(url.clone())
            .form(form)
            .send()
            .await
            .map_err(|e| CredentialError::transient(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &format!("{url}: {status} {body}")));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| CredentialError::transient(format!("{url}: malformed token response: {e}")))
    }
}

#[async_trait]
impl CredentialProvider for AcrTokenExchangeProvider {
    async fn acquire(&self, scope: &CredentialScope) -> Result<Credential, CredentialError> {
        let aad_token = self.read_aad_token().await?;

        let mut exchange = vec![
            ("grant_type", "access_token"),
            ("service", scope.service.as_str()),
            ("access_token", aad_token.as_str()),
        ];
        if let Some(tenant) = &self.tenant {
            exchange.push(("tenant", tenant.as_str()));
        }
        let refresh: RefreshTokenResponse = self
            .post_form(&scope.realm, "/oauth2/exchange", &exchange)
            .await?;

        let access: AccessTokenResponse = self
            .post_form(
                &scope.realm,
                "/oauth2/token",
                &[
                    ("grant_type", "refresh_token"),
                    ("service", scope.service.as_str()),
                    ("scope", scope.scope.as_str()),
                    ("refresh_token", refresh.refresh_token.as_str()),
                ],
            )
            .await?;

        tracing::debug!(service = %scope.service, scope = %scope.scope, "Acquired registry access token");
        Ok(Credential::bearer(access.access_token))
    }
}

/// Maps a token endpoint status to a credential failure class.
fn classify_status(status: StatusCode, message: &str) -> CredentialError {
    if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        CredentialError::transient(message)
    } else {
        CredentialError::permanent(message)
    }
}
