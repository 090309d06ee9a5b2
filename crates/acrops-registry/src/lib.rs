//! # acrops Registry
//!
//! Azure Container Registry client for the acrops controller.
//!
//! This crate provides the two network-facing collaborators of a
//! reconciliation pass:
//!
//! - **Credential providers** ([`CredentialProvider`]): issue short-lived
//!   bearer credentials for a registry, classifying failures as transient or
//!   permanent.
//! - **Repository listing** ([`RepositoryLister`]): fetch one page of the
//!   registry catalog at a time. [`RepositoryPager`] drives the paginated
//!   sequence and refuses to report a truncated listing as complete.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use acrops_core::{AcrDeploymentSpec, RegistryEndpoint, DEFAULT_REGISTRY_DOMAIN};
//! use acrops_registry::{
//!     CredentialProvider, CredentialScope, HttpRegistryClient, RegistryConfig, RepositoryPager,
//!     StaticCredentialProvider,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let endpoint = RegistryEndpoint::from_spec(
//!         &AcrDeploymentSpec::new("myregistry"),
//!         DEFAULT_REGISTRY_DOMAIN,
//!     )?;
//!     let client = HttpRegistryClient::new(RegistryConfig::default())?;
//!     let provider = StaticCredentialProvider::bearer("token");
//!
//!     let credential = provider.acquire(&CredentialScope::catalog(&endpoint)).await?;
//!     let repositories = RepositoryPager::new(&client, &endpoint, &credential, 100)
//!         .collect_all()
//!         .await?;
//!     println!("{repositories:?}");
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Reconciler                             │
//! └──────────────┬───────────────────────────────┬──────────────┘
//!                │ acquire(scope)                │ list_page(cursor)
//!                ▼                               ▼
//! ┌──────────────────────────┐   ┌──────────────────────────────┐
//! │   CredentialProvider     │   │  RepositoryLister / Pager    │
//! │ (static, token exchange) │   │  (GET /acr/v1/_catalog)      │
//! └──────────────┬───────────┘   └──────────────┬───────────────┘
//!                ▼                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │              Azure Container Registry                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod catalog;
mod client;
mod config;
mod credential;
mod error;

pub use catalog::{parse_next_link, PageCursor, RepositoryLister, RepositoryPage, RepositoryPager};
pub use client::HttpRegistryClient;
pub use config::{RegistryAuth, RegistryConfig, TlsConfig};
pub use credential::{
    AcrTokenExchangeProvider, Credential, CredentialError, CredentialProvider, CredentialScope,
    StaticCredentialProvider, CATALOG_SCOPE,
};
pub use error::RegistryError;
