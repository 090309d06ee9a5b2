//! acrops Controller
//!
//! Reconciles `AcrDeployment` resources against Azure Container Registry.
//!
//! # Overview
//!
//! Each pass:
//! - **Reads** a fresh snapshot of the resource (absent means nothing to do)
//! - **Derives** the registry endpoint from `spec.registryIdentifier`
//! - **Authenticates** through a [`acrops_registry::CredentialProvider`]
//! - **Enumerates** every catalog page through a [`acrops_registry::RepositoryLister`]
//! - **Records** the repository list, or a classified error, in status
//!
//! Transient failures are requeued with capped exponential backoff and leave
//! status untouched. Permanent failures are recorded and not retried until
//! the baseline resync.
//!
//! # Architecture
//!
//! ```text
//!   watch events
//!        │
//!        ▼
//! ┌──────────────────┐   Outcome    ┌──────────────────┐
//! │ kube Controller  │◄─────────────│    Reconciler    │
//! │   (runner.rs)    │─────────────►│ (reconciler.rs)  │
//! └──────────────────┘   request    └───┬─────┬─────┬──┘
//!                                       │     │     │
//!                          ResourceStore│     │     │RepositoryLister
//!                                       ▼     │     ▼
//!                           KubeResourceStore │  HttpRegistryClient
//!                                             ▼
//!                                    CredentialProvider
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use acrops_controller::{run, KubeResourceStore, Reconciler, ReconcilerConfig};
//! use acrops_registry::{HttpRegistryClient, RegistryAuth, RegistryConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = kube::Client::try_default().await?;
//!     let registry = HttpRegistryClient::new(RegistryConfig::default())?;
//!     // An Entra ID access token kept fresh by a sidecar, not a federated assertion.
//!     let credentials = RegistryAuth::token_exchange("/var/run/acrops/aad-access-token")
//!         .into_provider(registry.http().clone());
//!
//!     let reconciler = Reconciler::new(
//!         ReconcilerConfig::default(),
//!         Arc::new(KubeResourceStore::new(client.clone())),
//!         credentials,
//!         Arc::new(registry),
//!     );
//!     run(client, reconciler, None).await;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]

pub mod backoff;
pub mod config;
pub mod error;
pub mod kube_store;
pub mod reconciler;
pub mod runner;

pub use backoff::{BackoffPolicy, BackoffTracker};
pub use config::{ReconcilerConfig, ReconcilerConfigBuilder};
pub use error::{ReconcileError, Result};
pub use kube_store::KubeResourceStore;
pub use reconciler::{Outcome, ReconcileRequest, Reconciler};
pub use runner::{error_policy, observe_dispatch, reconcile, run, Context, DispatchResult};
