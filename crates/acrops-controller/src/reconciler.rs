//! The reconciliation pass.
//!
//! A pass reads the current snapshot of one `AcrDeployment`, derives its
//! registry endpoint, acquires a credential, lists every repository, and
//! records the result in status. Nothing is cached between passes, and the
//! status write is the only side effect.
//!
//! ```text
//! get(key) ──► endpoint ──► acquire(scope) ──► list pages ──► update_status
//!    │ None        │ invalid       │ denied          │ failed        │ conflict
//!    ▼             ▼               ▼                 ▼               ▼
//! NotFound     Terminal        Terminal          Requeue       re-read, retry
//! ```
//!
//! Provisioning the workload template onto the cluster is not part of a pass:
//! the controller currently stops at enumeration.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use acrops_core::{
    AcrDeployment, AcrDeploymentStatus, ErrorCategory, RegistryEndpoint, ResourceKey,
    ResourceStore, StatusError, StoreError,
};
use acrops_registry::{CredentialProvider, CredentialScope, RepositoryLister, RepositoryPager};
use chrono::Utc;
use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::backoff::BackoffTracker;
use crate::config::ReconcilerConfig;
use crate::error::{ReconcileError, Result};

/// One invocation of the reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileRequest {
    /// Instance to reconcile.
    pub key: ResourceKey,
    /// Every network call of the pass must finish before this instant.
    pub deadline: Instant,
}

impl ReconcileRequest {
    /// Creates a request with an absolute deadline.
    pub const fn new(key: ResourceKey, deadline: Instant) -> Self {
        Self { key, deadline }
    }

    /// Creates a request whose deadline is `timeout` from now.
    pub fn with_timeout(key: ResourceKey, timeout: Duration) -> Self {
        Self::new(key, Instant::now() + timeout)
    }
}

/// Result of a pass.
#[derive(Debug)]
pub enum Outcome {
    /// Status reflects a full enumeration.
    Synced,
    /// The instance does not exist; nothing was done.
    NotFound,
    /// A transient failure; try again after the delay.
    Requeue {
        /// Delay before the next pass.
        after: Duration,
        /// What failed.
        reason: ErrorCategory,
    },
    /// A permanent failure; retrying will not help until something changes.
    Terminal(ReconcileError),
}

impl Outcome {
    /// The requeue half of the result.
    pub const fn requeue_after(&self) -> Option<Duration> {
        match self {
            Self::Requeue { after, .. } => Some(*after),
            _ => None,
        }
    }

    /// The error half of the result.
    pub const fn error(&self) -> Option<&ReconcileError> {
        match self {
            Self::Terminal(err) => Some(err),
            _ => None,
        }
    }

    /// Returns true for `Synced` and `NotFound`.
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Synced | Self::NotFound)
    }
}

enum PassResult {
    Synced { repositories: usize, written: bool },
    NotFound,
}

/// Reconciles `AcrDeployment` instances against their registries.
pub struct Reconciler {
    config: ReconcilerConfig,
    store: Arc<dyn ResourceStore>,
    credentials: Arc<dyn CredentialProvider>,
    lister: Arc<dyn RepositoryLister>,
    backoff: BackoffTracker,
}

impl Reconciler {
    /// Creates a reconciler over the given collaborators.
    pub fn new(
        config: ReconcilerConfig,
        store: Arc<dyn ResourceStore>,
        credentials: Arc<dyn CredentialProvider>,
        lister: Arc<dyn RepositoryLister>,
    ) -> Self {
        let backoff = BackoffTracker::new(config.backoff);
        Self {
            config,
            store,
            credentials,
            lister,
            backoff,
        }
    }

    /// The configuration in use.
    pub const fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Consecutive transient failures recorded for `key`.
    pub fn failures(&self, key: &ResourceKey) -> u32 {
        self.backoff.failures(key)
    }

    /// Drops the backoff state of `key`, for objects that were deleted.
    pub fn forget(&self, key: &ResourceKey) {
        self.backoff.reset(key);
    }

    /// Runs one pass for `request.key`.
    pub async fn reconcile(&self, request: &ReconcileRequest) -> Outcome {
        let pass_id = Uuid::now_v7();
        let span = tracing::info_span!("reconcile", key = %request.key, pass_id = %pass_id);
        self.reconcile_inner(request).instrument(span).await
    }

    async fn reconcile_inner(&self, request: &ReconcileRequest) -> Outcome {
        let key = &request.key;
        tracing::debug!("Starting reconciliation pass");

        match self.run_pass(request).await {
            Ok(PassResult::NotFound) => {
                self.backoff.reset(key);
                tracing::debug!("Resource not found, nothing to do");
                Outcome::NotFound
            }
            Ok(PassResult::Synced {
                repositories,
                written,
            }) => {
                self.backoff.reset(key);
                tracing::info!(repositories, status_written = written, "Reconciliation complete");
                Outcome::Synced
            }
            Err(err) if err.is_transient() => {
                let backoff = self.backoff.record_failure(key);
                let after = err.retry_after().map_or(backoff, |hint| hint.max(backoff));
                tracing::warn!(
                    category = %err.category(),
                    error = %err,
                    failures = self.backoff.failures(key),
                    requeue_after_ms = u64::try_from(after.as_millis()).unwrap_or(u64::MAX),
                    "Transient failure, requeueing"
                );
                Outcome::Requeue {
                    after,
                    reason: err.category(),
                }
            }
            Err(err) => {
                self.backoff.reset(key);
                tracing::error!(category = %err.category(), error = %err, "Reconciliation failed");
                Outcome::Terminal(err)
            }
        }
    }

    async fn run_pass(&self, request: &ReconcileRequest) -> Result<PassResult> {
        let key = &request.key;
        let max_writes = self.config.max_conflict_retries.max(1);
        let mut writes = 0;

        loop {
            let resource = match self.bounded(request, "reading", self.store.get(key)).await? {
                Ok(Some(resource)) => resource,
                Ok(None) | Err(StoreError::Gone { .. }) => return Ok(PassResult::NotFound),
                Err(err) => return Err(ReconcileError::Store(err)),
            };

            let (status, failure) = self.observe(request, &resource).await?;
            let repositories = status.repositories.len();
            let finish = |written| match failure {
                Some(err) => Err(err),
                None => Ok(PassResult::Synced {
                    repositories,
                    written,
                }),
            };

            if resource
                .status
                .as_ref()
                .is_some_and(|current| current.same_content(&status))
            {
                tracing::debug!("Status unchanged, skipping write");
                return finish(false);
            }

            let version = resource.version_token().unwrap_or_default();
            writes += 1;
            match self
                .bounded(
                    request,
                    "updating status",
                    self.store.update_status(key, &status, version),
                )
                .await?
            {
                Ok(()) => return finish(true),
                Err(StoreError::Gone { .. }) => return Ok(PassResult::NotFound),
                Err(StoreError::Conflict { .. }) if writes < max_writes => {
                    tracing::debug!(attempt = writes, "Status write conflicted, re-reading");
                }
                Err(StoreError::Conflict { .. }) => {
                    return Err(ReconcileError::StatusConflict {
                        key: key.clone(),
                        attempts: writes,
                    });
                }
                Err(err) => return Err(ReconcileError::Store(err)),
            }
        }
    }

    /// Computes the status for `resource`.
    ///
    /// Transient failures abort the pass with nothing to write. Permanent
    /// failures produce a `Failed` status and are handed back alongside it.
    async fn observe(
        &self,
        request: &ReconcileRequest,
        resource: &AcrDeployment,
    ) -> Result<(AcrDeploymentStatus, Option<ReconcileError>)> {
        let generation = resource.metadata.generation;
        match self.enumerate(request, resource).await {
            Ok(repositories) => Ok((
                AcrDeploymentStatus::synced(repositories, generation, Utc::now()),
                None,
            )),
            Err(err) if err.is_transient() => Err(err),
            Err(err) => {
                let error = StatusError::new(err.category(), err.status_message());
                let status =
                    AcrDeploymentStatus::failed(resource.status.as_ref(), error, generation, Utc::now());
                Ok((status, Some(err)))
            }
        }
    }

    async fn enumerate(
        &self,
        request: &ReconcileRequest,
        resource: &AcrDeployment,
    ) -> Result<Vec<String>> {
        let endpoint = RegistryEndpoint::from_spec(&resource.spec, &self.config.registry_domain)
            .map_err(|source| ReconcileError::MalformedSpec {
                key: request.key.clone(),
                source,
            })?;

        let scope = CredentialScope::catalog(&endpoint);
        let credential = self
            .bounded(request, "acquiring a credential", self.credentials.acquire(&scope))
            .await?
            .map_err(|err| {
                let message = err.message().to_string();
                if err.is_transient() {
                    ReconcileError::CredentialTransient {
                        endpoint: endpoint.clone(),
                        message,
                    }
                } else {
                    ReconcileError::CredentialDenied {
                        endpoint: endpoint.clone(),
                        message,
                    }
                }
            })?;
        tracing::debug!(endpoint = %endpoint, credential = credential.kind(), "Acquired registry credential");

        let mut pager = RepositoryPager::new(
            self.lister.as_ref(),
            &endpoint,
            &credential,
            self.config.max_pages,
        );
        let mut repositories = Vec::new();
        loop {
            let page = self
                .bounded(request, "listing repositories", pager.next_page())
                .await?
                .map_err(|source| ReconcileError::Enumeration {
                    endpoint: endpoint.clone(),
                    source,
                })?;
            match page {
                Some(names) => repositories.extend(names),
                None => break,
            }
        }

        tracing::debug!(
            endpoint = %endpoint,
            pages = pager.pages(),
            repositories = repositories.len(),
            "Enumerated registry"
        );
        Ok(repositories)
    }

    /// Runs `call` under the pass deadline.
    async fn bounded<F: Future>(
        &self,
        request: &ReconcileRequest,
        operation: &'static str,
        call: F,
    ) -> Result<F::Output> {
        tokio::time::timeout_at(request.deadline, call)
            .await
            .map_err(|_| ReconcileError::Cancelled {
                key: request.key.clone(),
                operation,
            })
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}
