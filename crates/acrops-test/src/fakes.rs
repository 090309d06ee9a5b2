//! In-memory fakes for the reconciler's collaborators.
//!
//! Each fake counts its calls so tests can assert what a pass did, not
//! only what it returned.
//!
//! ```rust
//! use acrops_test::{InMemoryStore, MockDeployment, PagedLister, ScriptedCredentialProvider};
//!
//! let store = InMemoryStore::new().with(MockDeployment::myregistry());
//! let credentials = ScriptedCredentialProvider::succeeding("token").fail_transient(2);
//! let lister = PagedLister::new([vec!["app-a", "app-b"], vec!["app-c"]]);
//! assert_eq!(store.gets(), 0);
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use acrops_core::{
    AcrDeployment, AcrDeploymentStatus, RegistryEndpoint, ResourceKey, ResourceStore, StoreError,
};
use acrops_registry::{
    Credential, CredentialError, CredentialProvider, CredentialScope, PageCursor,
    RegistryError, RepositoryLister, RepositoryPage,
};
use async_trait::async_trait;
use parking_lot::Mutex;

/// Desired-state store held in memory, with fault injection.
///
/// Every successful status write bumps the resource version, so writes
/// conditioned on a stale version fail with [`StoreError::Conflict`].
#[derive(Debug, Default)]
pub struct InMemoryStore {
    resources: Mutex<HashMap<ResourceKey, AcrDeployment>>,
    injected_conflicts: Mutex<Option<u32>>,
    unavailable: Mutex<bool>,
    write_latency: Mutex<Option<Duration>>,
    gets: AtomicUsize,
    writes: AtomicUsize,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `resource` and returns the store.
    #[must_use]
    pub fn with(self, resource: AcrDeployment) -> Self {
        self.insert(resource);
        self
    }

    /// Adds or replaces `resource`. A missing namespace means `default`.
    pub fn insert(&self, resource: AcrDeployment) {
        let key = ResourceKey::new(
            resource
                .metadata
                .namespace
                .clone()
                .unwrap_or_else(|| "default".to_string()),
            resource.metadata.name.clone().unwrap_or_default(),
        );
        self.resources.lock().insert(key, resource);
    }

    /// Deletes the resource at `key`.
    pub fn remove(&self, key: &ResourceKey) {
        self.resources.lock().remove(key);
    }

    /// Current snapshot of the resource at `key`.
    #[must_use]
    pub fn snapshot(&self, key: &ResourceKey) -> Option<AcrDeployment> {
        self.resources.lock().get(key).cloned()
    }

    /// Current status of the resource at `key`.
    #[must_use]
    pub fn status(&self, key: &ResourceKey) -> Option<AcrDeploymentStatus> {
        self.snapshot(key).and_then(|r| r.status)
    }

    /// Makes the next `count` status writes lose a race with another writer.
    pub fn conflict_next(&self, count: u32) {
        *self.injected_conflicts.lock() = Some(count);
    }

    /// Makes every status write lose a race with another writer.
    pub fn always_conflict(&self) {
        *self.injected_conflicts.lock() = Some(u32::MAX);
    }

    /// Makes every call fail with [`StoreError::Unavailable`] while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock() = unavailable;
    }

    /// Delays every status write by `latency` before it is applied.
    #[must_use]
    pub fn with_write_latency(self, latency: Duration) -> Self {
        *self.write_latency.lock() = Some(latency);
        self
    }

    /// Number of `get` calls.
    #[must_use]
    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Number of `update_status` calls.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_available(&self, key: &ResourceKey, operation: &'static str) -> Result<(), StoreError> {
        if *self.unavailable.lock() {
            return Err(StoreError::Unavailable {
                key: key.clone(),
                operation,
                reason: "injected outage".to_string(),
            });
        }
        Ok(())
    }

    fn take_injected_conflict(&self) -> bool {
        let mut injected = self.injected_conflicts.lock();
        match injected.as_mut() {
            Some(0) | None => false,
            Some(remaining) => {
                if *remaining != u32::MAX {
                    *remaining -= 1;
                }
                true
            }
        }
    }
}

fn bump_version(resource: &mut AcrDeployment) {
    let next = resource
        .metadata
        .resource_version
        .as_deref()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0)
        + 1;
    resource.metadata.resource_version = Some(next.to_string());
}

#[async_trait]
impl ResourceStore for InMemoryStore {
    async fn get(&self, key: &ResourceKey) -> Result<Option<AcrDeployment>, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.check_available(key, "reading")?;
        Ok(self.snapshot(key))
    }

    async fn update_status(
        &self,
        key: &ResourceKey,
        status: &AcrDeploymentStatus,
        expected_version: &str,
    ) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let latency = *self.write_latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        self.check_available(key, "updating status of")?;

        let injected = self.take_injected_conflict();
        let mut resources = self.resources.lock();
        let Some(resource) = resources.get_mut(key) else {
            return Err(StoreError::Gone { key: key.clone() });
        };

        if injected {
            // Another writer got there first.
            bump_version(resource);
        }
        if resource.version_token() != Some(expected_version) {
            return Err(StoreError::Conflict {
                key: key.clone(),
                expected_version: expected_version.to_string(),
            });
        }

        resource.status = Some(status.clone());
        bump_version(resource);
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum CredentialStep {
    Grant(Credential),
    Transient(String),
    Permanent(String),
}

impl CredentialStep {
    fn into_result(self) -> Result<Credential, CredentialError> {
        match self {
            Self::Grant(credential) => Ok(credential),
            Self::Transient(message) => Err(CredentialError::transient(message)),
            Self::Permanent(message) => Err(CredentialError::permanent(message)),
        }
    }
}

/// Credential provider replaying a scripted sequence of results.
///
/// Scripted steps are consumed first; afterwards every call returns the
/// fallback.
#[derive(Debug)]
pub struct ScriptedCredentialProvider {
    script: Mutex<VecDeque<CredentialStep>>,
    fallback: CredentialStep,
    latency: Mutex<Option<Duration>>,
    scopes: Mutex<Vec<CredentialScope>>,
}

impl ScriptedCredentialProvider {
    fn with_fallback(fallback: CredentialStep) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            latency: Mutex::new(None),
            scopes: Mutex::new(Vec::new()),
        }
    }

    /// Grants a bearer token on every call.
    #[must_use]
    pub fn succeeding(token: impl Into<String>) -> Self {
        Self::with_fallback(CredentialStep::Grant(Credential::bearer(token)))
    }

    /// Denies every call permanently.
    #[must_use]
    pub fn denying() -> Self {
        Self::with_fallback(CredentialStep::Permanent(
            "AADSTS700016: application not found in tenant".to_string(),
        ))
    }

    /// Fails transiently on every call.
    #[must_use]
    pub fn unavailable() -> Self {
        Self::with_fallback(CredentialStep::Transient(
            "token endpoint returned 503".to_string(),
        ))
    }

    /// Prepends `count` transient failures before the fallback.
    #[must_use]
    pub fn fail_transient(self, count: usize) -> Self {
        {
            let mut script = self.script.lock();
            for attempt in 1..=count {
                script.push_back(CredentialStep::Transient(format!(
                    "token endpoint unreachable (attempt {attempt})"
                )));
            }
        }
        self
    }

    /// Delays every call by `latency`.
    #[must_use]
    pub fn with_latency(self, latency: Duration) -> Self {
        *self.latency.lock() = Some(latency);
        self
    }

    /// Number of `acquire` calls.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.scopes.lock().len()
    }

    /// Scopes requested so far, in order.
    #[must_use]
    pub fn scopes(&self) -> Vec<CredentialScope> {
        self.scopes.lock().clone()
    }
}

#[async_trait]
impl CredentialProvider for ScriptedCredentialProvider {
    async fn acquire(&self, scope: &CredentialScope) -> Result<Credential, CredentialError> {
        self.scopes.lock().push(scope.clone());
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let step = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        step.into_result()
    }
}

/// Failure injected into one catalog page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageFault {
    /// The registry answers with this HTTP status.
    Status(u16),
    /// The registry throttles, optionally with `Retry-After`.
    RateLimited(Option<Duration>),
    /// The page points back at itself as the next page.
    RepeatCursor,
}

/// Catalog lister serving fixed pages.
///
/// Page `i` is requested with cursor `page-i`; the first page has no cursor.
#[derive(Debug, Default)]
pub struct PagedLister {
    pages: Vec<Vec<String>>,
    faults: Mutex<HashMap<usize, PageFault>>,
    latency: Mutex<Option<Duration>>,
    calls: AtomicUsize,
    endpoints: Mutex<Vec<String>>,
}

impl PagedLister {
    /// Creates a lister over `pages`. No pages behaves as one empty page.
    #[must_use]
    pub fn new<P, N, S>(pages: P) -> Self
    where
        P: IntoIterator<Item = N>,
        N: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pages: pages
                .into_iter()
                .map(|page| page.into_iter().map(Into::into).collect())
                .collect(),
            ..Self::default()
        }
    }

    /// Makes page `index` fail with `fault` until [`PagedLister::heal`] is called.
    #[must_use]
    pub fn with_fault(self, index: usize, fault: PageFault) -> Self {
        self.faults.lock().insert(index, fault);
        self
    }

    /// Delays every page by `latency`.
    #[must_use]
    pub fn with_latency(self, latency: Duration) -> Self {
        *self.latency.lock() = Some(latency);
        self
    }

    /// Removes every injected fault.
    pub fn heal(&self) {
        self.faults.lock().clear();
    }

    /// Number of `list_page` calls.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Endpoints listed so far, in order.
    #[must_use]
    pub fn endpoints(&self) -> Vec<String> {
        self.endpoints.lock().clone()
    }

    fn cursor(index: usize) -> PageCursor {
        PageCursor::new(format!("page-{index}"))
    }

    fn index(cursor: Option<&PageCursor>) -> usize {
        cursor
            .and_then(|c| c.as_str().strip_prefix("page-"))
            .and_then(|i| i.parse().ok())
            .unwrap_or(0)
    }
}

#[async_trait]
impl RepositoryLister for PagedLister {
    async fn list_page(
        &self,
        endpoint: &RegistryEndpoint,
        _credential: &Credential,
        cursor: Option<&PageCursor>,
    ) -> Result<RepositoryPage, RegistryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.endpoints.lock().push(endpoint.to_string());

        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let index = Self::index(cursor);
        let fault = self.faults.lock().get(&index).copied();
        let names = self.pages.get(index).cloned().unwrap_or_default();
        let next = (index + 1 < self.pages.len()).then(|| Self::cursor(index + 1));

        match fault {
            Some(PageFault::Status(status)) => Err(RegistryError::HttpError {
                status,
                message: "injected failure".to_string(),
            }),
            Some(PageFault::RateLimited(retry_after)) => {
                Err(RegistryError::RateLimited { retry_after })
            }
            Some(PageFault::RepeatCursor) => Ok(RepositoryPage {
                names,
                next: Some(Self::cursor(index)),
            }),
            None => Ok(RepositoryPage { names, next }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockDeployment;

    #[tokio::test]
    async fn test_store_conflicts_on_stale_version() {
        let store = InMemoryStore::new().with(MockDeployment::myregistry());
        let key = ResourceKey::new("default", "app");
        let status = AcrDeploymentStatus::default();

        store.update_status(&key, &status, "1").await.unwrap();
        assert_eq!(
            store.snapshot(&key).unwrap().version_token(),
            Some("2")
        );
        assert!(matches!(
            store.update_status(&key, &status, "1").await,
            Err(StoreError::Conflict { .. })
        ));
        assert_eq!(store.writes(), 2);
    }

    #[tokio::test]
    async fn test_store_injected_conflicts() {
        let store = InMemoryStore::new().with(MockDeployment::myregistry());
        let key = ResourceKey::new("default", "app");
        store.conflict_next(1);

        assert!(store
            .update_status(&key, &AcrDeploymentStatus::default(), "1")
            .await
            .is_err());
        let version = store.snapshot(&key).unwrap().version_token().unwrap().to_string();
        store
            .update_status(&key, &AcrDeploymentStatus::default(), &version)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_store_gone() {
        let store = InMemoryStore::new();
        let key = ResourceKey::new("default", "missing");
        assert!(store.get(&key).await.unwrap().is_none());
        assert!(matches!(
            store
                .update_status(&key, &AcrDeploymentStatus::default(), "1")
                .await,
            Err(StoreError::Gone { .. })
        ));
    }

    #[tokio::test]
    async fn test_scripted_credentials() {
        let provider = ScriptedCredentialProvider::succeeding("token").fail_transient(1);
        let endpoint = RegistryEndpoint::parse("https://myregistry.azurecr.io").unwrap();
        let scope = CredentialScope::catalog(&endpoint);

        assert!(provider.acquire(&scope).await.unwrap_err().is_transient());
        assert_eq!(
            provider.acquire(&scope).await.unwrap(),
            Credential::bearer("token")
        );
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_paged_lister() {
        let lister = PagedLister::new([vec!["a", "b"], vec!["c"]]);
        let endpoint = RegistryEndpoint::parse("https://myregistry.azurecr.io").unwrap();

        let first = lister
            .list_page(&endpoint, &Credential::Anonymous, None)
            .await
            .unwrap();
        assert_eq!(first.names, vec!["a", "b"]);
        let second = lister
            .list_page(&endpoint, &Credential::Anonymous, first.next.as_ref())
            .await
            .unwrap();
        assert_eq!(second.names, vec!["c"]);
        assert!(second.next.is_none());
    }
}
