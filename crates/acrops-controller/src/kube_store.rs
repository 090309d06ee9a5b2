//! [`ResourceStore`] backed by the Kubernetes API.

use acrops_core::{AcrDeployment, AcrDeploymentStatus, ResourceKey, ResourceStore, StoreError};
use async_trait::async_trait;
use kube::api::{Api, PostParams};
use kube::{Client, Resource};

/// Reads `AcrDeployment` objects and replaces their status subresource.
///
/// Writes carry `metadata.resourceVersion`, so the API server rejects them
/// with 409 when the object changed since it was read.
#[derive(Clone)]
pub struct KubeResourceStore {
    client: Client,
}

impl KubeResourceStore {
    /// Creates a store using `client`.
    pub const fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, key: &ResourceKey) -> Api<AcrDeployment> {
        Api::namespaced(self.client.clone(), &key.namespace)
    }
}

#[async_trait]
impl ResourceStore for KubeResourceStore {
    async fn get(&self, key: &ResourceKey) -> Result<Option<AcrDeployment>, StoreError> {
        self.api(key)
            .get_opt(&key.name)
            .await
            .map_err(|e| unavailable(key, "reading", &e))
    }

    async fn update_status(
        &self,
        key: &ResourceKey,
        status: &AcrDeploymentStatus,
        expected_version: &str,
    ) -> Result<(), StoreError> {
        let body = serde_json::to_vec(&status_body(key, status, expected_version)).map_err(|e| {
            StoreError::Unavailable {
                key: key.clone(),
                operation: "encoding status of",
                reason: e.to_string(),
            }
        })?;

        match self
            .api(key)
            .replace_status(&key.name, &PostParams::default(), body)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => Err(write_error(key, expected_version, &e)),
        }
    }
}

impl std::fmt::Debug for KubeResourceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeResourceStore").finish_non_exhaustive()
    }
}

/// Full object body for `replace_status`, pinned to `expected_version`.
fn status_body(
    key: &ResourceKey,
    status: &AcrDeploymentStatus,
    expected_version: &str,
) -> serde_json::Value {
    serde_json::json!({
        "apiVersion": AcrDeployment::api_version(&()),
        "kind": AcrDeployment::kind(&()),
        "metadata": {
            "name": key.name,
            "namespace": key.namespace,
            "resourceVersion": expected_version,
        },
        "status": status,
    })
}

fn write_error(key: &ResourceKey, expected_version: &str, err: &kube::Error) -> StoreError {
    match err {
        kube::Error::Api(response) if response.code == 409 => StoreError::Conflict {
            key: key.clone(),
            expected_version: expected_version.to_string(),
        },
        kube::Error::Api(response) if response.code == 404 => StoreError::Gone { key: key.clone() },
        other => unavailable(key, "updating status of", other),
    }
}

fn unavailable(key: &ResourceKey, operation: &'static str, err: &kube::Error) -> StoreError {
    StoreError::Unavailable {
        key: key.clone(),
        operation,
        reason: err.to_string(),
    }
}
