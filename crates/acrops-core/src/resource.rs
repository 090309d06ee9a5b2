//! The `AcrDeployment` custom resource.
//!
//! An `AcrDeployment` declares a container registry deployment: which Azure
//! Container Registry it is bound to, which image it refers to, and an
//! optional embedded `apps/v1` Deployment template. The controller only reads
//! the spec and only writes the status.
//!
//! Example:
//! ```yaml
//! apiVersion: deployments.acrops.io/v1beta1
//! kind: AcrDeployment
//! metadata:
//!   name: storefront
//!   namespace: shop
//! spec:
//!   registryIdentifier: myregistry
//!   image:
//!     repository: storefront/web
//!     tag: v1.4.2
//! ```

use std::fmt;

use k8s_openapi::api::apps::v1::Deployment;
use kube::{CustomResource, ResourceExt};
use schemars::gen::SchemaGenerator;
use schemars::schema::{InstanceType, Schema, SchemaObject};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::status::AcrDeploymentStatus;

/// Desired state of an `AcrDeployment`.
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "deployments.acrops.io",
    version = "v1beta1",
    kind = "AcrDeployment",
    namespaced,
    status = "AcrDeploymentStatus",
    shortname = "acrd",
    printcolumn = r#"{"name":"Registry","type":"string","jsonPath":".spec.registryIdentifier"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Repositories","type":"integer","jsonPath":".status.repositoryCount"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AcrDeploymentSpec {
    /// Registry name; the endpoint is `https://<registryIdentifier>.<registry-domain>`.
    pub registry_identifier: String,

    /// Image this deployment refers to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageReference>,

    /// Embedded `apps/v1` Deployment, passed through unmodified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub workload_template: Option<serde_json::Value>,
}

impl AcrDeploymentSpec {
    /// Creates a spec bound to the given registry.
    #[must_use]
    pub fn new(registry_identifier: impl Into<String>) -> Self {
        Self {
            registry_identifier: registry_identifier.into(),
            image: None,
            workload_template: None,
        }
    }

    /// Sets the image reference.
    #[must_use]
    pub fn with_image(mut self, image: ImageReference) -> Self {
        self.image = Some(image);
        self
    }

    /// Sets the embedded workload template.
    #[must_use]
    pub fn with_workload_template(mut self, template: serde_json::Value) -> Self {
        self.workload_template = Some(template);
        self
    }

    /// Decodes the workload template as an `apps/v1` Deployment.
    ///
    /// The template itself is never modified; this only checks that it has
    /// the expected shape.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidWorkloadTemplate`] if the template does not
    /// deserialize as a Deployment.
    pub fn workload_deployment(&self) -> Result<Option<Deployment>> {
        self.workload_template
            .as_ref()
            .map(|value| {
                serde_json::from_value::<Deployment>(value.clone())
                    .map_err(Error::InvalidWorkloadTemplate)
            })
            .transpose()
    }
}

/// Reference to an image in the bound registry.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImageReference {
    /// Repository path inside the registry (e.g. `storefront/web`).
    pub repository: String,

    /// Tag; defaults to `latest` when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl ImageReference {
    /// Creates a reference to the given repository.
    #[must_use]
    pub fn new(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            tag: None,
        }
    }

    /// Sets the tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Returns the effective tag.
    #[must_use]
    pub fn tag_or_latest(&self) -> &str {
        self.tag.as_deref().unwrap_or("latest")
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag_or_latest())
    }
}

/// Identity of a resource instance: the reconciliation key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    /// Namespace of the instance.
    pub namespace: String,
    /// Name of the instance.
    pub name: String,
}

impl ResourceKey {
    /// Creates a key from namespace and name.
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Builds the key for a resource.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingIdentity`] if the resource has no name or namespace.
    pub fn from_resource(resource: &AcrDeployment) -> Result<Self> {
        let name = resource
            .metadata
            .name
            .clone()
            .ok_or(Error::MissingIdentity { field: "name" })?;
        let namespace = resource
            .namespace()
            .ok_or(Error::MissingIdentity { field: "namespace" })?;
        Ok(Self { namespace, name })
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl AcrDeployment {
    /// Returns the optimistic-concurrency token of this snapshot.
    #[must_use]
    pub fn version_token(&self) -> Option<&str> {
        self.metadata.resource_version.as_deref()
    }
}

fn preserve_unknown_fields(_: &mut SchemaGenerator) -> Schema {
    let mut schema = SchemaObject {
        instance_type: Some(InstanceType::Object.into()),
        ..SchemaObject::default()
    };
    schema.extensions.insert(
        "x-kubernetes-preserve-unknown-fields".to_string(),
        serde_json::Value::Bool(true),
    );
    Schema::Object(schema)
}
