//! Fixture builders for `AcrDeployment` resources.
//!
//! # Examples
//!
//! ```rust
//! use acrops_test::MockDeployment;
//!
//! let resource = MockDeployment::new("web")
//!     .with_namespace("team-a")
//!     .with_registry("contosoregistry")
//!     .build();
//! assert_eq!(resource.spec.registry_identifier, "contosoregistry");
//! assert_eq!(resource.metadata.resource_version.as_deref(), Some("1"));
//! ```

use acrops_core::{AcrDeployment, AcrDeploymentSpec, AcrDeploymentStatus, ImageReference};

use crate::error::{Result, TestError};

/// Builder for `AcrDeployment` test resources.
///
/// Defaults: namespace `default`, registry `myregistry`, resource version
/// `1`, generation `1`, no status.
#[derive(Debug, Clone)]
pub struct MockDeployment {
    name: String,
    namespace: String,
    spec: AcrDeploymentSpec,
    status: Option<AcrDeploymentStatus>,
    resource_version: String,
    generation: i64,
}

impl MockDeployment {
    /// Creates a builder for a resource named `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: "default".to_string(),
            spec: AcrDeploymentSpec::new("myregistry"),
            status: None,
            resource_version: "1".to_string(),
            generation: 1,
        }
    }

    /// The canonical `default/app` resource pointing at `myregistry`.
    #[must_use]
    pub fn myregistry() -> AcrDeployment {
        Self::new("app").build()
    }

    /// Sets the namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Sets `spec.registryIdentifier`.
    #[must_use]
    pub fn with_registry(mut self, identifier: impl Into<String>) -> Self {
        self.spec.registry_identifier = identifier.into();
        self
    }

    /// Sets `spec.image`.
    #[must_use]
    pub fn with_image(mut self, image: ImageReference) -> Self {
        self.spec = self.spec.with_image(image);
        self
    }

    /// Sets `spec.workloadTemplate`.
    #[must_use]
    pub fn with_workload_template(mut self, template: serde_json::Value) -> Self {
        self.spec = self.spec.with_workload_template(template);
        self
    }

    /// Sets the stored status.
    #[must_use]
    pub fn with_status(mut self, status: AcrDeploymentStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets `metadata.resourceVersion`.
    #[must_use]
    pub fn with_resource_version(mut self, version: impl Into<String>) -> Self {
        self.resource_version = version.into();
        self
    }

    /// Sets `metadata.generation`.
    #[must_use]
    pub const fn with_generation(mut self, generation: i64) -> Self {
        self.generation = generation;
        self
    }

    /// Builds the resource.
    #[must_use]
    pub fn build(self) -> AcrDeployment {
        let mut resource = AcrDeployment::new(&self.name, self.spec);
        resource.metadata.namespace = Some(self.namespace);
        resource.metadata.resource_version = Some(self.resource_version);
        resource.metadata.generation = Some(self.generation);
        resource.status = self.status;
        resource
    }
}

/// Parses an `AcrDeployment` manifest, filling in the metadata a server would set.
///
/// # Errors
///
/// Returns [`TestError::FixtureParse`] for malformed YAML and
/// [`TestError::IncompleteFixture`] when the manifest has no name.
pub fn load_yaml(manifest: &str) -> Result<AcrDeployment> {
    let mut resource: AcrDeployment =
        serde_yaml::from_str(manifest).map_err(|source| TestError::FixtureParse { source })?;
    if resource.metadata.name.is_none() {
        return Err(TestError::IncompleteFixture {
            field: "metadata.name",
        });
    }
    resource
        .metadata
        .namespace
        .get_or_insert_with(|| "default".to_string());
    resource
        .metadata
        .resource_version
        .get_or_insert_with(|| "1".to_string());
    resource.metadata.generation.get_or_insert(1);
    Ok(resource)
}
