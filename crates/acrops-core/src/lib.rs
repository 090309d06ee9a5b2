//! # acrops Core
//!
//! Core types and traits for the acrops registry controller.
//!
//! This crate provides the resource model shared by every other crate in the
//! workspace:
//!
//! - [`AcrDeployment`] - the custom resource (spec + status) the controller reconciles
//! - [`ResourceKey`] - the `(namespace, name)` identity used as the reconciliation key
//! - [`RegistryEndpoint`] - the registry URL derived from `spec.registryIdentifier`
//! - [`ErrorCategory`] - the stable error taxonomy written into status
//! - [`ResourceStore`] - the desired-state store seam (get + versioned status update)
//!
//! ## Example
//!
//! ```rust
//! use acrops_core::{AcrDeploymentSpec, RegistryEndpoint};
//!
//! let spec = AcrDeploymentSpec::new("myregistry");
//! let endpoint = RegistryEndpoint::from_spec(&spec, acrops_core::DEFAULT_REGISTRY_DOMAIN)?;
//! assert_eq!(endpoint.as_str(), "https://myregistry.azurecr.io");
//! # Ok::<(), acrops_core::Error>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod endpoint;
pub mod error;
pub mod resource;
pub mod status;
pub mod store;
pub mod validation;


pub use endpoint::{RegistryEndpoint, DEFAULT_REGISTRY_DOMAIN};
pub use error::{Error, Result};
pub use resource::{AcrDeployment, AcrDeploymentSpec, ImageReference, ResourceKey};
pub use status::{AcrDeploymentStatus, ErrorCategory, Phase, StatusError};
pub use store::{ResourceStore, StoreError};
pub use validation::{Validate, ValidationError, ValidationErrors};
