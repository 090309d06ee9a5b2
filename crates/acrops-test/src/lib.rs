//! # acrops Test
//!
//! Test support for the acrops controller.
//!
//! This crate provides:
//!
//! - Fixture builders for `AcrDeployment` resources ([`MockDeployment`], [`load_yaml`])
//! - An in-memory desired-state store with conflict and outage injection ([`InMemoryStore`])
//! - A scripted credential provider ([`ScriptedCredentialProvider`])
//! - A paged catalog lister with per-page fault injection ([`PagedLister`])
//!
//! ## Example
//!
//! ```rust
//! use acrops_core::ResourceKey;
//! use acrops_test::{InMemoryStore, MockDeployment};
//!
//! let store = InMemoryStore::new().with(
//!     MockDeployment::new("web").with_registry("contosoregistry").build(),
//! );
//! let stored = store.snapshot(&ResourceKey::new("default", "web")).unwrap();
//! assert_eq!(stored.spec.registry_identifier, "contosoregistry");
//! ```

pub mod error;
pub mod fakes;
pub mod fixtures;

pub use error::{Result, TestError};
pub use fakes::{InMemoryStore, PageFault, PagedLister, ScriptedCredentialProvider};
pub use fixtures::{load_yaml, MockDeployment};
