//! Configuration types for the reconciler.
//!
//! Defaults suit a production cluster; tests shrink the durations through
//! [`ReconcilerConfig::builder`].

use std::time::Duration;

use acrops_core::DEFAULT_REGISTRY_DOMAIN;

use crate::backoff::BackoffPolicy;

/// Configuration for the reconciler and its dispatcher.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Domain appended to the registry identifier.
    pub registry_domain: String,

    /// Status write attempts before giving up on version conflicts.
    pub max_conflict_retries: u32,

    /// Requeue backoff for transient failures.
    pub backoff: BackoffPolicy,

    /// Deadline for a single pass, covering every network call in it.
    pub pass_timeout: Duration,

    /// Requeue interval after a terminal failure.
    pub resync_interval: Duration,

    /// Catalog pages fetched per pass before the listing counts as truncated.
    pub max_pages: u32,

    /// Maximum number of concurrent passes (distinct keys).
    pub concurrency: u16,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            registry_domain: DEFAULT_REGISTRY_DOMAIN.to_string(),
            max_conflict_retries: 3,
            backoff: BackoffPolicy::default(),
            pass_timeout: Duration::from_secs(120),
            resync_interval: Duration::from_secs(300),
            max_pages: 1000,
            concurrency: 4,
        }
    }
}

impl ReconcilerConfig {
    /// Creates a configuration builder.
    pub fn builder() -> ReconcilerConfigBuilder {
        ReconcilerConfigBuilder::default()
    }
}

/// Builder for `ReconcilerConfig`.
#[derive(Debug, Default)]
pub struct ReconcilerConfigBuilder {
    registry_domain: Option<String>,
    max_conflict_retries: Option<u32>,
    backoff: Option<BackoffPolicy>,
    pass_timeout: Option<Duration>,
    resync_interval: Option<Duration>,
    max_pages: Option<u32>,
    concurrency: Option<u16>,
}

impl ReconcilerConfigBuilder {
    /// Sets the registry domain.
    pub fn registry_domain(mut self, domain: impl Into<String>) -> Self {
        self.registry_domain = Some(domain.into());
        self
    }

    /// Sets the number of status write attempts on conflict.
    pub fn max_conflict_retries(mut self, retries: u32) -> Self {
        self.max_conflict_retries = Some(retries);
        self
    }

    /// Sets the backoff policy.
    pub fn backoff(mut self, policy: BackoffPolicy) -> Self {
        self.backoff = Some(policy);
        self
    }

    /// Sets the per-pass deadline.
    pub fn pass_timeout(mut self, timeout: Duration) -> Self {
        self.pass_timeout = Some(timeout);
        self
    }

    /// Sets the requeue interval after terminal failures.
    pub fn resync_interval(mut self, interval: Duration) -> Self {
        self.resync_interval = Some(interval);
        self
    }

    /// Sets the page limit per enumeration.
    pub fn max_pages(mut self, pages: u32) -> Self {
        self.max_pages = Some(pages);
        self
    }

    /// Sets the dispatcher concurrency.
    pub fn concurrency(mut self, concurrency: u16) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> ReconcilerConfig {
        let defaults = ReconcilerConfig::default();
        ReconcilerConfig {
            registry_domain: self.registry_domain.unwrap_or(defaults.registry_domain),
            max_conflict_retries: self
                .max_conflict_retries
                .unwrap_or(defaults.max_conflict_retries),
            backoff: self.backoff.unwrap_or(defaults.backoff),
            pass_timeout: self.pass_timeout.unwrap_or(defaults.pass_timeout),
            resync_interval: self.resync_interval.unwrap_or(defaults.resync_interval),
            max_pages: self.max_pages.unwrap_or(defaults.max_pages),
            concurrency: self.concurrency.unwrap_or(defaults.concurrency),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ReconcilerConfig::default();
        assert_eq!(config.registry_domain, "azurecr.io");
        assert_eq!(config.max_conflict_retries, 3);
        assert!(config.pass_timeout > Duration::ZERO);
        assert!(config.resync_interval >= config.backoff.max);
    }

    #[test]
    fn test_builder() {
        let config = ReconcilerConfig::builder()
            .registry_domain("azurecr.us")
            .max_conflict_retries(5)
            .pass_timeout(Duration::from_secs(10))
            .max_pages(7)
            .concurrency(1)
            .build();

        assert_eq!(config.registry_domain, "azurecr.us");
        assert_eq!(config.max_conflict_retries, 5);
        assert_eq!(config.pass_timeout, Duration::from_secs(10));
        assert_eq!(config.max_pages, 7);
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.resync_interval, Duration::from_secs(300));
    }
}
