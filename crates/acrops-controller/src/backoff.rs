//! Requeue backoff for transient failures.

use std::collections::HashMap;
use std::time::Duration;

use acrops_core::ResourceKey;
use parking_lot::Mutex;

/// Capped exponential backoff without jitter.
///
/// The delay for the `n`th consecutive failure is
/// `min(initial * multiplier^(n-1), max)`, which never decreases as `n` grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay after the first failure.
    pub initial: Duration,
    /// Upper bound on any delay.
    pub max: Duration,
    /// Growth factor between consecutive failures.
    pub multiplier: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(5),
            max: Duration::from_secs(300),
            multiplier: 2,
        }
    }
}

impl BackoffPolicy {
    /// Creates a policy.
    pub const fn new(initial: Duration, max: Duration, multiplier: u32) -> Self {
        Self {
            initial,
            max,
            multiplier,
        }
    }

    /// Delay after `failures` consecutive failures. Zero failures is treated as one.
    pub fn delay(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1);
        let factor = self.multiplier.max(1).checked_pow(exponent);
        factor
            .and_then(|f| self.initial.checked_mul(f))
            .map_or(self.max, |delay| delay.min(self.max))
    }
}

/// Consecutive transient failures per resource.
///
/// The dispatcher never runs two passes for one key at the same time, so an
/// entry is only ever touched by one pass.
#[derive(Debug, Default)]
pub struct BackoffTracker {
    policy: BackoffPolicy,
    failures: Mutex<HashMap<ResourceKey, u32>>,
}

impl BackoffTracker {
    /// Creates a tracker using `policy`.
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Records a failure for `key` and returns the delay before the next attempt.
    pub fn record_failure(&self, key: &ResourceKey) -> Duration {
        let failures = {
            let mut map = self.failures.lock();
            let count = map.entry(key.clone()).or_insert(0);
            *count = count.saturating_add(1);
            *count
        };
        self.policy.delay(failures)
    }

    /// Clears the failure count for `key`.
    pub fn reset(&self, key: &ResourceKey) {
        self.failures.lock().remove(key);
    }

    /// Current consecutive failure count for `key`.
    pub fn failures(&self, key: &ResourceKey) -> u32 {
        self.failures.lock().get(key).copied().unwrap_or(0)
    }

    /// The policy in use.
    pub const fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }
}
