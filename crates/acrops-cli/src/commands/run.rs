//! Run command implementation.
//!
//! Starts the controller against the cluster from the ambient kubeconfig or
//! in-cluster service account.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use acrops_controller::{BackoffPolicy, KubeResourceStore, Reconciler, ReconcilerConfig};
use acrops_registry::HttpRegistryClient;

use super::registry::{AuthArgs, RegistryArgs};

/// Arguments for the run command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Namespace to watch (all namespaces if omitted)
    #[arg(short, long, env = "ACROPS_WATCH_NAMESPACE")]
    pub namespace: Option<String>,

    /// Resources reconciled concurrently
    #[arg(long, env = "ACROPS_CONCURRENCY", default_value = "4")]
    pub concurrency: u16,

    /// Status write attempts on version conflicts
    #[arg(long, env = "ACROPS_MAX_CONFLICT_RETRIES", default_value = "3")]
    pub max_conflict_retries: u32,

    /// Deadline for one reconciliation pass, in seconds
    #[arg(long, env = "ACROPS_PASS_TIMEOUT", default_value = "120")]
    pub pass_timeout: u64,

    /// Requeue interval after permanent failures, in seconds
    #[arg(long, env = "ACROPS_RESYNC_INTERVAL", default_value = "300")]
    pub resync_interval: u64,

    /// First backoff delay after a transient failure, in seconds
    #[arg(long, env = "ACROPS_BACKOFF_INITIAL", default_value = "5")]
    pub backoff_initial: u64,

    /// Largest backoff delay, in seconds
    #[arg(long, env = "ACROPS_BACKOFF_MAX", default_value = "300")]
    pub backoff_max: u64,

    #[command(flatten)]
    pub registry: RegistryArgs,

    #[command(flatten)]
    pub auth: AuthArgs,
}

impl RunArgs {
    fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig::builder()
            .registry_domain(&self.registry.registry_domain)
            .max_conflict_retries(self.max_conflict_retries)
            .backoff(BackoffPolicy::new(
                Duration::from_secs(self.backoff_initial),
                Duration::from_secs(self.backoff_max),
                2,
            ))
            .pass_timeout(Duration::from_secs(self.pass_timeout))
            .resync_interval(Duration::from_secs(self.resync_interval))
            .max_pages(self.registry.max_pages)
            .concurrency(self.concurrency)
            .build()
    }
}

/// Executes the run command until a termination signal arrives.
///
/// # Errors
///
/// Returns an error if the cluster or registry client cannot be created.
pub async fn execute(args: RunArgs) -> Result<()> {
    let config = args.reconciler_config();
    let auth = args.auth.auth()?;

    info!(
        registry_domain = %config.registry_domain,
        namespace = args.namespace.as_deref().unwrap_or("*"),
        "Starting acrops controller"
    );

    let client = kube::Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;
    let registry =
        HttpRegistryClient::new(args.registry.config()).context("Failed to create registry client")?;
    let credentials = auth.into_provider(registry.http().clone());

    let reconciler = Reconciler::new(
        config,
        Arc::new(KubeResourceStore::new(client.clone())),
        credentials,
        Arc::new(registry),
    );

    acrops_controller::run(client, reconciler, args.namespace.as_deref()).await;
    Ok(())
}
