//! Binding of the [`Reconciler`] to `kube::runtime::Controller`.
//!
//! The controller watches `AcrDeployment` objects and serializes passes per
//! object. Outcomes map onto runtime actions:
//!
//! | Outcome     | Action                                   |
//! |-------------|------------------------------------------|
//! | `Synced`    | wait for the next change                 |
//! | `NotFound`  | wait for the next change                 |
//! | `Requeue`   | requeue after the backoff delay          |
//! | `Terminal`  | error policy: requeue at resync interval |

use std::sync::Arc;

use acrops_core::{AcrDeployment, ResourceKey};
use futures::StreamExt;
use kube::runtime::controller::{
    Action, Config as ControllerConfig, Controller, Error as ControllerError,
};
use kube::runtime::reflector::ObjectRef;
use kube::runtime::watcher::{self, Config as WatcherConfig};
use kube::{Api, Client, ResourceExt};

use crate::error::ReconcileError;
use crate::reconciler::{Outcome, ReconcileRequest, Reconciler};

const WATCH_TIMEOUT_SECS: u32 = 290;

/// One item of the controller's result stream.
pub type DispatchResult =
    Result<(ObjectRef<AcrDeployment>, Action), ControllerError<ReconcileError, watcher::Error>>;

/// Shared state handed to every pass.
#[derive(Debug)]
pub struct Context {
    reconciler: Reconciler,
}

impl Context {
    /// Wraps `reconciler` for the runtime.
    pub const fn new(reconciler: Reconciler) -> Self {
        Self { reconciler }
    }

    /// The wrapped reconciler.
    pub const fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }
}

/// Runtime entry point for one object.
///
/// # Errors
///
/// Returns the terminal error of the pass; transient failures become a
/// requeue action instead.
pub async fn reconcile(
    resource: Arc<AcrDeployment>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let key = match ResourceKey::from_resource(&resource) {
        Ok(key) => key,
        Err(err) => {
            tracing::warn!(error = %err, "Skipping object without identity");
            return Ok(Action::await_change());
        }
    };
    let request = ReconcileRequest::with_timeout(key, ctx.reconciler.config().pass_timeout);

    match ctx.reconciler.reconcile(&request).await {
        Outcome::Synced | Outcome::NotFound => Ok(Action::await_change()),
        Outcome::Requeue { after, .. } => Ok(Action::requeue(after)),
        Outcome::Terminal(err) => Err(err),
    }
}

/// Requeues terminal failures at the baseline resync interval.
pub fn error_policy(
    resource: Arc<AcrDeployment>,
    error: &ReconcileError,
    ctx: Arc<Context>,
) -> Action {
    tracing::error!(
        resource = %resource.name_any(),
        namespace = %resource.namespace().unwrap_or_default(),
        category = %error.category(),
        error = %error,
        "Reconciliation failed permanently"
    );
    Action::requeue(ctx.reconciler.config().resync_interval)
}

/// Logs one dispatch result.
///
/// A requeue that fires after its object was deleted never reaches
/// [`reconcile`]; the runtime reports it as `ObjectNotFound` instead, and
/// the object's backoff state is dropped here.
pub fn observe_dispatch(ctx: &Context, result: &DispatchResult) {
    match result {
        Ok((object, action)) => {
            tracing::debug!(object = %object, ?action, "Reconciled");
        }
        Err(ControllerError::ObjectNotFound(object)) => {
            if let Some(namespace) = &object.namespace {
                ctx.reconciler
                    .forget(&ResourceKey::new(namespace.as_str(), object.name.as_str()));
            }
            tracing::debug!(object = %object, "Object deleted while queued");
        }
        Err(err) => tracing::warn!(error = %err, "Reconcile dispatch error"),
    }
}

/// Runs the controller until a termination signal arrives.
///
/// Watches a single namespace when `namespace` is set, otherwise all of them.
pub async fn run(client: Client, reconciler: Reconciler, namespace: Option<&str>) {
    let api: Api<AcrDeployment> = match namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    };
    let concurrency = reconciler.config().concurrency;
    let ctx = Arc::new(Context::new(reconciler));
    let observer = ctx.clone();

    tracing::info!(
        namespace = namespace.unwrap_or("*"),
        concurrency,
        "Starting AcrDeployment controller"
    );

    Controller::new(api, WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS))
        .with_config(ControllerConfig::default().concurrency(concurrency))
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| {
            observe_dispatch(&observer, &result);
            futures::future::ready(())
        })
        .await;

    tracing::info!("AcrDeployment controller stopped");
}
