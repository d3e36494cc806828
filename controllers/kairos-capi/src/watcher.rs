//! Kubernetes resource watchers.
//!
//! This module handles watching the Kairos resources for changes and
//! triggering reconciliation using kube_runtime::Controller.
//!
//! Both watchers go through the generic `watch_resource()` helper, which
//! turns the reconciler's `ReconcileOutcome` into a runtime `Action`, keeps
//! the per-object Fibonacci backoff used by the error policy and records
//! reconcile metrics.

use crate::backoff::BackoffTable;
use crate::error::ControllerError;
use crate::metrics::Metrics;
use crate::reconcile_helpers::object_key;
use crate::reconciler::{ReconcileOutcome, Reconciler};
use crds::{KairosConfig, KairosControlPlane, Machine};
use futures::StreamExt;
use futures::future::BoxFuture;
use kube::Api;
use kube::api::DynamicObject;
use kube_runtime::controller::{self, Action, Config as RuntimeConfig};
use kube_runtime::reflector::ObjectRef;
use kube_runtime::{Controller, watcher};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Delay between the last event for an object and its reconcile
const DEBOUNCE: Duration = Duration::from_secs(5);

/// State shared by every reconcile a watcher runs
#[derive(Debug)]
pub struct WatchContext {
    pub reconciler: Arc<Reconciler>,
    pub backoff: BackoffTable,
    pub metrics: Arc<Metrics>,
}

/// Map a successful pass onto the runtime's requeue decision
pub fn outcome_action(outcome: ReconcileOutcome) -> Action {
    match outcome {
        ReconcileOutcome::Done => Action::await_change(),
        ReconcileOutcome::RequeueAfter(delay) => Action::requeue(delay),
    }
}

/// `namespace/name` of a runtime object reference, matching `object_key`
fn ref_key(obj_ref: &ObjectRef<DynamicObject>) -> String {
    format!("{}/{}", obj_ref.namespace.as_deref().unwrap_or_default(), obj_ref.name)
}

/// Drop the backoff state of an object the runtime no longer has.
///
/// Returns whether `error` reported a missing object.
fn evict_missing<E1, E2>(backoff: &BackoffTable, error: &controller::Error<E1, E2>) -> bool
where
    E1: std::error::Error + 'static,
    E2: std::error::Error + 'static,
{
    match error {
        controller::Error::ObjectNotFound(obj_ref) => {
            let key = ref_key(obj_ref);
            debug!("{} is gone, forgetting its backoff", key);
            backoff.reset(&key);
            true
        }
        _ => false,
    }
}

/// Run `controller` until its watch streams end.
///
/// `reconcile_fn` is one of the reconciler's entry points. Failed passes are
/// requeued after the object's next Fibonacci delay; a successful pass
/// resets that object's backoff.
async fn watch_resource<K, F>(
    controller: Controller<K>,
    ctx: Arc<WatchContext>,
    reconcile_fn: F,
    resource_name: &'static str,
) -> Result<(), ControllerError>
where
    K: kube::Resource + Clone + Send + Sync + 'static + std::fmt::Debug + serde::de::DeserializeOwned,
    K::DynamicType: Default + std::cmp::Eq + std::hash::Hash + Clone + std::fmt::Debug + Unpin,
    F: Fn(Arc<Reconciler>, Arc<K>) -> BoxFuture<'static, Result<ReconcileOutcome, ControllerError>>
        + Send
        + Sync
        + Clone
        + 'static,
{
    info!("Starting {} watcher", resource_name);

    let error_policy = |obj: Arc<K>, error: &ControllerError, ctx: Arc<WatchContext>| {
        let key = object_key(obj.as_ref());
        let (delay, attempts) = ctx.backoff.next_delay(&key);
        warn!(
            "Reconciliation of {} {} failed ({:?}, attempt {}), retrying in {}s: {}",
            resource_name,
            key,
            error.class(),
            attempts,
            delay.as_secs(),
            error
        );
        Action::requeue(delay)
    };

    let reconcile = move |obj: Arc<K>, ctx: Arc<WatchContext>| {
        let reconcile_fn = reconcile_fn.clone();
        async move {
            let key = object_key(obj.as_ref());
            debug!("Reconciling {} {}", resource_name, key);

            let started = Instant::now();
            let result = reconcile_fn(Arc::clone(&ctx.reconciler), obj).await;
            let result_label = if result.is_ok() { "success" } else { "error" };
            ctx.metrics.observe(resource_name, result_label, started.elapsed());

            match result {
                Ok(outcome) => {
                    ctx.backoff.reset(&key);
                    Ok(outcome_action(outcome))
                }
                Err(e) => {
                    error!("Reconciliation failed for {} {}: {}", resource_name, key, e);
                    Err(e)
                }
            }
        }
    };

    let backoff = ctx.backoff.clone();
    controller
        .run(reconcile, error_policy, ctx)
        .for_each(move |res| {
            if let Err(e) = &res {
                evict_missing(&backoff, e);
            }
            async move {
                match res {
                    Ok((object, _)) => debug!("Reconciled {} {}", resource_name, object.name),
                    Err(e) => error!("Controller error for {}: {}", resource_name, e),
                }
            }
        })
        .await;

    Ok(())
}

/// Watches the Kairos resources for changes.
#[derive(Clone)]
pub struct Watcher {
    ctx: Arc<WatchContext>,
    kairos_config_api: Api<KairosConfig>,
    kairos_control_plane_api: Api<KairosControlPlane>,
    machine_api: Api<Machine>,
    concurrency: u16,
}

impl Watcher {
    /// Creates a new watcher instance.
    pub fn new(
        ctx: Arc<WatchContext>,
        kairos_config_api: Api<KairosConfig>,
        kairos_control_plane_api: Api<KairosControlPlane>,
        machine_api: Api<Machine>,
        concurrency: u16,
    ) -> Self {
        Self {
            ctx,
            kairos_config_api,
            kairos_control_plane_api,
            machine_api,
            concurrency,
        }
    }

    fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig::default().debounce(DEBOUNCE).concurrency(self.concurrency)
    }

    /// Watches KairosConfig resources.
    pub async fn watch_kairos_configs(&self) -> Result<(), ControllerError> {
        let controller = Controller::new(self.kairos_config_api.clone(), watcher::Config::default())
            .with_config(self.runtime_config());

        watch_resource(
            controller,
            Arc::clone(&self.ctx),
            |reconciler: Arc<Reconciler>, config: Arc<KairosConfig>| {
                Box::pin(async move { reconciler.reconcile_kairos_config(&config).await })
            },
            "KairosConfig",
        )
        .await
    }

    /// Watches KairosControlPlane resources and the Machines they own.
    pub async fn watch_kairos_control_planes(&self) -> Result<(), ControllerError> {
        let controller = Controller::new(self.kairos_control_plane_api.clone(), watcher::Config::default())
            .owns(self.machine_api.clone(), watcher::Config::default())
            .with_config(self.runtime_config());

        watch_resource(
            controller,
            Arc::clone(&self.ctx),
            |reconciler: Arc<Reconciler>, kcp: Arc<KairosControlPlane>| {
                Box::pin(async move { reconciler.reconcile_kairos_control_plane(&kcp).await })
            },
            "KairosControlPlane",
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_action() {
        assert_eq!(outcome_action(ReconcileOutcome::Done), Action::await_change());
        assert_eq!(
            outcome_action(ReconcileOutcome::RequeueAfter(Duration::from_secs(30))),
            Action::requeue(Duration::from_secs(30))
        );
    }

    #[test]
    fn test_missing_object_backoff_is_evicted() {
        let backoff = BackoffTable::default();
        backoff.next_delay("default/demo-cp");
        backoff.next_delay("default/demo-cp");
        backoff.next_delay("default/other");

        let gone = ObjectRef::<KairosControlPlane>::new("demo-cp").within("default").erase();
        let error: controller::Error<ControllerError, std::convert::Infallible> =
            controller::Error::ObjectNotFound(gone);
        assert!(evict_missing(&backoff, &error));

        // The evicted object starts over, the other one keeps its state
        assert_eq!(backoff.next_delay("default/demo-cp"), (Duration::from_secs(5), 1));
        assert_eq!(backoff.next_delay("default/other"), (Duration::from_secs(5), 2));
    }
}
