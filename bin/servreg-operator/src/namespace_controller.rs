//! Namespace controller keeping registry namespaces in line with the policy

use crate::cluster::namespace_snapshot;
use crate::service_controller::{report, Context, ReconcileError};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Namespace as KubeNamespace;
use kube::{Api, Client, ResourceExt};
use kube_runtime::{controller::Action, controller::Error as ControllerError, watcher, Controller};
use servreg_sync::{ChangeEvent, NamespaceSnapshot};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct NamespaceController {
    client: Client,
    ctx: Arc<Context>,
}

impl NamespaceController {
    pub fn new(client: Client, ctx: Arc<Context>) -> Self {
        Self { client, ctx }
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        info!("Starting Namespace reconciliation");

        let namespaces: Api<KubeNamespace> = Api::all(self.client.clone());
        let controller = Controller::new(namespaces, watcher::Config::default());

        let mut stream = controller
            .run(reconcile, error_policy, self.ctx.clone())
            .boxed();

        while let Some(item) = stream.next().await {
            match item {
                Ok((obj, _)) => debug!("Reconciled Namespace {}", obj),
                Err(ControllerError::ObjectNotFound(obj)) => {
                    let event = ChangeEvent::NamespaceChanged(NamespaceSnapshot {
                        deleted: true,
                        ..NamespaceSnapshot::new(obj.name.clone())
                    });
                    if let Err(e) = self.ctx.reconciler.handle(&event).await {
                        report(&event.path(), &e);
                    }
                }
                Err(e) => error!("Error in reconciliation stream: {}", e),
            }
        }

        Ok(())
    }
}

async fn reconcile(ns: Arc<KubeNamespace>, ctx: Arc<Context>) -> Result<Action, ReconcileError> {
    let event = ChangeEvent::NamespaceChanged(namespace_snapshot(&ns));
    debug!("Reconciling Namespace {}", event.path());

    match ctx.reconciler.handle(&event).await {
        Ok(_) => Ok(Action::requeue(ctx.requeue)),
        Err(e) if e.is_retryable() => Err(ReconcileError(e)),
        Err(e) => {
            report(&event.path(), &e);
            Ok(Action::await_change())
        }
    }
}

fn error_policy(ns: Arc<KubeNamespace>, e: &ReconcileError, ctx: Arc<Context>) -> Action {
    warn!("Error reconciling Namespace {}: {}", ns.name_any(), e);
    Action::requeue(ctx.error_requeue)
}
