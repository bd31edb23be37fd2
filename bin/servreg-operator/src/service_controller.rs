//! Service controller mirroring load-balanced services into the registry

use crate::cluster::{service_snapshot, service_tombstone};
use futures::StreamExt;
use k8s_openapi::api::core::v1::{Namespace as KubeNamespace, Service as KubeService};
use kube::{Api, Client, ResourceExt};
use kube_runtime::reflector::{ObjectRef, Store};
use kube_runtime::{controller::Action, controller::Error as ControllerError, watcher, Controller};
use servreg_core::RegistryError;
use servreg_sync::{ChangeEvent, Reconciler, SyncConfig};
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug)]
pub struct ReconcileError(pub RegistryError);

impl fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Reconciliation error: {}", self.0)
    }
}

impl Error for ReconcileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.0)
    }
}

/// State shared by the controllers
pub struct Context {
    pub reconciler: Arc<Reconciler>,
    pub requeue: Duration,
    pub error_requeue: Duration,
}

impl Context {
    pub fn new(reconciler: Arc<Reconciler>, config: &SyncConfig) -> Self {
        Self {
            reconciler,
            requeue: config.requeue_interval(),
            error_requeue: config.error_requeue_interval(),
        }
    }
}

pub struct ServiceController {
    client: Client,
    ctx: Arc<Context>,
}

impl ServiceController {
    pub fn new(client: Client, ctx: Arc<Context>) -> Self {
        Self { client, ctx }
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        info!("Starting Service reconciliation");

        let services: Api<KubeService> = Api::all(self.client.clone());
        let namespaces: Api<KubeNamespace> = Api::all(self.client.clone());

        let controller = Controller::new(services, watcher::Config::default());
        let store = controller.store();

        // Re-evaluate every service of a namespace whose labels may have changed
        let ns_store = store.clone();
        let controller = controller.watches(namespaces, watcher::Config::default(), move |ns| {
            services_in(&ns_store, &ns.name_any())
        });

        tokio::spawn(collect_orphans(self.ctx.clone(), store));

        let mut stream = controller
            .run(reconcile, error_policy, self.ctx.clone())
            .boxed();

        // Process the reconciliation stream
        while let Some(item) = stream.next().await {
            match item {
                Ok((obj, _)) => debug!("Reconciled Service {}", obj),
                Err(ControllerError::ObjectNotFound(obj)) => {
                    let namespace = obj.namespace.clone().unwrap_or_default();
                    let event = ChangeEvent::ServiceChanged(service_tombstone(&namespace, &obj.name));
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

fn services_in(store: &Store<KubeService>, namespace: &str) -> Vec<ObjectRef<KubeService>> {
    store
        .state()
        .into_iter()
        .filter(|svc| svc.namespace().as_deref() == Some(namespace))
        .map(|svc| ObjectRef::from_obj(&*svc))
        .collect()
}

async fn reconcile(svc: Arc<KubeService>, ctx: Arc<Context>) -> Result<Action, ReconcileError> {
    let event = ChangeEvent::ServiceChanged(service_snapshot(&svc));
    debug!("Reconciling Service {}", event.path());

    match ctx.reconciler.handle(&event).await {
        Ok(_) => Ok(Action::requeue(ctx.requeue)),
        Err(e) if e.is_retryable() => Err(ReconcileError(e)),
        Err(e) => {
            report(&event.path(), &e);
            Ok(Action::await_change())
        }
    }
}

fn error_policy(svc: Arc<KubeService>, e: &ReconcileError, ctx: Arc<Context>) -> Action {
    warn!(
        "Error reconciling Service {}/{}: {}",
        svc.namespace().unwrap_or_default(),
        svc.name_any(),
        e
    );
    Action::requeue(ctx.error_requeue)
}

/// Log a failed pass; expected outcomes are not faults
pub fn report(path: &str, e: &RegistryError) {
    if e.is_retryable() {
        warn!("Registry unavailable while reconciling {}: {}", path, e);
    } else {
        debug!("Skipping {}: {}", path, e);
    }
}

/// Periodically deregister services that vanished from the cluster while
/// no deletion was observed, e.g. while the operator was down
async fn collect_orphans(ctx: Arc<Context>, store: Store<KubeService>) {
    if store.wait_until_ready().await.is_err() {
        warn!("Service store was dropped before becoming ready");
        return;
    }

    loop {
        let broker = ctx.reconciler.broker();
        match broker.list_ns().await {
            Ok(namespaces) => {
                for ns in namespaces {
                    let services = match broker.list_serv(&ns.name).await {
                        Ok(services) => services,
                        Err(e) => {
                            report(&ns.name, &e);
                            continue;
                        }
                    };

                    for serv in services {
                        let obj = ObjectRef::<KubeService>::new(&serv.name).within(&serv.ns_name);
                        if store.get(&obj).is_some() {
                            continue;
                        }

                        info!("Service {}/{} no longer exists, deregistering", serv.ns_name, serv.name);
                        let event = ChangeEvent::ServiceChanged(service_tombstone(&serv.ns_name, &serv.name));
                        if let Err(e) = ctx.reconciler.handle(&event).await {
                            report(&event.path(), &e);
                        }
                    }
                }
            }
            Err(e) => report("registry", &e),
        }

        tokio::time::sleep(ctx.requeue).await;
    }
}
