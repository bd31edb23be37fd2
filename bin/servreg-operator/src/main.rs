use anyhow::{Context as _, Result};
use kube::Client;
use servreg_core::{Broker, RegistryBackend};
use servreg_etcd::{EtcdGateway, KvBackend, MemoryKv};
use servreg_sync::{BackendConfig, BackendKind, Policy, Reconciler, SyncConfig};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod cluster;
mod namespace_controller;
mod service_controller;

use cluster::KubeNamespaceLookup;
use namespace_controller::NamespaceController;
use service_controller::{Context, ServiceController};

const DEFAULT_CONFIG_PATH: &str = "/etc/servreg/config.yaml";

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!("Starting servreg-operator...");

    let config = load_config()?;
    let backend = build_backend(&config.backend)?;
    let broker = Broker::new(backend, config.broker_timeout());
    info!("Registry broker initialized with {} backend", broker.backend_name());

    let policy = Arc::new(Policy::from_config(&config));
    info!("Namespace policy: {:?}", policy.namespace_policy());
    if config.allowed_annotations.is_empty() {
        warn!("No allowed annotations configured, no service will be mirrored");
    }

    let client = Client::try_default().await?;
    let lookup = Arc::new(KubeNamespaceLookup::new(client.clone()));
    let reconciler = Arc::new(Reconciler::new(broker, policy, lookup));
    let ctx = Arc::new(Context::new(reconciler, &config));

    let service_controller = ServiceController::new(client.clone(), ctx.clone());
    tokio::spawn(async move {
        if let Err(e) = service_controller.run().await {
            error!("Service controller error: {}", e);
        }
    });

    let namespace_controller = NamespaceController::new(client, ctx);
    tokio::spawn(async move {
        if let Err(e) = namespace_controller.run().await {
            error!("Namespace controller error: {}", e);
        }
    });

    // Keep the process alive
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting...");

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("SERVREG_LOG_FORMAT").map(|f| f == "json").unwrap_or(false);

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn load_config() -> Result<SyncConfig> {
    let mut config = match std::env::var("SERVREG_CONFIG") {
        Ok(path) => SyncConfig::load(&path).with_context(|| format!("loading {}", path))?,
        Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => SyncConfig::load(DEFAULT_CONFIG_PATH)?,
        Err(_) => {
            warn!("No configuration file found, using defaults");
            SyncConfig::default()
        }
    };

    config.apply_overrides(|name| std::env::var(name).ok())?;
    Ok(config)
}

fn build_backend(config: &BackendConfig) -> Result<Arc<dyn RegistryBackend>> {
    let backend: Arc<dyn RegistryBackend> = match config.kind {
        BackendKind::Etcd => {
            let gateway = EtcdGateway::new(config.endpoints.clone(), config.request_timeout())?;
            let backend = KvBackend::with_prefix(gateway, &config.prefix);
            info!(
                "Using etcd at {} under {}",
                backend.client().endpoints().join(", "),
                backend.prefix()
            );
            Arc::new(backend)
        }
        BackendKind::Memory => {
            warn!("Using the in-memory backend, registry content is lost on exit");
            Arc::new(KvBackend::with_prefix(MemoryKv::new(), &config.prefix))
        }
    };
    Ok(backend)
}
