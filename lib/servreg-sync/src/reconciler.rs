//! Level-triggered reconciliation of cluster state into the registry
//!
//! Every pass recomputes the desired registry content for one object from
//! its latest snapshot and converges the backend towards it, so dropped,
//! duplicated or reordered notifications are repaired by the next pass.
//!
//! Writes to one path are serialized through [`PathLocks`]. A service pass
//! holds its service lock for the whole pass and takes the namespace lock
//! while writing the namespace and the service record. A namespace lock is
//! never held while waiting for a service lock.

use crate::event::{ChangeEvent, NamespaceSnapshot, ServiceSnapshot};
use crate::locks::PathLocks;
use crate::policy::{NamespaceLookup, Policy};
use servreg_core::{Broker, Endpoint, Key, Namespace, Result, Service};
use sha2::{Digest, Sha256};
use std::ops::AddAssign;
use std::sync::Arc;
use tracing::{debug, info};

/// Metadata key holding the port protocol on endpoints
pub const PROTOCOL_KEY: &str = "protocol";

/// Registry writes issued by a pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub created: u32,
    pub updated: u32,
    pub deleted: u32,
    pub unchanged: u32,
}

impl ReconcileOutcome {
    /// True when the pass did not write anything
    pub fn is_noop(&self) -> bool {
        self.created == 0 && self.updated == 0 && self.deleted == 0
    }
}

impl AddAssign for ReconcileOutcome {
    fn add_assign(&mut self, other: Self) {
        self.created += other.created;
        self.updated += other.updated;
        self.deleted += other.deleted;
        self.unchanged += other.unchanged;
    }
}

/// Name of the endpoint representing `address:port/protocol` of a service.
///
/// The protocol is part of the identity so that a port number served over
/// both TCP and UDP yields two endpoints.
pub fn endpoint_name(serv_name: &str, address: &str, port: u16, protocol: &str) -> String {
    let input = format!("{}:{}/{}", address, port, protocol.to_lowercase());
    let digest = Sha256::digest(input.as_bytes());
    format!("{}-{}", serv_name, &hex::encode(digest)[..10])
}

/// Converges the registry towards the eligible cluster state
pub struct Reconciler {
    broker: Broker,
    policy: Arc<Policy>,
    lookup: Arc<dyn NamespaceLookup>,
    locks: PathLocks,
}

impl Reconciler {
    pub fn new(broker: Broker, policy: Arc<Policy>, lookup: Arc<dyn NamespaceLookup>) -> Self {
        Self {
            broker,
            policy,
            lookup,
            locks: PathLocks::new(),
        }
    }

    pub fn broker(&self) -> &Broker {
        &self.broker
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Entry point for watcher notifications, dispatching on the object kind
    pub async fn handle(&self, event: &ChangeEvent) -> Result<ReconcileOutcome> {
        match event {
            ChangeEvent::NamespaceChanged(ns) => self.reconcile_namespace(ns).await,
            ChangeEvent::ServiceChanged(svc) => self.reconcile_service(svc).await,
        }
    }

    /// Registry content a service should have, given its eligible parent
    pub fn desired_state(
        &self,
        svc: &ServiceSnapshot,
        parent: &NamespaceSnapshot,
    ) -> (Namespace, Service, Vec<Endpoint>) {
        let ns = Namespace::new(parent.name.clone(), self.policy.filter_annotations(&parent.annotations));
        let metadata = self.policy.filter_annotations(&svc.annotations);
        let serv = Service::new(svc.namespace.clone(), svc.name.clone(), metadata.clone());

        let mut endpoints = Vec::new();
        for address in &svc.ingress {
            for port in &svc.ports {
                let protocol = port.protocol.to_lowercase();
                let mut endp_metadata = metadata.clone();
                endp_metadata.insert(PROTOCOL_KEY.to_string(), protocol.clone());
                endpoints.push(Endpoint::new(
                    svc.namespace.clone(),
                    svc.name.clone(),
                    endpoint_name(&svc.name, address, port.port, &protocol),
                    address.clone(),
                    port.port,
                    endp_metadata,
                ));
            }
        }
        endpoints.sort_by(|a, b| a.name.cmp(&b.name));
        endpoints.dedup_by(|a, b| a.name == b.name);

        (ns, serv, endpoints)
    }

    pub async fn reconcile_service(&self, svc: &ServiceSnapshot) -> Result<ReconcileOutcome> {
        let key = Key::service(&svc.namespace, &svc.name)?;
        let _guard = self.locks.lock(&key.to_string()).await;

        let parent = if svc.deleted {
            None
        } else {
            self.policy.eligible_parent(svc, self.lookup.as_ref()).await
        };

        let outcome = match parent {
            Some(parent) => self.register_service(svc, &parent).await?,
            None => self.deregister_service(&svc.namespace, &svc.name).await?,
        };

        if outcome.is_noop() {
            debug!("Service {} already converged", key);
        } else {
            info!(
                "Reconciled service {}: {} created, {} updated, {} deleted",
                key, outcome.created, outcome.updated, outcome.deleted
            );
        }
        Ok(outcome)
    }

    pub async fn reconcile_namespace(&self, ns: &NamespaceSnapshot) -> Result<ReconcileOutcome> {
        let key = Key::namespace(&ns.name)?;

        let outcome = if !ns.deleted && self.policy.should_watch_namespace(&ns.labels) {
            let _guard = self.locks.lock(&key.to_string()).await;
            let desired = Namespace::new(ns.name.clone(), self.policy.filter_annotations(&ns.annotations));
            self.refresh_ns(&desired).await?
        } else {
            self.teardown_namespace(&ns.name).await?
        };

        if !outcome.is_noop() {
            info!(
                "Reconciled namespace {}: {} updated, {} deleted",
                key, outcome.updated, outcome.deleted
            );
        }
        Ok(outcome)
    }

    async fn register_service(
        &self,
        svc: &ServiceSnapshot,
        parent: &NamespaceSnapshot,
    ) -> Result<ReconcileOutcome> {
        let (ns, serv, endpoints) = self.desired_state(svc, parent);
        let mut outcome = ReconcileOutcome::default();

        {
            let _ns_guard = self.locks.lock(&Key::namespace(&ns.name)?.to_string()).await;
            outcome += self.apply_ns(&ns).await?;
            outcome += self.apply_serv(&serv).await?;
        }

        outcome += self.apply_endpoints(&serv, endpoints).await?;
        Ok(outcome)
    }

    /// Remove a service and its endpoints, then its namespace if it is left
    /// without services. Must be called with the service lock held.
    async fn deregister_service(&self, ns_name: &str, serv_name: &str) -> Result<ReconcileOutcome> {
        let mut outcome = ReconcileOutcome::default();

        match self.broker.get_serv(ns_name, serv_name).await {
            Ok(_) => {
                for endp in self.broker.list_endp(ns_name, serv_name).await? {
                    outcome += self.remove_endp(&endp).await?;
                }
                outcome += absorb_missing(self.broker.delete_serv(ns_name, serv_name).await)?;
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        let _ns_guard = self.locks.lock(&Key::namespace(ns_name)?.to_string()).await;
        outcome += self.prune_ns(ns_name).await?;
        Ok(outcome)
    }

    /// Remove every service of a namespace, then the namespace itself
    async fn teardown_namespace(&self, ns_name: &str) -> Result<ReconcileOutcome> {
        let mut outcome = ReconcileOutcome::default();

        match self.broker.get_ns(ns_name).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => return Ok(outcome),
            Err(e) => return Err(e),
        }

        for serv in self.broker.list_serv(ns_name).await? {
            let key = Key::service(&serv.ns_name, &serv.name)?;
            let _guard = self.locks.lock(&key.to_string()).await;
            outcome += self.deregister_service(&serv.ns_name, &serv.name).await?;
        }

        let _ns_guard = self.locks.lock(&Key::namespace(ns_name)?.to_string()).await;
        outcome += self.prune_ns(ns_name).await?;
        Ok(outcome)
    }

    /// Delete the namespace if it has no services left.
    /// Must be called with the namespace lock held.
    async fn prune_ns(&self, ns_name: &str) -> Result<ReconcileOutcome> {
        match self.broker.get_ns(ns_name).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => return Ok(ReconcileOutcome::default()),
            Err(e) => return Err(e),
        }

        if !self.broker.list_serv(ns_name).await?.is_empty() {
            return Ok(ReconcileOutcome::default());
        }

        info!("Deleting namespace {} from the registry", ns_name);
        absorb_missing(self.broker.delete_ns(ns_name).await)
    }

    /// Update an existing namespace record; absent namespaces are left to
    /// the service passes
    async fn refresh_ns(&self, desired: &Namespace) -> Result<ReconcileOutcome> {
        let mut outcome = ReconcileOutcome::default();
        match self.broker.get_ns(&desired.name).await {
            Ok(current) if current == *desired => outcome.unchanged += 1,
            Ok(_) => {
                self.broker.update_ns(desired).await?;
                outcome.updated += 1;
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
        Ok(outcome)
    }

    async fn apply_ns(&self, desired: &Namespace) -> Result<ReconcileOutcome> {
        let mut outcome = ReconcileOutcome::default();
        match self.broker.get_ns(&desired.name).await {
            Ok(current) if current == *desired => outcome.unchanged += 1,
            Ok(_) => {
                self.broker.update_ns(desired).await?;
                outcome.updated += 1;
            }
            Err(e) if e.is_not_found() => match self.broker.create_ns(desired).await {
                Ok(_) => outcome.created += 1,
                Err(e) if e.is_already_exists() => {
                    self.broker.update_ns(desired).await?;
                    outcome.updated += 1;
                }
                Err(e) => return Err(e),
            },
            Err(e) => return Err(e),
        }
        Ok(outcome)
    }

    async fn apply_serv(&self, desired: &Service) -> Result<ReconcileOutcome> {
        let mut outcome = ReconcileOutcome::default();
        match self.broker.get_serv(&desired.ns_name, &desired.name).await {
            Ok(current) if current == *desired => outcome.unchanged += 1,
            Ok(_) => {
                self.broker.update_serv(desired).await?;
                outcome.updated += 1;
            }
            Err(e) if e.is_not_found() => match self.broker.create_serv(desired).await {
                Ok(_) => outcome.created += 1,
                Err(e) if e.is_already_exists() => {
                    self.broker.update_serv(desired).await?;
                    outcome.updated += 1;
                }
                Err(e) => return Err(e),
            },
            Err(e) => return Err(e),
        }
        Ok(outcome)
    }

    async fn apply_endpoints(&self, serv: &Service, desired: Vec<Endpoint>) -> Result<ReconcileOutcome> {
        let mut outcome = ReconcileOutcome::default();
        let current = self.broker.list_endp(&serv.ns_name, &serv.name).await?;

        for endp in &desired {
            match current.iter().find(|c| c.name == endp.name) {
                Some(existing) if existing == endp => outcome.unchanged += 1,
                Some(_) => {
                    self.broker.update_endp(endp).await?;
                    outcome.updated += 1;
                }
                None => match self.broker.create_endp(endp).await {
                    Ok(_) => outcome.created += 1,
                    Err(e) if e.is_already_exists() => {
                        self.broker.update_endp(endp).await?;
                        outcome.updated += 1;
                    }
                    Err(e) => return Err(e),
                },
            }
        }

        for stale in current.iter().filter(|c| !desired.iter().any(|d| d.name == c.name)) {
            outcome += self.remove_endp(stale).await?;
        }

        Ok(outcome)
    }

    async fn remove_endp(&self, endp: &Endpoint) -> Result<ReconcileOutcome> {
        debug!("Deleting endpoint {}/{}/{}", endp.ns_name, endp.serv_name, endp.name);
        absorb_missing(
            self.broker
                .delete_endp(&endp.ns_name, &endp.serv_name, &endp.name)
                .await,
        )
    }
}

/// A delete that finds nothing has already converged
fn absorb_missing(res: Result<()>) -> Result<ReconcileOutcome> {
    match res {
        Ok(()) => Ok(ReconcileOutcome {
            deleted: 1,
            ..Default::default()
        }),
        Err(e) if e.is_not_found() => Ok(ReconcileOutcome::default()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ListPolicy, DEFAULT_ALLOW_LABEL, DEFAULT_BLOCK_LABEL};
    use crate::event::{ServicePort, ServiceType};
    use crate::policy::LookupError;
    use async_trait::async_trait;
    use servreg_core::{Metadata, RegistryError};
    use servreg_etcd::{KvBackend, MemoryKv};
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::sync::RwLock;

    #[derive(Default)]
    struct MapLookup(RwLock<HashMap<String, NamespaceSnapshot>>);

    impl MapLookup {
        async fn set(&self, ns: NamespaceSnapshot) {
            self.0.write().await.insert(ns.name.clone(), ns);
        }
    }

    #[async_trait]
    impl NamespaceLookup for MapLookup {
        async fn get_namespace(&self, name: &str) -> std::result::Result<NamespaceSnapshot, LookupError> {
            self.0
                .read()
                .await
                .get(name)
                .cloned()
                .ok_or_else(|| LookupError(format!("namespace {} not found", name)))
        }
    }

    fn metadata(pairs: &[(&str, &str)]) -> Metadata {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    async fn setup(patterns: &[&str]) -> (Reconciler, Arc<MapLookup>) {
        let backend = Arc::new(KvBackend::new(MemoryKv::new()));
        let broker = Broker::new(backend, Duration::from_secs(5));
        let policy = Arc::new(Policy::new(
            ListPolicy::BlockList,
            DEFAULT_ALLOW_LABEL,
            DEFAULT_BLOCK_LABEL,
            patterns.iter().map(|p| p.to_string()),
        ));
        let lookup = Arc::new(MapLookup::default());
        lookup.set(NamespaceSnapshot::new("prod")).await;
        (Reconciler::new(broker, policy, lookup.clone()), lookup)
    }

    fn web() -> ServiceSnapshot {
        ServiceSnapshot {
            namespace: "prod".to_string(),
            name: "web".to_string(),
            service_type: ServiceType::LoadBalancer,
            ingress: vec!["203.0.113.7".to_string()],
            ports: vec![ServicePort::tcp(80), ServicePort::tcp(443)],
            annotations: metadata(&[("a.io/x", "1"), ("b.io/y", "2")]),
            deleted: false,
        }
    }

    #[test]
    fn test_endpoint_name() {
        let name = endpoint_name("web", "203.0.113.7", 80, "tcp");
        assert!(name.starts_with("web-"));
        assert_eq!(name.len(), "web-".len() + 10);
        assert_eq!(name, endpoint_name("web", "203.0.113.7", 80, "TCP"));
        assert_ne!(name, endpoint_name("web", "203.0.113.7", 443, "tcp"));
        assert_ne!(name, endpoint_name("web", "203.0.113.7", 80, "udp"));
    }

    #[tokio::test]
    async fn test_registers_eligible_service() {
        let (reconciler, _) = setup(&["a.io/*"]).await;

        let outcome = reconciler.reconcile_service(&web()).await.unwrap();
        assert_eq!(outcome.created, 4);

        let broker = reconciler.broker();
        broker.get_ns("prod").await.unwrap();
        let serv = broker.get_serv("prod", "web").await.unwrap();
        assert_eq!(serv.metadata, metadata(&[("a.io/x", "1")]));

        let endpoints = broker.list_endp("prod", "web").await.unwrap();
        assert_eq!(endpoints.len(), 2);
        for endp in &endpoints {
            assert_eq!(endp.address, "203.0.113.7");
            assert_eq!(endp.metadata.get(PROTOCOL_KEY).map(String::as_str), Some("tcp"));
            assert_eq!(endp.metadata.get("a.io/x").map(String::as_str), Some("1"));
        }
    }

    #[tokio::test]
    async fn test_same_port_over_two_protocols() {
        let (reconciler, _) = setup(&["a.io/*"]).await;
        let mut dns = web();
        dns.name = "dns".to_string();
        dns.ports = vec![ServicePort::tcp(53), ServicePort::udp(53)];

        let outcome = reconciler.reconcile_service(&dns).await.unwrap();
        assert_eq!(outcome.created, 4);

        let endpoints = reconciler.broker().list_endp("prod", "dns").await.unwrap();
        assert_eq!(endpoints.len(), 2);
        let mut protocols: Vec<&str> = endpoints
            .iter()
            .filter_map(|e| e.metadata.get(PROTOCOL_KEY).map(String::as_str))
            .collect();
        protocols.sort();
        assert_eq!(protocols, vec!["tcp", "udp"]);
        assert!(endpoints.iter().all(|e| e.port == 53));

        let outcome = reconciler.reconcile_service(&dns).await.unwrap();
        assert!(outcome.is_noop());
    }

    #[tokio::test]
    async fn test_repeated_pass_is_noop() {
        let (reconciler, _) = setup(&["a.io/*"]).await;
        reconciler.reconcile_service(&web()).await.unwrap();
        let before = reconciler.broker().list_endp("prod", "web").await.unwrap();

        let outcome = reconciler.reconcile_service(&web()).await.unwrap();
        assert!(outcome.is_noop());
        assert_eq!(outcome.unchanged, 4);

        let after = reconciler.broker().list_endp("prod", "web").await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_changed_annotations_update_records() {
        let (reconciler, _) = setup(&["a.io/*"]).await;
        reconciler.reconcile_service(&web()).await.unwrap();

        let mut svc = web();
        svc.annotations.insert("a.io/x".to_string(), "2".to_string());
        let outcome = reconciler.reconcile_service(&svc).await.unwrap();
        assert_eq!(outcome.updated, 3);
        assert_eq!(outcome.created, 0);

        let serv = reconciler.broker().get_serv("prod", "web").await.unwrap();
        assert_eq!(serv.metadata, metadata(&[("a.io/x", "2")]));
    }

    #[tokio::test]
    async fn test_port_change_replaces_endpoint() {
        let (reconciler, _) = setup(&["a.io/*"]).await;
        reconciler.reconcile_service(&web()).await.unwrap();

        let mut svc = web();
        svc.ports = vec![ServicePort::tcp(80), ServicePort::tcp(8443)];
        let outcome = reconciler.reconcile_service(&svc).await.unwrap();
        assert_eq!(outcome.created, 1);
        assert_eq!(outcome.deleted, 1);

        let ports: Vec<u16> = reconciler
            .broker()
            .list_endp("prod", "web")
            .await
            .unwrap()
            .iter()
            .map(|e| e.port)
            .collect();
        assert!(ports.contains(&80));
        assert!(ports.contains(&8443));
        assert_eq!(ports.len(), 2);
    }

    #[tokio::test]
    async fn test_lost_address_deregisters() {
        let (reconciler, _) = setup(&["a.io/*"]).await;
        reconciler.reconcile_service(&web()).await.unwrap();

        let mut svc = web();
        svc.ingress.clear();
        let outcome = reconciler.reconcile_service(&svc).await.unwrap();
        assert_eq!(outcome.deleted, 4);

        assert!(reconciler.broker().list_ns().await.unwrap().is_empty());
        let err = reconciler.broker().get_serv("prod", "web").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_deleted_service_deregisters() {
        let (reconciler, _) = setup(&["a.io/*"]).await;
        reconciler.reconcile_service(&web()).await.unwrap();

        let mut svc = web();
        svc.deleted = true;
        let outcome = reconciler.handle(&ChangeEvent::ServiceChanged(svc.clone())).await.unwrap();
        assert_eq!(outcome.deleted, 4);

        let again = reconciler.handle(&ChangeEvent::ServiceChanged(svc)).await.unwrap();
        assert_eq!(again, ReconcileOutcome::default());
    }

    #[tokio::test]
    async fn test_ineligible_and_absent_writes_nothing() {
        let (reconciler, _) = setup(&["*/*"]).await;
        let mut svc = web();
        svc.service_type = ServiceType::ClusterIp;

        let outcome = reconciler.reconcile_service(&svc).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::default());
        assert!(reconciler.broker().list_ns().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lookup_failure_is_not_eligible() {
        let (reconciler, _) = setup(&["a.io/*"]).await;
        let mut svc = web();
        svc.namespace = "unknown".to_string();

        let outcome = reconciler.reconcile_service(&svc).await.unwrap();
        assert!(outcome.is_noop());
        assert!(reconciler.broker().list_ns().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_identifiers_are_rejected() {
        let (reconciler, _) = setup(&["a.io/*"]).await;
        let mut svc = web();
        svc.namespace.clear();

        let err = reconciler.reconcile_service(&svc).await.unwrap_err();
        assert!(matches!(err, RegistryError::MissingNamespaceName));

        let err = reconciler
            .reconcile_namespace(&NamespaceSnapshot::new(""))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::MissingNamespaceName));
    }

    #[tokio::test]
    async fn test_blocked_namespace_is_torn_down() {
        let (reconciler, lookup) = setup(&["a.io/*"]).await;
        let mut api = web();
        api.name = "api".to_string();
        reconciler.reconcile_service(&web()).await.unwrap();
        reconciler.reconcile_service(&api).await.unwrap();

        let blocked = NamespaceSnapshot::new("prod").with_label(DEFAULT_BLOCK_LABEL, "true");
        lookup.set(blocked.clone()).await;

        let outcome = reconciler
            .handle(&ChangeEvent::NamespaceChanged(blocked.clone()))
            .await
            .unwrap();
        // 2 services, 4 endpoints, 1 namespace
        assert_eq!(outcome.deleted, 7);
        assert!(reconciler.broker().list_ns().await.unwrap().is_empty());

        let outcome = reconciler.reconcile_service(&web()).await.unwrap();
        assert!(outcome.is_noop());
        let outcome = reconciler.reconcile_namespace(&blocked).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::default());
    }

    #[tokio::test]
    async fn test_namespace_kept_while_services_remain() {
        let (reconciler, _) = setup(&["a.io/*"]).await;
        let mut api = web();
        api.name = "api".to_string();
        reconciler.reconcile_service(&web()).await.unwrap();
        reconciler.reconcile_service(&api).await.unwrap();

        api.deleted = true;
        reconciler.reconcile_service(&api).await.unwrap();

        reconciler.broker().get_ns("prod").await.unwrap();
        let services = reconciler.broker().list_serv("prod").await.unwrap();
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].name, "web");
    }

    #[tokio::test]
    async fn test_namespace_metadata_refresh() {
        let (reconciler, lookup) = setup(&["team.io/*"]).await;
        let ns = NamespaceSnapshot::new("prod").with_annotation("team.io/owner", "blue");
        lookup.set(ns.clone()).await;

        let mut svc = web();
        svc.annotations = metadata(&[("team.io/tier", "frontend")]);
        reconciler.reconcile_service(&svc).await.unwrap();
        let stored = reconciler.broker().get_ns("prod").await.unwrap();
        assert_eq!(stored.metadata, metadata(&[("team.io/owner", "blue")]));

        let ns = ns.with_annotation("team.io/owner", "green").with_annotation("other", "x");
        let outcome = reconciler.reconcile_namespace(&ns).await.unwrap();
        assert_eq!(outcome.updated, 1);
        let stored = reconciler.broker().get_ns("prod").await.unwrap();
        assert_eq!(stored.metadata, metadata(&[("team.io/owner", "green")]));

        let outcome = reconciler.reconcile_namespace(&ns).await.unwrap();
        assert!(outcome.is_noop());
    }

    #[tokio::test]
    async fn test_eligible_namespace_without_services_is_not_created() {
        let (reconciler, _) = setup(&["a.io/*"]).await;
        let outcome = reconciler
            .reconcile_namespace(&NamespaceSnapshot::new("prod"))
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::default());
        assert!(reconciler.broker().list_ns().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_passes_converge() {
        let (reconciler, _) = setup(&["a.io/*"]).await;
        let reconciler = Arc::new(reconciler);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let reconciler = reconciler.clone();
            handles.push(tokio::spawn(async move { reconciler.reconcile_service(&web()).await }));
        }

        let mut total = ReconcileOutcome::default();
        for handle in handles {
            total += handle.await.unwrap().unwrap();
        }

        assert_eq!(total.created, 4);
        assert_eq!(total.updated, 0);
        assert_eq!(reconciler.broker().list_endp("prod", "web").await.unwrap().len(), 2);
    }
}
