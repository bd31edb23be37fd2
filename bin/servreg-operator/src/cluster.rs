//! Conversions from Kubernetes objects to change snapshots

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace as KubeNamespace, Service as KubeService};
use kube::{Api, Client, ResourceExt};
use servreg_sync::{LookupError, NamespaceLookup, NamespaceSnapshot, ServicePort, ServiceSnapshot, ServiceType};

pub fn namespace_snapshot(ns: &KubeNamespace) -> NamespaceSnapshot {
    NamespaceSnapshot {
        name: ns.name_any(),
        labels: ns.labels().clone(),
        annotations: ns.annotations().clone(),
        deleted: ns.metadata.deletion_timestamp.is_some(),
    }
}

pub fn service_snapshot(svc: &KubeService) -> ServiceSnapshot {
    let spec = svc.spec.as_ref();

    let service_type = spec
        .and_then(|s| s.type_.as_deref())
        .map(ServiceType::from)
        .unwrap_or_default();

    let ports = spec
        .and_then(|s| s.ports.as_ref())
        .map(|ports| {
            ports
                .iter()
                .filter_map(|p| {
                    let port = u16::try_from(p.port).ok()?;
                    Some(ServicePort::new(port, p.protocol.as_deref().unwrap_or("TCP")))
                })
                .collect()
        })
        .unwrap_or_default();

    let ingress = svc
        .status
        .as_ref()
        .and_then(|s| s.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.as_ref())
        .map(|ingress| {
            ingress
                .iter()
                .filter_map(|i| i.ip.clone().or_else(|| i.hostname.clone()))
                .collect()
        })
        .unwrap_or_default();

    ServiceSnapshot {
        namespace: svc.namespace().unwrap_or_default(),
        name: svc.name_any(),
        service_type,
        ingress,
        ports,
        annotations: svc.annotations().clone(),
        deleted: svc.metadata.deletion_timestamp.is_some(),
    }
}

/// Snapshot standing for a service that no longer exists in the cluster
pub fn service_tombstone(namespace: &str, name: &str) -> ServiceSnapshot {
    ServiceSnapshot {
        deleted: true,
        ..ServiceSnapshot::new(namespace, name)
    }
}

/// Reads parent namespaces straight from the API server
pub struct KubeNamespaceLookup {
    api: Api<KubeNamespace>,
}

impl KubeNamespaceLookup {
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }
}

#[async_trait]
impl NamespaceLookup for KubeNamespaceLookup {
    async fn get_namespace(&self, name: &str) -> Result<NamespaceSnapshot, LookupError> {
        self.api
            .get(name)
            .await
            .map(|ns| namespace_snapshot(&ns))
            .map_err(|e| LookupError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{
        LoadBalancerIngress, LoadBalancerStatus, ServicePort as KubeServicePort, ServiceSpec,
        ServiceStatus,
    };
    use kube::api::ObjectMeta;
    use std::collections::BTreeMap;

    fn lb_service() -> KubeService {
        KubeService {
            metadata: ObjectMeta {
                name: Some("web".to_string()),
                namespace: Some("prod".to_string()),
                annotations: Some(BTreeMap::from([("a.io/x".to_string(), "1".to_string())])),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                type_: Some("LoadBalancer".to_string()),
                ports: Some(vec![
                    KubeServicePort {
                        name: Some("http".to_string()),
                        port: 80,
                        protocol: Some("TCP".to_string()),
                        ..Default::default()
                    },
                    KubeServicePort {
                        port: 53,
                        protocol: Some("UDP".to_string()),
                        ..Default::default()
                    },
                ]),
                ..Default::default()
            }),
            status: Some(ServiceStatus {
                load_balancer: Some(LoadBalancerStatus {
                    ingress: Some(vec![
                        LoadBalancerIngress {
                            ip: Some("203.0.113.7".to_string()),
                            ..Default::default()
                        },
                        LoadBalancerIngress {
                            hostname: Some("lb.example.com".to_string()),
                            ..Default::default()
                        },
                    ]),
                }),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_service_snapshot() {
        let snapshot = service_snapshot(&lb_service());
        assert_eq!(snapshot.path(), "prod/web");
        assert_eq!(snapshot.service_type, ServiceType::LoadBalancer);
        assert_eq!(snapshot.ingress, vec!["203.0.113.7", "lb.example.com"]);
        assert_eq!(snapshot.ports.len(), 2);
        assert_eq!(snapshot.ports[1].protocol, "UDP");
        assert_eq!(snapshot.annotations.get("a.io/x").map(String::as_str), Some("1"));
        assert!(!snapshot.deleted);
    }

    #[test]
    fn test_service_without_spec() {
        let svc = KubeService {
            metadata: ObjectMeta {
                name: Some("bare".to_string()),
                namespace: Some("prod".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let snapshot = service_snapshot(&svc);
        assert_eq!(snapshot.service_type, ServiceType::ClusterIp);
        assert!(snapshot.ingress.is_empty());
        assert!(snapshot.ports.is_empty());
    }

    #[test]
    fn test_namespace_snapshot() {
        let ns = KubeNamespace {
            metadata: ObjectMeta {
                name: Some("prod".to_string()),
                labels: Some(BTreeMap::from([("servreg.io/allowed".to_string(), "".to_string())])),
                ..Default::default()
            },
            ..Default::default()
        };
        let snapshot = namespace_snapshot(&ns);
        assert_eq!(snapshot.name, "prod");
        assert!(snapshot.labels.contains_key("servreg.io/allowed"));
        assert!(!snapshot.deleted);
    }

    #[test]
    fn test_tombstone() {
        let snapshot = service_tombstone("prod", "web");
        assert!(snapshot.deleted);
        assert_eq!(snapshot.path(), "prod/web");
    }
}
