//! Change notifications delivered by the cluster watcher
//!
//! Snapshots carry the full current state of the source object, so any
//! single notification is enough to recompute what the registry should
//! hold. Deletions arrive as snapshots with `deleted` set.

use std::collections::BTreeMap;

pub type Labels = BTreeMap<String, String>;
pub type Annotations = BTreeMap<String, String>;

/// Exposure type of a cluster service
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum ServiceType {
    #[default]
    ClusterIp,
    NodePort,
    LoadBalancer,
    ExternalName,
    Other(String),
}

impl From<&str> for ServiceType {
    fn from(value: &str) -> Self {
        match value {
            "ClusterIP" => ServiceType::ClusterIp,
            "NodePort" => ServiceType::NodePort,
            "LoadBalancer" => ServiceType::LoadBalancer,
            "ExternalName" => ServiceType::ExternalName,
            other => ServiceType::Other(other.to_string()),
        }
    }
}

/// A port exposed by a cluster service
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServicePort {
    pub port: u16,
    pub protocol: String,
}

impl ServicePort {
    pub fn new(port: u16, protocol: impl Into<String>) -> Self {
        Self {
            port,
            protocol: protocol.into(),
        }
    }

    pub fn tcp(port: u16) -> Self {
        Self::new(port, "TCP")
    }

    pub fn udp(port: u16) -> Self {
        Self::new(port, "UDP")
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NamespaceSnapshot {
    pub name: String,
    pub labels: Labels,
    pub annotations: Annotations,
    pub deleted: bool,
}

impl NamespaceSnapshot {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_annotation(mut self, key: &str, value: &str) -> Self {
        self.annotations.insert(key.to_string(), value.to_string());
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServiceSnapshot {
    pub namespace: String,
    pub name: String,
    pub service_type: ServiceType,
    /// Externally reachable load balancer addresses (IPs or hostnames)
    pub ingress: Vec<String>,
    pub ports: Vec<ServicePort>,
    pub annotations: Annotations,
    pub deleted: bool,
}

impl ServiceSnapshot {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// Identity path `namespace/name`
    pub fn path(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

/// A notification from the upstream event source
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChangeEvent {
    NamespaceChanged(NamespaceSnapshot),
    ServiceChanged(ServiceSnapshot),
}

impl ChangeEvent {
    /// Identity path of the object the event is about
    pub fn path(&self) -> String {
        match self {
            ChangeEvent::NamespaceChanged(ns) => ns.name.clone(),
            ChangeEvent::ServiceChanged(svc) => svc.path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_type_from_str() {
        assert_eq!(ServiceType::from("LoadBalancer"), ServiceType::LoadBalancer);
        assert_eq!(ServiceType::from("ClusterIP"), ServiceType::ClusterIp);
        assert_eq!(ServiceType::from("Weird"), ServiceType::Other("Weird".to_string()));
    }

    #[test]
    fn test_event_paths() {
        let ns = ChangeEvent::NamespaceChanged(NamespaceSnapshot::new("prod"));
        assert_eq!(ns.path(), "prod");
        let svc = ChangeEvent::ServiceChanged(ServiceSnapshot::new("prod", "web"));
        assert_eq!(svc.path(), "prod/web");
    }
}
