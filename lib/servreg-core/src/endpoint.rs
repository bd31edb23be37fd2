//! Registry endpoints
use crate::{Entity, Key, Metadata, Result};
use serde::{Deserialize, Serialize};

/// A reachable address of a service, referencing its parents by name
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub ns_name: String,
    pub serv_name: String,
    pub name: String,
    pub address: String,
    pub port: u16,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Endpoint {
    pub fn new(
        ns_name: impl Into<String>,
        serv_name: impl Into<String>,
        name: impl Into<String>,
        address: impl Into<String>,
        port: u16,
        metadata: Metadata,
    ) -> Self {
        Self {
            ns_name: ns_name.into(),
            serv_name: serv_name.into(),
            name: name.into(),
            address: address.into(),
            port,
            metadata,
        }
    }
}

impl Entity for Endpoint {
    fn key(&self) -> Result<Key> {
        Key::endpoint(&self.ns_name, &self.serv_name, &self.name)
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Namespace, RegistryError, Service};

    fn endpoint() -> Endpoint {
        Endpoint::new(
            "namespace-name",
            "service-name",
            "endpoint-name",
            "10.0.0.1",
            8080,
            [("protocol".to_string(), "tcp".to_string())].into(),
        )
    }

    #[test]
    fn test_yaml_round_trip() {
        let endp = endpoint();
        let encoded = serde_yaml::to_string(&endp).unwrap();
        assert!(encoded.contains("nsName: namespace-name"));
        assert!(encoded.contains("servName: service-name"));
        let decoded: Endpoint = serde_yaml::from_str(&encoded).unwrap();
        assert_eq!(decoded, endp);

        let serv = Service::new("ns", "serv", [("a.io/x".to_string(), "1".to_string())].into());
        let decoded: Service = serde_yaml::from_str(&serde_yaml::to_string(&serv).unwrap()).unwrap();
        assert_eq!(decoded, serv);

        let ns = Namespace::new("ns", Default::default());
        let decoded: Namespace = serde_yaml::from_str(&serde_yaml::to_string(&ns).unwrap()).unwrap();
        assert_eq!(decoded, ns);
    }

    #[test]
    fn test_entity_keys() {
        let key = endpoint().key().unwrap();
        assert_eq!(key.to_string(), "namespace-name/service-name/endpoint-name");

        let mut endp = endpoint();
        endp.serv_name.clear();
        assert!(matches!(endp.key(), Err(RegistryError::MissingServiceName)));

        let serv = Service::new("", "serv", Default::default());
        assert!(matches!(serv.key(), Err(RegistryError::MissingNamespaceName)));
    }
}
