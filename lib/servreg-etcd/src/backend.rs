//! Registry backend storing one YAML document per entity

use crate::KvClient;
use async_trait::async_trait;
use servreg_core::key::DEFAULT_PREFIX;
use servreg_core::{
    Endpoint, EndpointStore, Entity, Key, KeyKind, Namespace, NamespaceStore, RegistryBackend,
    RegistryError, Result, Service, ServiceStore,
};
use tracing::{debug, warn};

/// Key-value registry backend
///
/// Every entity lives at the path of its [`Key`] under `prefix`, and
/// list operations scan the children prefix of the parent key.
pub struct KvBackend<C> {
    client: C,
    prefix: String,
}

impl<C: KvClient> KvBackend<C> {
    pub fn new(client: C) -> Self {
        Self::with_prefix(client, DEFAULT_PREFIX)
    }

    pub fn with_prefix(client: C, prefix: &str) -> Self {
        Self {
            client,
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Root the entity paths are stored under
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn encode<E: Entity>(&self, key: &Key, entity: &E) -> Result<Vec<u8>> {
        serde_yaml::to_string(entity)
            .map(String::into_bytes)
            .map_err(|source| RegistryError::Encode {
                key: key.to_string(),
                source,
            })
    }

    fn decode<E: Entity>(&self, path: &str, value: &[u8]) -> Result<E> {
        serde_yaml::from_slice(value).map_err(|source| RegistryError::Decode {
            key: path.to_string(),
            source,
        })
    }

    async fn get_one<E: Entity>(&self, key: &Key) -> Result<E> {
        let path = key.to_path(&self.prefix);
        match self.client.get(&path).await? {
            Some(value) => self.decode(&path, &value),
            None => Err(RegistryError::NotFound(path)),
        }
    }

    /// Direct children of the prefix, skipping anything deeper
    async fn list_children<E: Entity>(&self, prefix: &str, kind: KeyKind) -> Result<Vec<E>> {
        let pairs = self.client.list_prefix(prefix).await?;
        let mut children = Vec::new();

        for (path, value) in pairs {
            match Key::parse(&path, &self.prefix) {
                Some(key) if key.kind() == kind => children.push(self.decode(&path, &value)?),
                Some(_) => {}
                None => warn!("Skipping unrecognized key {}", path),
            }
        }

        debug!("Listed {} entries under {}", children.len(), prefix);
        Ok(children)
    }

    async fn create_one<E: Entity>(&self, entity: &E) -> Result<E> {
        let key = entity.key()?;
        let path = key.to_path(&self.prefix);
        let value = self.encode(&key, entity)?;
        if !self.client.create(&path, value).await? {
            return Err(RegistryError::AlreadyExists(path));
        }
        debug!("Created {}", path);
        Ok(entity.clone())
    }

    async fn update_one<E: Entity>(&self, entity: &E) -> Result<E> {
        let key = entity.key()?;
        let path = key.to_path(&self.prefix);
        let value = self.encode(&key, entity)?;
        if !self.client.update(&path, value).await? {
            return Err(RegistryError::NotFound(path));
        }
        debug!("Updated {}", path);
        Ok(entity.clone())
    }

    async fn delete_one(&self, key: &Key) -> Result<()> {
        let path = key.to_path(&self.prefix);
        if !self.client.delete(&path).await? {
            return Err(RegistryError::NotFound(path));
        }
        debug!("Deleted {}", path);
        Ok(())
    }

    fn children_prefix(&self, key: &Key) -> Result<String> {
        key.children_prefix(&self.prefix)
            .ok_or_else(|| RegistryError::InvalidName(key.to_string()))
    }
}

#[async_trait]
impl<C: KvClient> NamespaceStore for KvBackend<C> {
    async fn get_ns(&self, name: &str) -> Result<Namespace> {
        self.get_one(&Key::namespace(name)?).await
    }

    async fn list_ns(&self) -> Result<Vec<Namespace>> {
        let prefix = Key::namespaces_prefix(&self.prefix);
        self.list_children(&prefix, KeyKind::Namespace).await
    }

    async fn create_ns(&self, ns: &Namespace) -> Result<Namespace> {
        self.create_one(ns).await
    }

    async fn update_ns(&self, ns: &Namespace) -> Result<Namespace> {
        self.update_one(ns).await
    }

    async fn delete_ns(&self, name: &str) -> Result<()> {
        self.delete_one(&Key::namespace(name)?).await
    }
}

#[async_trait]
impl<C: KvClient> ServiceStore for KvBackend<C> {
    async fn get_serv(&self, ns_name: &str, name: &str) -> Result<Service> {
        self.get_one(&Key::service(ns_name, name)?).await
    }

    async fn list_serv(&self, ns_name: &str) -> Result<Vec<Service>> {
        let prefix = self.children_prefix(&Key::namespace(ns_name)?)?;
        self.list_children(&prefix, KeyKind::Service).await
    }

    async fn create_serv(&self, serv: &Service) -> Result<Service> {
        self.create_one(serv).await
    }

    async fn update_serv(&self, serv: &Service) -> Result<Service> {
        self.update_one(serv).await
    }

    async fn delete_serv(&self, ns_name: &str, name: &str) -> Result<()> {
        self.delete_one(&Key::service(ns_name, name)?).await
    }
}

#[async_trait]
impl<C: KvClient> EndpointStore for KvBackend<C> {
    async fn get_endp(&self, ns_name: &str, serv_name: &str, name: &str) -> Result<Endpoint> {
        self.get_one(&Key::endpoint(ns_name, serv_name, name)?).await
    }

    async fn list_endp(&self, ns_name: &str, serv_name: &str) -> Result<Vec<Endpoint>> {
        let prefix = self.children_prefix(&Key::service(ns_name, serv_name)?)?;
        self.list_children(&prefix, KeyKind::Endpoint).await
    }

    async fn create_endp(&self, endp: &Endpoint) -> Result<Endpoint> {
        self.create_one(endp).await
    }

    async fn update_endp(&self, endp: &Endpoint) -> Result<Endpoint> {
        self.update_one(endp).await
    }

    async fn delete_endp(&self, ns_name: &str, serv_name: &str, name: &str) -> Result<()> {
        self.delete_one(&Key::endpoint(ns_name, serv_name, name)?).await
    }
}

impl<C: KvClient> RegistryBackend for KvBackend<C> {
    fn name(&self) -> &'static str {
        "kv"
    }
}
