//! Validating façade in front of the configured registry backend

use crate::{Endpoint, Entity, Key, Namespace, RegistryBackend, RegistryError, Result, Service};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Default deadline for a single broker call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Broker validates identifiers, bounds every call with a deadline and
/// hands the request over to the backend selected at startup.
///
/// Validation errors are returned before the backend is touched. Any
/// "missing" signal coming back from the backend is reported as
/// [`RegistryError::NotFound`] carrying the entity path, and an expired
/// deadline as [`RegistryError::BackendUnavailable`].
#[derive(Clone)]
pub struct Broker {
    backend: Arc<dyn RegistryBackend>,
    timeout: Duration,
}

impl Broker {
    pub fn new(backend: Arc<dyn RegistryBackend>, timeout: Duration) -> Self {
        debug!("Using {} registry backend, timeout {:?}", backend.name(), timeout);
        Self { backend, timeout }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    async fn call<T, F>(&self, key: &Key, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Err(RegistryError::NotFound(_))) => Err(RegistryError::NotFound(key.to_string())),
            Ok(Err(RegistryError::AlreadyExists(_))) => {
                Err(RegistryError::AlreadyExists(key.to_string()))
            }
            Ok(res) => res,
            Err(_) => Err(RegistryError::BackendUnavailable(format!(
                "{} backend did not answer for {} within {:?}",
                self.backend.name(),
                key,
                self.timeout
            ))),
        }
    }

    // Namespaces

    pub async fn get_ns(&self, name: &str) -> Result<Namespace> {
        let key = Key::namespace(name)?;
        self.call(&key, self.backend.get_ns(name)).await
    }

    pub async fn list_ns(&self) -> Result<Vec<Namespace>> {
        self.call(&Key::default(), self.backend.list_ns()).await
    }

    pub async fn create_ns(&self, ns: &Namespace) -> Result<Namespace> {
        let key = ns.key()?;
        self.call(&key, self.backend.create_ns(ns)).await
    }

    pub async fn update_ns(&self, ns: &Namespace) -> Result<Namespace> {
        let key = ns.key()?;
        self.call(&key, self.backend.update_ns(ns)).await
    }

    pub async fn delete_ns(&self, name: &str) -> Result<()> {
        let key = Key::namespace(name)?;
        self.call(&key, self.backend.delete_ns(name)).await
    }

    // Services

    pub async fn get_serv(&self, ns_name: &str, name: &str) -> Result<Service> {
        let key = Key::service(ns_name, name)?;
        self.call(&key, self.backend.get_serv(ns_name, name)).await
    }

    pub async fn list_serv(&self, ns_name: &str) -> Result<Vec<Service>> {
        let key = Key::namespace(ns_name)?;
        self.call(&key, self.backend.list_serv(ns_name)).await
    }

    pub async fn create_serv(&self, serv: &Service) -> Result<Service> {
        let key = serv.key()?;
        self.call(&key, self.backend.create_serv(serv)).await
    }

    pub async fn update_serv(&self, serv: &Service) -> Result<Service> {
        let key = serv.key()?;
        self.call(&key, self.backend.update_serv(serv)).await
    }

    pub async fn delete_serv(&self, ns_name: &str, name: &str) -> Result<()> {
        let key = Key::service(ns_name, name)?;
        self.call(&key, self.backend.delete_serv(ns_name, name)).await
    }

    // Endpoints

    pub async fn get_endp(&self, ns_name: &str, serv_name: &str, name: &str) -> Result<Endpoint> {
        let key = Key::endpoint(ns_name, serv_name, name)?;
        self.call(&key, self.backend.get_endp(ns_name, serv_name, name)).await
    }

    pub async fn list_endp(&self, ns_name: &str, serv_name: &str) -> Result<Vec<Endpoint>> {
        let key = Key::service(ns_name, serv_name)?;
        self.call(&key, self.backend.list_endp(ns_name, serv_name)).await
    }

    pub async fn create_endp(&self, endp: &Endpoint) -> Result<Endpoint> {
        let key = endp.key()?;
        self.call(&key, self.backend.create_endp(endp)).await
    }

    pub async fn update_endp(&self, endp: &Endpoint) -> Result<Endpoint> {
        let key = endp.key()?;
        self.call(&key, self.backend.update_endp(endp)).await
    }

    pub async fn delete_endp(&self, ns_name: &str, serv_name: &str, name: &str) -> Result<()> {
        let key = Key::endpoint(ns_name, serv_name, name)?;
        self.call(&key, self.backend.delete_endp(ns_name, serv_name, name)).await
    }
}
