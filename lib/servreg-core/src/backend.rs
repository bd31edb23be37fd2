//! Pluggable registry backends
//!
//! A backend implements one store trait per entity type. The [`Broker`]
//! validates identifiers before calling into any of them, so
//! implementations can assume well-formed names.
//!
//! Contract shared by every store:
//! - `get` fails with `NotFound` when nothing is stored at the key
//! - `list` returns the direct children of the parent, not the subtree
//! - `create` fails with `AlreadyExists` when the key is occupied
//! - `update` and `delete` fail with `NotFound` when the key is absent
//!
//! [`Broker`]: crate::Broker

use crate::{Endpoint, Namespace, Result, Service};
use async_trait::async_trait;

#[async_trait]
pub trait NamespaceStore: Send + Sync {
    async fn get_ns(&self, name: &str) -> Result<Namespace>;

    async fn list_ns(&self) -> Result<Vec<Namespace>>;

    async fn create_ns(&self, ns: &Namespace) -> Result<Namespace>;

    async fn update_ns(&self, ns: &Namespace) -> Result<Namespace>;

    async fn delete_ns(&self, name: &str) -> Result<()>;
}

#[async_trait]
pub trait ServiceStore: Send + Sync {
    async fn get_serv(&self, ns_name: &str, name: &str) -> Result<Service>;

    async fn list_serv(&self, ns_name: &str) -> Result<Vec<Service>>;

    async fn create_serv(&self, serv: &Service) -> Result<Service>;

    async fn update_serv(&self, serv: &Service) -> Result<Service>;

    async fn delete_serv(&self, ns_name: &str, name: &str) -> Result<()>;
}

#[async_trait]
pub trait EndpointStore: Send + Sync {
    async fn get_endp(&self, ns_name: &str, serv_name: &str, name: &str) -> Result<Endpoint>;

    async fn list_endp(&self, ns_name: &str, serv_name: &str) -> Result<Vec<Endpoint>>;

    async fn create_endp(&self, endp: &Endpoint) -> Result<Endpoint>;

    async fn update_endp(&self, endp: &Endpoint) -> Result<Endpoint>;

    async fn delete_endp(&self, ns_name: &str, serv_name: &str, name: &str) -> Result<()>;
}

/// Full capability set of a registry backend
pub trait RegistryBackend: NamespaceStore + ServiceStore + EndpointStore {
    /// Short name used in logs
    fn name(&self) -> &'static str;
}
