//! Core service registry model
//!
//! This library provides:
//! - The Namespace/Service/Endpoint entity model
//! - Hierarchical keys for flat key-value keyspaces
//! - The pluggable backend traits and the validating Broker in front of them

pub mod backend;
pub mod broker;
pub mod endpoint;
pub mod entity;
pub mod error;
pub mod key;
pub mod namespace;
pub mod service;

pub use backend::{EndpointStore, NamespaceStore, RegistryBackend, ServiceStore};
pub use broker::Broker;
pub use endpoint::Endpoint;
pub use entity::{Entity, Metadata};
pub use error::{RegistryError, Result};
pub use key::{Key, KeyKind};
pub use namespace::Namespace;
pub use service::Service;
