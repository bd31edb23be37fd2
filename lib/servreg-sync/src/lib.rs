//! Synchronization engine mirroring cluster services into a registry
//!
//! This library provides:
//! - The eligibility policy and annotation filtering
//! - The change events consumed from the cluster watcher
//! - The level-triggered reconciler driving the registry Broker

pub mod config;
pub mod event;
pub mod locks;
pub mod policy;
pub mod reconciler;

pub use config::{BackendConfig, BackendKind, ConfigError, ListPolicy, SyncConfig};
pub use event::{ChangeEvent, NamespaceSnapshot, ServicePort, ServiceSnapshot, ServiceType};
pub use locks::PathLocks;
pub use policy::{filter_annotations, should_watch_namespace, LookupError, NamespaceLookup, Policy};
pub use reconciler::{ReconcileOutcome, Reconciler};
