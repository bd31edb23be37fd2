//! Eligibility and metadata filtering
//!
//! Decides which namespaces and services get mirrored into the registry
//! and which annotations travel with them.

use crate::config::{ListPolicy, SyncConfig};
use crate::event::{Annotations, Labels, NamespaceSnapshot, ServiceSnapshot, ServiceType};
use async_trait::async_trait;
use servreg_core::Metadata;
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, warn};

/// Allow-list pattern matching every annotation
pub const WILDCARD: &str = "*/*";

#[derive(Error, Debug)]
#[error("namespace lookup failed: {0}")]
pub struct LookupError(pub String);

/// Read access to cluster namespaces, used to check a service's parent
#[async_trait]
pub trait NamespaceLookup: Send + Sync {
    async fn get_namespace(&self, name: &str) -> Result<NamespaceSnapshot, LookupError>;
}

/// Whether a namespace with these labels is eligible under `policy`
pub fn should_watch_namespace(
    labels: &Labels,
    policy: ListPolicy,
    allow_label: &str,
    block_label: &str,
) -> bool {
    match policy {
        ListPolicy::AllowList => labels.contains_key(allow_label),
        ListPolicy::BlockList => !labels.contains_key(block_label),
        ListPolicy::Unrecognized => false,
    }
}

/// Keep the annotations permitted by `allowed`.
///
/// A key is kept if it is listed as is, or, for `prefix/name` keys, if
/// `prefix/*` or `*/name` is listed. `*/*` keeps everything.
pub fn filter_annotations(annotations: &Annotations, allowed: &HashSet<String>) -> Metadata {
    if annotations.is_empty() || allowed.is_empty() {
        return Metadata::new();
    }

    if allowed.contains(WILDCARD) {
        return annotations.clone();
    }

    annotations
        .iter()
        .filter(|(key, _)| annotation_allowed(key, allowed))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn annotation_allowed(key: &str, allowed: &HashSet<String>) -> bool {
    if allowed.contains(key) {
        return true;
    }

    let parts: Vec<&str> = key.split('/').collect();
    let [prefix, name] = parts.as_slice() else {
        return false;
    };

    allowed.contains(&format!("{}/*", prefix)) || allowed.contains(&format!("*/{}", name))
}

/// Immutable policy shared by every reconciliation pass
#[derive(Clone, Debug)]
pub struct Policy {
    namespace_policy: ListPolicy,
    allow_label: String,
    block_label: String,
    allowed_annotations: HashSet<String>,
}

impl Policy {
    pub fn new(
        namespace_policy: ListPolicy,
        allow_label: impl Into<String>,
        block_label: impl Into<String>,
        allowed_annotations: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            namespace_policy,
            allow_label: allow_label.into(),
            block_label: block_label.into(),
            allowed_annotations: allowed_annotations.into_iter().collect(),
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        if config.namespace_policy == ListPolicy::Unrecognized {
            warn!("Unrecognized namespace policy, no namespace will be mirrored");
        }
        Self::new(
            config.namespace_policy,
            config.allow_label.clone(),
            config.block_label.clone(),
            config.allowed_annotations.iter().cloned(),
        )
    }

    pub fn namespace_policy(&self) -> ListPolicy {
        self.namespace_policy
    }

    pub fn should_watch_namespace(&self, labels: &Labels) -> bool {
        should_watch_namespace(labels, self.namespace_policy, &self.allow_label, &self.block_label)
    }

    pub fn filter_annotations(&self, annotations: &Annotations) -> Metadata {
        filter_annotations(annotations, &self.allowed_annotations)
    }

    /// Checks that do not need the parent namespace
    pub fn service_is_candidate(&self, service: &ServiceSnapshot) -> bool {
        service.service_type == ServiceType::LoadBalancer
            && !service.ingress.is_empty()
            && !self.filter_annotations(&service.annotations).is_empty()
    }

    /// Parent namespace of an eligible service, `None` if the service is
    /// not eligible.
    ///
    /// A failed parent lookup makes the service ineligible; it is logged,
    /// never returned.
    pub async fn eligible_parent(
        &self,
        service: &ServiceSnapshot,
        lookup: &dyn NamespaceLookup,
    ) -> Option<NamespaceSnapshot> {
        if !self.service_is_candidate(service) {
            return None;
        }

        let ns = match lookup.get_namespace(&service.namespace).await {
            Ok(ns) => ns,
            Err(e) => {
                warn!("Error while getting parent namespace of service {}: {}", service.path(), e);
                return None;
            }
        };

        if ns.deleted || !self.should_watch_namespace(&ns.labels) {
            debug!("Namespace {} is not watched", ns.name);
            return None;
        }

        Some(ns)
    }

    pub async fn should_watch_service(
        &self,
        service: &ServiceSnapshot,
        lookup: &dyn NamespaceLookup,
    ) -> bool {
        self.eligible_parent(service, lookup).await.is_some()
    }
}
