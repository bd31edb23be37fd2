//! Hierarchical keys for storing the registry tree in a flat keyspace
//!
//! A key is laid out as
//! `<prefix>/namespaces/<ns>/services/<serv>/endpoints/<endp>`, truncated
//! at the deepest level that is set. Children of any key share the
//! `<key>/<collection>/` prefix, which is what list operations scan.

use crate::{RegistryError, Result};
use std::fmt;

/// Default root under which every registry key is stored
pub const DEFAULT_PREFIX: &str = "/service-registry";

const NAMESPACES: &str = "namespaces";
const SERVICES: &str = "services";
const ENDPOINTS: &str = "endpoints";

/// The level of the hierarchy a key points at
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyKind {
    Namespace,
    Service,
    Endpoint,
}

/// Composite key built from `(ns, serv, endp)` names
///
/// Empty components mean "not set". A key is only valid when every set
/// component has all higher levels set as well.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Key {
    ns: String,
    serv: String,
    endp: String,
}

impl Key {
    /// Build a key without validating it
    pub fn from_names(ns: &str, serv: &str, endp: &str) -> Self {
        Self {
            ns: ns.to_string(),
            serv: serv.to_string(),
            endp: endp.to_string(),
        }
    }

    /// Validated key for a namespace
    pub fn namespace(ns: &str) -> Result<Self> {
        let key = Self::from_names(ns, "", "");
        key.validate()?;
        Ok(key)
    }

    /// Validated key for a service; both names are required
    pub fn service(ns: &str, serv: &str) -> Result<Self> {
        let key = Self::from_names(ns, serv, "");
        key.validate()?;
        if key.serv.is_empty() {
            return Err(RegistryError::MissingServiceName);
        }
        Ok(key)
    }

    /// Validated key for an endpoint; all three names are required
    pub fn endpoint(ns: &str, serv: &str, endp: &str) -> Result<Self> {
        let key = Self::from_names(ns, serv, endp);
        key.validate()?;
        if key.serv.is_empty() {
            return Err(RegistryError::MissingServiceName);
        }
        if key.endp.is_empty() {
            return Err(RegistryError::MissingEndpointName);
        }
        Ok(key)
    }

    /// Check the hierarchy of the key.
    ///
    /// Fails with the error of the highest missing level that sits above a
    /// set one. The namespace is always required: an entirely empty key
    /// names nothing, so it fails with `MissingNamespaceName` rather than
    /// passing vacuously. Names containing `/` would break the path layout
    /// and fail with `InvalidName`.
    pub fn validate(&self) -> Result<()> {
        if self.ns.is_empty() {
            return Err(RegistryError::MissingNamespaceName);
        }
        if self.serv.is_empty() && !self.endp.is_empty() {
            return Err(RegistryError::MissingServiceName);
        }

        for name in [&self.ns, &self.serv, &self.endp] {
            if name.contains('/') {
                return Err(RegistryError::InvalidName(name.clone()));
            }
        }

        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// The deepest level that is set
    pub fn kind(&self) -> KeyKind {
        if !self.endp.is_empty() {
            KeyKind::Endpoint
        } else if !self.serv.is_empty() {
            KeyKind::Service
        } else {
            KeyKind::Namespace
        }
    }

    pub fn ns_name(&self) -> &str {
        &self.ns
    }

    pub fn serv_name(&self) -> &str {
        &self.serv
    }

    pub fn endp_name(&self) -> &str {
        &self.endp
    }

    /// Full storage path of this key under `prefix`
    pub fn to_path(&self, prefix: &str) -> String {
        let mut path = format!("{}/{}/{}", prefix.trim_end_matches('/'), NAMESPACES, self.ns);
        if !self.serv.is_empty() {
            path.push_str(&format!("/{}/{}", SERVICES, self.serv));
            if !self.endp.is_empty() {
                path.push_str(&format!("/{}/{}", ENDPOINTS, self.endp));
            }
        }
        path
    }

    /// Prefix shared by the direct children of this key.
    ///
    /// Endpoints have no children, so `None` is returned for them.
    pub fn children_prefix(&self, prefix: &str) -> Option<String> {
        let collection = match self.kind() {
            KeyKind::Namespace => SERVICES,
            KeyKind::Service => ENDPOINTS,
            KeyKind::Endpoint => return None,
        };
        Some(format!("{}/{}/", self.to_path(prefix), collection))
    }

    /// Prefix shared by every namespace key
    pub fn namespaces_prefix(prefix: &str) -> String {
        format!("{}/{}/", prefix.trim_end_matches('/'), NAMESPACES)
    }

    /// Parse a storage path produced by [`Key::to_path`] back into a key.
    ///
    /// Returns `None` for anything that does not follow the layout.
    pub fn parse(path: &str, prefix: &str) -> Option<Self> {
        let rest = path.strip_prefix(&Self::namespaces_prefix(prefix))?;
        let parts: Vec<&str> = rest.split('/').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return None;
        }

        let key = match parts.as_slice() {
            [ns] => Self::from_names(ns, "", ""),
            [ns, SERVICES, serv] => Self::from_names(ns, serv, ""),
            [ns, SERVICES, serv, ENDPOINTS, endp] => Self::from_names(ns, serv, endp),
            _ => return None,
        };
        Some(key)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ns)?;
        if !self.serv.is_empty() || !self.endp.is_empty() {
            write!(f, "/{}", self.serv)?;
        }
        if !self.endp.is_empty() {
            write!(f, "/{}", self.endp)?;
        }
        Ok(())
    }
}
