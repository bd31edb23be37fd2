//! Registry services

use crate::{Entity, Key, Metadata, Result};
use serde::{Deserialize, Serialize};

/// A service, referencing its namespace by name
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub ns_name: String,
    pub name: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Service {
    pub fn new(ns_name: impl Into<String>, name: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            ns_name: ns_name.into(),
            name: name.into(),
            metadata,
        }
    }
}

impl Entity for Service {
    fn key(&self) -> Result<Key> {
        Key::service(&self.ns_name, &self.name)
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}
