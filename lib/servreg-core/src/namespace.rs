//! Registry namespaces

use crate::{Entity, Key, Metadata, Result};
use serde::{Deserialize, Serialize};

/// Top level of the registry hierarchy
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Namespace {
    pub name: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Namespace {
    pub fn new(name: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            name: name.into(),
            metadata,
        }
    }
}

impl Entity for Namespace {
    fn key(&self) -> Result<Key> {
        Key::namespace(&self.name)
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}
