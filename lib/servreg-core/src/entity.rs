//! Shared pieces of the registry entity model

use crate::{Key, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;

/// Free-form string metadata attached to every registry entity
pub type Metadata = BTreeMap<String, String>;

/// A registry entity that can be stored under its hierarchical key
pub trait Entity: Clone + Serialize + DeserializeOwned + Send + Sync {
    /// Key derived from the entity's identity path, validated
    fn key(&self) -> Result<Key>;

    fn metadata(&self) -> &Metadata;
}
