//! Key-value client seam used by the registry backend

use async_trait::async_trait;
use servreg_core::Result;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// One round trip against a flat key-value store.
///
/// Implementations report transport failures and timeouts as
/// `RegistryError::BackendUnavailable`; absence is expressed through the
/// return values, never as an error.
#[async_trait]
pub trait KvClient: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// All pairs whose key starts with `prefix`, sorted by key
    async fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>>;

    /// Store `value` only if `key` is free. Returns false if it was taken.
    async fn create(&self, key: &str, value: Vec<u8>) -> Result<bool>;

    /// Store `value` only if `key` is taken. Returns false if it was free.
    async fn update(&self, key: &str, value: Vec<u8>) -> Result<bool>;

    /// Returns false if there was nothing to delete
    async fn delete(&self, key: &str) -> Result<bool>;
}

/// In-process key-value store
#[derive(Default)]
pub struct MemoryKv {
    data: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a raw value, bypassing the create/update checks
    pub async fn insert_raw(&self, key: &str, value: Vec<u8>) {
        self.data.write().await.insert(key.to_string(), value);
    }
}

#[async_trait]
impl KvClient for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.data.read().await.get(key).cloned())
    }

    async fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let data = self.data.read().await;
        Ok(data
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn create(&self, key: &str, value: Vec<u8>) -> Result<bool> {
        let mut data = self.data.write().await;
        if data.contains_key(key) {
            return Ok(false);
        }
        data.insert(key.to_string(), value);
        Ok(true)
    }

    async fn update(&self, key: &str, value: Vec<u8>) -> Result<bool> {
        let mut data = self.data.write().await;
        match data.get_mut(key) {
            Some(stored) => {
                *stored = value;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.data.write().await.remove(key).is_some())
    }
}
