//! Runtime configuration
//!
//! Loaded once at startup from a YAML document; every field has a
//! default so an empty document is a valid configuration.

use serde::Deserialize;
use servreg_core::broker::DEFAULT_TIMEOUT;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Label that opts a namespace in under the allow-list policy
pub const DEFAULT_ALLOW_LABEL: &str = "servreg.io/allowed";
/// Label that opts a namespace out under the block-list policy
pub const DEFAULT_BLOCK_LABEL: &str = "servreg.io/blocked";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid value for {name}: {value}")]
    InvalidOverride { name: String, value: String },
}

/// Which namespaces are eligible for mirroring
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub enum ListPolicy {
    /// Only namespaces carrying the allow label
    #[serde(rename = "allowlist", alias = "allowList", alias = "AllowList")]
    AllowList,
    /// Every namespace except those carrying the block label
    #[serde(rename = "blocklist", alias = "blockList", alias = "BlockList")]
    BlockList,
    /// Anything else; no namespace is eligible
    #[serde(other)]
    Unrecognized,
}

impl ListPolicy {
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "allowlist" => ListPolicy::AllowList,
            "blocklist" => ListPolicy::BlockList,
            _ => ListPolicy::Unrecognized,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Etcd,
    Memory,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackendConfig {
    pub kind: BackendKind,
    pub endpoints: Vec<String>,
    pub prefix: String,
    pub request_timeout_seconds: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Etcd,
            endpoints: vec!["http://127.0.0.1:2379".to_string()],
            prefix: "/service-registry".to_string(),
            request_timeout_seconds: 10,
        }
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncConfig {
    pub namespace_policy: ListPolicy,
    pub allow_label: String,
    pub block_label: String,
    pub allowed_annotations: Vec<String>,
    pub backend: BackendConfig,
    pub broker_timeout_seconds: u64,
    pub requeue_seconds: u64,
    pub error_requeue_seconds: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            namespace_policy: ListPolicy::AllowList,
            allow_label: DEFAULT_ALLOW_LABEL.to_string(),
            block_label: DEFAULT_BLOCK_LABEL.to_string(),
            allowed_annotations: Vec::new(),
            backend: BackendConfig::default(),
            broker_timeout_seconds: DEFAULT_TIMEOUT.as_secs(),
            requeue_seconds: 300,
            error_requeue_seconds: 30,
        }
    }
}

impl SyncConfig {
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    /// Apply `SERVREG_*` overrides looked up through `var`
    pub fn apply_overrides<F>(&mut self, var: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoints) = var("SERVREG_ETCD_ENDPOINTS") {
            self.backend.endpoints = endpoints
                .split(',')
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_string)
                .collect();
        }

        if let Some(policy) = var("SERVREG_NAMESPACE_POLICY") {
            self.namespace_policy = ListPolicy::parse(&policy);
        }

        if let Some(prefix) = var("SERVREG_PREFIX") {
            self.backend.prefix = prefix;
        }

        if let Some(timeout) = var("SERVREG_BROKER_TIMEOUT_SECONDS") {
            self.broker_timeout_seconds =
                timeout.parse().map_err(|_| ConfigError::InvalidOverride {
                    name: "SERVREG_BROKER_TIMEOUT_SECONDS".to_string(),
                    value: timeout.clone(),
                })?;
        }

        Ok(())
    }

    pub fn broker_timeout(&self) -> Duration {
        Duration::from_secs(self.broker_timeout_seconds)
    }

    pub fn requeue_interval(&self) -> Duration {
        Duration::from_secs(self.requeue_seconds)
    }

    pub fn error_requeue_interval(&self) -> Duration {
        Duration::from_secs(self.error_requeue_seconds)
    }
}
