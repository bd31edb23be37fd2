//! etcd v3 client speaking the JSON gateway (`/v3/kv/*`)
//!
//! Keys and values travel base64 encoded. Conditional writes are
//! transactions comparing the key's create revision against zero.

use crate::KvClient;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use servreg_core::{RegistryError, Result};
use std::time::Duration;
use tracing::{debug, warn};

/// Default timeout for a single HTTP round trip
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// etcd client over the v3 JSON gateway
pub struct EtcdGateway {
    http: reqwest::Client,
    endpoints: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RangeResponse {
    #[serde(default)]
    kvs: Vec<KeyValue>,
}

#[derive(Debug, Deserialize)]
struct KeyValue {
    key: String,
    #[serde(default)]
    value: String,
}

#[derive(Debug, Default, Deserialize)]
struct DeleteRangeResponse {
    #[serde(default)]
    deleted: Option<Int64>,
}

#[derive(Debug, Default, Deserialize)]
struct TxnResponse {
    #[serde(default)]
    succeeded: bool,
}

/// int64 fields come back as JSON strings from the gateway
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Int64 {
    Str(String),
    Num(i64),
}

impl Int64 {
    fn value(&self) -> i64 {
        match self {
            Int64::Str(s) => s.parse().unwrap_or(0),
            Int64::Num(n) => *n,
        }
    }
}

#[derive(Debug, Serialize)]
struct RangeRequest {
    key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    range_end: Option<String>,
}

impl EtcdGateway {
    /// Create a client for the given endpoints (`http://host:2379`),
    /// tried in order on every request
    pub fn new(endpoints: Vec<String>, request_timeout: Duration) -> Result<Self> {
        if endpoints.is_empty() {
            return Err(RegistryError::BackendUnavailable(
                "no etcd endpoints configured".to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| RegistryError::BackendUnavailable(format!("http client: {}", e)))?;

        let endpoints = endpoints
            .into_iter()
            .map(|e| e.trim_end_matches('/').to_string())
            .collect();

        Ok(Self { http, endpoints })
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let mut last_error = String::new();

        for endpoint in &self.endpoints {
            let url = format!("{}{}", endpoint, path);
            let response = match self.http.post(&url).json(body).send().await {
                Ok(response) => response,
                Err(e) => {
                    warn!("etcd request to {} failed: {}", url, e);
                    last_error = format!("{}: {}", url, e);
                    continue;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                last_error = format!("{}: status {}: {}", url, status, text);
                warn!("etcd request to {} rejected with status {}", url, status);
                continue;
            }

            return response
                .json::<R>()
                .await
                .map_err(|e| RegistryError::BackendUnavailable(format!("{}: bad response: {}", url, e)));
        }

        Err(RegistryError::BackendUnavailable(last_error))
    }
}

fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

fn decode(text: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(text)
        .map_err(|e| RegistryError::BackendUnavailable(format!("invalid base64 from etcd: {}", e)))
}

/// Smallest key greater than every key starting with `prefix`
fn prefix_range_end(prefix: &str) -> Vec<u8> {
    let mut end = prefix.as_bytes().to_vec();
    while let Some(last) = end.pop() {
        if last < 0xff {
            end.push(last + 1);
            return end;
        }
    }
    // all 0xff: scan to the end of the keyspace
    vec![0]
}

fn put_if(key: &str, value: &[u8], result: &str) -> Value {
    let key = encode(key.as_bytes());
    json!({
        "compare": [{
            "key": key,
            "target": "CREATE",
            "result": result,
            "create_revision": "0",
        }],
        "success": [{
            "request_put": { "key": key, "value": encode(value) }
        }],
    })
}

#[async_trait]
impl KvClient for EtcdGateway {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let request = RangeRequest {
            key: encode(key.as_bytes()),
            range_end: None,
        };
        let response: RangeResponse = self.post("/v3/kv/range", &request).await?;
        match response.kvs.first() {
            Some(kv) => Ok(Some(decode(&kv.value)?)),
            None => Ok(None),
        }
    }

    async fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let request = RangeRequest {
            key: encode(prefix.as_bytes()),
            range_end: Some(encode(&prefix_range_end(prefix))),
        };
        let response: RangeResponse = self.post("/v3/kv/range", &request).await?;
        debug!("etcd range {} returned {} keys", prefix, response.kvs.len());

        response
            .kvs
            .iter()
            .map(|kv| -> Result<(String, Vec<u8>)> {
                let key = String::from_utf8(decode(&kv.key)?).map_err(|e| {
                    RegistryError::BackendUnavailable(format!("non utf-8 key from etcd: {}", e))
                })?;
                Ok((key, decode(&kv.value)?))
            })
            .collect()
    }

    async fn create(&self, key: &str, value: Vec<u8>) -> Result<bool> {
        let response: TxnResponse = self.post("/v3/kv/txn", &put_if(key, &value, "EQUAL")).await?;
        Ok(response.succeeded)
    }

    async fn update(&self, key: &str, value: Vec<u8>) -> Result<bool> {
        let response: TxnResponse = self.post("/v3/kv/txn", &put_if(key, &value, "GREATER")).await?;
        Ok(response.succeeded)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let request = RangeRequest {
            key: encode(key.as_bytes()),
            range_end: None,
        };
        let response: DeleteRangeResponse = self.post("/v3/kv/deleterange", &request).await?;
        Ok(response.deleted.map(|d| d.value()).unwrap_or(0) > 0)
    }
}
