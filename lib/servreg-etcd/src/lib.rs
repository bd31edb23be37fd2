//! Key-value registry backend
//!
//! Stores the registry tree in a flat keyspace, either in memory or in
//! etcd through its v3 JSON gateway.
pub mod backend;
pub mod gateway;
pub mod kv;

pub use backend::KvBackend;
pub use gateway::EtcdGateway;
pub use kv::{KvClient, MemoryKv};
