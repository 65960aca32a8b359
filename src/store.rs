//! The shared keyspace: key map, expiry map, startup parameters and the
//! replication peers, all behind one lock.
//!
//! Expiry is lazy. A read that finds a past deadline evicts the key from
//! both maps and reports it absent; nothing sweeps in the background.
//! Propagation snapshots the replica list first so no socket write ever
//! happens while the store lock is held.

use std::collections::HashMap;
use std::sync::Arc;

use jiff::Timestamp;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::connection::{Connection, ConnectionRole};
use crate::resp::RespValue;

#[derive(Debug, Default)]
struct StoreInner {
    dict: HashMap<String, RespValue>,
    expiry: HashMap<String, i64>,
    params: HashMap<String, String>,
    replicas: Vec<Arc<Connection>>,
    master: Option<Arc<Connection>>,
}

#[derive(Debug, Default)]
pub struct Store {
    inner: Mutex<StoreInner>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a value. Any previous expiry on the key is cleared.
    pub async fn set(&self, key: &str, value: RespValue) {
        let mut inner = self.inner.lock().await;
        inner.dict.insert(key.to_string(), value);
        inner.expiry.remove(key);
    }

    /// Stores a value that expires `ttl_ms` milliseconds from now.
    pub async fn set_with_expiry(&self, key: &str, value: RespValue, ttl_ms: u64) {
        let deadline_ms = Timestamp::now().as_millisecond() + ttl_ms as i64;
        self.set_with_absolute_expiry(key, value, deadline_ms).await;
    }

    /// Stores a value with an absolute expiry in milliseconds since epoch.
    pub async fn set_with_absolute_expiry(&self, key: &str, value: RespValue, deadline_ms: i64) {
        let mut inner = self.inner.lock().await;
        inner.dict.insert(key.to_string(), value);
        inner.expiry.insert(key.to_string(), deadline_ms);
    }

    /// Reads a key, lazily evicting it when its deadline has passed.
    pub async fn get(&self, key: &str) -> Option<RespValue> {
        let mut inner = self.inner.lock().await;

        if let Some(&deadline_ms) = inner.expiry.get(key) {
            if Timestamp::now().as_millisecond() > deadline_ms {
                inner.dict.remove(key);
                inner.expiry.remove(key);
                return None;
            }
        }

        inner.dict.get(key).cloned()
    }

    /// All live keys. Pattern filtering happens in the KEYS handler.
    pub async fn keys(&self) -> Vec<String> {
        let inner = self.inner.lock().await;
        inner.dict.keys().cloned().collect()
    }

    pub async fn set_param(&self, key: &str, value: &str) {
        let mut inner = self.inner.lock().await;
        inner.params.insert(key.to_string(), value.to_string());
    }

    pub async fn get_param(&self, key: &str) -> Option<String> {
        let inner = self.inner.lock().await;
        inner.params.get(key).cloned()
    }

    /// Classification used by the TYPE command.
    pub async fn type_of_value(&self, key: &str) -> &'static str {
        match self.get(key).await {
            None => "none",
            Some(RespValue::SimpleString(_)) | Some(RespValue::BulkString(_)) => "string",
            Some(RespValue::Stream(_)) => "stream",
            Some(_) => "unknown",
        }
    }

    /// Registers a replica connection and flips its relation.
    pub async fn add_replica(&self, connection: Arc<Connection>) {
        connection.set_relation(ConnectionRole::Replica).await;

        let mut inner = self.inner.lock().await;
        inner.replicas.push(connection);
    }

    /// Drops a replica whose connection task has ended.
    pub async fn remove_replica(&self, connection: &Arc<Connection>) {
        let mut inner = self.inner.lock().await;
        inner
            .replicas
            .retain(|existing| !Arc::ptr_eq(existing, connection));
    }

    pub async fn replicas(&self) -> Vec<Arc<Connection>> {
        let inner = self.inner.lock().await;
        inner.replicas.clone()
    }

    pub async fn set_master(&self, connection: Arc<Connection>) {
        let mut inner = self.inner.lock().await;
        inner.master = Some(connection);
    }

    pub async fn master(&self) -> Option<Arc<Connection>> {
        let inner = self.inner.lock().await;
        inner.master.clone()
    }

    /// Forwards a replicated call to every replica, advancing each
    /// replica's propagation counters.
    pub async fn propagate_to_replicas(&self, call: &RespValue) {
        let replicas = self.replicas().await;
        if replicas.is_empty() {
            return;
        }

        let encoded = call.encode();

        for replica in replicas {
            if let Err(error) = replica.write(encoded.as_bytes()).await {
                warn!(replica = %replica.addr(), %error, "failed to propagate command");
                continue;
            }

            let mut state = replica.state().await;
            state.total_propagated += encoded.len();
            state.expected_offset = state.total_propagated;

            debug!(
                replica = %replica.addr(),
                bytes = encoded.len(),
                total_propagated = state.total_propagated,
                offset = state.offset,
                "propagated command to replica"
            );
        }
    }
}
