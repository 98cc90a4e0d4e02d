//! The durable KV contract used to snapshot/restore a `WorkflowMemory`:
//! key namespace `pipeline_trigger:{workflowID}`, opaque binary value,
//! TTL = 3600s.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{MemoryError, Result};

/// Durable key-value store with TTL. One production implementation (redis),
/// one in-memory implementation for tests — the same
/// trait-plus-two-implementations shape as `event::bus::EventBus`.
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn delete(&self, key: &str) -> Result<()>;
}

pub struct RedisDurableStore {
    manager: redis::aio::ConnectionManager,
}

impl RedisDurableStore {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client =
            redis::Client::open(redis_url).map_err(|e| MemoryError::IOError(e.to_string()))?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| MemoryError::IOError(e.to_string()))?;
        Ok(Self { manager })
    }
}

#[async_trait]
impl DurableStore for RedisDurableStore {
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let mut conn = self.manager.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl.as_secs())
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| MemoryError::IOError(e.to_string()))
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.manager.clone();
        redis::cmd("GET")
            .arg(key)
            .query_async::<Option<Vec<u8>>>(&mut conn)
            .await
            .map_err(|e| MemoryError::IOError(e.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        redis::cmd("DEL")
            .arg(key)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| MemoryError::IOError(e.to_string()))
    }
}

struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

/// In-memory durable store for tests: honours TTL expiry so that restore
/// semantics (`NotFound` once expired) are exercised without a running
/// redis instance.
#[derive(Default, Clone)]
pub struct InMemoryDurableStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl InMemoryDurableStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DurableStore for InMemoryDurableStore {
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        self.entries.write().insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut entries = self.entries.write();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}
