//! The event bus contract: `publish(channel, bytes)`, best-effort, no replay.
//!
//! One production implementation backed by redis pub/sub, one in-memory
//! implementation used by this crate's own tests and by callers exercising
//! `MemoryStore` without a running redis instance.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use redis::aio::ConnectionManager;
use tracing::warn;

use crate::error::{MemoryError, Result};

/// Publishes binary-encoded events to a channel named after the workflow ID.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, channel: &str, bytes: Vec<u8>) -> Result<()>;
}

/// Redis-backed event bus. Publish failures are mapped to `IOError`; this
/// never rolls back the in-memory mutation that produced the event, it is
/// simply returned to the caller.
pub struct RedisEventBus {
    manager: ConnectionManager,
}

impl RedisEventBus {
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
impl EventBus for RedisEventBus {
    async fn publish(&self, channel: &str, bytes: Vec<u8>) -> Result<()> {
        let mut conn = self.manager.clone();
        redis::cmd("PUBLISH")
            .arg(channel)
            .arg(bytes)
            .query_async::<i64>(&mut conn)
            .await
            .map_err(|e| {
                warn!(channel, error = %e, "event publish failed");
                MemoryError::IOError(e.to_string())
            })?;
        Ok(())
    }
}

/// In-memory event bus for tests: records every published `(channel, bytes)`
/// pair in order, so a test can assert on event sequencing.
#[derive(Default, Clone)]
pub struct InMemoryEventBus {
    published: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.published.lock().clone()
    }

    pub fn clear(&self) {
        self.published.lock().clear();
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, channel: &str, bytes: Vec<u8>) -> Result<()> {
        self.published.lock().push((channel.to_string(), bytes));
        Ok(())
    }
}

/// Discards every event. Used as the default bus for a `WorkflowMemory`
/// constructed outside of `MemoryStore` (e.g. in unit tests of the value/path
/// layers that have no interest in streaming).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventBus;

#[async_trait]
impl EventBus for NoopEventBus {
    async fn publish(&self, _channel: &str, _bytes: Vec<u8>) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_bus_records_publishes_in_order() {
        let bus = InMemoryEventBus::new();
        bus.publish("w1", vec![1]).await.unwrap();
        bus.publish("w1", vec![2]).await.unwrap();

        let published = bus.published();
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].1, vec![1]);
        assert_eq!(published[1].1, vec![2]);
    }
}
