//! Configuration for `MemoryStore`
//!
//! Builder style: a `Default` impl holding the fixed constants, plus
//! `with_*` methods for the binary that wires this crate into a deployment
//! to override them. This crate never reads the environment itself; that is
//! the wiring binary's concern.

use std::time::Duration;

/// Tunables for `MemoryStore`.
#[derive(Debug, Clone)]
pub struct MemoryStoreConfig {
    /// TTL applied to every snapshot written by `write_workflow_memory_to_redis`.
    pub snapshot_ttl: Duration,

    /// Key prefix for durable KV snapshot keys; default namespace is
    /// `pipeline_trigger:{workflowID}`.
    pub snapshot_key_prefix: String,

    /// Prefix prepended to the workflow ID to form the event-bus channel
    /// name. Defaults to empty, so the channel is the bare workflow ID.
    pub event_channel_prefix: String,
}

impl MemoryStoreConfig {
    pub fn with_snapshot_ttl(mut self, ttl: Duration) -> Self {
        self.snapshot_ttl = ttl;
        self
    }

    pub fn with_snapshot_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.snapshot_key_prefix = prefix.into();
        self
    }

    pub fn with_event_channel_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.event_channel_prefix = prefix.into();
        self
    }

    pub fn snapshot_key(&self, workflow_id: &str) -> String {
        format!("{}{}", self.snapshot_key_prefix, workflow_id)
    }

    pub fn event_channel(&self, workflow_id: &str) -> String {
        format!("{}{}", self.event_channel_prefix, workflow_id)
    }
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            snapshot_ttl: Duration::from_secs(3600),
            snapshot_key_prefix: "pipeline_trigger:".to_string(),
            event_channel_prefix: String::new(),
        }
    }
}
