//! `MemoryStore`: the process-wide registry mapping workflow ID to
//! `WorkflowMemory`, plus snapshot/restore to the durable KV and direct
//! publication of workflow-status events.
//!
//! The registry itself is a `dashmap::DashMap` — lock-free reads, atomic
//! insert/delete across unrelated workflows — the same concurrent-map
//! building block `durable`'s worker pool uses for its task bookkeeping,
//! repurposed here for workflow lookup instead of task claiming.

pub mod durable_kv;

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{info, instrument, warn};

use crate::config::MemoryStoreConfig;
use crate::error::{MemoryError, Result};
use crate::event::bus::EventBus;
use crate::event::MemoryEvent;
use crate::memory::{Recipe, WorkflowMemory, WorkflowMemorySnapshot};
use crate::value::codec;

pub use durable_kv::{DurableStore, InMemoryDurableStore, RedisDurableStore};

/// Process-wide registry of live `WorkflowMemory` handles.
pub struct MemoryStore {
    workflows: DashMap<String, Arc<WorkflowMemory>>,
    durable: Arc<dyn DurableStore>,
    bus: Arc<dyn EventBus>,
    config: MemoryStoreConfig,
}

impl MemoryStore {
    pub fn new(
        durable: Arc<dyn DurableStore>,
        bus: Arc<dyn EventBus>,
        config: MemoryStoreConfig,
    ) -> Self {
        Self {
            workflows: DashMap::new(),
            durable,
            bus,
            config,
        }
    }

    /// `NewWorkflowMemory(id, recipe, batchSize)`. Overwrites any prior
    /// entry with the same ID.
    #[instrument(skip(self, recipe))]
    pub fn new_workflow_memory(
        &self,
        id: impl Into<String>,
        recipe: Recipe,
        batch_size: usize,
    ) -> Arc<WorkflowMemory> {
        let id = id.into();
        let channel = self.config.event_channel(&id);
        let memory = Arc::new(WorkflowMemory::with_bus(
            id.clone(),
            recipe,
            batch_size,
            self.bus.clone(),
            Some(channel),
        ));
        self.workflows.insert(id.clone(), memory.clone());
        info!(workflow_id = %id, batch_size, "workflow memory created");
        memory
    }

    /// `GetWorkflowMemory(id)`.
    pub fn get_workflow_memory(&self, id: &str) -> Result<Arc<WorkflowMemory>> {
        self.workflows
            .get(id)
            .map(|entry| entry.clone())
            .ok_or_else(|| MemoryError::not_found(format!("workflow {id}")))
    }

    /// `PurgeWorkflowMemory(id)`. Idempotent; also best-effort deletes the
    /// durable snapshot so a reused workflow ID can never be restored from a
    /// stale blob.
    #[instrument(skip(self))]
    pub async fn purge_workflow_memory(&self, id: &str) -> Result<()> {
        self.workflows.remove(id);
        let key = self.config.snapshot_key(id);
        if let Err(e) = self.durable.delete(&key).await {
            warn!(workflow_id = id, error = %e, "failed to delete durable snapshot during purge");
        }
        Ok(())
    }

    /// `WriteWorkflowMemoryToRedis(id)`.
    #[instrument(skip(self))]
    pub async fn write_workflow_memory_to_redis(&self, id: &str) -> Result<()> {
        let memory = self.get_workflow_memory(id)?;
        let snapshot = memory.snapshot();
        let bytes = codec::encode(&snapshot)?;
        let key = self.config.snapshot_key(id);
        self.durable.put(&key, bytes, self.config.snapshot_ttl).await
    }

    /// `LoadWorkflowMemoryFromRedis(id)`.
    #[instrument(skip(self))]
    pub async fn load_workflow_memory_from_redis(&self, id: &str) -> Result<Arc<WorkflowMemory>> {
        let key = self.config.snapshot_key(id);
        let bytes = self
            .durable
            .get(&key)
            .await?
            .ok_or_else(|| MemoryError::not_found(format!("snapshot {key}")))?;
        let mut snapshot: WorkflowMemorySnapshot = codec::decode(&bytes)?;
        snapshot.id = id.to_string();

        let channel = self.config.event_channel(id);
        let memory = Arc::new(WorkflowMemory::from_snapshot(
            snapshot,
            self.bus.clone(),
            Some(channel),
        ));
        self.workflows.insert(id.to_string(), memory.clone());
        Ok(memory)
    }

    /// `SendWorkflowStatusEvent(id, event)`. For events not tied to a
    /// specific mutation, e.g. `PipelineStarted`/`PipelineClosed`, which the
    /// core never emits on its own — that is left to the orchestrator.
    pub async fn send_workflow_status_event(&self, id: &str, event: MemoryEvent) -> Result<()> {
        let bytes = codec::encode(&event)?;
        let channel = self.config.event_channel(id);
        self.bus.publish(&channel, bytes).await
    }
}
