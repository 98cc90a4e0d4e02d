//! `WorkflowMemory`: the per-workflow, batched, mutex-guarded value store.
//!
//! A struct holding locked collections behind `Arc`, safe to share across
//! the tokio tasks that drive one workflow's activities. The lock is a
//! single `parking_lot::Mutex` over the whole `data` tree rather than one
//! lock per batch index or component.

pub mod tags;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{MemoryError, Result};
use crate::event::bus::{EventBus, NoopEventBus};
use crate::event::{MemoryEvent, StatusTriple};
use crate::path;
use crate::value::Value;

pub use tags::{ComponentDataTag, PipelineDataTag, StatusFlag};

/// The recipe descriptor is opaque to this core: only stored and returned.
pub type Recipe = serde_json::Value;

/// A snapshotable view of a `WorkflowMemory`: everything but the mutex and
/// the bus handle, used by `WriteWorkflowMemoryToRedis`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowMemorySnapshot {
    pub id: String,
    pub data: Vec<Value>,
    pub recipe: Recipe,
}

/// Per-workflow memory object. Owns a fixed-length vector of root `Map`s
/// (one per batch index), an opaque recipe reference, and a one-way
/// streaming flag. Every operation acquires `data`'s mutex to read or write
/// the tree. Operations that also publish an event hold a second,
/// async-aware `ordering` mutex across the whole mutate-then-publish
/// sequence, so that two concurrent mutations can never have their events
/// land on the bus in the opposite order from the mutations themselves.
pub struct WorkflowMemory {
    id: String,
    data: Mutex<Vec<Value>>,
    recipe: RwLock<Recipe>,
    batch_size: usize,
    streaming: AtomicBool,
    bus: Arc<dyn EventBus>,
    channel: String,
    /// Serializes each mutate-then-publish sequence against every other one,
    /// so event publish order always matches mutation order.
    ordering: tokio::sync::Mutex<()>,
}

impl WorkflowMemory {
    /// Construct a fresh workflow memory with `batch_size` pre-populated
    /// root maps.
    pub fn new(id: impl Into<String>, recipe: Recipe, batch_size: usize) -> Self {
        Self::with_bus(id, recipe, batch_size, Arc::new(NoopEventBus), None)
    }

    /// Construct with an explicit event bus and channel name, as
    /// `MemoryStore` does for every workflow it registers.
    pub fn with_bus(
        id: impl Into<String>,
        recipe: Recipe,
        batch_size: usize,
        bus: Arc<dyn EventBus>,
        channel: Option<String>,
    ) -> Self {
        let id = id.into();
        let channel = channel.unwrap_or_else(|| id.clone());
        Self {
            data: Mutex::new((0..batch_size).map(|_| Self::seed_root()).collect()),
            recipe: RwLock::new(recipe),
            batch_size,
            streaming: AtomicBool::new(false),
            bus,
            channel,
            id,
            ordering: tokio::sync::Mutex::new(()),
        }
    }

    fn seed_root() -> Value {
        let mut root = IndexMap::new();
        root.insert("variable".to_string(), Value::empty_map());
        root.insert("secret".to_string(), Value::empty_map());
        root.insert("output".to_string(), Value::empty_map());
        Value::Map(root)
    }

    fn component_skeleton() -> Value {
        let mut status = IndexMap::new();
        status.insert("started".to_string(), Value::Boolean(false));
        status.insert("skipped".to_string(), Value::Boolean(false));
        status.insert("completed".to_string(), Value::Boolean(false));

        let mut comp = IndexMap::new();
        comp.insert("input".to_string(), Value::empty_map());
        comp.insert("output".to_string(), Value::empty_map());
        comp.insert("status".to_string(), Value::Map(status));
        comp.insert("setup".to_string(), Value::empty_map());
        Value::Map(comp)
    }

    fn check_batch(&self, i: usize) -> Result<()> {
        if i >= self.batch_size {
            Err(MemoryError::BatchOutOfRange {
                index: i,
                batch_size: self.batch_size,
            })
        } else {
            Ok(())
        }
    }

    async fn publish(&self, event: MemoryEvent) -> Result<()> {
        if !self.streaming.load(Ordering::Acquire) {
            return Ok(());
        }
        let bytes = crate::value::codec::encode(&event)?;
        self.bus.publish(&self.channel, bytes).await
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn get_batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn get_recipe(&self) -> Recipe {
        self.recipe.read().clone()
    }

    pub fn set_recipe(&self, recipe: Recipe) {
        *self.recipe.write() = recipe;
    }

    pub fn enable_streaming(&self) {
        self.streaming.store(true, Ordering::Release);
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::Acquire)
    }

    /// `Set(i, key, v)`: write an arbitrary top-level key under batch `i`.
    #[instrument(skip(self, value), fields(workflow_id = %self.id))]
    pub fn set(&self, i: usize, key: &str, value: Value) -> Result<()> {
        self.check_batch(i)?;
        let mut data = self.data.lock();
        data[i]
            .as_map_mut()
            .expect("root is always a map")
            .insert(key.to_string(), value);
        Ok(())
    }

    /// `Get(i, path)`: resolve a dotted/bracketed path against batch `i`'s root.
    #[instrument(skip(self), fields(workflow_id = %self.id))]
    pub fn get(&self, i: usize, path_expr: &str) -> Result<Value> {
        self.check_batch(i)?;
        let data = self.data.lock();
        path::get(&data[i], path_expr)
    }

    /// `InitComponent(i, C)`: install (or reset) the component skeleton.
    /// Idempotent — re-initialising an existing component resets it.
    #[instrument(skip(self), fields(workflow_id = %self.id))]
    pub fn init_component(&self, i: usize, component: &str) -> Result<()> {
        self.check_batch(i)?;
        let mut data = self.data.lock();
        data[i]
            .as_map_mut()
            .expect("root is always a map")
            .insert(component.to_string(), Self::component_skeleton());
        Ok(())
    }

    fn component_map_mut<'a>(
        root: &'a mut Value,
        component: &str,
    ) -> Result<&'a mut IndexMap<String, Value>> {
        root.as_map_mut()
            .expect("root is always a map")
            .get_mut(component)
            .ok_or_else(|| MemoryError::component_not_found(component))?
            .as_map_mut()
            .ok_or_else(|| MemoryError::component_not_found(component))
    }

    fn component_map<'a>(
        root: &'a Value,
        component: &str,
    ) -> Result<&'a IndexMap<String, Value>> {
        root.as_map()
            .expect("root is always a map")
            .get(component)
            .ok_or_else(|| MemoryError::component_not_found(component))?
            .as_map()
            .ok_or_else(|| MemoryError::component_not_found(component))
    }

    /// `SetComponentData(i, C, T, v)`. Emits `ComponentInputUpdated` or
    /// `ComponentOutputUpdated` when streaming and `T` is `input`/`output`.
    #[instrument(skip(self, value), fields(workflow_id = %self.id))]
    pub async fn set_component_data(
        &self,
        i: usize,
        component: &str,
        tag: ComponentDataTag,
        value: Value,
    ) -> Result<()> {
        self.check_batch(i)?;
        let _order = self.ordering.lock().await;
        {
            let mut data = self.data.lock();
            let comp = Self::component_map_mut(&mut data[i], component)?;
            comp.insert(tag.as_str().to_string(), value.clone());
        }

        match tag {
            ComponentDataTag::Input => {
                let wire = value.to_wire_json()?;
                self.publish(MemoryEvent::ComponentInputUpdated {
                    update_time: Utc::now(),
                    component_id: component.to_string(),
                    batch_index: i,
                    input: wire,
                })
                .await
            }
            ComponentDataTag::Output => {
                let wire = value.to_wire_json()?;
                self.publish(MemoryEvent::ComponentOutputUpdated {
                    update_time: Utc::now(),
                    component_id: component.to_string(),
                    batch_index: i,
                    output: wire,
                })
                .await
            }
            ComponentDataTag::Element | ComponentDataTag::Setup => Ok(()),
        }
    }

    /// `GetComponentData(i, C, T)`. Returns `Value::Null` if `T` was never
    /// set on an initialised component — `element` in particular is bound by
    /// the orchestrator some time after `InitComponent`, not at init time.
    #[instrument(skip(self), fields(workflow_id = %self.id))]
    pub fn get_component_data(
        &self,
        i: usize,
        component: &str,
        tag: ComponentDataTag,
    ) -> Result<Value> {
        self.check_batch(i)?;
        let data = self.data.lock();
        let comp = Self::component_map(&data[i], component)?;
        Ok(comp.get(tag.as_str()).cloned().unwrap_or(Value::Null))
    }

    /// `SetComponentStatus(i, C, T, b)`. Always emits `ComponentStatusUpdated`
    /// carrying the full `{started, skipped, completed}` triple when streaming.
    #[instrument(skip(self), fields(workflow_id = %self.id))]
    pub async fn set_component_status(
        &self,
        i: usize,
        component: &str,
        flag: StatusFlag,
        value: bool,
    ) -> Result<()> {
        self.check_batch(i)?;
        let _order = self.ordering.lock().await;
        let triple = {
            let mut data = self.data.lock();
            let comp = Self::component_map_mut(&mut data[i], component)?;
            let status = comp
                .get_mut("status")
                .and_then(Value::as_map_mut)
                .expect("status installed by init_component");
            status.insert(flag.as_str().to_string(), Value::Boolean(value));
            StatusTriple {
                started: status.get("started").and_then(Value::as_bool).unwrap_or(false),
                skipped: status.get("skipped").and_then(Value::as_bool).unwrap_or(false),
                completed: status
                    .get("completed")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
            }
        };

        self.publish(MemoryEvent::ComponentStatusUpdated {
            update_time: Utc::now(),
            component_id: component.to_string(),
            batch_index: i,
            status: triple,
        })
        .await
    }

    /// `GetComponentStatus(i, C, T)`.
    #[instrument(skip(self), fields(workflow_id = %self.id))]
    pub fn get_component_status(
        &self,
        i: usize,
        component: &str,
        flag: StatusFlag,
    ) -> Result<bool> {
        self.check_batch(i)?;
        let data = self.data.lock();
        let comp = Self::component_map(&data[i], component)?;
        Ok(comp
            .get("status")
            .and_then(Value::as_map)
            .and_then(|s| s.get(flag.as_str()))
            .and_then(Value::as_bool)
            .unwrap_or(false))
    }

    /// `SetPipelineData(i, T, v)`. Emits `PipelineOutputUpdated` iff `T == output`.
    #[instrument(skip(self, value), fields(workflow_id = %self.id))]
    pub async fn set_pipeline_data(
        &self,
        i: usize,
        tag: PipelineDataTag,
        value: Value,
    ) -> Result<()> {
        self.check_batch(i)?;
        let _order = self.ordering.lock().await;
        let is_output = matches!(tag, PipelineDataTag::Output);
        {
            let mut data = self.data.lock();
            data[i]
                .as_map_mut()
                .expect("root is always a map")
                .insert(tag.as_str().to_string(), value.clone());
        }

        if is_output {
            let wire = value.to_wire_json()?;
            self.publish(MemoryEvent::PipelineOutputUpdated {
                update_time: Utc::now(),
                batch_index: i,
                output: wire,
            })
            .await
        } else {
            Ok(())
        }
    }

    /// `GetPipelineData(i, T)`.
    #[instrument(skip(self), fields(workflow_id = %self.id))]
    pub fn get_pipeline_data(&self, i: usize, tag: PipelineDataTag) -> Result<Value> {
        self.check_batch(i)?;
        let data = self.data.lock();
        data[i]
            .as_map()
            .expect("root is always a map")
            .get(tag.as_str())
            .cloned()
            .ok_or_else(|| MemoryError::not_found(tag.as_str()))
    }

    /// A deep snapshot of everything but the mutex and the bus handle, for
    /// `MemoryStore::write_workflow_memory_to_redis`.
    pub fn snapshot(&self) -> WorkflowMemorySnapshot {
        WorkflowMemorySnapshot {
            id: self.id.clone(),
            data: self.data.lock().clone(),
            recipe: self.recipe.read().clone(),
        }
    }

    /// Reconstitute from a snapshot with a fresh mutex and bus handle, as
    /// `MemoryStore::load_workflow_memory_from_redis` does.
    pub fn from_snapshot(
        snapshot: WorkflowMemorySnapshot,
        bus: Arc<dyn EventBus>,
        channel: Option<String>,
    ) -> Self {
        let batch_size = snapshot.data.len();
        let channel = channel.unwrap_or_else(|| snapshot.id.clone());
        Self {
            id: snapshot.id,
            data: Mutex::new(snapshot.data),
            recipe: RwLock::new(snapshot.recipe),
            batch_size,
            streaming: AtomicBool::new(false),
            bus,
            channel,
            ordering: tokio::sync::Mutex::new(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn memory(batch_size: usize) -> WorkflowMemory {
        WorkflowMemory::new("w1", Recipe::Null, batch_size)
    }

    #[test]
    fn fresh_memory_has_empty_pipeline_buckets() {
        let mem = memory(1);
        for tag in [
            PipelineDataTag::Variable,
            PipelineDataTag::Secret,
            PipelineDataTag::Output,
        ] {
            assert_eq!(
                mem.get_pipeline_data(0, tag).unwrap().as_map().unwrap().len(),
                0
            );
        }
    }

    #[test]
    fn init_component_installs_empty_skeleton() {
        let mem = memory(1);
        mem.init_component(0, "c1").unwrap();

        for flag in [StatusFlag::Started, StatusFlag::Skipped, StatusFlag::Completed] {
            assert!(!mem.get_component_status(0, "c1", flag).unwrap());
        }
        for tag in [ComponentDataTag::Input, ComponentDataTag::Output, ComponentDataTag::Setup] {
            assert_eq!(
                mem.get_component_data(0, "c1", tag)
                    .unwrap()
                    .as_map()
                    .unwrap()
                    .len(),
                0
            );
        }
    }

    #[test]
    fn set_then_get_round_trips_structurally() {
        let mem = memory(1);
        mem.set(0, "variable", Value::empty_map()).unwrap();

        let mut name = IndexMap::new();
        name.insert("name".to_string(), Value::string("Ada"));
        mem.set(0, "variable", Value::Map(name)).unwrap();

        assert_eq!(mem.get(0, "variable.name").unwrap(), Value::string("Ada"));
    }

    #[tokio::test]
    async fn s1_simple_variable_round_trip() {
        let mem = memory(1);
        let mut vars = IndexMap::new();
        vars.insert("name".to_string(), Value::string("Ada"));
        mem.set_pipeline_data(0, PipelineDataTag::Variable, Value::Map(vars))
            .await
            .unwrap();

        assert_eq!(mem.get(0, "variable.name").unwrap(), Value::string("Ada"));
    }

    #[tokio::test]
    async fn s2_component_lifecycle_emits_events_in_order() {
        let bus = Arc::new(crate::event::bus::InMemoryEventBus::new());
        let mem = WorkflowMemory::with_bus(
            "w1",
            Recipe::Null,
            1,
            bus.clone(),
            None,
        );
        mem.enable_streaming();
        mem.init_component(0, "c1").unwrap();

        mem.set_component_status(0, "c1", StatusFlag::Started, true)
            .await
            .unwrap();

        let mut input = IndexMap::new();
        input.insert("x".to_string(), Value::Number(1.0));
        mem.set_component_data(0, "c1", ComponentDataTag::Input, Value::Map(input))
            .await
            .unwrap();

        let mut output = IndexMap::new();
        output.insert("y".to_string(), Value::Number(2.0));
        mem.set_component_data(0, "c1", ComponentDataTag::Output, Value::Map(output))
            .await
            .unwrap();

        mem.set_component_status(0, "c1", StatusFlag::Completed, true)
            .await
            .unwrap();

        let published = bus.published();
        assert_eq!(published.len(), 4);

        let events: Vec<MemoryEvent> = published
            .iter()
            .map(|(_, bytes)| crate::value::codec::decode(bytes).unwrap())
            .collect();

        match &events[0] {
            MemoryEvent::ComponentStatusUpdated { status, .. } => {
                assert_eq!(
                    *status,
                    StatusTriple {
                        started: true,
                        skipped: false,
                        completed: false
                    }
                );
            }
            other => panic!("unexpected first event: {other:?}"),
        }
        match &events[1] {
            MemoryEvent::ComponentInputUpdated { input, .. } => {
                assert_eq!(*input, json!({"x": 1.0}));
            }
            other => panic!("unexpected second event: {other:?}"),
        }
        match &events[2] {
            MemoryEvent::ComponentOutputUpdated { output, .. } => {
                assert_eq!(*output, json!({"y": 2.0}));
            }
            other => panic!("unexpected third event: {other:?}"),
        }
        match &events[3] {
            MemoryEvent::ComponentStatusUpdated { status, .. } => {
                assert_eq!(
                    *status,
                    StatusTriple {
                        started: true,
                        skipped: false,
                        completed: true
                    }
                );
            }
            other => panic!("unexpected fourth event: {other:?}"),
        }
    }

    #[test]
    fn batch_out_of_range_is_rejected() {
        let mem = memory(1);
        assert!(matches!(
            mem.get(5, ""),
            Err(MemoryError::BatchOutOfRange { .. })
        ));
    }

    #[test]
    fn set_component_data_on_uninitialised_component_is_component_not_found() {
        let mem = memory(1);
        assert!(matches!(
            mem.get_component_data(0, "ghost", ComponentDataTag::Input),
            Err(MemoryError::ComponentNotFound { .. })
        ));
    }

    #[test]
    fn s5_batch_isolation() {
        let mem = memory(3);
        let mut v0 = IndexMap::new();
        v0.insert("i".to_string(), Value::Number(0.0));
        mem.set(0, "variable", Value::Map(v0)).unwrap();

        let mut v2 = IndexMap::new();
        v2.insert("i".to_string(), Value::Number(2.0));
        mem.set(2, "variable", Value::Map(v2)).unwrap();

        assert_eq!(
            mem.get_pipeline_data(1, PipelineDataTag::Variable)
                .unwrap()
                .as_map()
                .unwrap()
                .len(),
            0
        );
        assert_eq!(mem.get(0, "variable.i").unwrap(), Value::Number(0.0));
        assert_eq!(mem.get(2, "variable.i").unwrap(), Value::Number(2.0));
    }

    #[test]
    fn element_slot_defaults_to_null_not_not_found() {
        let mem = memory(1);
        mem.init_component(0, "c1").unwrap();
        assert_eq!(
            mem.get_component_data(0, "c1", ComponentDataTag::Element)
                .unwrap(),
            Value::Null
        );
    }

    #[test]
    fn re_init_resets_component() {
        let mem = memory(1);
        mem.init_component(0, "c1").unwrap();
        mem.set(0, "c1", Value::string("not a component anymore"))
            .unwrap();
        mem.init_component(0, "c1").unwrap();
        assert!(!mem.get_component_status(0, "c1", StatusFlag::Started).unwrap());
    }

    #[tokio::test]
    async fn s6_concurrent_writers_same_workflow() {
        let mem = Arc::new(memory(1));
        mem.init_component(0, "c1").unwrap();
        mem.init_component(0, "c2").unwrap();

        let mut i1 = IndexMap::new();
        i1.insert("a".to_string(), Value::Number(1.0));
        let mut i2 = IndexMap::new();
        i2.insert("b".to_string(), Value::Number(2.0));

        let m1 = mem.clone();
        let m2 = mem.clone();
        let t1 = tokio::spawn(async move {
            m1.set_component_data(0, "c1", ComponentDataTag::Input, Value::Map(i1))
                .await
        });
        let t2 = tokio::spawn(async move {
            m2.set_component_data(0, "c2", ComponentDataTag::Input, Value::Map(i2))
                .await
        });
        t1.await.unwrap().unwrap();
        t2.await.unwrap().unwrap();

        assert_eq!(mem.get(0, "c1.input.a").unwrap(), Value::Number(1.0));
        assert_eq!(mem.get(0, "c2.input.b").unwrap(), Value::Number(2.0));
        for flag in [StatusFlag::Started, StatusFlag::Skipped, StatusFlag::Completed] {
            assert!(!mem.get_component_status(0, "c1", flag).unwrap());
            assert!(!mem.get_component_status(0, "c2", flag).unwrap());
        }
    }

    /// A bus that stalls its first publish so a slower first mutation races
    /// against a faster second one. Used by
    /// `event_publish_order_matches_mutation_order_under_a_slow_first_publish`.
    struct StallFirstPublishBus {
        inner: crate::event::bus::InMemoryEventBus,
        stalled: std::sync::atomic::AtomicBool,
    }

    #[async_trait::async_trait]
    impl EventBus for StallFirstPublishBus {
        async fn publish(&self, channel: &str, bytes: Vec<u8>) -> Result<()> {
            if !self.stalled.swap(true, Ordering::SeqCst) {
                tokio::time::sleep(std::time::Duration::from_millis(30)).await;
            }
            self.inner.publish(channel, bytes).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn event_publish_order_matches_mutation_order_under_a_slow_first_publish() {
        let bus = Arc::new(StallFirstPublishBus {
            inner: crate::event::bus::InMemoryEventBus::new(),
            stalled: std::sync::atomic::AtomicBool::new(false),
        });
        let mem = Arc::new(WorkflowMemory::with_bus(
            "w1",
            Recipe::Null,
            1,
            bus.clone(),
            None,
        ));
        mem.enable_streaming();
        mem.init_component(0, "c1").unwrap();

        let m1 = mem.clone();
        let first = tokio::spawn(async move {
            m1.set_component_status(0, "c1", StatusFlag::Started, true)
                .await
        });
        // With time paused, one yield is enough for the first call to run to
        // completion up to its (pending) stalled sleep, so it is guaranteed
        // to hold the ordering lock before the second call is even attempted.
        tokio::task::yield_now().await;
        let m2 = mem.clone();
        let second = tokio::spawn(async move {
            m2.set_component_status(0, "c1", StatusFlag::Skipped, true)
                .await
        });

        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        let published = bus.inner.published();
        assert_eq!(published.len(), 2);
        let events: Vec<MemoryEvent> = published
            .iter()
            .map(|(_, bytes)| crate::value::codec::decode(bytes).unwrap())
            .collect();

        match &events[0] {
            MemoryEvent::ComponentStatusUpdated { status, .. } => {
                assert!(status.started && !status.skipped);
            }
            other => panic!("unexpected first event: {other:?}"),
        }
        match &events[1] {
            MemoryEvent::ComponentStatusUpdated { status, .. } => {
                assert!(status.started && status.skipped);
            }
            other => panic!("unexpected second event: {other:?}"),
        }
    }
}
