//! Event envelope, taxonomy, and publishing
//!
//! Every mutation that streaming observers care about is reprojected through
//! [`crate::value::Value::to_wire_json`] and wrapped into one of the tagged
//! variants below before being binary-encoded and published on the bus under
//! channel = workflow ID.
//!
//! Seven concrete event tags are modelled here as one `#[serde(tag = "event",
//! content = "data")]` enum.

pub mod bus;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// The `{started, skipped, completed}` triple carried by
/// `component_status_updated`, always sent in full even though only one
/// flag changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTriple {
    pub started: bool,
    pub skipped: bool,
    pub completed: bool,
}

/// The event envelope published on the bus and used for
/// `MemoryStore::send_workflow_status_event`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum MemoryEvent {
    PipelineStarted {
        update_time: DateTime<Utc>,
        batch_index: usize,
        variable: Json,
    },
    PipelineOutputUpdated {
        update_time: DateTime<Utc>,
        batch_index: usize,
        output: Json,
    },
    PipelineCompleted {
        update_time: DateTime<Utc>,
        batch_index: usize,
        output: Json,
    },
    PipelineClosed {
        update_time: DateTime<Utc>,
    },
    ComponentStatusUpdated {
        update_time: DateTime<Utc>,
        component_id: String,
        batch_index: usize,
        status: StatusTriple,
    },
    ComponentInputUpdated {
        update_time: DateTime<Utc>,
        component_id: String,
        batch_index: usize,
        input: Json,
    },
    ComponentOutputUpdated {
        update_time: DateTime<Utc>,
        component_id: String,
        batch_index: usize,
        output: Json,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn component_status_updated_serializes_with_event_tag() {
        let event = MemoryEvent::ComponentStatusUpdated {
            update_time: Utc::now(),
            component_id: "c1".to_string(),
            batch_index: 0,
            status: StatusTriple {
                started: true,
                skipped: false,
                completed: false,
            },
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], json!("component_status_updated"));
        assert_eq!(json["data"]["status"]["started"], json!(true));
    }
}
