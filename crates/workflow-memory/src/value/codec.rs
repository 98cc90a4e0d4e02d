//! Self-describing codec used both for snapshotting a `WorkflowMemory` and
//! for publishing events on the bus.
//!
//! `bincode` is not self-describing: decoding a dynamic, tagged payload
//! (this crate's `Value`, or `MemoryEvent` with its `serde_json::Value`
//! fields) requires `deserialize_any`, which bincode's format cannot support.
//! `serde_json` is, so it is used here instead — the same choice the wider
//! backend makes for its own opaque blob encoding (see
//! `everruns-storage`'s encryption envelope). A blob produced by one version
//! of this crate either decodes cleanly or fails with a typed
//! `DecodeError`; it never silently coerces an unknown variant into one it
//! does understand.

use serde::{Deserialize, Serialize};

use crate::error::{MemoryError, Result};

/// Encode any serializable value to its self-describing wire form.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| MemoryError::DecodeError(e.to_string()))
}

/// Decode a value previously produced by [`encode`].
pub fn decode<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| MemoryError::DecodeError(e.to_string()))
}
