//! The dynamic value graph used to represent pipeline runtime state
//!
//! `Value` is a recursive tagged union: `Null`, `Boolean`, `Number`, `String`,
//! `Array`, `Map`, and an opaque typed leaf for binary payloads such as
//! base64-encoded images. Every variant round-trips through the binary codec
//! in `codec` and projects to a JSON-shaped envelope via `structural`.
//!
//! Cycles are structurally unreachable: a `Value` owns its children outright
//! (no `Rc`/`Arc` sharing), so there is no way to make a sub-value its own
//! ancestor short of `mem::swap`-ing through unsafe code. The codec therefore
//! does not need cycle detection.

pub mod codec;
pub mod structural;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A typed opaque leaf — currently only a base64-encoded binary blob with a
/// MIME type, as produced by image-processing operators upstream of this
/// core. The core never interprets the bytes; it only stores, snapshots, and
/// projects them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blob {
    pub mime_type: String,
    pub base64: String,
}

impl Blob {
    pub fn new(mime_type: impl Into<String>, base64: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            base64: base64.into(),
        }
    }
}

/// The dynamic value graph
///
/// Externally tagged (the default derive): bincode and other non-self-describing
/// binary formats can only round-trip enums whose variants carry their
/// discriminant out of band, not an internally-tagged `{"type": ..., ...}`
/// shape, which requires `deserialize_any` and fails for newtype variants
/// wrapping a scalar or sequence. The wire-facing `{"type": ...}` shape is
/// produced separately by `to_structural`/`to_wire_json`, not by this derive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Map(IndexMap<String, Value>),
    Blob(Blob),
}

impl Value {
    /// An empty map, the shape every pipeline-scoped and component-scoped
    /// bucket starts out as.
    pub fn empty_map() -> Self {
        Value::Map(IndexMap::new())
    }

    pub fn empty_array() -> Self {
        Value::Array(Vec::new())
    }

    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut IndexMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// A friendly name for the variant, used in `InvalidPath` messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Blob(_) => "blob",
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}
