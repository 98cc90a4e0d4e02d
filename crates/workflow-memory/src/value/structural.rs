//! Projection of `Value` to the JSON-shaped structural envelope used for
//! wire emission (event payloads) and for the double JSON round-trip
//! described below.

use serde_json::{Map as JsonMap, Value as Json};

use super::Value;

impl Value {
    /// Project this value to its structural (JSON-shaped) envelope.
    ///
    /// `Null` becomes a JSON null. A `Map` entry whose value is `Null` is
    /// omitted from the projected object — streaming consumers treat
    /// absence as null. An `Array` element that is `Null` is preserved at
    /// its index: array shape is positional and must not shift.
    pub fn to_structural(&self) -> Json {
        match self {
            Value::Null => Json::Null,
            Value::Boolean(b) => Json::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::String(s) => Json::String(s.clone()),
            Value::Array(items) => Json::Array(items.iter().map(Value::to_structural).collect()),
            Value::Map(entries) => {
                let mut obj = JsonMap::with_capacity(entries.len());
                for (k, v) in entries {
                    if v.is_null() {
                        continue;
                    }
                    obj.insert(k.clone(), v.to_structural());
                }
                Json::Object(obj)
            }
            Value::Blob(blob) => Json::String(blob.base64.clone()),
        }
    }

    /// The double JSON round-trip used when constructing an event payload:
    /// project to the structural envelope, serialise it to bytes, then
    /// deserialise back into a generic `serde_json::Value`. This strips any
    /// type information not expressible in JSON and yields the canonical
    /// wire representation consumers see.
    pub fn to_wire_json(&self) -> crate::error::Result<Json> {
        let structural = self.to_structural();
        let bytes = serde_json::to_vec(&structural)
            .map_err(|e| crate::error::MemoryError::DecodeError(e.to_string()))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| crate::error::MemoryError::DecodeError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    #[test]
    fn null_map_entry_is_omitted() {
        let mut m = IndexMap::new();
        m.insert("a".to_string(), Value::Number(1.0));
        m.insert("b".to_string(), Value::Null);
        let v = Value::Map(m);

        let json = v.to_structural();
        let obj = json.as_object().unwrap();
        assert!(obj.contains_key("a"));
        assert!(!obj.contains_key("b"));
    }

    #[test]
    fn null_array_element_is_preserved() {
        let v = Value::Array(vec![Value::Number(1.0), Value::Null, Value::Number(3.0)]);
        let json = v.to_structural();
        let arr = json.as_array().unwrap();
        assert_eq!(arr.len(), 3);
        assert!(arr[1].is_null());
    }

    #[test]
    fn wire_json_round_trips_through_bytes() {
        let v = Value::string("Ada");
        assert_eq!(v.to_wire_json().unwrap(), Json::String("Ada".to_string()));
    }
}
