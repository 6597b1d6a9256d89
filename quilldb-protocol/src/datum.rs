//! The Datum tagged union: wire representation of a single value.
//!
//! Each node carries exactly one populated variant. Integers travel as
//! decimal strings so no precision is lost in transit; binary data travels
//! hex-encoded. Decoding is total over the wire format: an absent, empty, or
//! unrecognized variant decodes to `Null`, never an error.

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// A single scalar or composite wire value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Datum {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Binary(Vec<u8>),
    Object(BTreeMap<String, Datum>),
    Array(Vec<Datum>),
}

impl Datum {
    /// Converts the datum to its tagged wire form.
    pub fn to_wire(&self) -> Value {
        match self {
            Datum::Null => Value::Null,
            Datum::Bool(b) => json!({ "bool": b }),
            Datum::Int(i) => json!({ "int": i.to_string() }),
            Datum::Float(f) => json!({ "float": f }),
            Datum::String(s) => json!({ "string": s }),
            Datum::Binary(b) => json!({ "binary": hex::encode(b) }),
            Datum::Object(fields) => {
                let map: Map<String, Value> = fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_wire()))
                    .collect();
                json!({ "object": map })
            }
            Datum::Array(items) => {
                let list: Vec<Value> = items.iter().map(Datum::to_wire).collect();
                json!({ "array": list })
            }
        }
    }

    /// Decodes a datum from its tagged wire form.
    ///
    /// Total: anything that is not a recognized single-variant object
    /// decodes to `Null`.
    pub fn from_wire(value: &Value) -> Datum {
        let obj = match value {
            Value::Object(obj) => obj,
            _ => return Datum::Null,
        };

        // Exactly one populated variant per node; the first recognized
        // key wins, everything else is treated as empty.
        if let Some(b) = obj.get("bool").and_then(Value::as_bool) {
            return Datum::Bool(b);
        }
        if let Some(v) = obj.get("int") {
            let parsed = match v {
                Value::String(s) => s.parse::<i64>().ok(),
                other => other.as_i64(),
            };
            return parsed.map(Datum::Int).unwrap_or(Datum::Null);
        }
        if let Some(f) = obj.get("float").and_then(Value::as_f64) {
            return Datum::Float(f);
        }
        if let Some(s) = obj.get("string").and_then(Value::as_str) {
            return Datum::String(s.to_string());
        }
        if let Some(h) = obj.get("binary").and_then(Value::as_str) {
            return hex::decode(h).map(Datum::Binary).unwrap_or(Datum::Null);
        }
        if let Some(Value::Object(fields)) = obj.get("object") {
            return Datum::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), Datum::from_wire(v)))
                    .collect(),
            );
        }
        if let Some(Value::Array(items)) = obj.get("array") {
            return Datum::Array(items.iter().map(Datum::from_wire).collect());
        }
        Datum::Null
    }

    /// Builds a datum from a native JSON value.
    pub fn from_json(value: &Value) -> Datum {
        match value {
            Value::Null => Datum::Null,
            Value::Bool(b) => Datum::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Datum::Int(i)
                } else {
                    Datum::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            Value::String(s) => Datum::String(s.clone()),
            Value::Array(items) => Datum::Array(items.iter().map(Datum::from_json).collect()),
            Value::Object(fields) => Datum::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), Datum::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Converts the datum into a native JSON value.
    ///
    /// Binary data becomes a hex string; a non-finite float becomes null.
    pub fn into_json(self) -> Value {
        match self {
            Datum::Null => Value::Null,
            Datum::Bool(b) => Value::Bool(b),
            Datum::Int(i) => Value::from(i),
            Datum::Float(f) => serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Datum::String(s) => Value::String(s),
            Datum::Binary(b) => Value::String(hex::encode(b)),
            Datum::Object(fields) => Value::Object(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, v.into_json()))
                    .collect(),
            ),
            Datum::Array(items) => {
                Value::Array(items.into_iter().map(Datum::into_json).collect())
            }
        }
    }
}

impl Serialize for Datum {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_wire().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Datum {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Datum::from_wire(&value))
    }
}
