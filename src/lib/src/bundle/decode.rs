//! CBOR node helpers for bundle decoding

use crate::error::FccError;
use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use serde_cbor::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Top-level bundle map, in wire order.
///
/// Decoded as a list of entries so duplicate keys survive and are caught by
/// the group-count check.
#[derive(Debug, Default)]
pub struct BundleMap {
    pub entries: Vec<(Value, Value)>,
}

impl BundleMap {
    pub fn decode(blob: &[u8]) -> Result<Self, FccError> {
        Ok(serde_cbor::from_slice(blob)?)
    }

    /// First value stored under the text key `name`
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.iter().find_map(|(key, value)| match key {
            Value::Text(key) if key == name => Some(value),
            _ => None,
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Encoded node count: one key plus one value per entry
    pub fn node_count(&self) -> usize {
        self.entries.len() * 2
    }
}

impl<'de> Deserialize<'de> for BundleMap {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct BundleMapVisitor;

        impl<'de> Visitor<'de> for BundleMapVisitor {
            type Value = BundleMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a bundle map")
            }

            fn visit_map<A>(self, mut access: A) -> Result<BundleMap, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0).min(16));
                while let Some(entry) = access.next_entry::<Value, Value>()? {
                    entries.push(entry);
                }
                Ok(BundleMap { entries })
            }
        }

        deserializer.deserialize_map(BundleMapVisitor)
    }
}

pub fn as_array(value: &Value) -> Result<&[Value], FccError> {
    match value {
        Value::Array(items) => Ok(items),
        _ => Err(FccError::BundleInvalidGroup),
    }
}

pub fn as_map(value: &Value) -> Result<&BTreeMap<Value, Value>, FccError> {
    match value {
        Value::Map(map) => Ok(map),
        _ => Err(FccError::BundleMalformed),
    }
}

pub fn as_bytes(value: &Value) -> Result<&[u8], FccError> {
    match value {
        Value::Bytes(bytes) => Ok(bytes),
        _ => Err(FccError::BundleMalformed),
    }
}

/// Text or byte string, as bytes
pub fn as_string_bytes(value: &Value) -> Result<&[u8], FccError> {
    match value {
        Value::Text(text) => Ok(text.as_bytes()),
        Value::Bytes(bytes) => Ok(bytes),
        _ => Err(FccError::BundleMalformed),
    }
}

pub fn as_text(value: &Value) -> Result<&str, FccError> {
    match value {
        Value::Text(text) => Ok(text),
        _ => Err(FccError::BundleMalformed),
    }
}

/// Unsigned integer that fits in 32 bits
pub fn as_u32(value: &Value) -> Result<u32, FccError> {
    match value {
        Value::Integer(n) => u32::try_from(*n).map_err(|_| FccError::BundleMalformed),
        _ => Err(FccError::BundleMalformed),
    }
}

pub fn as_u64(value: &Value) -> Result<u64, FccError> {
    match value {
        Value::Integer(n) => u64::try_from(*n).map_err(|_| FccError::BundleMalformed),
        _ => Err(FccError::BundleMalformed),
    }
}

pub fn field<'a>(map: &'a BTreeMap<Value, Value>, name: &str) -> Option<&'a Value> {
    map.get(&Value::Text(name.to_string()))
}

pub fn required_field<'a>(
    map: &'a BTreeMap<Value, Value>,
    name: &str,
) -> Result<&'a Value, FccError> {
    field(map, name).ok_or_else(|| {
        log::error!("Bundle item is missing its {} field", name);
        FccError::BundleMalformed
    })
}
