//! Accumulated middleware data.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// Open key → value bag threaded through one request's middleware chain.
///
/// Merging is shallow: keys from the newer bag overwrite older ones.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Data(Map<String, Value>);

impl Data {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Deserialize the value under `key` into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.0
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Shallow-merge `other` into `self`.
    pub fn merge(&mut self, other: Data) {
        for (key, value) in other.0 {
            self.0.insert(key, value);
        }
    }

    /// Build a bag from any value serializing to a JSON object.
    ///
    /// Non-object values yield `None`.
    pub fn from_serialize<T: Serialize>(value: &T) -> Option<Self> {
        match serde_json::to_value(value).ok()? {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }
}

impl From<Map<String, Value>> for Data {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
