// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Per-run configuration: an insertion-ordered map of typed values.
//!
//! Order matters: it is the argument order recorded in cache fingerprints.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::space::{FromVariant, VariantValue};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Configuration {
    entries: Vec<(String, VariantValue)>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `key`. Replacing keeps the key's original position.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<VariantValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<VariantValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&VariantValue> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    /// Typed lookup.
    pub fn get_as<T: FromVariant>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|value| value.get::<T>())
    }

    pub fn remove(&mut self, key: &str) -> Option<VariantValue> {
        let position = self.entries.iter().position(|(existing, _)| existing == key)?;
        Some(self.entries.remove(position).1)
    }

    /// Apply every entry of `other` on top of this configuration.
    pub fn merge(&mut self, other: &Configuration) {
        for (key, value) in other.iter() {
            self.set(key.clone(), value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, VariantValue)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Plain JSON object (`{"key": value}`) for consumption by external
    /// programs. Unlike the serde form, values carry no type tags.
    pub fn to_plain_json(&self) -> serde_json::Value {
        let map = self
            .entries
            .iter()
            .map(|(key, value)| (key.clone(), value.to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}

impl Serialize for Configuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl FromIterator<(String, VariantValue)> for Configuration {
    fn from_iter<I: IntoIterator<Item = (String, VariantValue)>>(iter: I) -> Self {
        let mut configuration = Configuration::new();
        for (key, value) in iter {
            configuration.set(key, value);
        }
        configuration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replacing_a_key_keeps_its_position() {
        let mut config = Configuration::new().with("a", 1.0).with("b", "x");
        config.set("a", 2.0);

        let keys: Vec<&str> = config.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(config.get_as::<f64>("a"), Some(2.0));
    }

    #[test]
    fn plain_json_drops_type_tags() {
        let config = Configuration::new().with("dim1", 0.5).with("label", "C");
        assert_eq!(
            config.to_plain_json(),
            serde_json::json!({"dim1": 0.5, "label": "C"})
        );
    }

    #[test]
    fn serialized_form_is_a_tagged_map() {
        let config = Configuration::new().with("n", 3i32);
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json, serde_json::json!({"n": {"type": "int32", "value": 3}}));
    }
}
