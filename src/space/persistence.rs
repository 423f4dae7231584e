// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! JSON persistence of a parameter space.
//!
//! Dimensions are grouped by their representation:
//!
//! ```text
//! {
//!   "space_id": "s",
//!   "internal_dimensions": [ { "name": "dim1", "group": "", "type": "double",
//!                              "values": [0.1, 0.2], "current_index": 0, "stride": 1 } ],
//!   "index_dimensions":    [ ... ],
//!   "mapped_dimensions":   [ { ..., "ids": ["A", "B"] } ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::errors::SpaceError;
use crate::observability::messages::space::PersistenceFailed;
use crate::observability::messages::StructuredLog;
use crate::space::dimension::{Dimension, Representation};
use crate::space::parameter_space::ParameterSpace;
use crate::space::value::{ValueType, VariantValue};
use crate::utils::files::write_atomic;

#[derive(Debug, Default, Serialize, Deserialize)]
struct SpaceDocument {
    #[serde(default)]
    space_id: String,
    #[serde(default)]
    internal_dimensions: Vec<DimensionRecord>,
    #[serde(default)]
    index_dimensions: Vec<DimensionRecord>,
    #[serde(default)]
    mapped_dimensions: Vec<DimensionRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DimensionRecord {
    name: String,
    #[serde(default)]
    group: String,
    #[serde(rename = "type")]
    value_type: ValueType,
    values: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    ids: Vec<String>,
    #[serde(default)]
    current_index: usize,
    #[serde(default = "default_stride")]
    stride: usize,
}

fn default_stride() -> usize {
    1
}

impl DimensionRecord {
    fn capture(dimension: &Dimension) -> Self {
        Self {
            name: dimension.name().to_string(),
            group: dimension.group().to_string(),
            value_type: dimension.value_type(),
            values: dimension.values().iter().map(VariantValue::to_json).collect(),
            ids: dimension.ids(),
            current_index: dimension.current_index(),
            stride: dimension.stride(),
        }
    }

    fn into_dimension(self, representation: Representation) -> Result<Dimension, SpaceError> {
        let values = self
            .values
            .iter()
            .map(|json| {
                VariantValue::from_json(self.value_type, json).ok_or_else(|| {
                    SpaceError::InvalidPersistence(format!(
                        "dimension '{}': {} is not a {} value",
                        self.name,
                        json,
                        self.value_type.as_str()
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let dimension = Dimension::new(self.name, self.group, self.value_type);
        dimension.set_values(values)?;
        if !self.ids.is_empty() {
            dimension.set_ids(self.ids)?;
        }
        dimension.set_representation(representation);
        dimension.set_stride(self.stride);
        dimension.set_current_index(self.current_index);
        Ok(dimension)
    }
}

impl ParameterSpace {
    /// Write every dimension of the space to `path`.
    pub fn save(&self, path: &Path) -> Result<(), SpaceError> {
        let mut document = SpaceDocument {
            space_id: self.id().to_string(),
            ..SpaceDocument::default()
        };
        for dimension in self.dimensions() {
            match dimension.representation() {
                Representation::Value => document
                    .internal_dimensions
                    .push(DimensionRecord::capture(&dimension)),
                Representation::Index => document
                    .index_dimensions
                    .push(DimensionRecord::capture(&dimension)),
                Representation::Id => document
                    .mapped_dimensions
                    .push(DimensionRecord::capture(&dimension)),
            }
        }
        let json = serde_json::to_vec_pretty(&document)?;
        write_atomic(path, &json)?;
        Ok(())
    }

    /// Register every dimension stored in `path`. Dimensions that already
    /// exist are overwritten in place. Returns the number of dimensions read.
    pub fn load(&self, path: &Path) -> Result<usize, SpaceError> {
        let content = fs::read(path)?;
        let document: SpaceDocument = serde_json::from_slice(&content)?;

        let groups = [
            (document.internal_dimensions, Representation::Value),
            (document.index_dimensions, Representation::Index),
            (document.mapped_dimensions, Representation::Id),
        ];
        let mut dimensions = Vec::new();
        for (records, representation) in groups {
            for record in records {
                dimensions.push(record.into_dimension(representation)?);
            }
        }

        let count = dimensions.len();
        for dimension in dimensions {
            let incoming = Arc::new(dimension);
            let active = self.register_dimension(incoming.clone())?;
            if !Arc::ptr_eq(&active, &incoming) {
                active.set_representation(incoming.representation());
                active.set_stride(incoming.stride());
                active.set_current_index(incoming.current_index());
            }
        }
        Ok(count)
    }

    pub fn write_to_file(&self, path: &Path) -> bool {
        match self.save(path) {
            Ok(()) => true,
            Err(error) => {
                PersistenceFailed {
                    space_id: self.id(),
                    path,
                    operation: "write",
                    error: &error,
                }
                .log();
                false
            }
        }
    }

    pub fn read_from_file(&self, path: &Path) -> bool {
        match self.load(path) {
            Ok(_) => true,
            Err(error) => {
                PersistenceFailed {
                    space_id: self.id(),
                    path,
                    operation: "read",
                    error: &error,
                }
                .log();
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_are_grouped_by_representation() {
        let space = ParameterSpace::new("s");
        let a = space.new_dimension("a", "", ValueType::Double);
        a.set_values(vec![VariantValue::Double(1.5)]).unwrap();
        let b = space.new_dimension("b", "g", ValueType::Int32);
        b.set_values(vec![VariantValue::Int32(1), VariantValue::Int32(2)]).unwrap();
        b.set_ids(vec!["one".into(), "two".into()]).unwrap();
        b.set_representation(Representation::Id);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("space.json");
        space.save(&path).unwrap();

        let json: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(json["internal_dimensions"][0]["values"], serde_json::json!([1.5]));
        assert_eq!(json["mapped_dimensions"][0]["ids"], serde_json::json!(["one", "two"]));
        assert_eq!(json["mapped_dimensions"][0]["type"], "int32");
        assert!(json["index_dimensions"].as_array().unwrap().is_empty());
    }

    #[test]
    fn ids_survive_a_round_trip_in_every_representation() {
        let space = ParameterSpace::new("s");
        let by_value = space.new_dimension("v", "", ValueType::Double);
        by_value
            .set_values(vec![VariantValue::Double(0.1), VariantValue::Double(0.2)])
            .unwrap();
        by_value.set_ids(vec!["A".into(), "B".into()]).unwrap();
        by_value.set_current_index(1);
        let by_index = space.new_dimension("i", "", ValueType::Int32);
        by_index.set_values(vec![VariantValue::Int32(7)]).unwrap();
        by_index.set_ids(vec!["seven".into()]).unwrap();
        by_index.set_representation(Representation::Index);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("space.json");
        assert!(space.write_to_file(&path));

        let reloaded = ParameterSpace::new("s");
        assert!(reloaded.read_from_file(&path));
        let v = reloaded.find_dimension("v").unwrap();
        assert_eq!(v.ids(), vec!["A".to_string(), "B".to_string()]);
        assert_eq!(v.values(), by_value.values());
        assert_eq!(v.current_index(), 1);
        assert_eq!(v.representation(), Representation::Value);
        let i = reloaded.find_dimension("i").unwrap();
        assert_eq!(i.ids(), vec!["seven".to_string()]);
        assert_eq!(i.representation(), Representation::Index);
    }

    #[test]
    fn mistyped_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("space.json");
        fs::write(
            &path,
            r#"{"internal_dimensions": [{"name": "x", "type": "int32", "values": ["nope"]}]}"#,
        )
        .unwrap();

        let space = ParameterSpace::new("s");
        assert!(matches!(space.load(&path), Err(SpaceError::InvalidPersistence(_))));
        assert!(!space.read_from_file(&path));
        assert!(space.is_empty());
    }

    #[test]
    fn missing_file_reports_failure() {
        let space = ParameterSpace::new("s");
        assert!(!space.read_from_file(Path::new("/nonexistent/space.json")));
    }
}
