// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use parking_lot::RwLock;
use serde_json::{json, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::errors::SpaceError;
use crate::space::{IndexOverrides, ParameterSpace};
use crate::utils::files::write_atomic;

/// COMMAND name that asks a pool's owner for a slice. Arguments `field` and
/// `dimension`; the reply carries `path`.
pub const CREATE_DATA_SLICE_COMMAND: &str = "create_data_slice";

/// Data files spread over the run directories of a parameter space.
///
/// A slice fixes every dimension but one at its current index and collects a
/// single field from each run directory along the remaining dimension. Slices
/// are written once per position into the slice cache directory and served
/// from there afterwards.
pub struct DataPool {
    id: String,
    space: Arc<ParameterSpace>,
    data_files: RwLock<Vec<String>>,
    slice_cache_directory: RwLock<PathBuf>,
}

impl DataPool {
    pub fn new(id: impl Into<String>, space: Arc<ParameterSpace>, slice_cache_directory: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            space,
            data_files: RwLock::new(Vec::new()),
            slice_cache_directory: RwLock::new(slice_cache_directory.into()),
        }
    }

    /// JSON files inside each run directory, searched in order for a field.
    pub fn with_data_files<I, S>(self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.data_files.write() = files.into_iter().map(Into::into).collect();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn space(&self) -> &Arc<ParameterSpace> {
        &self.space
    }

    pub fn data_files(&self) -> Vec<String> {
        self.data_files.read().clone()
    }

    pub fn set_data_files(&self, files: Vec<String>) {
        *self.data_files.write() = files;
    }

    pub fn slice_cache_directory(&self) -> PathBuf {
        self.slice_cache_directory.read().clone()
    }

    pub fn set_slice_cache_directory(&self, directory: impl Into<PathBuf>) {
        *self.slice_cache_directory.write() = directory.into();
    }

    /// Build (or reuse) the slice of `field` along `dimension` at the current
    /// position of every other dimension. Returns the slice file.
    pub fn create_data_slice(&self, field: &str, dimension: &str) -> Result<PathBuf, SpaceError> {
        let along = self
            .space
            .find_dimension(dimension)
            .ok_or_else(|| SpaceError::UnknownDimension(dimension.to_string()))?;

        let position = self
            .space
            .dimensions()
            .iter()
            .filter(|d| d.key() != along.key())
            .map(|d| format!("{}={}", d.key(), d.current_index()))
            .collect::<Vec<_>>()
            .join(";");
        let fingerprint = crc32fast::hash(format!("{}|{}|{}", field, along.key(), position).as_bytes());
        let target = self.slice_cache_directory().join(format!(
            "{}_{}_{:08x}.json",
            sanitize(field),
            sanitize(along.name()),
            fingerprint
        ));
        if target.is_file() {
            return Ok(target);
        }

        let root = self.space.root_path();
        let mut coordinates = Vec::with_capacity(along.size());
        let mut values = Vec::with_capacity(along.size());
        let mut found = false;
        for index in 0..along.size() {
            let mut overrides = IndexOverrides::new();
            overrides.insert(along.key().clone(), index);
            coordinates.push(along.value_at(index).map(|v| v.to_json()).unwrap_or(Value::Null));
            let value = self
                .space
                .generate_relative_run_path(&overrides)
                .and_then(|relative| self.read_field(&root.join(relative), field));
            found |= value.is_some();
            values.push(value.unwrap_or(Value::Null));
        }
        if !found {
            return Err(SpaceError::EmptySlice {
                field: field.to_string(),
                dimension: along.key().to_string(),
            });
        }

        let document = json!({
            "field": field,
            "dimension": along.name(),
            "coordinates": coordinates,
            "values": values,
        });
        write_atomic(&target, &serde_json::to_vec_pretty(&document)?)?;
        Ok(target)
    }

    fn read_field(&self, directory: &Path, field: &str) -> Option<Value> {
        self.data_files.read().iter().find_map(|file| {
            let bytes = std::fs::read(directory.join(file)).ok()?;
            let document: Value = serde_json::from_slice(&bytes).ok()?;
            document.get(field).cloned()
        })
    }
}

fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

impl fmt::Debug for DataPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataPool")
            .field("id", &self.id)
            .field("space", &self.space.id())
            .field("slice_cache_directory", &self.slice_cache_directory())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::{Dimension, ValueType, VariantValue};

    fn pool_over_grid(root: &Path) -> DataPool {
        let space = Arc::new(ParameterSpace::new("grid"));
        space.set_root_path(root);
        space.set_path_template("x_%%x:INDEX%%/y_%%y:INDEX%%");
        for (name, values) in [("x", vec![1, 2, 3]), ("y", vec![10, 20])] {
            let dim = Dimension::new(name, "", ValueType::Int32);
            dim.set_values(values.into_iter().map(VariantValue::Int32).collect()).unwrap();
            space.register_dimension(Arc::new(dim)).unwrap();
        }
        for xi in 0..3 {
            for yi in 0..2 {
                let dir = root.join(format!("x_{}/y_{}", xi, yi));
                std::fs::create_dir_all(&dir).unwrap();
                let energy = (xi + 1) * (yi + 1) * 10;
                std::fs::write(dir.join("data.json"), format!("{{\"energy\": {}}}", energy)).unwrap();
            }
        }
        DataPool::new("pool", space, root.join("slices")).with_data_files(["missing.json", "data.json"])
    }

    #[test]
    fn slice_collects_a_field_along_one_dimension() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool_over_grid(dir.path());
        pool.space().find_dimension("y").unwrap().set_current_index(1);

        let path = pool.create_data_slice("energy", "x").unwrap();
        let slice: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(slice["values"], json!([20, 40, 60]));
        assert_eq!(slice["coordinates"], json!([1, 2, 3]));
        assert!(path.starts_with(dir.path().join("slices")));
    }

    #[test]
    fn slices_are_reused_per_position() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool_over_grid(dir.path());

        let first = pool.create_data_slice("energy", "x").unwrap();
        std::fs::remove_dir_all(dir.path().join("x_0")).unwrap();
        assert_eq!(pool.create_data_slice("energy", "x").unwrap(), first);

        pool.space().find_dimension("y").unwrap().set_current_index(1);
        assert_ne!(pool.create_data_slice("energy", "x").unwrap(), first);
    }

    #[test]
    fn unknown_dimension_and_missing_field_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool_over_grid(dir.path());
        assert!(matches!(
            pool.create_data_slice("energy", "z"),
            Err(SpaceError::UnknownDimension(_))
        ));
        assert!(matches!(
            pool.create_data_slice("pressure", "x"),
            Err(SpaceError::EmptySlice { .. })
        ));
    }
}
