// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Structural fingerprint of a processor run.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::engine::Configuration;
use crate::space::{Dimension, VariantValue};
use crate::utils::files::{crc32_file, modified_timestamp};

/// One named, typed value in a fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceArgument {
    pub id: String,
    pub value: VariantValue,
}

impl SourceArgument {
    pub fn new(id: impl Into<String>, value: VariantValue) -> Self {
        Self { id: id.into(), value }
    }
}

/// A file on disk as it was when recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDependency {
    pub path: String,
    pub modified: String,
    pub size: u64,
    pub hash: u32,
}

impl FileDependency {
    /// Record `path`, storing `recorded_as` as its path.
    pub fn capture(path: &Path, recorded_as: impl Into<String>) -> std::io::Result<Self> {
        Ok(Self {
            path: recorded_as.into(),
            modified: modified_timestamp(path)?,
            size: std::fs::metadata(path)?.len(),
            hash: crc32_file(path)?,
        })
    }

    /// Same size and content hash as the file now at `path`.
    pub fn matches_file(&self, path: &Path) -> bool {
        let Ok(metadata) = std::fs::metadata(path) else {
            return false;
        };
        metadata.len() == self.size && crc32_file(path).map(|h| h == self.hash).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub processor_type: String,
    pub processor_id: String,
    pub command_line_arguments: String,
    pub working_path: String,
    pub arguments: Vec<SourceArgument>,
    pub dependencies: Vec<SourceArgument>,
    #[serde(default)]
    pub file_dependencies: Vec<FileDependency>,
}

impl SourceInfo {
    pub fn new(processor_type: impl Into<String>, processor_id: impl Into<String>) -> Self {
        Self {
            processor_type: processor_type.into(),
            processor_id: processor_id.into(),
            ..Self::default()
        }
    }

    pub fn with_arguments(mut self, configuration: &Configuration) -> Self {
        self.arguments = configuration
            .iter()
            .map(|(key, value)| SourceArgument::new(key.clone(), value.clone()))
            .collect();
        self
    }

    /// Record each dimension's current value under its key.
    pub fn with_dependencies(mut self, dimensions: &[std::sync::Arc<Dimension>]) -> Self {
        for dimension in dimensions {
            let id = dimension.key().to_string();
            if self.dependencies.iter().any(|d| d.id == id) {
                continue;
            }
            if let Some(value) = dimension.current_value() {
                self.dependencies.push(SourceArgument::new(id, value));
            }
        }
        self
    }

    pub fn with_command_line(mut self, command_line: impl Into<String>) -> Self {
        self.command_line_arguments = command_line.into();
        self
    }

    pub fn with_working_path(mut self, path: &Path) -> Self {
        self.working_path = path.to_string_lossy().into_owned();
        self
    }

    /// Record the input files; unreadable ones are skipped.
    pub fn with_input_files(mut self, paths: &[std::path::PathBuf]) -> Self {
        self.file_dependencies = paths
            .iter()
            .filter_map(|path| FileDependency::capture(path, path.to_string_lossy()).ok())
            .collect();
        self
    }

    /// Two runs are the same iff type, id, command line, ordered arguments
    /// and ordered dependencies are equal, and the input files have the
    /// same content.
    pub fn matches(&self, other: &SourceInfo) -> bool {
        self.processor_type == other.processor_type
            && self.processor_id == other.processor_id
            && self.command_line_arguments == other.command_line_arguments
            && self.arguments == other.arguments
            && self.dependencies == other.dependencies
            && self.file_dependencies.len() == other.file_dependencies.len()
            && self
                .file_dependencies
                .iter()
                .zip(&other.file_dependencies)
                .all(|(a, b)| a.path == b.path && a.size == b.size && a.hash == b.hash)
    }

    /// CRC32 over the identifying fields, input file contents included.
    pub fn fingerprint(&self) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(self.processor_type.as_bytes());
        hasher.update(&[0]);
        hasher.update(self.processor_id.as_bytes());
        hasher.update(&[0]);
        hasher.update(self.command_line_arguments.as_bytes());
        for argument in self.arguments.iter().chain(&self.dependencies) {
            hasher.update(&[0]);
            hasher.update(argument.id.as_bytes());
            hasher.update(&[b'=']);
            hasher.update(argument.value.to_string().as_bytes());
        }
        for file in &self.file_dependencies {
            hasher.update(&[0]);
            hasher.update(file.path.as_bytes());
            hasher.update(&file.size.to_le_bytes());
            hasher.update(&file.hash.to_le_bytes());
        }
        hasher.finalize()
    }

    /// Short text built from the argument values, safe for file names.
    pub fn argument_prefix(&self, max_len: usize) -> String {
        let joined = self
            .arguments
            .iter()
            .map(|argument| argument.value.to_filename_component())
            .collect::<Vec<_>>()
            .join("_");
        let prefix: String = joined.chars().take(max_len).collect();
        if prefix.is_empty() {
            "run".to_string()
        } else {
            prefix
        }
    }
}
