// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;
use thiserror::Error;

use crate::errors::{CacheError, SpaceError};

/// Errors that can occur during configuration validation
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A circular dependency was detected in the processor graph
    CyclicDependency {
        /// The cycle path showing the circular dependency
        cycle: Vec<String>,
    },
    /// A processor references a dependency that doesn't exist
    UnresolvedDependency {
        /// The processor that has the unresolved dependency
        processor_id: String,
        /// The dependency that couldn't be resolved
        missing_dependency: String,
    },
    /// A processor has a duplicate ID
    DuplicateProcessorId {
        /// The duplicate processor ID
        processor_id: String,
    },
    /// Two dimensions share the same (name, group) key
    DuplicateDimension { name: String, group: String },
    /// The sweep section names a dimension the space does not declare
    UnknownSweepDimension { name: String },
    /// A command processor has no program to run
    MissingProgram { processor_id: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::CyclicDependency { cycle } => {
                write!(f, "Cyclic dependency detected: {}", cycle.join(" -> "))
            }
            ValidationError::UnresolvedDependency {
                processor_id,
                missing_dependency,
            } => {
                write!(
                    f,
                    "Processor '{}' depends on '{}' which does not exist",
                    processor_id, missing_dependency
                )
            }
            ValidationError::DuplicateProcessorId { processor_id } => {
                write!(f, "Duplicate processor ID: '{}'", processor_id)
            }
            ValidationError::DuplicateDimension { name, group } => {
                write!(f, "Duplicate dimension: '{}' in group '{}'", name, group)
            }
            ValidationError::UnknownSweepDimension { name } => {
                write!(f, "Sweep references unknown dimension '{}'", name)
            }
            ValidationError::MissingProgram { processor_id } => {
                write!(f, "Command processor '{}' has no program", processor_id)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Errors raised while loading a configuration file or building a runtime from it.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration validation failed:\n{}", join_validation(.0))]
    Validation(Vec<ValidationError>),

    #[error("Dimension '{dimension}' has a value that is not a valid {expected}: {value}")]
    InvalidValue {
        dimension: String,
        expected: String,
        value: String,
    },

    #[error(transparent)]
    Space(#[from] SpaceError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

fn join_validation(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
