// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

use crate::space::ValueType;

/// Errors from dimension and parameter space operations.
#[derive(Debug, Error)]
pub enum SpaceError {
    /// A value of the wrong type was handed to a dimension.
    #[error("Dimension '{dimension}' holds {expected:?} values, got {found:?}")]
    TypeMismatch {
        dimension: String,
        expected: ValueType,
        found: ValueType,
    },

    /// The id list must be empty or as long as the value list.
    #[error("Dimension '{dimension}' has {values} values but {ids} ids")]
    IdsLengthMismatch {
        dimension: String,
        values: usize,
        ids: usize,
    },

    #[error("Unknown dimension '{0}'")]
    UnknownDimension(String),

    /// The dimension instance is already active in another space.
    #[error("Dimension '{dimension}' is already registered in space '{space}'")]
    AlreadyAttached { dimension: String, space: String },

    /// No run directory along the slice held the requested field.
    #[error("No data for field '{field}' along '{dimension}'")]
    EmptySlice { field: String, dimension: String },

    #[error("Invalid parameter space file: {0}")]
    InvalidPersistence(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
