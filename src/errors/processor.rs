// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Errors raised inside a processor run. They are logged and turned into a
/// failed run at the processor boundary.
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' exited with {status}")]
    ExitStatus { program: String, status: String },

    #[error("'{program}' did not finish within {after:?}")]
    Timeout {
        program: String,
        after: std::time::Duration,
    },

    #[error("Processor produced no output file '{0}'")]
    MissingOutput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
