// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::path::PathBuf;
use thiserror::Error;

/// Errors from the cache ledger and artifact store.
#[derive(Debug, Error)]
pub enum CacheError {
    /// A processor declared an output file that was not produced.
    #[error("Declared output file is missing: {0}")]
    MissingOutput(PathBuf),

    #[error("Cache ledger is unreadable: {0}")]
    CorruptLedger(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
