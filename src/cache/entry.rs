// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::source_info::{FileDependency, SourceInfo};

/// One output file held by the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedFile {
    /// The copy inside the cache directory; `path` is cache-relative.
    pub cache_file: FileDependency,
    /// File name the processor produced.
    pub original_name: String,
}

/// A ledger record. Entries are only ever appended or flagged stale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub timestamp_start: DateTime<Utc>,
    pub timestamp_end: DateTime<Utc>,
    pub files: Vec<CachedFile>,
    #[serde(default)]
    pub user_info: String,
    pub source_info: SourceInfo,
    #[serde(default)]
    pub stale: bool,
}
