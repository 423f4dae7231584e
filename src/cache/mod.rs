// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Fingerprint cache for processor outputs.
//!
//! A run is identified by its [`SourceInfo`]: processor type and id, the
//! ordered run arguments and the ordered dependency values. When a run with
//! an equal fingerprint is already in the ledger, its cached outputs are
//! copied into place instead of running the processor again.
//!
//! ```text
//! cache_dir/
//!   tinc_cache.json                      ledger: version, entries, files
//!   0.3_C_1a2b3c4d_result.json           <argument prefix>_<crc32>_<name>
//! ```

pub mod entry;
pub mod manager;
pub mod source_info;

pub use entry::{CacheEntry, CachedFile};
pub use manager::{CacheHit, CacheManager};
pub use source_info::{FileDependency, SourceArgument, SourceInfo};
