// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for the fingerprint cache.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};

/// Cached outputs were restored instead of running the processor.
///
/// # Log Level
/// `info!` - A run was avoided
pub struct CacheHit<'a> {
    pub processor_id: &'a str,
    pub fingerprint: u32,
    pub files: usize,
}

impl Display for CacheHit<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Cache hit for '{}' ({:08x}): restored {} file(s)",
            self.processor_id, self.fingerprint, self.files
        )
    }
}

impl StructuredLog for CacheHit<'_> {
    fn log(&self) {
        tracing::info!(
            processor_id = self.processor_id,
            fingerprint = self.fingerprint,
            files = self.files,
            "{}", self
        );
    }
}

/// No usable entry; the processor will run.
///
/// # Log Level
/// `debug!` - Expected on every first run
pub struct CacheMiss<'a> {
    pub processor_id: &'a str,
    pub fingerprint: u32,
}

impl Display for CacheMiss<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Cache miss for '{}' ({:08x})", self.processor_id, self.fingerprint)
    }
}

impl StructuredLog for CacheMiss<'_> {
    fn log(&self) {
        tracing::debug!(
            processor_id = self.processor_id,
            fingerprint = self.fingerprint,
            "{}", self
        );
    }
}

/// A matching entry was rejected by hash validation.
///
/// # Log Level
/// `warn!` - A file changed outside the cache
pub struct CacheValidationFailed<'a> {
    pub file: &'a std::path::Path,
    pub reason: &'a str,
}

impl Display for CacheValidationFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Cached file {} rejected: {}",
            self.file.display(),
            self.reason
        )
    }
}

impl StructuredLog for CacheValidationFailed<'_> {
    fn log(&self) {
        tracing::warn!(file = %self.file.display(), reason = self.reason, "{}", self);
    }
}

/// A new entry was appended to the ledger.
///
/// # Log Level
/// `debug!` - Routine bookkeeping
pub struct CacheEntryStored<'a> {
    pub processor_id: &'a str,
    pub fingerprint: u32,
    pub files: usize,
    pub entries: usize,
}

impl Display for CacheEntryStored<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Cached {} file(s) for '{}' ({:08x}); ledger holds {} entries",
            self.files, self.processor_id, self.fingerprint, self.entries
        )
    }
}

impl StructuredLog for CacheEntryStored<'_> {
    fn log(&self) {
        tracing::debug!(
            processor_id = self.processor_id,
            fingerprint = self.fingerprint,
            files = self.files,
            entries = self.entries,
            "{}", self
        );
    }
}

/// Cache I/O failed; the caller falls back to running uncached.
///
/// # Log Level
/// `warn!` - Correctness is kept, the cache is bypassed
///
/// # Example
/// ```
/// use the_lattice::observability::messages::cache::CacheUnavailable;
///
/// let error = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
/// let msg = CacheUnavailable {
///     operation: "store",
///     error: &error,
/// };
///
/// assert_eq!(msg.to_string(), "Cache store failed, running uncached: disk full");
/// ```
pub struct CacheUnavailable<'a> {
    pub operation: &'a str,
    pub error: &'a dyn Display,
}

impl Display for CacheUnavailable<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Cache {} failed, running uncached: {}",
            self.operation, self.error
        )
    }
}

impl StructuredLog for CacheUnavailable<'_> {
    fn log(&self) {
        tracing::warn!(operation = self.operation, error = %self.error, "{}", self);
    }
}
