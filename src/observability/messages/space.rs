// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for parameter spaces and dimensions.
//!
//! This module contains message types for logging events related to:
//! * Dimension registration and removal
//! * Template token resolution
//! * Sweep lifecycle (start, completion, cancellation)
//! * Space persistence

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A dimension became part of a space, or an existing one was overwritten.
///
/// # Log Level
/// `debug!` - Routine bookkeeping
pub struct DimensionRegistered<'a> {
    pub space_id: &'a str,
    pub dimension: &'a str,
    pub size: usize,
    pub merged: bool,
}

impl Display for DimensionRegistered<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let action = if self.merged { "updated" } else { "registered" };
        write!(
            f,
            "Dimension '{}' {} in space '{}' with {} values",
            self.dimension, action, self.space_id, self.size
        )
    }
}

impl StructuredLog for DimensionRegistered<'_> {
    fn log(&self) {
        tracing::debug!(
            space_id = self.space_id,
            dimension = self.dimension,
            size = self.size,
            merged = self.merged,
            "{}", self
        );
    }
}

/// A dimension could not join a space.
///
/// # Log Level
/// `warn!` - The caller's registration was refused
pub struct DimensionRejected<'a> {
    pub space_id: &'a str,
    pub dimension: &'a str,
    pub reason: &'a dyn Display,
}

impl Display for DimensionRejected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Dimension '{}' rejected by space '{}': {}",
            self.dimension, self.space_id, self.reason
        )
    }
}

impl StructuredLog for DimensionRejected<'_> {
    fn log(&self) {
        tracing::warn!(
            space_id = self.space_id,
            dimension = self.dimension,
            reason = %self.reason,
            "{}", self
        );
    }
}

/// A `%%token%%` could not be resolved and was left in place.
///
/// # Log Level
/// `warn!` - Produces a path that still contains the raw token
///
/// # Example
/// ```
/// use the_lattice::observability::messages::space::TemplateTokenUnresolved;
///
/// let msg = TemplateTokenUnresolved {
///     template: "runs/%%eci,day%%",
///     token: "eci,day",
///     reason: "no common id for 'eci,day'",
/// };
///
/// assert!(msg.to_string().contains("eci,day"));
/// ```
pub struct TemplateTokenUnresolved<'a> {
    pub template: &'a str,
    pub token: &'a str,
    pub reason: &'a str,
}

impl Display for TemplateTokenUnresolved<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Unresolved token '%%{}%%' in template '{}': {}",
            self.token, self.template, self.reason
        )
    }
}

impl StructuredLog for TemplateTokenUnresolved<'_> {
    fn log(&self) {
        tracing::warn!(
            template = self.template,
            token = self.token,
            reason = self.reason,
            "{}", self
        );
    }
}

/// Sweep started over a set of dimensions.
///
/// # Log Level
/// `info!` - Important operational event
pub struct SweepStarted<'a> {
    pub space_id: &'a str,
    pub processor_id: &'a str,
    pub dimensions: &'a [String],
    pub total: usize,
    pub threads: usize,
}

impl Display for SweepStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Sweeping '{}' over [{}] in space '{}': {} points on {} thread(s)",
            self.processor_id,
            self.dimensions.join(", "),
            self.space_id,
            self.total,
            self.threads
        )
    }
}

impl StructuredLog for SweepStarted<'_> {
    fn log(&self) {
        tracing::info!(
            space_id = self.space_id,
            processor_id = self.processor_id,
            total = self.total,
            threads = self.threads,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "sweep",
            span_name = name,
            space_id = self.space_id,
            processor_id = self.processor_id,
            total = self.total,
        )
    }
}

/// Sweep finished, possibly early.
///
/// # Log Level
/// `info!` on success, `warn!` when points failed or the sweep was stopped
pub struct SweepCompleted<'a> {
    pub space_id: &'a str,
    pub processed: usize,
    pub total: usize,
    pub success: bool,
    pub stopped: bool,
    pub duration: std::time::Duration,
}

impl Display for SweepCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let state = match (self.stopped, self.success) {
            (true, _) => "stopped",
            (false, true) => "completed",
            (false, false) => "completed with failures",
        };
        write!(
            f,
            "Sweep in space '{}' {}: {}/{} points in {:?}",
            self.space_id, state, self.processed, self.total, self.duration
        )
    }
}

impl StructuredLog for SweepCompleted<'_> {
    fn log(&self) {
        if self.success && !self.stopped {
            tracing::info!(
                space_id = self.space_id,
                processed = self.processed,
                total = self.total,
                duration_ms = self.duration.as_millis() as u64,
                "{}", self
            );
        } else {
            tracing::warn!(
                space_id = self.space_id,
                processed = self.processed,
                total = self.total,
                stopped = self.stopped,
                duration_ms = self.duration.as_millis() as u64,
                "{}", self
            );
        }
    }
}

/// Sweep could not start.
///
/// # Log Level
/// `error!` - Nothing was run
pub struct SweepRejected<'a> {
    pub space_id: &'a str,
    pub reason: &'a str,
}

impl Display for SweepRejected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Sweep in space '{}' not started: {}", self.space_id, self.reason)
    }
}

impl StructuredLog for SweepRejected<'_> {
    fn log(&self) {
        tracing::error!(space_id = self.space_id, reason = self.reason, "{}", self);
    }
}

/// Reading or writing a persisted space failed.
///
/// # Log Level
/// `error!` - The operation had no effect
pub struct PersistenceFailed<'a> {
    pub space_id: &'a str,
    pub path: &'a std::path::Path,
    pub operation: &'a str,
    pub error: &'a dyn Display,
}

impl Display for PersistenceFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Failed to {} space '{}' at {}: {}",
            self.operation,
            self.space_id,
            self.path.display(),
            self.error
        )
    }
}

impl StructuredLog for PersistenceFailed<'_> {
    fn log(&self) {
        tracing::error!(
            space_id = self.space_id,
            path = %self.path.display(),
            operation = self.operation,
            error = %self.error,
            "{}", self
        );
    }
}
