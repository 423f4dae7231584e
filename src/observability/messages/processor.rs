// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for processor execution and lifecycle events.
//!
//! This module contains message types for logging events related to:
//! * Processor execution lifecycle (start, skip, completion, failure)
//! * Graph composition and child failures
//! * External command launches
//! * Per-run metadata handling

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Processor run started.
///
/// # Log Level
/// `debug!` - Emitted once per run, including every sweep point
pub struct ProcessorStarted<'a> {
    pub processor_id: &'a str,
    pub processor_type: &'a str,
    pub output_directory: &'a std::path::Path,
}

impl Display for ProcessorStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Processor '{}' ({}) started, output in {}",
            self.processor_id,
            self.processor_type,
            self.output_directory.display()
        )
    }
}

impl StructuredLog for ProcessorStarted<'_> {
    fn log(&self) {
        tracing::debug!(
            processor_id = self.processor_id,
            processor_type = self.processor_type,
            output_directory = %self.output_directory.display(),
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "processor",
            span_name = name,
            processor_id = self.processor_id,
            processor_type = self.processor_type,
        )
    }
}

/// Processor run skipped without executing.
///
/// # Log Level
/// `debug!` - Expected when outputs are current or the processor is disabled
pub struct ProcessorSkipped<'a> {
    pub processor_id: &'a str,
    pub reason: &'a str,
}

impl Display for ProcessorSkipped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Processor '{}' skipped: {}", self.processor_id, self.reason)
    }
}

impl StructuredLog for ProcessorSkipped<'_> {
    fn log(&self) {
        tracing::debug!(processor_id = self.processor_id, reason = self.reason, "{}", self);
    }
}

/// Processor run finished.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use the_lattice::observability::messages::processor::ProcessorCompleted;
/// use std::time::Duration;
///
/// let msg = ProcessorCompleted {
///     processor_id: "render",
///     success: true,
///     duration: Duration::from_millis(120),
/// };
///
/// assert!(msg.to_string().contains("render"));
/// ```
pub struct ProcessorCompleted<'a> {
    pub processor_id: &'a str,
    pub success: bool,
    pub duration: std::time::Duration,
}

impl Display for ProcessorCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let outcome = if self.success { "succeeded" } else { "failed" };
        write!(
            f,
            "Processor '{}' {} in {:?}",
            self.processor_id, outcome, self.duration
        )
    }
}

impl StructuredLog for ProcessorCompleted<'_> {
    fn log(&self) {
        tracing::info!(
            processor_id = self.processor_id,
            success = self.success,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }
}

/// Processor failed before or during its run.
///
/// # Log Level
/// `error!` - The run produced no usable output
pub struct ProcessorFailed<'a> {
    pub processor_id: &'a str,
    pub reason: &'a str,
}

impl Display for ProcessorFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Processor '{}' failed: {}", self.processor_id, self.reason)
    }
}

impl StructuredLog for ProcessorFailed<'_> {
    fn log(&self) {
        tracing::error!(processor_id = self.processor_id, reason = self.reason, "{}", self);
    }
}

/// A graph child failed.
///
/// # Log Level
/// `warn!` - Whether the graph continues depends on `ignored`
pub struct GraphChildFailed<'a> {
    pub graph_id: &'a str,
    pub child_id: &'a str,
    pub ignored: bool,
}

impl Display for GraphChildFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        if self.ignored {
            write!(
                f,
                "Child '{}' of graph '{}' failed; failure ignored",
                self.child_id, self.graph_id
            )
        } else {
            write!(f, "Child '{}' of graph '{}' failed", self.child_id, self.graph_id)
        }
    }
}

impl StructuredLog for GraphChildFailed<'_> {
    fn log(&self) {
        tracing::warn!(
            graph_id = self.graph_id,
            child_id = self.child_id,
            ignored = self.ignored,
            "{}", self
        );
    }
}

/// A serial graph stopped before running all of its children.
///
/// # Log Level
/// `warn!` - Remaining children were not run
pub struct GraphHalted<'a> {
    pub graph_id: &'a str,
    pub failed_child: &'a str,
    pub skipped: usize,
}

impl Display for GraphHalted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Graph '{}' halted after '{}' failed; {} child(ren) not run",
            self.graph_id, self.failed_child, self.skipped
        )
    }
}

impl StructuredLog for GraphHalted<'_> {
    fn log(&self) {
        tracing::warn!(
            graph_id = self.graph_id,
            failed_child = self.failed_child,
            skipped = self.skipped,
            "{}", self
        );
    }
}

/// An external program is being launched.
///
/// # Log Level
/// `info!` - Important operational event
pub struct CommandLaunched<'a> {
    pub processor_id: &'a str,
    pub command_line: &'a str,
    pub working_directory: &'a std::path::Path,
}

impl Display for CommandLaunched<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Processor '{}' launching `{}` in {}",
            self.processor_id,
            self.command_line,
            self.working_directory.display()
        )
    }
}

impl StructuredLog for CommandLaunched<'_> {
    fn log(&self) {
        tracing::info!(
            processor_id = self.processor_id,
            command_line = self.command_line,
            working_directory = %self.working_directory.display(),
            "{}", self
        );
    }
}

/// Per-run metadata could not be written next to an output.
///
/// # Log Level
/// `warn!` - The next run will not be able to skip
pub struct MetadataWriteFailed<'a> {
    pub processor_id: &'a str,
    pub output: &'a std::path::Path,
    pub error: &'a dyn Display,
}

impl Display for MetadataWriteFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Processor '{}' could not record run metadata for {}: {}",
            self.processor_id,
            self.output.display(),
            self.error
        )
    }
}

impl StructuredLog for MetadataWriteFailed<'_> {
    fn log(&self) {
        tracing::warn!(
            processor_id = self.processor_id,
            output = %self.output.display(),
            error = %self.error,
            "{}", self
        );
    }
}
