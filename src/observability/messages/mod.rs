// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for structured logging, organized by subsystem.
//!
//! * `space` - dimension registration, template resolution, sweeps
//! * `processor` - processor and graph execution
//! * `cache` - fingerprint cache decisions and ledger I/O
//! * `protocol` - network replication and barrier synchronization

use tracing::Span;

pub mod cache;
pub mod processor;
pub mod protocol;
pub mod space;

/// A log message that knows its own level and structured fields.
pub trait StructuredLog {
    /// Emit the message as a `tracing` event.
    fn log(&self);

    /// Open a span carrying the message's fields.
    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("lattice", span_name = name)
    }
}
