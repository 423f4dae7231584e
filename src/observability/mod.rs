// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Structured logging for the lattice.
//!
//! Diagnostic text is not written inline at call sites. Each event has a
//! small message struct with a `Display` implementation and a
//! [`StructuredLog`](messages::StructuredLog) implementation that picks the
//! level and attaches the fields:
//!
//! * `messages::space` - dimensions, templates, sweeps and persistence
//! * `messages::processor` - processor lifecycle, graphs and external commands
//! * `messages::cache` - cache lookups, hits, misses and ledger writes
//! * `messages::protocol` - connections, replication, commands and barriers
//!
//! # Usage
//!
//! ```rust
//! use the_lattice::observability::messages::processor::ProcessorFailed;
//! use the_lattice::observability::messages::StructuredLog;
//!
//! let msg = ProcessorFailed {
//!     processor_id: "render",
//!     reason: "exit status 2",
//! };
//!
//! msg.log();
//! ```
//!
//! Subscribers are installed by the binary only; the library never
//! initialises a global subscriber.

pub mod messages;
