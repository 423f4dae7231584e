// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Replication of dimensions, parameter spaces, processors, disk buffers and
//! data pools between nodes, plus cross-node barriers.
//!
//! One [`Server`] accepts any number of [`Client`]s. Both sides share the
//! same [`Node`]: a set of object registries and the message handling that
//! keeps them in sync. Every local change to a registered object is
//! broadcast as a CONFIGURE message; changes applied from a peer are relayed
//! to every other peer but never echoed back to the one they came from.
//!
//! ```text
//!   client A ──┐                 ┌── REGISTER / CONFIGURE / REMOVE
//!              ├── server node ──┤
//!   client B ──┘                 └── BARRIER  REQUEST → ACK_LOCK → UNLOCK
//! ```
//!
//! Frames are a 4-byte big-endian length followed by a protobuf
//! [`Envelope`](crate::proto::Envelope).

use std::fmt;

use crate::proto::ObjectType;

pub mod barrier;
pub mod client;
pub mod codec;
pub mod connection;
pub mod convert;
pub mod data_pool;
pub mod disk_buffer;
pub mod node;
pub mod registry;
pub mod root_paths;
pub mod server;

#[cfg(test)]
pub mod integration_tests;

pub use barrier::{BarrierCoordinator, BarrierFollower};
pub use client::Client;
pub use data_pool::DataPool;
pub use disk_buffer::{DiskBuffer, DiskBufferChange, DiskBufferEvent};
pub use node::{CommandHandler, Node, Side};
pub use registry::{Ownership, Registry, Replicated};
pub use root_paths::RootPathMap;
pub use server::Server;

/// Kinds of objects the protocol replicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Parameter,
    ParameterSpace,
    Processor,
    DiskBuffer,
    DataPool,
    /// Every object of every kind; only meaningful in REQUEST.
    Global,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Parameter => "parameter",
            ObjectKind::ParameterSpace => "parameter_space",
            ObjectKind::Processor => "processor",
            ObjectKind::DiskBuffer => "disk_buffer",
            ObjectKind::DataPool => "data_pool",
            ObjectKind::Global => "global",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ObjectKind> for ObjectType {
    fn from(kind: ObjectKind) -> Self {
        match kind {
            ObjectKind::Parameter => ObjectType::Parameter,
            ObjectKind::ParameterSpace => ObjectType::ParameterSpace,
            ObjectKind::Processor => ObjectType::Processor,
            ObjectKind::DiskBuffer => ObjectType::DiskBuffer,
            ObjectKind::DataPool => ObjectType::DataPool,
            ObjectKind::Global => ObjectType::Global,
        }
    }
}

impl From<ObjectType> for ObjectKind {
    fn from(object_type: ObjectType) -> Self {
        match object_type {
            ObjectType::Parameter => ObjectKind::Parameter,
            ObjectType::ParameterSpace => ObjectKind::ParameterSpace,
            ObjectType::Processor => ObjectKind::Processor,
            ObjectType::DiskBuffer => ObjectKind::DiskBuffer,
            ObjectType::DataPool => ObjectKind::DataPool,
            ObjectType::Global => ObjectKind::Global,
        }
    }
}
