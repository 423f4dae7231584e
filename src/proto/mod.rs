// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

// Wire messages exchanged between synchronization nodes
#[path = "sync.v1.rs"]
pub mod sync_v1;

// Re-export the types for easier access
pub use sync_v1::{
    envelope, register, variant, Barrier, BarrierStage, Command, CommandReply, Configure, ConfigureKind,
    ConfigurationEntry, DataPoolDetails, DimensionDetails, DiskBufferDetails, Envelope, FloatList, NodeState,
    ObjectType, Ping, Pong, Pose, ProcessorDetails, Register, Remove, Representation, Request, SpaceDetails,
    Status, ValueType, Variant,
};
