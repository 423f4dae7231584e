// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

// Package `lattice.sync.v1`. Field numbers are part of the wire format and
// must not be reused.

/// One framed message. `message_id` is unique per sending node and is what a
/// `CommandReply` refers back to.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Envelope {
    #[prost(uint64, tag = "1")]
    pub message_id: u64,
    #[prost(oneof = "envelope::Body", tags = "2, 3, 4, 5, 6, 7, 8, 9, 10, 11")]
    pub body: ::core::option::Option<envelope::Body>,
}
/// Nested message and enum types in `Envelope`.
pub mod envelope {
    #[allow(clippy::derive_partial_eq_without_eq)]
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Body {
        #[prost(message, tag = "2")]
        Register(super::Register),
        #[prost(message, tag = "3")]
        Configure(super::Configure),
        #[prost(message, tag = "4")]
        Remove(super::Remove),
        #[prost(message, tag = "5")]
        Request(super::Request),
        #[prost(message, tag = "6")]
        Command(super::Command),
        #[prost(message, tag = "7")]
        CommandReply(super::CommandReply),
        #[prost(message, tag = "8")]
        Ping(super::Ping),
        #[prost(message, tag = "9")]
        Pong(super::Pong),
        #[prost(message, tag = "10")]
        Status(super::Status),
        #[prost(message, tag = "11")]
        Barrier(super::Barrier),
    }
}

#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FloatList {
    #[prost(float, repeated, tag = "1")]
    pub values: ::prost::alloc::vec::Vec<f32>,
}

/// Position (x, y, z) followed by orientation quaternion (w, x, y, z).
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Pose {
    #[prost(double, repeated, tag = "1")]
    pub values: ::prost::alloc::vec::Vec<f64>,
}

#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Variant {
    #[prost(oneof = "variant::Kind", tags = "1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13")]
    pub kind: ::core::option::Option<variant::Kind>,
}
/// Nested message and enum types in `Variant`.
pub mod variant {
    #[allow(clippy::derive_partial_eq_without_eq)]
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Kind {
        #[prost(float, tag = "1")]
        Float(f32),
        #[prost(double, tag = "2")]
        Double(f64),
        #[prost(int32, tag = "3")]
        Int32(i32),
        #[prost(int64, tag = "4")]
        Int64(i64),
        /// Widened on the wire; values above 255 are rejected on decode.
        #[prost(uint32, tag = "5")]
        Uint8(u32),
        #[prost(uint32, tag = "6")]
        Uint32(u32),
        #[prost(uint64, tag = "7")]
        Uint64(u64),
        #[prost(string, tag = "8")]
        Text(::prost::alloc::string::String),
        #[prost(bool, tag = "9")]
        Bool(bool),
        #[prost(message, tag = "10")]
        FloatVec(super::FloatList),
        #[prost(uint64, tag = "11")]
        Choice(u64),
        #[prost(bool, tag = "12")]
        Trigger(bool),
        #[prost(message, tag = "13")]
        Pose(super::Pose),
    }
}

#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConfigurationEntry {
    #[prost(string, tag = "1")]
    pub key: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub value: ::core::option::Option<Variant>,
}

#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DimensionDetails {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub group: ::prost::alloc::string::String,
    #[prost(enumeration = "ValueType", tag = "3")]
    pub value_type: i32,
    #[prost(message, repeated, tag = "4")]
    pub values: ::prost::alloc::vec::Vec<Variant>,
    #[prost(string, repeated, tag = "5")]
    pub ids: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(uint64, tag = "6")]
    pub current_index: u64,
    #[prost(enumeration = "Representation", tag = "7")]
    pub representation: i32,
    #[prost(uint64, tag = "8")]
    pub stride: u64,
    /// Space the dimension is active in; empty for free-standing parameters.
    #[prost(string, tag = "9")]
    pub space_id: ::prost::alloc::string::String,
}

#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SpaceDetails {
    #[prost(string, tag = "1")]
    pub id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub root_path: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub path_template: ::prost::alloc::string::String,
    #[prost(message, repeated, tag = "4")]
    pub dimensions: ::prost::alloc::vec::Vec<DimensionDetails>,
}

#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProcessorDetails {
    #[prost(string, tag = "1")]
    pub id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub type_name: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub input_directory: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub output_directory: ::prost::alloc::string::String,
    #[prost(string, tag = "5")]
    pub running_directory: ::prost::alloc::string::String,
    #[prost(string, repeated, tag = "6")]
    pub input_files: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(string, repeated, tag = "7")]
    pub output_files: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(bool, tag = "8")]
    pub enabled: bool,
    #[prost(message, repeated, tag = "9")]
    pub configuration: ::prost::alloc::vec::Vec<ConfigurationEntry>,
}

#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DiskBufferDetails {
    #[prost(string, tag = "1")]
    pub id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub file_name: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub path: ::prost::alloc::string::String,
    #[prost(uint32, tag = "4")]
    pub buffer_count: u32,
    #[prost(string, tag = "5")]
    pub current_file: ::prost::alloc::string::String,
}

#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DataPoolDetails {
    #[prost(string, tag = "1")]
    pub id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub space_id: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub slice_cache_directory: ::prost::alloc::string::String,
    #[prost(string, repeated, tag = "4")]
    pub data_files: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
}

#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Register {
    #[prost(enumeration = "ObjectType", tag = "1")]
    pub object_type: i32,
    #[prost(oneof = "register::Details", tags = "2, 3, 4, 5, 6")]
    pub details: ::core::option::Option<register::Details>,
}
/// Nested message and enum types in `Register`.
pub mod register {
    #[allow(clippy::derive_partial_eq_without_eq)]
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Details {
        #[prost(message, tag = "2")]
        Dimension(super::DimensionDetails),
        #[prost(message, tag = "3")]
        Space(super::SpaceDetails),
        #[prost(message, tag = "4")]
        Processor(super::ProcessorDetails),
        #[prost(message, tag = "5")]
        DiskBuffer(super::DiskBufferDetails),
        #[prost(message, tag = "6")]
        DataPool(super::DataPoolDetails),
    }
}

/// A single property change. Which payload field is read depends on `kind`.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Configure {
    #[prost(enumeration = "ObjectType", tag = "1")]
    pub object_type: i32,
    #[prost(string, tag = "2")]
    pub id: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub group: ::prost::alloc::string::String,
    #[prost(enumeration = "ConfigureKind", tag = "4")]
    pub kind: i32,
    #[prost(message, optional, tag = "5")]
    pub value: ::core::option::Option<Variant>,
    #[prost(message, repeated, tag = "6")]
    pub values: ::prost::alloc::vec::Vec<Variant>,
    #[prost(string, repeated, tag = "7")]
    pub ids: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(string, tag = "8")]
    pub text: ::prost::alloc::string::String,
    #[prost(uint64, tag = "9")]
    pub number: u64,
    #[prost(bool, tag = "10")]
    pub flag: bool,
    #[prost(string, tag = "11")]
    pub key: ::prost::alloc::string::String,
}

#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Remove {
    #[prost(enumeration = "ObjectType", tag = "1")]
    pub object_type: i32,
    #[prost(string, tag = "2")]
    pub id: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub group: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub space_id: ::prost::alloc::string::String,
}

/// Ask the peer to REGISTER the named object, or everything for `GLOBAL`.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Request {
    #[prost(enumeration = "ObjectType", tag = "1")]
    pub object_type: i32,
    #[prost(string, tag = "2")]
    pub id: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub group: ::prost::alloc::string::String,
}

#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Command {
    #[prost(enumeration = "ObjectType", tag = "1")]
    pub object_type: i32,
    #[prost(string, tag = "2")]
    pub id: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub name: ::prost::alloc::string::String,
    #[prost(message, repeated, tag = "4")]
    pub arguments: ::prost::alloc::vec::Vec<ConfigurationEntry>,
}

#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CommandReply {
    /// `message_id` of the envelope carrying the command.
    #[prost(uint64, tag = "1")]
    pub request_id: u64,
    #[prost(bool, tag = "2")]
    pub success: bool,
    #[prost(string, tag = "3")]
    pub error: ::prost::alloc::string::String,
    #[prost(message, repeated, tag = "4")]
    pub results: ::prost::alloc::vec::Vec<ConfigurationEntry>,
}

#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Ping {
    #[prost(uint64, tag = "1")]
    pub token: u64,
}

#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Pong {
    #[prost(uint64, tag = "1")]
    pub token: u64,
}

#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Status {
    #[prost(enumeration = "NodeState", tag = "1")]
    pub state: i32,
}

#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Barrier {
    #[prost(enumeration = "BarrierStage", tag = "1")]
    pub stage: i32,
    #[prost(uint64, tag = "2")]
    pub sequence: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ObjectType {
    Parameter = 0,
    ParameterSpace = 1,
    Processor = 2,
    DiskBuffer = 3,
    DataPool = 4,
    Global = 5,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ValueType {
    Float = 0,
    Double = 1,
    Int32 = 2,
    Int64 = 3,
    Uint8 = 4,
    Uint32 = 5,
    Uint64 = 6,
    String = 7,
    Bool = 8,
    FloatVec = 9,
    Choice = 10,
    Trigger = 11,
    Pose = 12,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Representation {
    Value = 0,
    Index = 1,
    Id = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ConfigureKind {
    /// Dimension current index in `number`.
    CurrentIndex = 0,
    /// Dimension values and ids in `values` / `ids`.
    Space = 1,
    /// Dimension representation code in `number`.
    Representation = 2,
    /// Dimension stride in `number`.
    Stride = 3,
    /// Space root path in `text`.
    RootPath = 4,
    /// Space path template in `text`.
    PathTemplate = 5,
    InputDirectory = 6,
    OutputDirectory = 7,
    RunningDirectory = 8,
    /// Processor enabled flag in `flag`.
    Enabled = 9,
    /// Processor configuration value `key` = `value`.
    ConfigurationValue = 10,
    /// Disk buffer received a new file, named in `text`.
    NewData = 11,
    /// Disk buffer directory in `text`.
    BufferPath = 12,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum NodeState {
    Available = 0,
    Busy = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum BarrierStage {
    Request = 0,
    AckLock = 1,
    Unlock = 2,
}
