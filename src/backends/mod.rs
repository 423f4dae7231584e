// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Processor implementations.
//!
//! * [`CommandProcessor`] runs an external program per run
//! * [`ComputeProcessor`] wraps an in-process closure
//! * [`MirrorProcessor`] stands in for a processor owned by a remote node
//!
//! [`ProcessorFactory`] builds processors from configuration entries:
//!
//! ```text
//! ProcessorConfig -> ProcessorFactory -> Arc<dyn Processor> -> ProcessorGraph
//! ```

pub mod command;
pub mod compute;
pub mod factory;
pub mod mirror;
#[cfg(test)]
pub mod stub;

pub use command::CommandProcessor;
pub use compute::ComputeProcessor;
pub use factory::ProcessorFactory;
pub use mirror::MirrorProcessor;
