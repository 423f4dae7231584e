// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod cache;
mod config;
mod processor;
mod protocol;
mod space;

pub use cache::CacheError;
pub use config::{ConfigError, ValidationError};
pub use processor::ProcessorError;
pub use protocol::{CodecError, ProtocolError, RegistryError};
pub use space::SpaceError;
