// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod async_wrapper;
pub mod configuration;
pub mod core;
pub mod graph;
pub mod run_metadata;

pub use async_wrapper::AsyncWrapper;
pub use configuration::Configuration;
pub use self::core::{execute, DoneEvent, ProcessorChange, ProcessorCore, ProcessorField, StartEvent};
pub use graph::{GraphMode, ProcessorGraph};
pub use run_metadata::RunMetadata;
