// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod processor;

pub use processor::{Processor, RunContext, RunRequest};
