// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod backends;   // processor backends
pub mod cache;      // fingerprint cache
pub mod config;     // config + runtime builder
pub mod engine;     // processor graphs
pub mod errors;     // error handling
pub mod observability;
pub mod proto;      // wire messages
pub mod protocol;   // server/client replication
pub mod space;      // dimensions + parameter spaces
pub mod traits;     // unified abstractions
pub mod utils;
