// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod files;
pub mod observers;

pub use observers::{ConnectionTag, Observers, Origin, SubscriptionId};
