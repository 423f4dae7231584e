// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod dependency_graph;
mod entry_points;
mod loader;
mod runtime;
mod validation;

pub mod consts;

pub use dependency_graph::DependencyGraph;
pub use entry_points::EntryPoints;
pub use loader::{
    load_and_validate_config, load_config, parse_config, Config, ConfigFormat, DimensionConfig,
    NodeConfig, NodeRole, ProcessorConfig, ProcessorKind, RootPathMapping, SpaceConfig, SweepConfig,
};
pub use runtime::{Runtime, RuntimeBuilder};
pub use validation::validate_config;
