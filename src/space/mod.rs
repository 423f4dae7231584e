// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Parameter dimensions, the spaces that group them and the sweeps that walk
//! their Cartesian product.

pub mod dimension;
pub mod parameter_space;
pub mod persistence;
pub mod sweep;
pub mod template;
pub mod value;

#[cfg(test)]
pub mod integration_tests;

pub use dimension::{
    Dimension, DimensionChange, DimensionEvent, DimensionKey, DimensionSnapshot, Representation,
};
pub use parameter_space::{ParameterSpace, PathGenerator, SpaceEvent};
pub use sweep::{Odometer, SweepProgress};
pub use template::IndexOverrides;
pub use value::{FromVariant, ValueType, VariantValue};
