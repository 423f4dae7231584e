// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The single tagged-union value type used for dimension values, run
//! configurations, cache fingerprints and wire messages.
//!
//! Code that needs a concrete Rust type goes through [`VariantValue::get`]
//! instead of matching on variants at every call site:
//!
//! ```
//! use the_lattice::space::VariantValue;
//!
//! let value = VariantValue::Double(0.25);
//! assert_eq!(value.get::<f64>(), Some(0.25));
//! assert_eq!(value.get::<String>(), None);
//! ```

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Declared element type of a dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Float,
    #[default]
    Double,
    Int32,
    Int64,
    #[serde(rename = "uint8")]
    UInt8,
    #[serde(rename = "uint32")]
    UInt32,
    #[serde(rename = "uint64")]
    UInt64,
    String,
    Bool,
    FloatVec,
    Choice,
    Trigger,
    Pose,
}

impl ValueType {
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ValueType::Float
                | ValueType::Double
                | ValueType::Int32
                | ValueType::Int64
                | ValueType::UInt8
                | ValueType::UInt32
                | ValueType::UInt64
                | ValueType::Choice
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Float => "float",
            ValueType::Double => "double",
            ValueType::Int32 => "int32",
            ValueType::Int64 => "int64",
            ValueType::UInt8 => "uint8",
            ValueType::UInt32 => "uint32",
            ValueType::UInt64 => "uint64",
            ValueType::String => "string",
            ValueType::Bool => "bool",
            ValueType::FloatVec => "float_vec",
            ValueType::Choice => "choice",
            ValueType::Trigger => "trigger",
            ValueType::Pose => "pose",
        }
    }
}

/// A typed value. Poses are position (x, y, z) followed by a quaternion (w, x, y, z).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum VariantValue {
    Float(f32),
    Double(f64),
    Int32(i32),
    Int64(i64),
    #[serde(rename = "uint8")]
    UInt8(u8),
    #[serde(rename = "uint32")]
    UInt32(u32),
    #[serde(rename = "uint64")]
    UInt64(u64),
    String(String),
    Bool(bool),
    FloatVec(Vec<f32>),
    Choice(u64),
    Trigger(bool),
    Pose([f64; 7]),
}

impl VariantValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            VariantValue::Float(_) => ValueType::Float,
            VariantValue::Double(_) => ValueType::Double,
            VariantValue::Int32(_) => ValueType::Int32,
            VariantValue::Int64(_) => ValueType::Int64,
            VariantValue::UInt8(_) => ValueType::UInt8,
            VariantValue::UInt32(_) => ValueType::UInt32,
            VariantValue::UInt64(_) => ValueType::UInt64,
            VariantValue::String(_) => ValueType::String,
            VariantValue::Bool(_) => ValueType::Bool,
            VariantValue::FloatVec(_) => ValueType::FloatVec,
            VariantValue::Choice(_) => ValueType::Choice,
            VariantValue::Trigger(_) => ValueType::Trigger,
            VariantValue::Pose(_) => ValueType::Pose,
        }
    }

    /// Zero value of a type.
    pub fn default_for(value_type: ValueType) -> Self {
        match value_type {
            ValueType::Float => VariantValue::Float(0.0),
            ValueType::Double => VariantValue::Double(0.0),
            ValueType::Int32 => VariantValue::Int32(0),
            ValueType::Int64 => VariantValue::Int64(0),
            ValueType::UInt8 => VariantValue::UInt8(0),
            ValueType::UInt32 => VariantValue::UInt32(0),
            ValueType::UInt64 => VariantValue::UInt64(0),
            ValueType::String => VariantValue::String(String::new()),
            ValueType::Bool => VariantValue::Bool(false),
            ValueType::FloatVec => VariantValue::FloatVec(Vec::new()),
            ValueType::Choice => VariantValue::Choice(0),
            ValueType::Trigger => VariantValue::Trigger(false),
            ValueType::Pose => VariantValue::Pose([0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0]),
        }
    }

    /// Build a value of `value_type` from a float, when that type is numeric.
    pub fn from_f64(value_type: ValueType, value: f64) -> Option<Self> {
        let converted = match value_type {
            ValueType::Float => VariantValue::Float(value as f32),
            ValueType::Double => VariantValue::Double(value),
            ValueType::Int32 => VariantValue::Int32(value as i32),
            ValueType::Int64 => VariantValue::Int64(value as i64),
            ValueType::UInt8 if value >= 0.0 => VariantValue::UInt8(value as u8),
            ValueType::UInt32 if value >= 0.0 => VariantValue::UInt32(value as u32),
            ValueType::UInt64 if value >= 0.0 => VariantValue::UInt64(value as u64),
            ValueType::Choice if value >= 0.0 => VariantValue::Choice(value as u64),
            ValueType::Bool => VariantValue::Bool(value != 0.0),
            ValueType::Trigger => VariantValue::Trigger(value != 0.0),
            _ => return None,
        };
        Some(converted)
    }

    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            VariantValue::Float(v) => Some(*v as f64),
            VariantValue::Double(v) => Some(*v),
            VariantValue::Int32(v) => Some(*v as f64),
            VariantValue::Int64(v) => Some(*v as f64),
            VariantValue::UInt8(v) => Some(*v as f64),
            VariantValue::UInt32(v) => Some(*v as f64),
            VariantValue::UInt64(v) => Some(*v as f64),
            VariantValue::Choice(v) => Some(*v as f64),
            VariantValue::Bool(v) | VariantValue::Trigger(v) => Some(if *v { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Typed accessor.
    pub fn get<T: FromVariant>(&self) -> Option<T> {
        T::from_variant(self)
    }

    /// Ordering between two values of the same type. Values of different
    /// numeric types compare numerically; anything else is unordered.
    pub fn compare(&self, other: &VariantValue) -> Option<Ordering> {
        match (self, other) {
            (VariantValue::String(a), VariantValue::String(b)) => Some(a.cmp(b)),
            (VariantValue::FloatVec(a), VariantValue::FloatVec(b)) => a.partial_cmp(b),
            (VariantValue::Pose(a), VariantValue::Pose(b)) => a.partial_cmp(b),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.partial_cmp(&y),
                _ => None,
            },
        }
    }

    /// Distance between two numeric values, used for nearest-value lookup.
    pub fn distance(&self, other: &VariantValue) -> Option<f64> {
        Some((self.as_f64()? - other.as_f64()?).abs())
    }

    /// Untagged JSON form, as written to persistence files and run
    /// configuration files.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::json;
        match self {
            VariantValue::Float(v) => json!(v),
            VariantValue::Double(v) => json!(v),
            VariantValue::Int32(v) => json!(v),
            VariantValue::Int64(v) => json!(v),
            VariantValue::UInt8(v) => json!(v),
            VariantValue::UInt32(v) => json!(v),
            VariantValue::UInt64(v) | VariantValue::Choice(v) => json!(v),
            VariantValue::String(v) => json!(v),
            VariantValue::Bool(v) | VariantValue::Trigger(v) => json!(v),
            VariantValue::FloatVec(v) => json!(v),
            VariantValue::Pose(v) => json!(v),
        }
    }

    /// Read an untagged JSON value as `value_type`.
    pub fn from_json(value_type: ValueType, json: &serde_json::Value) -> Option<Self> {
        let value = match value_type {
            ValueType::Float => VariantValue::Float(json.as_f64()? as f32),
            ValueType::Double => VariantValue::Double(json.as_f64()?),
            ValueType::Int32 => VariantValue::Int32(i32::try_from(json.as_i64()?).ok()?),
            ValueType::Int64 => VariantValue::Int64(json.as_i64()?),
            ValueType::UInt8 => VariantValue::UInt8(u8::try_from(json.as_u64()?).ok()?),
            ValueType::UInt32 => VariantValue::UInt32(u32::try_from(json.as_u64()?).ok()?),
            ValueType::UInt64 => VariantValue::UInt64(json.as_u64()?),
            ValueType::Choice => VariantValue::Choice(json.as_u64()?),
            ValueType::String => VariantValue::String(match json {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                _ => return None,
            }),
            ValueType::Bool => VariantValue::Bool(json.as_bool()?),
            ValueType::Trigger => VariantValue::Trigger(json.as_bool()?),
            ValueType::FloatVec => VariantValue::FloatVec(
                json.as_array()?
                    .iter()
                    .map(|v| v.as_f64().map(|f| f as f32))
                    .collect::<Option<Vec<f32>>>()?,
            ),
            ValueType::Pose => {
                let parts = json
                    .as_array()?
                    .iter()
                    .map(|v| v.as_f64())
                    .collect::<Option<Vec<f64>>>()?;
                VariantValue::Pose(parts.try_into().ok()?)
            }
        };
        Some(value)
    }

    /// Text safe to embed in a file name.
    pub fn to_filename_component(&self) -> String {
        self.to_string()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect()
    }
}

impl fmt::Display for VariantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariantValue::Float(v) => write!(f, "{}", v),
            VariantValue::Double(v) => write!(f, "{}", v),
            VariantValue::Int32(v) => write!(f, "{}", v),
            VariantValue::Int64(v) => write!(f, "{}", v),
            VariantValue::UInt8(v) => write!(f, "{}", v),
            VariantValue::UInt32(v) => write!(f, "{}", v),
            VariantValue::UInt64(v) => write!(f, "{}", v),
            VariantValue::String(v) => write!(f, "{}", v),
            VariantValue::Bool(v) | VariantValue::Trigger(v) => write!(f, "{}", v),
            VariantValue::Choice(v) => write!(f, "{}", v),
            VariantValue::FloatVec(v) => {
                let parts: Vec<String> = v.iter().map(|x| x.to_string()).collect();
                write!(f, "{}", parts.join(","))
            }
            VariantValue::Pose(v) => {
                let parts: Vec<String> = v.iter().map(|x| x.to_string()).collect();
                write!(f, "{}", parts.join(","))
            }
        }
    }
}

/// Conversion out of a [`VariantValue`].
pub trait FromVariant: Sized {
    fn from_variant(value: &VariantValue) -> Option<Self>;
}

impl FromVariant for f64 {
    fn from_variant(value: &VariantValue) -> Option<Self> {
        value.as_f64()
    }
}

impl FromVariant for f32 {
    fn from_variant(value: &VariantValue) -> Option<Self> {
        value.as_f64().map(|v| v as f32)
    }
}

impl FromVariant for i64 {
    fn from_variant(value: &VariantValue) -> Option<Self> {
        match value {
            VariantValue::Int32(v) => Some(*v as i64),
            VariantValue::Int64(v) => Some(*v),
            VariantValue::UInt8(v) => Some(*v as i64),
            VariantValue::UInt32(v) => Some(*v as i64),
            VariantValue::UInt64(v) => i64::try_from(*v).ok(),
            VariantValue::Choice(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }
}

impl FromVariant for i32 {
    fn from_variant(value: &VariantValue) -> Option<Self> {
        i64::from_variant(value).and_then(|v| i32::try_from(v).ok())
    }
}

impl FromVariant for u64 {
    fn from_variant(value: &VariantValue) -> Option<Self> {
        i64::from_variant(value)
            .and_then(|v| u64::try_from(v).ok())
            .or(match value {
                VariantValue::UInt64(v) | VariantValue::Choice(v) => Some(*v),
                _ => None,
            })
    }
}

impl FromVariant for usize {
    fn from_variant(value: &VariantValue) -> Option<Self> {
        u64::from_variant(value).and_then(|v| usize::try_from(v).ok())
    }
}

impl FromVariant for bool {
    fn from_variant(value: &VariantValue) -> Option<Self> {
        match value {
            VariantValue::Bool(v) | VariantValue::Trigger(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromVariant for String {
    fn from_variant(value: &VariantValue) -> Option<Self> {
        match value {
            VariantValue::String(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl FromVariant for Vec<f32> {
    fn from_variant(value: &VariantValue) -> Option<Self> {
        match value {
            VariantValue::FloatVec(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl FromVariant for [f64; 7] {
    fn from_variant(value: &VariantValue) -> Option<Self> {
        match value {
            VariantValue::Pose(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<f64> for VariantValue {
    fn from(value: f64) -> Self {
        VariantValue::Double(value)
    }
}

impl From<f32> for VariantValue {
    fn from(value: f32) -> Self {
        VariantValue::Float(value)
    }
}

impl From<i32> for VariantValue {
    fn from(value: i32) -> Self {
        VariantValue::Int32(value)
    }
}

impl From<i64> for VariantValue {
    fn from(value: i64) -> Self {
        VariantValue::Int64(value)
    }
}

impl From<u64> for VariantValue {
    fn from(value: u64) -> Self {
        VariantValue::UInt64(value)
    }
}

impl From<bool> for VariantValue {
    fn from(value: bool) -> Self {
        VariantValue::Bool(value)
    }
}

impl From<&str> for VariantValue {
    fn from(value: &str) -> Self {
        VariantValue::String(value.to_string())
    }
}

impl From<String> for VariantValue {
    fn from(value: String) -> Self {
        VariantValue::String(value)
    }
}
