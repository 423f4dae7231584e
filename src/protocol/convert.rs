// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Conversions between in-memory objects and their wire messages.

use crate::engine::Configuration;
use crate::errors::ProtocolError;
use crate::proto::{self, variant::Kind, ConfigurationEntry, DimensionDetails, ProcessorDetails, Variant};
use crate::space::{Dimension, DimensionSnapshot, Representation, ValueType, VariantValue};
use crate::traits::Processor;

pub fn variant_to_wire(value: &VariantValue) -> Variant {
    let kind = match value {
        VariantValue::Float(v) => Kind::Float(*v),
        VariantValue::Double(v) => Kind::Double(*v),
        VariantValue::Int32(v) => Kind::Int32(*v),
        VariantValue::Int64(v) => Kind::Int64(*v),
        VariantValue::UInt8(v) => Kind::Uint8(u32::from(*v)),
        VariantValue::UInt32(v) => Kind::Uint32(*v),
        VariantValue::UInt64(v) => Kind::Uint64(*v),
        VariantValue::String(v) => Kind::Text(v.clone()),
        VariantValue::Bool(v) => Kind::Bool(*v),
        VariantValue::FloatVec(v) => Kind::FloatVec(proto::FloatList { values: v.clone() }),
        VariantValue::Choice(v) => Kind::Choice(*v),
        VariantValue::Trigger(v) => Kind::Trigger(*v),
        VariantValue::Pose(v) => Kind::Pose(proto::Pose { values: v.to_vec() }),
    };
    Variant { kind: Some(kind) }
}

pub fn variant_from_wire(variant: &Variant) -> Result<VariantValue, ProtocolError> {
    let kind = variant
        .kind
        .as_ref()
        .ok_or_else(|| ProtocolError::InvalidValue("empty variant".to_string()))?;
    Ok(match kind {
        Kind::Float(v) => VariantValue::Float(*v),
        Kind::Double(v) => VariantValue::Double(*v),
        Kind::Int32(v) => VariantValue::Int32(*v),
        Kind::Int64(v) => VariantValue::Int64(*v),
        Kind::Uint8(v) => VariantValue::UInt8(
            u8::try_from(*v).map_err(|_| ProtocolError::InvalidValue(format!("{} is not a uint8", v)))?,
        ),
        Kind::Uint32(v) => VariantValue::UInt32(*v),
        Kind::Uint64(v) => VariantValue::UInt64(*v),
        Kind::Text(v) => VariantValue::String(v.clone()),
        Kind::Bool(v) => VariantValue::Bool(*v),
        Kind::FloatVec(list) => VariantValue::FloatVec(list.values.clone()),
        Kind::Choice(v) => VariantValue::Choice(*v),
        Kind::Trigger(v) => VariantValue::Trigger(*v),
        Kind::Pose(pose) => {
            let values: [f64; 7] = pose
                .values
                .as_slice()
                .try_into()
                .map_err(|_| ProtocolError::InvalidValue(format!("pose with {} components", pose.values.len())))?;
            VariantValue::Pose(values)
        }
    })
}

pub fn value_type_to_wire(value_type: ValueType) -> proto::ValueType {
    match value_type {
        ValueType::Float => proto::ValueType::Float,
        ValueType::Double => proto::ValueType::Double,
        ValueType::Int32 => proto::ValueType::Int32,
        ValueType::Int64 => proto::ValueType::Int64,
        ValueType::UInt8 => proto::ValueType::Uint8,
        ValueType::UInt32 => proto::ValueType::Uint32,
        ValueType::UInt64 => proto::ValueType::Uint64,
        ValueType::String => proto::ValueType::String,
        ValueType::Bool => proto::ValueType::Bool,
        ValueType::FloatVec => proto::ValueType::FloatVec,
        ValueType::Choice => proto::ValueType::Choice,
        ValueType::Trigger => proto::ValueType::Trigger,
        ValueType::Pose => proto::ValueType::Pose,
    }
}

pub fn value_type_from_wire(value_type: proto::ValueType) -> ValueType {
    match value_type {
        proto::ValueType::Float => ValueType::Float,
        proto::ValueType::Double => ValueType::Double,
        proto::ValueType::Int32 => ValueType::Int32,
        proto::ValueType::Int64 => ValueType::Int64,
        proto::ValueType::Uint8 => ValueType::UInt8,
        proto::ValueType::Uint32 => ValueType::UInt32,
        proto::ValueType::Uint64 => ValueType::UInt64,
        proto::ValueType::String => ValueType::String,
        proto::ValueType::Bool => ValueType::Bool,
        proto::ValueType::FloatVec => ValueType::FloatVec,
        proto::ValueType::Choice => ValueType::Choice,
        proto::ValueType::Trigger => ValueType::Trigger,
        proto::ValueType::Pose => ValueType::Pose,
    }
}

pub fn representation_to_wire(representation: Representation) -> proto::Representation {
    match representation {
        Representation::Value => proto::Representation::Value,
        Representation::Index => proto::Representation::Index,
        Representation::Id => proto::Representation::Id,
    }
}

pub fn representation_from_wire(representation: proto::Representation) -> Representation {
    match representation {
        proto::Representation::Value => Representation::Value,
        proto::Representation::Index => Representation::Index,
        proto::Representation::Id => Representation::Id,
    }
}

/// Decode a representation sent as a plain number in CONFIGURE.
pub fn representation_from_code(code: u64) -> Result<Representation, ProtocolError> {
    i32::try_from(code)
        .ok()
        .and_then(|code| proto::Representation::try_from(code).ok())
        .map(representation_from_wire)
        .ok_or_else(|| ProtocolError::InvalidValue(format!("representation code {}", code)))
}

pub fn values_to_wire(values: &[VariantValue]) -> Vec<Variant> {
    values.iter().map(variant_to_wire).collect()
}

pub fn values_from_wire(values: &[Variant]) -> Result<Vec<VariantValue>, ProtocolError> {
    values.iter().map(variant_from_wire).collect()
}

pub fn configuration_to_entries(configuration: &Configuration) -> Vec<ConfigurationEntry> {
    configuration
        .iter()
        .map(|(key, value)| ConfigurationEntry {
            key: key.clone(),
            value: Some(variant_to_wire(value)),
        })
        .collect()
}

pub fn configuration_from_entries(entries: &[ConfigurationEntry]) -> Result<Configuration, ProtocolError> {
    let mut configuration = Configuration::new();
    for entry in entries {
        let value = entry
            .value
            .as_ref()
            .ok_or_else(|| ProtocolError::InvalidValue(format!("entry '{}' has no value", entry.key)))?;
        configuration.set(entry.key.clone(), variant_from_wire(value)?);
    }
    Ok(configuration)
}

pub fn dimension_details(dimension: &Dimension) -> DimensionDetails {
    let snapshot = dimension.snapshot();
    DimensionDetails {
        name: dimension.name().to_string(),
        group: dimension.group().to_string(),
        value_type: value_type_to_wire(snapshot.value_type) as i32,
        values: values_to_wire(&snapshot.values),
        ids: snapshot.ids,
        current_index: snapshot.current_index as u64,
        representation: representation_to_wire(snapshot.representation) as i32,
        stride: snapshot.stride as u64,
        space_id: dimension.space_id().unwrap_or_default(),
    }
}

/// Decode the value set of a REGISTER. Every value must match the declared
/// type.
pub fn snapshot_from_details(details: &DimensionDetails) -> Result<DimensionSnapshot, ProtocolError> {
    let value_type = value_type_from_wire(details.value_type());
    let values = values_from_wire(&details.values)?;
    if let Some(wrong) = values.iter().find(|v| v.value_type() != value_type) {
        return Err(ProtocolError::InvalidValue(format!(
            "'{}' declares {:?} values but carries {:?}",
            details.name,
            value_type,
            wrong.value_type()
        )));
    }
    Ok(DimensionSnapshot {
        value_type,
        values,
        ids: details.ids.clone(),
        current_index: details.current_index as usize,
        representation: representation_from_wire(details.representation()),
        stride: details.stride.max(1) as usize,
    })
}

pub fn dimension_from_details(details: &DimensionDetails) -> Result<Dimension, ProtocolError> {
    let snapshot = snapshot_from_details(details)?;
    let dimension = Dimension::new(details.name.clone(), details.group.clone(), snapshot.value_type);
    dimension.apply_snapshot(snapshot, crate::utils::Origin::Local);
    Ok(dimension)
}

pub fn processor_details(processor: &dyn Processor) -> ProcessorDetails {
    let core = processor.core();
    ProcessorDetails {
        id: processor.id().to_string(),
        type_name: processor.type_name().to_string(),
        input_directory: core.input_directory().to_string_lossy().into_owned(),
        output_directory: core.output_directory().to_string_lossy().into_owned(),
        running_directory: core.running_directory().to_string_lossy().into_owned(),
        input_files: core.input_files(),
        output_files: core.output_files(),
        enabled: core.enabled(),
        configuration: configuration_to_entries(&core.configuration()),
    }
}
