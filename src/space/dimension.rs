// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! A named, typed, ordered discrete value set with a live current coordinate.
//!
//! The current index stored inside a [`Dimension`] is the single source of
//! truth for "where are we now" in that dimension. Everything else (template
//! resolution, sweep configuration, network replication) reads it from here.
//!
//! # Example
//! ```
//! use the_lattice::space::{Dimension, Representation, ValueType, VariantValue};
//!
//! let dim = Dimension::new("dim1", "", ValueType::Double);
//! dim.set_values((1..=5).map(|i| VariantValue::Double(i as f64 / 10.0)).collect()).unwrap();
//! dim.set_ids(vec!["A", "B", "C", "D", "E"].into_iter().map(String::from).collect()).unwrap();
//! dim.set_representation(Representation::Id);
//! dim.set_current_index(2);
//!
//! assert_eq!(dim.current_id().as_deref(), Some("C"));
//! assert_eq!(dim.current_value(), Some(VariantValue::Double(0.3)));
//! ```

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::errors::SpaceError;
use crate::space::value::{ValueType, VariantValue};
use crate::utils::{Observers, Origin, SubscriptionId};

/// How a dimension presents its current coordinate in templates and run
/// configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Representation {
    #[default]
    Value,
    Index,
    Id,
}

impl Representation {
    /// Parse the suffix used in `%%name:REPRESENTATION%%` tokens.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_uppercase().as_str() {
            "VALUE" => Some(Representation::Value),
            "INDEX" => Some(Representation::Index),
            "ID" => Some(Representation::Id),
            _ => None,
        }
    }
}

/// Uniqueness key of a dimension inside a space or registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DimensionKey {
    pub name: String,
    pub group: String,
}

impl DimensionKey {
    pub fn new(name: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
        }
    }
}

impl fmt::Display for DimensionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.group, self.name)
        }
    }
}

/// What changed on a dimension.
#[derive(Debug, Clone, PartialEq)]
pub enum DimensionChange {
    CurrentIndex(usize),
    /// Values and ids were replaced.
    Space,
    Representation(Representation),
    Stride(usize),
}

#[derive(Debug, Clone)]
pub struct DimensionEvent {
    pub key: DimensionKey,
    pub change: DimensionChange,
    pub origin: Origin,
}

#[derive(Debug, Clone)]
struct DimensionState {
    value_type: ValueType,
    values: Vec<VariantValue>,
    ids: Vec<String>,
    current_index: usize,
    representation: Representation,
    stride: usize,
}

/// A snapshot of everything that defines a dimension's value set.
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionSnapshot {
    pub value_type: ValueType,
    pub values: Vec<VariantValue>,
    pub ids: Vec<String>,
    pub current_index: usize,
    pub representation: Representation,
    pub stride: usize,
}

pub struct Dimension {
    key: DimensionKey,
    state: RwLock<DimensionState>,
    space_id: Mutex<Option<String>>,
    observers: Observers<DimensionEvent>,
}

impl Dimension {
    pub fn new(name: impl Into<String>, group: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            key: DimensionKey::new(name, group),
            state: RwLock::new(DimensionState {
                value_type,
                values: Vec::new(),
                ids: Vec::new(),
                current_index: 0,
                representation: Representation::Value,
                stride: 1,
            }),
            space_id: Mutex::new(None),
            observers: Observers::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.key.name
    }

    pub fn group(&self) -> &str {
        &self.key.group
    }

    pub fn key(&self) -> &DimensionKey {
        &self.key
    }

    pub fn value_type(&self) -> ValueType {
        self.state.read().value_type
    }

    pub fn values(&self) -> Vec<VariantValue> {
        self.state.read().values.clone()
    }

    pub fn ids(&self) -> Vec<String> {
        self.state.read().ids.clone()
    }

    pub fn size(&self) -> usize {
        self.state.read().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().values.is_empty()
    }

    pub fn value_at(&self, index: usize) -> Option<VariantValue> {
        self.state.read().values.get(index).cloned()
    }

    pub fn id_at(&self, index: usize) -> Option<String> {
        self.state.read().ids.get(index).cloned()
    }

    pub fn snapshot(&self) -> DimensionSnapshot {
        let state = self.state.read();
        DimensionSnapshot {
            value_type: state.value_type,
            values: state.values.clone(),
            ids: state.ids.clone(),
            current_index: state.current_index,
            representation: state.representation,
            stride: state.stride,
        }
    }

    /// Replace the value set. Ids are cleared when their length no longer
    /// matches; the current index is clamped into range.
    pub fn set_values(&self, values: Vec<VariantValue>) -> Result<(), SpaceError> {
        self.set_values_from(values, Origin::Local)
    }

    pub fn set_values_from(&self, values: Vec<VariantValue>, origin: Origin) -> Result<(), SpaceError> {
        {
            let mut state = self.state.write();
            check_types(&self.key.name, state.value_type, &values)?;
            if state.ids.len() != values.len() {
                state.ids.clear();
            }
            state.values = values;
            clamp_index(&mut state);
        }
        self.emit(DimensionChange::Space, origin);
        Ok(())
    }

    /// Attach string ids parallel to the values. An empty list removes them.
    pub fn set_ids(&self, ids: Vec<String>) -> Result<(), SpaceError> {
        self.set_ids_from(ids, Origin::Local)
    }

    pub fn set_ids_from(&self, ids: Vec<String>, origin: Origin) -> Result<(), SpaceError> {
        {
            let mut state = self.state.write();
            if !ids.is_empty() && ids.len() != state.values.len() {
                return Err(SpaceError::IdsLengthMismatch {
                    dimension: self.key.name.clone(),
                    values: state.values.len(),
                    ids: ids.len(),
                });
            }
            state.ids = ids;
        }
        self.emit(DimensionChange::Space, origin);
        Ok(())
    }

    /// Replace values and ids together in one change.
    pub fn set_space(&self, values: Vec<VariantValue>, ids: Vec<String>, origin: Origin) -> Result<(), SpaceError> {
        {
            let mut state = self.state.write();
            check_types(&self.key.name, state.value_type, &values)?;
            if !ids.is_empty() && ids.len() != values.len() {
                return Err(SpaceError::IdsLengthMismatch {
                    dimension: self.key.name.clone(),
                    values: values.len(),
                    ids: ids.len(),
                });
            }
            state.values = values;
            state.ids = ids;
            clamp_index(&mut state);
        }
        self.emit(DimensionChange::Space, origin);
        Ok(())
    }

    /// Append one value (and its id, when the dimension carries ids).
    pub fn push_value(&self, value: VariantValue, id: Option<String>) -> Result<(), SpaceError> {
        {
            let mut state = self.state.write();
            check_types(&self.key.name, state.value_type, std::slice::from_ref(&value))?;
            let carries_ids = !state.ids.is_empty() || (state.values.is_empty() && id.is_some());
            if carries_ids {
                let id = id.ok_or_else(|| SpaceError::IdsLengthMismatch {
                    dimension: self.key.name.clone(),
                    values: state.values.len() + 1,
                    ids: state.ids.len(),
                })?;
                state.ids.push(id);
            }
            state.values.push(value);
        }
        self.emit(DimensionChange::Space, Origin::Local);
        Ok(())
    }

    /// Copy the value set, representation and stride of `other` into this
    /// instance, keeping this instance's identity and observers.
    pub fn copy_space_from(&self, other: &Dimension, origin: Origin) {
        let incoming = other.snapshot();
        self.apply_snapshot(incoming, origin);
    }

    /// Replace the value set, representation, stride and current index.
    /// Only the parts that actually differ emit change events.
    pub fn apply_snapshot(&self, incoming: DimensionSnapshot, origin: Origin) {
        let representation = incoming.representation;
        let stride = incoming.stride.max(1);
        let (space_changed, index_changed, representation_changed, stride_changed, index) = {
            let mut state = self.state.write();
            let previous_index = state.current_index;
            let representation_changed = state.representation != representation;
            let stride_changed = state.stride != stride;
            let ids = if incoming.ids.len() == incoming.values.len() {
                incoming.ids
            } else {
                Vec::new()
            };
            let space_changed =
                state.value_type != incoming.value_type || state.values != incoming.values || state.ids != ids;
            if space_changed {
                state.value_type = incoming.value_type;
                state.values = incoming.values;
                state.ids = ids;
            }
            state.representation = representation;
            state.stride = stride;
            state.current_index = incoming.current_index;
            clamp_index(&mut state);
            (
                space_changed,
                previous_index != state.current_index,
                representation_changed,
                stride_changed,
                state.current_index,
            )
        };
        if space_changed {
            self.emit(DimensionChange::Space, origin);
        }
        if representation_changed {
            self.emit(DimensionChange::Representation(representation), origin);
        }
        if stride_changed {
            self.emit(DimensionChange::Stride(stride), origin);
        }
        if index_changed {
            self.emit(DimensionChange::CurrentIndex(index), origin);
        }
    }

    pub fn current_index(&self) -> usize {
        self.state.read().current_index
    }

    pub fn current_value(&self) -> Option<VariantValue> {
        let state = self.state.read();
        state.values.get(state.current_index).cloned()
    }

    pub fn current_id(&self) -> Option<String> {
        let state = self.state.read();
        state.ids.get(state.current_index).cloned()
    }

    /// Move the current coordinate. Returns false if `index` is out of range.
    pub fn set_current_index(&self, index: usize) -> bool {
        self.set_current_index_from(index, Origin::Local)
    }

    pub fn set_current_index_from(&self, index: usize, origin: Origin) -> bool {
        let changed = {
            let mut state = self.state.write();
            if index >= state.values.len() {
                return false;
            }
            let changed = state.current_index != index;
            state.current_index = index;
            changed
        };
        if changed {
            self.emit(DimensionChange::CurrentIndex(index), origin);
        }
        true
    }

    /// Move to the value nearest to `value`.
    pub fn set_current_value(&self, value: &VariantValue) -> bool {
        match self.index_of_value(value) {
            Some(index) => self.set_current_index(index),
            None => false,
        }
    }

    /// Move to the first position labelled `id`.
    pub fn set_current_id(&self, id: &str) -> bool {
        let index = self.state.read().ids.iter().position(|existing| existing == id);
        match index {
            Some(index) => self.set_current_index(index),
            None => false,
        }
    }

    /// Index of an exactly equal value, else of the numerically nearest one.
    pub fn index_of_value(&self, value: &VariantValue) -> Option<usize> {
        let state = self.state.read();
        if let Some(exact) = state
            .values
            .iter()
            .position(|candidate| candidate.compare(value) == Some(Ordering::Equal))
        {
            return Some(exact);
        }
        state
            .values
            .iter()
            .enumerate()
            .filter_map(|(index, candidate)| candidate.distance(value).map(|d| (index, d)))
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
            .map(|(index, _)| index)
    }

    /// Every id whose value equals the value stored at `index`.
    pub fn ids_for_index(&self, index: usize) -> Vec<String> {
        let state = self.state.read();
        let Some(target) = state.values.get(index) else {
            return Vec::new();
        };
        state
            .values
            .iter()
            .zip(state.ids.iter())
            .filter(|(value, _)| value.compare(target) == Some(Ordering::Equal))
            .map(|(_, id)| id.clone())
            .collect()
    }

    pub fn representation(&self) -> Representation {
        self.state.read().representation
    }

    pub fn set_representation(&self, representation: Representation) {
        self.set_representation_from(representation, Origin::Local)
    }

    pub fn set_representation_from(&self, representation: Representation, origin: Origin) {
        let changed = {
            let mut state = self.state.write();
            let changed = state.representation != representation;
            state.representation = representation;
            changed
        };
        if changed {
            self.emit(DimensionChange::Representation(representation), origin);
        }
    }

    pub fn stride(&self) -> usize {
        self.state.read().stride
    }

    /// Step size used when sweeping. Values below one are treated as one.
    pub fn set_stride(&self, stride: usize) {
        self.set_stride_from(stride, Origin::Local)
    }

    pub fn set_stride_from(&self, stride: usize, origin: Origin) {
        let stride = stride.max(1);
        let changed = {
            let mut state = self.state.write();
            let changed = state.stride != stride;
            state.stride = stride;
            changed
        };
        if changed {
            self.emit(DimensionChange::Stride(stride), origin);
        }
    }

    /// Number of coordinates a sweep visits: `ceil(size / stride)`.
    pub fn sweep_points(&self) -> usize {
        let state = self.state.read();
        state.values.len().div_ceil(state.stride)
    }

    pub fn min(&self) -> Option<VariantValue> {
        self.extreme(Ordering::Less)
    }

    pub fn max(&self) -> Option<VariantValue> {
        self.extreme(Ordering::Greater)
    }

    fn extreme(&self, wanted: Ordering) -> Option<VariantValue> {
        let state = self.state.read();
        let mut best: Option<&VariantValue> = None;
        for value in &state.values {
            best = match best {
                Some(current) if value.compare(current) != Some(wanted) => Some(current),
                _ => Some(value),
            };
        }
        best.cloned()
    }

    /// Sort values ascending (ids follow their values) and keep the current
    /// coordinate on the same value.
    pub fn conform(&self) {
        let changed = {
            let mut state = self.state.write();
            if state.values.is_empty() {
                return;
            }
            let current = state.values.get(state.current_index).cloned();
            let current_id = state.ids.get(state.current_index).cloned();
            let mut order: Vec<usize> = (0..state.values.len()).collect();
            order.sort_by(|a, b| {
                state.values[*a]
                    .compare(&state.values[*b])
                    .unwrap_or(Ordering::Equal)
            });
            if order.iter().enumerate().all(|(position, index)| position == *index) {
                false
            } else {
                let values: Vec<VariantValue> = order.iter().map(|i| state.values[*i].clone()).collect();
                let ids: Vec<String> = if state.ids.len() == state.values.len() {
                    order.iter().map(|i| state.ids[*i].clone()).collect()
                } else {
                    Vec::new()
                };
                state.values = values;
                state.ids = ids;
                if let Some(current) = current {
                    let position = state.values.iter().enumerate().position(|(index, value)| {
                        value.compare(&current) == Some(Ordering::Equal)
                            && (current_id.is_none() || state.ids.get(index) == current_id.as_ref())
                    });
                    state.current_index = position.unwrap_or(0);
                }
                true
            }
        };
        if changed {
            self.emit(DimensionChange::Space, Origin::Local);
        }
    }

    /// The current coordinate in this dimension's representation.
    pub fn current_representation(&self) -> Option<VariantValue> {
        let index = self.current_index();
        self.representation_at(index, self.representation())
    }

    pub fn representation_at(&self, index: usize, representation: Representation) -> Option<VariantValue> {
        let state = self.state.read();
        match representation {
            Representation::Value => state.values.get(index).cloned(),
            Representation::Index => (index < state.values.len()).then(|| VariantValue::UInt64(index as u64)),
            Representation::Id => state.ids.get(index).map(|id| VariantValue::String(id.clone())),
        }
    }

    /// Text used when the dimension is substituted into a path template.
    pub fn template_text(&self, index: usize, representation: Representation) -> Option<String> {
        self.representation_at(index, representation).map(|value| value.to_string())
    }

    /// An independent copy with the same value set and coordinate, no
    /// observers and no owning space.
    pub fn deep_copy(&self) -> Dimension {
        let copy = Dimension::new(self.key.name.clone(), self.key.group.clone(), self.value_type());
        *copy.state.write() = self.state.read().clone();
        copy
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&DimensionEvent) + Send + Sync + 'static,
    {
        self.observers.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// Id of the space this dimension is active in, if any.
    pub fn space_id(&self) -> Option<String> {
        self.space_id.lock().clone()
    }

    pub(crate) fn attach(&self, space: &str) -> Result<(), SpaceError> {
        let mut owner = self.space_id.lock();
        match owner.as_deref() {
            Some(existing) if existing != space => Err(SpaceError::AlreadyAttached {
                dimension: self.key.to_string(),
                space: existing.to_string(),
            }),
            _ => {
                *owner = Some(space.to_string());
                Ok(())
            }
        }
    }

    pub(crate) fn detach(&self) {
        *self.space_id.lock() = None;
    }

    fn emit(&self, change: DimensionChange, origin: Origin) {
        self.observers.notify(&DimensionEvent {
            key: self.key.clone(),
            change,
            origin,
        });
    }
}

impl fmt::Debug for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("Dimension")
            .field("key", &self.key)
            .field("value_type", &state.value_type)
            .field("size", &state.values.len())
            .field("current_index", &state.current_index)
            .field("representation", &state.representation)
            .finish()
    }
}

fn check_types(name: &str, expected: ValueType, values: &[VariantValue]) -> Result<(), SpaceError> {
    match values.iter().find(|value| value.value_type() != expected) {
        Some(wrong) => Err(SpaceError::TypeMismatch {
            dimension: name.to_string(),
            expected,
            found: wrong.value_type(),
        }),
        None => Ok(()),
    }
}

fn clamp_index(state: &mut DimensionState) {
    if state.current_index >= state.values.len() {
        state.current_index = state.values.len().saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::Arc;

    fn doubles(values: &[f64]) -> Vec<VariantValue> {
        values.iter().map(|v| VariantValue::Double(*v)).collect()
    }

    fn ids(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn id_mode_reports_current_id_and_value() {
        let dim = Dimension::new("dim1", "", ValueType::Double);
        dim.set_values(doubles(&[0.1, 0.2, 0.3, 0.4, 0.5])).unwrap();
        dim.set_ids(ids(&["A", "B", "C", "D", "E"])).unwrap();
        dim.set_representation(Representation::Id);
        assert!(dim.set_current_index(2));

        assert_eq!(dim.current_id().as_deref(), Some("C"));
        assert_eq!(dim.current_value(), Some(VariantValue::Double(0.3)));
        assert_eq!(dim.current_representation(), Some(VariantValue::from("C")));
    }

    #[test]
    fn conform_sorts_values_and_permutes_ids() {
        let dim = Dimension::new("dim", "", ValueType::Double);
        dim.set_values(doubles(&[0.3, 0.1, 0.2])).unwrap();
        dim.set_ids(ids(&["c", "a", "b"])).unwrap();
        dim.set_current_index(0);

        dim.conform();

        assert_eq!(dim.values(), doubles(&[0.1, 0.2, 0.3]));
        assert_eq!(dim.ids(), ids(&["a", "b", "c"]));
        assert_eq!(dim.min(), Some(VariantValue::Double(0.1)));
        assert_eq!(dim.max(), Some(VariantValue::Double(0.3)));
        assert_eq!(dim.current_value(), Some(VariantValue::Double(0.3)));
    }

    #[test]
    fn ids_must_match_value_count() {
        let dim = Dimension::new("dim", "", ValueType::Double);
        dim.set_values(doubles(&[1.0, 2.0])).unwrap();
        let err = dim.set_ids(ids(&["only_one"])).unwrap_err();
        assert!(matches!(err, SpaceError::IdsLengthMismatch { values: 2, ids: 1, .. }));
        dim.set_ids(Vec::new()).unwrap();
    }

    #[test]
    fn wrong_value_type_is_rejected() {
        let dim = Dimension::new("dim", "", ValueType::Int32);
        let err = dim.set_values(doubles(&[1.0])).unwrap_err();
        assert!(matches!(err, SpaceError::TypeMismatch { .. }));
    }

    #[test]
    fn out_of_range_index_is_refused() {
        let dim = Dimension::new("dim", "", ValueType::Double);
        dim.set_values(doubles(&[1.0, 2.0])).unwrap();
        assert!(!dim.set_current_index(2));
        assert_eq!(dim.current_index(), 0);
    }

    #[test]
    fn nearest_value_lookup() {
        let dim = Dimension::new("dim", "", ValueType::Double);
        dim.set_values(doubles(&[0.0, 1.0, 2.0])).unwrap();
        assert!(dim.set_current_value(&VariantValue::Double(1.4)));
        assert_eq!(dim.current_index(), 1);
    }

    #[test]
    fn change_events_carry_origin_and_only_fire_on_change() {
        let dim = Dimension::new("dim", "g", ValueType::Double);
        dim.set_values(doubles(&[0.0, 1.0, 2.0])).unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        dim.subscribe(move |event| {
            if let DimensionChange::CurrentIndex(_) = event.change {
                assert_eq!(event.key, DimensionKey::new("dim", "g"));
                seen.fetch_add(1, AtomicOrdering::SeqCst);
            }
        });

        dim.set_current_index(1);
        dim.set_current_index(1);
        dim.set_current_index(2);
        assert_eq!(count.load(AtomicOrdering::SeqCst), 2);
    }

    #[test]
    fn applying_an_identical_snapshot_is_silent() {
        let dim = Dimension::new("dim", "", ValueType::Double);
        dim.set_values(doubles(&[0.0, 1.0])).unwrap();
        let events = Arc::new(AtomicUsize::new(0));
        let seen = events.clone();
        dim.subscribe(move |_| {
            seen.fetch_add(1, AtomicOrdering::SeqCst);
        });

        dim.apply_snapshot(dim.snapshot(), Origin::Local);
        assert_eq!(events.load(AtomicOrdering::SeqCst), 0);

        let mut changed = dim.snapshot();
        changed.values = doubles(&[0.0, 1.0, 2.0]);
        dim.apply_snapshot(changed, Origin::Local);
        assert_eq!(events.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(dim.size(), 3);
    }

    #[test]
    fn sweep_points_respect_stride() {
        let dim = Dimension::new("dim", "", ValueType::Double);
        dim.set_values(doubles(&[0.0, 1.0, 2.0, 3.0, 4.0])).unwrap();
        assert_eq!(dim.sweep_points(), 5);
        dim.set_stride(2);
        assert_eq!(dim.sweep_points(), 3);
        dim.set_stride(0);
        assert_eq!(dim.stride(), 1);
    }

    #[test]
    fn ids_for_index_returns_all_labels_sharing_a_value() {
        let dim = Dimension::new("dim", "", ValueType::Double);
        dim.set_values(doubles(&[1.0, 1.0, 2.0])).unwrap();
        dim.set_ids(ids(&["x", "y", "z"])).unwrap();
        assert_eq!(dim.ids_for_index(0), ids(&["x", "y"]));
        assert_eq!(dim.ids_for_index(2), ids(&["z"]));
    }

    #[test]
    fn deep_copy_is_independent() {
        let dim = Dimension::new("dim", "", ValueType::Double);
        dim.set_values(doubles(&[1.0, 2.0])).unwrap();
        let copy = dim.deep_copy();
        copy.set_current_index(1);
        assert_eq!(dim.current_index(), 0);
        assert_eq!(copy.values(), dim.values());
        assert!(copy.space_id().is_none());
    }
}
