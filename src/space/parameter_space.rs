// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! An ordered set of dimensions plus the filesystem layout derived from them.
//!
//! The space turns the current coordinate of its dimensions into a relative
//! run path through a `%%token%%` template (see [`template`](super::template))
//! or a user supplied generator, and drives sweeps over its dimensions (see
//! [`sweep`](super::sweep)).

use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::cache::CacheManager;
use crate::engine::Configuration;
use crate::errors::SpaceError;
use crate::observability::messages::space::{DimensionRegistered, DimensionRejected};
use crate::observability::messages::StructuredLog;
use crate::space::dimension::{Dimension, DimensionEvent, DimensionKey};
use crate::space::sweep::{Odometer, SweepControl, SweepProgress};
use crate::space::template::{self, IndexOverrides};
use crate::space::value::ValueType;
use crate::utils::{Observers, Origin, SubscriptionId};

/// Replaces template resolution when set. Receives the space's dimensions and
/// the index overrides; returns the relative run path.
pub type PathGenerator = Arc<dyn Fn(&[Arc<Dimension>], &IndexOverrides) -> Option<String> + Send + Sync>;

#[derive(Debug, Clone)]
pub enum SpaceEvent {
    DimensionRegistered { key: DimensionKey, origin: Origin },
    DimensionRemoved { key: DimensionKey, origin: Origin },
    DimensionChanged(DimensionEvent),
    RootPathChanged { path: PathBuf, origin: Origin },
    PathTemplateChanged { template: String, origin: Origin },
}

struct Member {
    dimension: Arc<Dimension>,
    relay: SubscriptionId,
}

static NEXT_COPY: AtomicU64 = AtomicU64::new(1);

pub struct ParameterSpace {
    id: String,
    members: Mutex<Vec<Member>>,
    root_path: RwLock<PathBuf>,
    path_template: RwLock<String>,
    path_generator: RwLock<Option<PathGenerator>>,
    cache_manager: RwLock<Option<Arc<CacheManager>>>,
    events: Arc<Observers<SpaceEvent>>,
    pub(super) progress: Arc<Observers<SweepProgress>>,
    pub(super) control: SweepControl,
}

impl ParameterSpace {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            members: Mutex::new(Vec::new()),
            root_path: RwLock::new(PathBuf::new()),
            path_template: RwLock::new(String::new()),
            path_generator: RwLock::new(None),
            cache_manager: RwLock::new(None),
            events: Arc::new(Observers::new()),
            progress: Arc::new(Observers::new()),
            control: SweepControl::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Create a dimension, or return the existing one with the same key.
    pub fn new_dimension(&self, name: &str, group: &str, value_type: ValueType) -> Arc<Dimension> {
        if let Some(existing) = self.get_dimension(name, group) {
            return existing;
        }
        let dimension = Arc::new(Dimension::new(name, group, value_type));
        match self.register_dimension(dimension.clone()) {
            Ok(registered) => registered,
            Err(_) => dimension,
        }
    }

    /// Add `dimension`, or overwrite the value set of the dimension already
    /// registered under the same (name, group). Returns the instance that is
    /// active in the space afterwards.
    pub fn register_dimension(&self, dimension: Arc<Dimension>) -> Result<Arc<Dimension>, SpaceError> {
        self.register_dimension_from(dimension, Origin::Local)
    }

    pub fn register_dimension_from(
        &self,
        dimension: Arc<Dimension>,
        origin: Origin,
    ) -> Result<Arc<Dimension>, SpaceError> {
        let key = dimension.key().clone();
        let (active, merged) = {
            let mut members = self.members.lock();
            let existing = members
                .iter()
                .find(|m| *m.dimension.key() == key)
                .map(|m| m.dimension.clone());
            match existing {
                Some(existing) if Arc::ptr_eq(&existing, &dimension) => return Ok(existing),
                Some(existing) => (existing, true),
                None => {
                    if let Err(error) = dimension.attach(&self.id) {
                        drop(members);
                        DimensionRejected {
                            space_id: &self.id,
                            dimension: &key.to_string(),
                            reason: &error,
                        }
                        .log();
                        return Err(error);
                    }
                    let events = self.events.clone();
                    let relay = dimension.subscribe(move |event| {
                        events.notify(&SpaceEvent::DimensionChanged(event.clone()));
                    });
                    members.push(Member {
                        dimension: dimension.clone(),
                        relay,
                    });
                    (dimension.clone(), false)
                }
            }
        };
        if merged {
            active.copy_space_from(&dimension, origin);
        }

        DimensionRegistered {
            space_id: &self.id,
            dimension: &key.to_string(),
            size: active.size(),
            merged,
        }
        .log();
        self.events
            .notify(&SpaceEvent::DimensionRegistered { key, origin });
        Ok(active)
    }

    pub fn remove_dimension(&self, name: &str, group: &str) -> Option<Arc<Dimension>> {
        self.remove_dimension_from(name, group, Origin::Local)
    }

    pub fn remove_dimension_from(&self, name: &str, group: &str, origin: Origin) -> Option<Arc<Dimension>> {
        let member = {
            let mut members = self.members.lock();
            let position = members
                .iter()
                .position(|m| m.dimension.name() == name && m.dimension.group() == group)?;
            members.remove(position)
        };
        member.dimension.unsubscribe(member.relay);
        member.dimension.detach();
        self.events.notify(&SpaceEvent::DimensionRemoved {
            key: member.dimension.key().clone(),
            origin,
        });
        Some(member.dimension)
    }

    pub fn get_dimension(&self, name: &str, group: &str) -> Option<Arc<Dimension>> {
        self.members
            .lock()
            .iter()
            .find(|m| m.dimension.name() == name && m.dimension.group() == group)
            .map(|m| m.dimension.clone())
    }

    /// Look a dimension up by name, or by `group/name`.
    pub fn find_dimension(&self, name: &str) -> Option<Arc<Dimension>> {
        let (group, name) = match name.rsplit_once('/') {
            Some((group, name)) => (Some(group), name),
            None => (None, name),
        };
        self.members
            .lock()
            .iter()
            .find(|m| m.dimension.name() == name && group.map_or(true, |g| m.dimension.group() == g))
            .map(|m| m.dimension.clone())
    }

    /// Registered dimensions in registration order.
    pub fn dimensions(&self) -> Vec<Arc<Dimension>> {
        self.members.lock().iter().map(|m| m.dimension.clone()).collect()
    }

    pub fn dimension_names(&self) -> Vec<String> {
        self.members
            .lock()
            .iter()
            .map(|m| m.dimension.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.members.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.lock().is_empty()
    }

    pub fn clear(&self) {
        let keys: Vec<DimensionKey> = self
            .members
            .lock()
            .iter()
            .map(|m| m.dimension.key().clone())
            .collect();
        for key in keys {
            self.remove_dimension(&key.name, &key.group);
        }
    }

    pub fn root_path(&self) -> PathBuf {
        self.root_path.read().clone()
    }

    pub fn set_root_path(&self, path: impl Into<PathBuf>) {
        self.set_root_path_from(path, Origin::Local)
    }

    pub fn set_root_path_from(&self, path: impl Into<PathBuf>, origin: Origin) {
        let path = path.into();
        *self.root_path.write() = path.clone();
        self.events.notify(&SpaceEvent::RootPathChanged { path, origin });
    }

    pub fn path_template(&self) -> String {
        self.path_template.read().clone()
    }

    pub fn set_path_template(&self, template: impl Into<String>) {
        self.set_path_template_from(template, Origin::Local)
    }

    pub fn set_path_template_from(&self, template: impl Into<String>, origin: Origin) {
        let template = template.into();
        *self.path_template.write() = template.clone();
        self.events
            .notify(&SpaceEvent::PathTemplateChanged { template, origin });
    }

    /// Override template resolution with a function.
    pub fn set_path_generator(&self, generator: Option<PathGenerator>) {
        *self.path_generator.write() = generator;
    }

    /// True when runs get a per-point directory under the root path.
    pub fn has_run_paths(&self) -> bool {
        self.path_generator.read().is_some() || !self.path_template.read().is_empty()
    }

    pub fn cache_manager(&self) -> Option<Arc<CacheManager>> {
        self.cache_manager.read().clone()
    }

    pub fn set_cache_manager(&self, cache: Option<Arc<CacheManager>>) {
        *self.cache_manager.write() = cache;
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&SpaceEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    pub fn subscribe_progress<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&SweepProgress) + Send + Sync + 'static,
    {
        self.progress.subscribe(callback)
    }

    pub fn unsubscribe_progress(&self, id: SubscriptionId) -> bool {
        self.progress.unsubscribe(id)
    }

    /// Expand `%%token%%` placeholders in `text`. Returns the text and
    /// whether every token resolved.
    pub fn resolve_template(&self, text: &str, overrides: &IndexOverrides) -> (String, bool) {
        let dimensions = self.dimensions();
        template::expand(text, |token| template::resolve_token(&dimensions, token, overrides))
    }

    /// Relative run path for the current coordinate with `overrides` applied.
    pub fn generate_relative_run_path(&self, overrides: &IndexOverrides) -> Option<String> {
        let generator = self.path_generator.read().clone();
        if let Some(generator) = generator {
            return generator(&self.dimensions(), overrides);
        }
        let template = self.path_template();
        let (path, complete) = self.resolve_template(&template, overrides);
        complete.then_some(path)
    }

    pub fn current_relative_run_path(&self) -> Option<String> {
        self.generate_relative_run_path(&IndexOverrides::new())
    }

    /// Absolute directory for the current coordinate, when run paths are
    /// configured and resolvable.
    pub fn current_run_directory(&self) -> Option<PathBuf> {
        if !self.has_run_paths() {
            return None;
        }
        self.current_relative_run_path()
            .map(|relative| self.root_path().join(relative))
    }

    /// Every distinct relative run path over the whole space, in sweep order.
    pub fn running_paths(&self) -> Vec<String> {
        let dimensions = self.dimensions();
        let odometer = Odometer::new(
            dimensions.iter().map(|d| d.size()).collect(),
            dimensions.iter().map(|d| d.stride()).collect(),
        );
        let mut paths: Vec<String> = Vec::new();
        for coordinate in odometer {
            let overrides: IndexOverrides = dimensions
                .iter()
                .zip(coordinate)
                .map(|(d, index)| (d.key().clone(), index))
                .collect();
            if let Some(path) = self.generate_relative_run_path(&overrides) {
                if !paths.contains(&path) {
                    paths.push(path);
                }
            }
        }
        paths
    }

    /// True iff moving `name` from index 0 to index `stride` changes the
    /// resolved run path.
    pub fn is_filesystem_dimension(&self, name: &str) -> bool {
        let Some(dimension) = self.find_dimension(name) else {
            return false;
        };
        let stride = dimension.stride();
        if stride >= dimension.size() {
            return false;
        }
        let at = |index: usize| {
            let overrides: IndexOverrides = [(dimension.key().clone(), index)].into_iter().collect();
            self.generate_relative_run_path(&overrides)
        };
        at(0) != at(stride)
    }

    /// Sort every dimension's values ascending.
    pub fn conform_space(&self) {
        for dimension in self.dimensions() {
            dimension.conform();
        }
    }

    /// Run configuration for the current coordinate: every registered
    /// dimension's current representation keyed by dimension name.
    pub fn configuration(&self) -> Configuration {
        self.dimensions()
            .iter()
            .filter_map(|d| d.current_representation().map(|v| (d.name().to_string(), v)))
            .collect()
    }

    /// An independent space with copies of every dimension. Observers are
    /// not copied; the cache manager is shared.
    pub fn deep_copy(&self) -> ParameterSpace {
        let copy = ParameterSpace::new(format!(
            "{}~{}",
            self.id,
            NEXT_COPY.fetch_add(1, Ordering::Relaxed)
        ));
        for dimension in self.dimensions() {
            // A fresh copy is never attached anywhere, so this cannot fail.
            let _ = copy.register_dimension(Arc::new(dimension.deep_copy()));
        }
        *copy.root_path.write() = self.root_path();
        *copy.path_template.write() = self.path_template();
        *copy.path_generator.write() = self.path_generator.read().clone();
        *copy.cache_manager.write() = self.cache_manager();
        copy
    }
}

impl fmt::Debug for ParameterSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterSpace")
            .field("id", &self.id)
            .field("dimensions", &self.dimension_names())
            .field("root_path", &self.root_path())
            .field("path_template", &self.path_template())
            .finish()
    }
}

impl Drop for ParameterSpace {
    fn drop(&mut self) {
        for member in self.members.get_mut().drain(..) {
            member.dimension.unsubscribe(member.relay);
            member.dimension.detach();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::value::VariantValue;
    use crate::space::Representation;
    use std::sync::atomic::AtomicUsize;

    fn doubles(values: &[f64]) -> Vec<VariantValue> {
        values.iter().map(|v| VariantValue::Double(*v)).collect()
    }

    #[test]
    fn same_name_dimensions_in_different_groups_vary_independently() {
        let space = ParameterSpace::new("s");
        space.set_path_template("%%coarse/res%%_%%fine/res%%");
        space.new_dimension("res", "coarse", ValueType::Double).set_values(doubles(&[1.0, 2.0])).unwrap();
        space.new_dimension("res", "fine", ValueType::Double).set_values(doubles(&[10.0, 20.0])).unwrap();

        let mut paths = space.running_paths();
        paths.sort();
        assert_eq!(paths, vec!["1_10", "1_20", "2_10", "2_20"]);

        space.set_path_template("%%fine/res%%");
        assert!(space.is_filesystem_dimension("fine/res"));
        assert!(!space.is_filesystem_dimension("coarse/res"));
    }

    #[test]
    fn reregistering_a_key_overwrites_in_place() {
        let space = ParameterSpace::new("s");
        let first = space.new_dimension("eci1", "", ValueType::Double);
        first.set_values(doubles(&[1.0, 2.0])).unwrap();

        let replacement = Arc::new(Dimension::new("eci1", "", ValueType::Double));
        replacement.set_values(doubles(&[5.0, 6.0, 7.0])).unwrap();
        let active = space.register_dimension(replacement).unwrap();

        assert!(Arc::ptr_eq(&active, &first));
        assert_eq!(space.len(), 1);
        assert_eq!(first.values(), doubles(&[5.0, 6.0, 7.0]));
    }

    #[test]
    fn a_dimension_is_active_in_one_space_at_a_time() {
        let a = ParameterSpace::new("a");
        let b = ParameterSpace::new("b");
        let dim = a.new_dimension("x", "", ValueType::Double);

        assert!(matches!(
            b.register_dimension(dim.clone()),
            Err(SpaceError::AlreadyAttached { .. })
        ));

        a.remove_dimension("x", "");
        assert!(b.register_dimension(dim).is_ok());
    }

    #[test]
    fn dimension_changes_are_relayed_as_space_events() {
        let space = ParameterSpace::new("s");
        let dim = space.new_dimension("x", "", ValueType::Double);
        dim.set_values(doubles(&[1.0, 2.0])).unwrap();
        let changes = Arc::new(AtomicUsize::new(0));
        let seen = changes.clone();
        space.subscribe(move |event| {
            if let SpaceEvent::DimensionChanged(_) = event {
                seen.fetch_add(1, Ordering::SeqCst);
            }
        });

        dim.set_current_index(1);
        assert_eq!(changes.load(Ordering::SeqCst), 1);

        space.remove_dimension("x", "");
        dim.set_current_index(0);
        assert_eq!(changes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn run_path_follows_the_template() {
        let space = ParameterSpace::new("s");
        space.set_root_path("/runs");
        space.set_path_template("%%dim1%%/%%dim2:ID%%");
        let dim1 = space.new_dimension("dim1", "", ValueType::Double);
        dim1.set_values(doubles(&[0.1, 0.2])).unwrap();
        let dim2 = space.new_dimension("dim2", "", ValueType::Double);
        dim2.set_values(doubles(&[1.0, 2.0])).unwrap();
        dim2.set_ids(vec!["lo".into(), "hi".into()]).unwrap();

        dim1.set_current_index(1);
        assert_eq!(space.current_relative_run_path().as_deref(), Some("0.2/lo"));
        assert_eq!(
            space.current_run_directory(),
            Some(PathBuf::from("/runs/0.2/lo"))
        );
        assert_eq!(space.running_paths().len(), 4);
    }

    #[test]
    fn path_generator_overrides_the_template() {
        let space = ParameterSpace::new("s");
        space.set_path_template("%%x%%");
        let x = space.new_dimension("x", "", ValueType::Int32);
        x.set_values(vec![VariantValue::Int32(3)]).unwrap();
        space.set_path_generator(Some(Arc::new(
            |dims: &[Arc<Dimension>], _: &IndexOverrides| Some(format!("generated_{}", dims.len())),
        )));
        assert_eq!(space.current_relative_run_path().as_deref(), Some("generated_1"));
    }

    #[test]
    fn filesystem_dimension_detection() {
        let space = ParameterSpace::new("s");
        space.set_path_template("out_%%a%%");
        let a = space.new_dimension("a", "", ValueType::Double);
        a.set_values(doubles(&[1.0, 2.0, 3.0])).unwrap();
        let b = space.new_dimension("b", "", ValueType::Double);
        b.set_values(doubles(&[1.0, 2.0, 3.0])).unwrap();

        assert!(space.is_filesystem_dimension("a"));
        assert!(!space.is_filesystem_dimension("b"));
        assert!(!space.is_filesystem_dimension("missing"));
    }

    #[test]
    fn conform_space_sorts_every_dimension() {
        let space = ParameterSpace::new("s");
        let a = space.new_dimension("a", "", ValueType::Double);
        a.set_values(doubles(&[3.0, 1.0, 2.0])).unwrap();
        let b = space.new_dimension("b", "", ValueType::Double);
        b.set_values(doubles(&[0.5, -1.0])).unwrap();

        space.conform_space();

        for dim in space.dimensions() {
            let values = dim.values();
            assert!(values.windows(2).all(|w| w[0].compare(&w[1]) != Some(std::cmp::Ordering::Greater)));
            assert_eq!(dim.min(), values.first().cloned());
            assert_eq!(dim.max(), values.last().cloned());
        }
    }

    #[test]
    fn configuration_uses_each_representation() {
        let space = ParameterSpace::new("s");
        let a = space.new_dimension("a", "", ValueType::Double);
        a.set_values(doubles(&[0.1, 0.2])).unwrap();
        a.set_representation(Representation::Index);
        a.set_current_index(1);

        let config = space.configuration();
        assert_eq!(config.get("a"), Some(&VariantValue::UInt64(1)));
    }

    #[test]
    fn deep_copy_does_not_alias() {
        let space = ParameterSpace::new("s");
        let a = space.new_dimension("a", "", ValueType::Double);
        a.set_values(doubles(&[0.1, 0.2])).unwrap();

        let copy = space.deep_copy();
        let copied = copy.get_dimension("a", "").unwrap();
        copied.set_current_index(1);

        assert_eq!(a.current_index(), 0);
        assert_ne!(copy.id(), space.id());
    }
}
