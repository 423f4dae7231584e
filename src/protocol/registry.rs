// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Per-node object registries with explicit ownership.

use parking_lot::Mutex;
use std::fmt::Display;
use std::sync::Arc;

use crate::errors::RegistryError;
use crate::protocol::data_pool::DataPool;
use crate::protocol::disk_buffer::DiskBuffer;
use crate::protocol::ObjectKind;
use crate::space::{Dimension, ParameterSpace};
use crate::traits::Processor;
use crate::utils::{Origin, SubscriptionId};

/// Who is responsible for an object's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ownership {
    /// Created from a peer's REGISTER. Dropped on REMOVE or node shutdown.
    Owned,
    /// Registered by the embedding application. The protocol never drops it.
    Borrowed,
}

/// Objects a node can relay. The node subscribes to each registered object's
/// change notifications and detaches again when the object leaves the
/// registry.
pub trait Replicated: Send + Sync {
    fn detach_relay(&self, subscription: SubscriptionId);
}

impl Replicated for Dimension {
    fn detach_relay(&self, subscription: SubscriptionId) {
        self.unsubscribe(subscription);
    }
}

impl Replicated for ParameterSpace {
    fn detach_relay(&self, subscription: SubscriptionId) {
        self.unsubscribe(subscription);
    }
}

impl Replicated for dyn Processor {
    fn detach_relay(&self, subscription: SubscriptionId) {
        self.core().unsubscribe(subscription);
    }
}

impl Replicated for DiskBuffer {
    fn detach_relay(&self, subscription: SubscriptionId) {
        self.unsubscribe(subscription);
    }
}

impl Replicated for DataPool {
    fn detach_relay(&self, _subscription: SubscriptionId) {}
}

struct Entry<K, T: ?Sized> {
    key: K,
    object: Arc<T>,
    ownership: Ownership,
    origin: Origin,
    relay: Option<SubscriptionId>,
}

/// Registered objects of one kind, in registration order.
pub struct Registry<K, T: ?Sized> {
    kind: ObjectKind,
    entries: Mutex<Vec<Entry<K, T>>>,
}

fn same_instance<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

impl<K, T> Registry<K, T>
where
    K: Clone + PartialEq + Display,
    T: ?Sized + Replicated,
{
    pub fn new(kind: ObjectKind) -> Self {
        Self {
            kind,
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// Add `object` under `key`.
    ///
    /// Registering the same instance again is a no-op, except that a borrowed
    /// registration takes over an owned one. A different instance under an
    /// existing key is refused.
    pub fn insert(
        &self,
        key: K,
        object: Arc<T>,
        ownership: Ownership,
        origin: Origin,
    ) -> Result<bool, RegistryError> {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.iter_mut().find(|e| e.key == key) {
            if !same_instance(&entry.object, &object) {
                return Err(RegistryError::DuplicateInstance {
                    kind: self.kind,
                    key: key.to_string(),
                });
            }
            if ownership == Ownership::Borrowed {
                entry.ownership = Ownership::Borrowed;
            }
            return Ok(false);
        }
        entries.push(Entry {
            key,
            object,
            ownership,
            origin,
            relay: None,
        });
        Ok(true)
    }

    /// Remember the node's relay subscription so it is detached on removal.
    pub fn set_relay(&self, key: &K, subscription: SubscriptionId) {
        if let Some(entry) = self.entries.lock().iter_mut().find(|e| e.key == *key) {
            entry.relay = Some(subscription);
        }
    }

    pub fn get(&self, key: &K) -> Option<Arc<T>> {
        self.entries
            .lock()
            .iter()
            .find(|e| e.key == *key)
            .map(|e| e.object.clone())
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.lock().iter().any(|e| e.key == *key)
    }

    pub fn ownership(&self, key: &K) -> Option<Ownership> {
        self.entries
            .lock()
            .iter()
            .find(|e| e.key == *key)
            .map(|e| e.ownership)
    }

    /// Where the registration came from: a peer connection for owned
    /// objects, local otherwise.
    pub fn origin(&self, key: &K) -> Option<Origin> {
        self.entries
            .lock()
            .iter()
            .find(|e| e.key == *key)
            .map(|e| e.origin)
    }

    /// Remove an entry regardless of ownership.
    pub fn remove(&self, key: &K) -> Option<Arc<T>> {
        let entry = {
            let mut entries = self.entries.lock();
            let position = entries.iter().position(|e| e.key == *key)?;
            entries.remove(position)
        };
        if let Some(relay) = entry.relay {
            entry.object.detach_relay(relay);
        }
        Some(entry.object)
    }

    /// Remove an entry only if the protocol owns it.
    pub fn remove_owned(&self, key: &K) -> Result<Arc<T>, Option<Ownership>> {
        match self.ownership(key) {
            Some(Ownership::Owned) => self.remove(key).ok_or(None),
            other => Err(other),
        }
    }

    /// Drop every owned entry. Returns how many were dropped.
    pub fn clear_owned(&self) -> usize {
        let dropped: Vec<Entry<K, T>> = {
            let mut entries = self.entries.lock();
            let (owned, kept): (Vec<_>, Vec<_>) = entries
                .drain(..)
                .partition(|e| e.ownership == Ownership::Owned);
            *entries = kept;
            owned
        };
        for entry in &dropped {
            if let Some(relay) = entry.relay {
                entry.object.detach_relay(relay);
            }
        }
        dropped.len()
    }

    pub fn keys(&self) -> Vec<K> {
        self.entries.lock().iter().map(|e| e.key.clone()).collect()
    }

    pub fn objects(&self) -> Vec<Arc<T>> {
        self.entries.lock().iter().map(|e| e.object.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::{DimensionKey, ValueType};
    use crate::utils::ConnectionTag;

    fn registry() -> Registry<DimensionKey, Dimension> {
        Registry::new(ObjectKind::Parameter)
    }

    fn dimension(name: &str) -> Arc<Dimension> {
        Arc::new(Dimension::new(name, "", ValueType::Double))
    }

    #[test]
    fn same_instance_registers_once() {
        let registry = registry();
        let dim = dimension("eci1");
        assert!(registry.insert(dim.key().clone(), dim.clone(), Ownership::Borrowed, Origin::Local).unwrap());
        assert!(!registry.insert(dim.key().clone(), dim.clone(), Ownership::Borrowed, Origin::Local).unwrap());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn a_second_instance_under_the_same_key_is_a_typed_error() {
        let registry = registry();
        let first = dimension("eci1");
        let second = dimension("eci1");
        registry
            .insert(first.key().clone(), first, Ownership::Borrowed, Origin::Local)
            .unwrap();

        let error = registry
            .insert(second.key().clone(), second, Ownership::Borrowed, Origin::Local)
            .unwrap_err();
        assert_eq!(
            error,
            RegistryError::DuplicateInstance {
                kind: ObjectKind::Parameter,
                key: "eci1".to_string()
            }
        );
    }

    #[test]
    fn borrowed_objects_survive_owned_cleanup() {
        let registry = registry();
        let local = dimension("local");
        let remote = dimension("remote");
        let origin = Origin::Remote(ConnectionTag(3));
        registry
            .insert(local.key().clone(), local.clone(), Ownership::Borrowed, Origin::Local)
            .unwrap();
        registry
            .insert(remote.key().clone(), remote.clone(), Ownership::Owned, origin)
            .unwrap();

        assert_eq!(registry.origin(remote.key()), Some(origin));
        assert_eq!(registry.remove_owned(local.key()).unwrap_err(), Some(Ownership::Borrowed));
        assert_eq!(registry.clear_owned(), 1);
        assert_eq!(registry.keys(), vec![local.key().clone()]);
    }

    #[test]
    fn borrowing_takes_over_an_owned_registration() {
        let registry = registry();
        let dim = dimension("shared");
        registry
            .insert(dim.key().clone(), dim.clone(), Ownership::Owned, Origin::Remote(ConnectionTag(1)))
            .unwrap();
        registry
            .insert(dim.key().clone(), dim.clone(), Ownership::Borrowed, Origin::Local)
            .unwrap();
        assert_eq!(registry.ownership(dim.key()), Some(Ownership::Borrowed));
    }

    #[test]
    fn removal_detaches_the_relay() {
        let registry = registry();
        let dim = dimension("watched");
        registry
            .insert(dim.key().clone(), dim.clone(), Ownership::Borrowed, Origin::Local)
            .unwrap();
        let relay = dim.subscribe(|_| {});
        registry.set_relay(dim.key(), relay);

        registry.remove(dim.key());
        assert!(!dim.unsubscribe(relay));
    }
}
