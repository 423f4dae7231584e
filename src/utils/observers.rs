// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observer lists used for change notification across the crate.
//!
//! Every object that announces changes (dimensions, parameter spaces,
//! processors, disk buffers) owns one or more `Observers<E>` lists instead of
//! ad hoc callback fields. Subscribing returns a `SubscriptionId` that can be
//! used to detach the callback again, so the lifetime of a listener is never
//! tied to the lifetime of the closure's captures.
//!
//! Each event carries an [`Origin`] so that listeners relaying changes over the
//! network can skip the connection a change came from.

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Identifies the connection a mutation arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionTag(pub u64);

impl fmt::Display for ConnectionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Where a change originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Origin {
    /// Changed by code running on this node.
    #[default]
    Local,
    /// Applied from a message received on the given connection.
    Remote(ConnectionTag),
}

impl Origin {
    /// True if the change arrived on `tag`.
    pub fn is_from(&self, tag: ConnectionTag) -> bool {
        matches!(self, Origin::Remote(t) if *t == tag)
    }
}

/// Handle returned by [`Observers::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// A list of callbacks notified with `&E`.
///
/// Callbacks are invoked outside the internal lock, so a callback may
/// subscribe or unsubscribe without deadlocking.
pub struct Observers<E> {
    next_id: AtomicU64,
    callbacks: Mutex<Vec<(SubscriptionId, Callback<E>)>>,
}

impl<E> Observers<E> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            callbacks: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.callbacks.lock().push((id, Arc::new(callback)));
        id
    }

    /// Remove a callback. Returns false if the id was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut callbacks = self.callbacks.lock();
        let before = callbacks.len();
        callbacks.retain(|(existing, _)| *existing != id);
        callbacks.len() != before
    }

    pub fn notify(&self, event: &E) {
        let snapshot: Vec<Callback<E>> = self
            .callbacks
            .lock()
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();
        for callback in snapshot {
            callback(event);
        }
    }

    pub fn len(&self) -> usize {
        self.callbacks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.lock().is_empty()
    }
}

impl<E> Default for Observers<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Observers<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("subscribers", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn notify_reaches_every_subscriber() {
        let observers: Observers<u32> = Observers::new();
        let total = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let total = total.clone();
            observers.subscribe(move |value| {
                total.fetch_add(*value as usize, Ordering::SeqCst);
            });
        }

        observers.notify(&2);
        assert_eq!(total.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn unsubscribe_detaches_callback() {
        let observers: Observers<()> = Observers::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let id = observers.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(observers.unsubscribe(id));
        assert!(!observers.unsubscribe(id));
        observers.notify(&());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(observers.is_empty());
    }

    #[test]
    fn origin_matches_only_its_connection() {
        let origin = Origin::Remote(ConnectionTag(4));
        assert!(origin.is_from(ConnectionTag(4)));
        assert!(!origin.is_from(ConnectionTag(5)));
        assert!(!Origin::Local.is_from(ConnectionTag(4)));
    }
}
