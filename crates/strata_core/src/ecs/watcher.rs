//! # Component Watchers
//!
//! A [`ComponentWatcher`] observes one component store and is called
//! synchronously from inside the store whenever a live record appears or
//! disappears. Overwriting a live record is not reported.
//!
//! Callbacks run while the store is mutably borrowed, so they must not touch
//! the watched store; reading any other store is fine.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use super::component::Component;
use super::entity::Entity;
use super::storage::{ComponentStore, StoreHandle};

type Callback = Box<dyn FnMut(Entity) + Send>;

/// Callbacks of one watcher, shared between the handle and the store.
pub(crate) struct WatcherSlot {
    active: AtomicBool,
    added: Mutex<Option<Callback>>,
    removed: Mutex<Option<Callback>>,
}

impl WatcherSlot {
    fn new() -> Self {
        Self {
            active: AtomicBool::new(true),
            added: Mutex::new(None),
            removed: Mutex::new(None),
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    pub(crate) fn fire_added(&self, entity: Entity) {
        if !self.is_active() {
            return;
        }
        if let Some(callback) = self.added.lock().as_mut() {
            callback(entity);
        }
    }

    pub(crate) fn fire_removed(&self, entity: Entity) {
        if !self.is_active() {
            return;
        }
        if let Some(callback) = self.removed.lock().as_mut() {
            callback(entity);
        }
    }
}

/// Handle that keeps a set of add/remove callbacks attached to a store.
///
/// Obtained from [`World::watch`](crate::World::watch) or
/// [`StoreHandle::watch`]. The callbacks stay attached until the handle is
/// destroyed or dropped.
///
/// ```rust,ignore
/// let spawned = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&spawned);
/// let watcher = world
///     .watch::<Position>()
///     .on_added(move |_| {
///         counter.fetch_add(1, Ordering::Relaxed);
///     });
/// world.spawn_bundle((Position::default(),));
/// watcher.destroy();
/// ```
#[must_use = "dropping a watcher detaches it"]
pub struct ComponentWatcher<T: Component> {
    store: Weak<RwLock<ComponentStore<T>>>,
    slot: Arc<WatcherSlot>,
}

impl<T: Component> ComponentWatcher<T> {
    pub(crate) fn attach(store: &StoreHandle<T>) -> Self {
        let slot = Arc::new(WatcherSlot::new());
        store.read().add_watcher(Arc::clone(&slot));
        Self {
            store: store.downgrade(),
            slot,
        }
    }

    /// Calls `f` with the entity each time it gains a live record.
    pub fn on_added(self, f: impl FnMut(Entity) + Send + 'static) -> Self {
        *self.slot.added.lock() = Some(Box::new(f));
        self
    }

    /// Calls `f` with the entity each time its live record is removed.
    pub fn on_removed(self, f: impl FnMut(Entity) + Send + 'static) -> Self {
        *self.slot.removed.lock() = Some(Box::new(f));
        self
    }

    /// Whether the watched store still exists.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.store.strong_count() > 0
    }

    /// Detaches the callbacks. Equivalent to dropping the handle.
    pub fn destroy(self) {
        drop(self);
    }
}

impl<T: Component> Drop for ComponentWatcher<T> {
    fn drop(&mut self) {
        self.slot.active.store(false, Ordering::Relaxed);
        // A borrowed store sweeps inactive watchers on its next gc.
        if let Some(store) = self.store.upgrade() {
            if let Some(guard) = store.try_read() {
                guard.sweep_watchers();
            }
        }
    }
}

impl<T: Component> fmt::Debug for ComponentWatcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentWatcher")
            .field("component", &T::UUID)
            .field("on_added", &self.slot.added.lock().is_some())
            .field("on_removed", &self.slot.removed.lock().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::ecs::component::tests::Position;

    fn counter() -> (Arc<AtomicUsize>, impl FnMut(Entity) + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let shared = Arc::clone(&count);
        (count, move |_| {
            shared.fetch_add(1, Ordering::Relaxed);
        })
    }

    #[test]
    fn test_fires_on_add_and_remove_only() {
        let handle = StoreHandle::<Position>::with_capacity(0);
        let (added, on_added) = counter();
        let (removed, on_removed) = counter();
        let watcher = handle.watch().on_added(on_added).on_removed(on_removed);

        let e = Entity::from_raw(3);
        handle.write().insert(e, Position::default());
        handle.write().insert(e, Position { x: 1, y: 1 });
        assert_eq!(added.load(Ordering::Relaxed), 1);

        handle.write().remove(e);
        handle.write().remove(e);
        assert_eq!(removed.load(Ordering::Relaxed), 1);

        handle.write().insert(e, Position::default());
        assert_eq!(added.load(Ordering::Relaxed), 2);
        assert!(watcher.is_attached());
        assert_eq!(handle.read().watcher_count(), 1);
    }

    #[test]
    fn test_destroy_detaches() {
        let handle = StoreHandle::<Position>::with_capacity(0);
        let (added, on_added) = counter();
        let watcher = handle.watch().on_added(on_added);
        watcher.destroy();

        handle.write().insert(Entity::from_raw(1), Position::default());
        assert_eq!(added.load(Ordering::Relaxed), 0);
        assert_eq!(handle.read().watcher_count(), 0);
    }

    #[test]
    fn test_destroy_inside_callback_is_swept_by_gc() {
        let handle = StoreHandle::<Position>::with_capacity(0);
        let parked = Arc::new(Mutex::new(None));
        let inner = Arc::clone(&parked);
        let watcher = handle.watch().on_removed(move |_| {
            if let Some(watcher) = inner.lock().take() {
                ComponentWatcher::<Position>::destroy(watcher);
            }
        });
        *parked.lock() = Some(watcher);

        let e = Entity::from_raw(1);
        handle.write().insert(e, Position::default());
        handle.write().remove(e);
        assert_eq!(handle.read().watcher_count(), 0);
        handle.write().gc();
        assert_eq!(handle.read().watchers_len(), 0);
    }
}
