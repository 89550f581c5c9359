//! # Weak References
//!
//! A [`WeakRef`] names one entity's record inside one component store
//! without owning the store. It caches the record's array position; the
//! store refreshes that cache when inserts or garbage collection shift
//! records, and sets it to "stale" when the record is removed. A stale
//! cache is re-resolved by binary search on the next access.

use std::fmt;
use std::sync::atomic::{AtomicIsize, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use super::component::Component;
use super::entity::Entity;
use super::storage::{ComponentStore, StoreHandle};
use crate::error::{fatal, EcsError};

const STALE: isize = -1;

/// Shared bookkeeping for all handles to one entity in one store.
///
/// The store keeps these sorted by entity.
pub(crate) struct WeakSlot {
    pub(crate) entity: Entity,
    index: AtomicIsize,
    uses: AtomicUsize,
}

impl WeakSlot {
    pub(crate) fn new(entity: Entity, index: usize) -> Self {
        Self {
            entity,
            index: AtomicIsize::new(to_slot(Some(index))),
            uses: AtomicUsize::new(1),
        }
    }

    /// Last known array position, `None` when stale.
    pub(crate) fn index(&self) -> Option<usize> {
        usize::try_from(self.index.load(Ordering::Relaxed)).ok()
    }

    pub(crate) fn set_index(&self, index: Option<usize>) {
        self.index.store(to_slot(index), Ordering::Relaxed);
    }

    /// Moves the cached position one slot right if it is not stale.
    pub(crate) fn shift_right(&self) {
        if let Some(i) = self.index() {
            self.set_index(Some(i + 1));
        }
    }

    pub(crate) fn uses(&self) -> usize {
        self.uses.load(Ordering::Relaxed)
    }

    pub(crate) fn acquire(&self) {
        self.uses.fetch_add(1, Ordering::Relaxed);
    }

    /// Drops one use and returns how many remain.
    fn release(&self) -> usize {
        self.uses.fetch_sub(1, Ordering::Relaxed) - 1
    }
}

fn to_slot(index: Option<usize>) -> isize {
    index.and_then(|i| isize::try_from(i).ok()).unwrap_or(STALE)
}

/// Reference-counted, auto-invalidating handle to a component record.
///
/// Obtained from [`World::weak_ref`](crate::World::weak_ref) or
/// [`StoreHandle::weak_ref`]. Every clone shares one use count; the store
/// forgets the entity's slot when the last handle is released or dropped.
pub struct WeakRef<T: Component> {
    store: Weak<RwLock<ComponentStore<T>>>,
    slot: Arc<WeakSlot>,
}

impl<T: Component> WeakRef<T> {
    pub(crate) fn new(store: &StoreHandle<T>, slot: Arc<WeakSlot>) -> Self {
        Self {
            store: store.downgrade(),
            slot,
        }
    }

    /// The referenced entity.
    #[inline]
    #[must_use]
    pub fn entity(&self) -> Entity {
        self.slot.entity
    }

    /// Number of live handles sharing this reference.
    #[must_use]
    pub fn use_count(&self) -> usize {
        self.slot.uses()
    }

    /// Cached array position, `None` when the record was removed since the last refresh.
    #[must_use]
    pub fn last_index(&self) -> Option<usize> {
        self.slot.index()
    }

    /// Runs `f` on the referenced component, or returns `None` if it is gone.
    ///
    /// # Panics
    ///
    /// Panics if the owning store was dropped or is mutably borrowed.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let store = self.upgrade();
        let guard = store
            .try_read()
            .unwrap_or_else(|| fatal(EcsError::StoreBorrowed { uuid: T::UUID }));
        let index = guard.resolve_slot(&self.slot)?;
        guard.data_at(index).map(f)
    }

    /// Runs `f` on the referenced component mutably, or returns `None` if it is gone.
    ///
    /// # Panics
    ///
    /// Panics if the owning store was dropped or is already borrowed.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let store = self.upgrade();
        let mut guard = store
            .try_write()
            .unwrap_or_else(|| fatal(EcsError::StoreBorrowed { uuid: T::UUID }));
        let index = guard.resolve_slot(&self.slot)?;
        guard.data_at_mut(index).map(f)
    }

    /// Copy of the referenced component, or `None` if it is gone.
    #[must_use]
    pub fn get(&self) -> Option<T> {
        self.with(T::clone)
    }

    /// Whether the referenced record is still live.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.with(|_| ()).is_some()
    }

    /// Destroys this handle. Equivalent to dropping it.
    pub fn release(self) {
        drop(self);
    }

    fn upgrade(&self) -> Arc<RwLock<ComponentStore<T>>> {
        self.store
            .upgrade()
            .unwrap_or_else(|| fatal(EcsError::StoreDropped(self.slot.entity)))
    }
}

impl<T: Component> Clone for WeakRef<T> {
    fn clone(&self) -> Self {
        self.slot.acquire();
        Self {
            store: Weak::clone(&self.store),
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T: Component> Drop for WeakRef<T> {
    fn drop(&mut self) {
        if self.slot.release() > 0 {
            return;
        }
        // A store that is borrowed right now prunes the slot on its next refresh.
        if let Some(store) = self.store.upgrade() {
            if let Some(guard) = store.try_read() {
                guard.prune_weak(self.slot.entity);
            }
        }
    }
}

impl<T: Component> fmt::Debug for WeakRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakRef")
            .field("component", &T::UUID)
            .field("entity", &self.slot.entity)
            .field("last_index", &self.slot.index())
            .field("uses", &self.slot.uses())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::component::tests::Position;

    fn store_with(entities: &[u64]) -> StoreHandle<Position> {
        let handle = StoreHandle::<Position>::with_capacity(0);
        {
            let mut store = handle.write();
            for &raw in entities {
                let e = Entity::from_raw(raw);
                store.insert(e, Position { x: i32::try_from(raw).unwrap(), y: 0 });
            }
        }
        handle
    }

    #[test]
    fn test_missing_entity_has_no_ref() {
        let handle = store_with(&[1, 2]);
        assert!(handle.weak_ref(Entity::from_raw(9)).is_none());
    }

    #[test]
    fn test_refs_are_shared_and_counted() {
        let handle = store_with(&[1, 2, 3]);
        let a = handle.weak_ref(Entity::from_raw(2)).unwrap();
        let b = handle.weak_ref(Entity::from_raw(2)).unwrap();
        assert_eq!(a.use_count(), 2);
        let c = a.clone();
        assert_eq!(c.use_count(), 3);
        assert_eq!(handle.read().weak_ref_count(), 1);

        drop(a);
        b.release();
        assert_eq!(c.use_count(), 1);
        assert_eq!(handle.read().weak_ref_count(), 1);
        drop(c);
        assert_eq!(handle.read().weak_ref_count(), 0);
    }

    #[test]
    fn test_shift_insert_refreshes_index() {
        let handle = store_with(&[10, 20, 30]);
        let r = handle.weak_ref(Entity::from_raw(30)).unwrap();
        assert_eq!(r.last_index(), Some(2));

        handle.write().insert(Entity::from_raw(15), Position::default());
        assert_eq!(r.last_index(), Some(3));
        assert_eq!(r.get().unwrap().x, 30);
    }

    #[test]
    fn test_removed_record_reports_gone() {
        let handle = store_with(&[1, 2, 3]);
        let r = handle.weak_ref(Entity::from_raw(2)).unwrap();
        assert!(r.is_alive());

        handle.write().remove(Entity::from_raw(2));
        assert_eq!(r.last_index(), None);
        assert!(r.get().is_none());
        assert!(!r.is_alive());

        // Re-adding the entity makes the lazy re-resolve succeed again.
        handle.write().insert(Entity::from_raw(2), Position { x: 7, y: 7 });
        assert_eq!(r.get(), Some(Position { x: 7, y: 7 }));
    }

    #[test]
    fn test_gc_refreshes_every_ref() {
        let handle = store_with(&[1, 2, 3, 4]);
        let r4 = handle.weak_ref(Entity::from_raw(4)).unwrap();
        handle.write().remove(Entity::from_raw(1));
        handle.write().remove(Entity::from_raw(3));
        assert_eq!(handle.write().gc(), 2);
        assert_eq!(r4.last_index(), Some(1));
        assert_eq!(r4.get().unwrap().x, 4);
    }

    #[test]
    fn test_with_mut_writes_through() {
        let handle = store_with(&[5]);
        let r = handle.weak_ref(Entity::from_raw(5)).unwrap();
        r.with_mut(|p| p.y = 42);
        assert_eq!(handle.read().get(Entity::from_raw(5)).unwrap().y, 42);
    }

    #[test]
    #[should_panic(expected = "used after its component store was dropped")]
    fn test_dropped_store_is_fatal() {
        let handle = store_with(&[1]);
        let r = handle.weak_ref(Entity::from_raw(1)).unwrap();
        drop(handle);
        let _ = r.get();
    }
}
