//! # Component Storage
//!
//! One dense store per component type, kept sorted by entity:
//! - Appending a larger entity id is O(1) amortized
//! - Any other insert binary searches and shift-inserts
//! - Removal sets a tombstone in place; `gc` compacts
//!
//! Records are laid out as three parallel columns (entities, tombstones,
//! data) so the query engine can merge-join over the entity column without
//! touching component data.

use std::any::TypeId;
use std::fmt;
use std::mem::size_of;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::de::value::{Error as ValueError, UnitDeserializer};
use serde::de::IntoDeserializer;
use serde::Deserialize;
use tracing::{debug, warn};

use super::component::{Component, ComponentValue};
use super::entity::Entity;
use super::events::{ComponentRemoved, EventBus};
use super::watcher::{ComponentWatcher, WatcherSlot};
use super::weak::{WeakRef, WeakSlot};
use super::world::World;
use crate::error::{fatal, EcsError, SnapshotError};

/// Result of [`ComponentStore::insert`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The entity had no live record; one was created or revived.
    Added,
    /// A live record existed and its data was overwritten.
    Replaced,
}

/// Entity-sorted storage for a single component type.
pub struct ComponentStore<T: Component> {
    entities: Vec<Entity>,
    tombstones: Vec<bool>,
    data: Vec<T>,
    live: usize,
    /// Sorted by entity.
    weak: Mutex<Vec<Arc<WeakSlot>>>,
    watchers: Mutex<Vec<Arc<WatcherSlot>>>,
    affinity: Option<Arc<AffinityGroup>>,
}

impl<T: Component> ComponentStore<T> {
    /// Creates an empty store with room for `capacity` records.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entities: Vec::with_capacity(capacity),
            tombstones: Vec::with_capacity(capacity),
            data: Vec::with_capacity(capacity),
            live: 0,
            weak: Mutex::new(Vec::new()),
            watchers: Mutex::new(Vec::new()),
            affinity: None,
        }
    }

    /// Inserts `value` for `entity`, overwriting any live record.
    pub fn insert(&mut self, entity: Entity, value: T) -> InsertOutcome {
        let before = self.capacity();

        let outcome = if self.entities.last().map_or(true, |&last| entity > last) {
            self.entities.push(entity);
            self.tombstones.push(false);
            self.data.push(value);
            self.live += 1;
            self.touch_weak(entity, self.entities.len() - 1);
            InsertOutcome::Added
        } else {
            match self.entities.binary_search(&entity) {
                Ok(i) => {
                    self.data[i] = value;
                    if self.tombstones[i] {
                        self.tombstones[i] = false;
                        self.live += 1;
                        self.touch_weak(entity, i);
                        InsertOutcome::Added
                    } else {
                        InsertOutcome::Replaced
                    }
                }
                Err(i) => {
                    self.entities.insert(i, entity);
                    self.tombstones.insert(i, false);
                    self.data.insert(i, value);
                    self.live += 1;
                    self.shift_weak(entity, i);
                    InsertOutcome::Added
                }
            }
        };

        let after = self.capacity();
        if after > before {
            if let Some(group) = &self.affinity {
                group.sync(TypeId::of::<T>(), after);
            }
        }
        if outcome == InsertOutcome::Added {
            for watcher in self.watchers.get_mut().iter() {
                watcher.fire_added(entity);
            }
        }
        outcome
    }

    /// Tombstones the live record for `entity` and returns a copy of its data.
    pub fn remove(&mut self, entity: Entity) -> Option<T> {
        let i = self.live_index(entity)?;
        self.tombstones[i] = true;
        self.live -= 1;
        let weak = self.weak.lock();
        if let Ok(w) = weak.binary_search_by_key(&entity, |s| s.entity) {
            weak[w].set_index(None);
        }
        drop(weak);
        for watcher in self.watchers.get_mut().iter() {
            watcher.fire_removed(entity);
        }
        Some(self.data[i].clone())
    }

    /// Position of the live record for `entity`.
    #[must_use]
    pub fn live_index(&self, entity: Entity) -> Option<usize> {
        let i = self.entities.binary_search(&entity).ok()?;
        (!self.tombstones[i]).then_some(i)
    }

    /// Returns the live component for `entity`.
    #[must_use]
    pub fn get(&self, entity: Entity) -> Option<&T> {
        self.live_index(entity).map(|i| &self.data[i])
    }

    /// Returns the live component for `entity` mutably.
    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        self.live_index(entity).map(move |i| &mut self.data[i])
    }

    /// Checks if `entity` has a live record.
    #[inline]
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.live_index(entity).is_some()
    }

    /// Compacts tombstoned records and refreshes every weak reference.
    ///
    /// Returns the number of records dropped.
    pub fn gc(&mut self) -> usize {
        let dropped = self.entities.len() - self.live;
        if dropped > 0 {
            let mut write = 0;
            for read in 0..self.entities.len() {
                if self.tombstones[read] {
                    continue;
                }
                if read != write {
                    self.entities.swap(read, write);
                    self.tombstones.swap(read, write);
                    self.data.swap(read, write);
                }
                write += 1;
            }
            self.entities.truncate(write);
            self.tombstones.truncate(write);
            self.data.truncate(write);
        }

        let mut weak = self.weak.lock();
        weak.retain(|slot| slot.uses() > 0);
        for slot in weak.iter() {
            slot.set_index(self.entities.binary_search(&slot.entity).ok());
        }
        self.sweep_watchers();
        dropped
    }

    /// Number of live records.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.live
    }

    /// Returns `true` if there are no live records.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of records held, tombstoned ones included.
    #[inline]
    #[must_use]
    pub fn raw_len(&self) -> usize {
        self.entities.len()
    }

    /// Reserved record slots.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.entities.capacity()
    }

    /// Grows every column to hold at least `capacity` records.
    pub fn reserve_to(&mut self, capacity: usize) {
        let extra = capacity.saturating_sub(self.entities.len());
        self.entities.reserve_exact(extra);
        self.tombstones.reserve_exact(extra);
        self.data.reserve_exact(extra);
    }

    /// Iterates live records in entity order.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.entities
            .iter()
            .zip(&self.tombstones)
            .zip(&self.data)
            .filter(|((_, &dead), _)| !dead)
            .map(|((&entity, _), data)| (entity, data))
    }

    /// Entity and tombstone columns.
    #[inline]
    #[must_use]
    pub fn columns(&self) -> (&[Entity], &[bool]) {
        (&self.entities, &self.tombstones)
    }

    /// Entity and tombstone columns alongside the mutable data column.
    #[inline]
    pub fn columns_mut(&mut self) -> (&[Entity], &[bool], &mut [T]) {
        (&self.entities, &self.tombstones, &mut self.data)
    }

    /// Number of entities with at least one outstanding weak reference.
    #[must_use]
    pub fn weak_ref_count(&self) -> usize {
        self.weak.lock().iter().filter(|s| s.uses() > 0).count()
    }

    /// Number of attached watchers.
    #[must_use]
    pub fn watcher_count(&self) -> usize {
        self.watchers.lock().iter().filter(|w| w.is_active()).count()
    }

    pub(crate) fn add_watcher(&self, watcher: Arc<WatcherSlot>) {
        self.watchers.lock().push(watcher);
    }

    /// Forgets destroyed watchers.
    pub(crate) fn sweep_watchers(&self) {
        self.watchers.lock().retain(|w| w.is_active());
    }

    #[cfg(test)]
    pub(crate) fn watchers_len(&self) -> usize {
        self.watchers.lock().len()
    }

    /// Record at a position the caller obtained from a query cursor.
    pub(crate) fn record_mut(&mut self, entity: Entity, index: usize) -> &mut T {
        if self.entities.get(index) != Some(&entity) || self.tombstones[index] {
            fatal(EcsError::InvalidQuery(format!(
                "cursor for `{}` points at a record that moved",
                T::UUID
            )));
        }
        &mut self.data[index]
    }

    pub(crate) fn data_at(&self, index: usize) -> Option<&T> {
        self.data.get(index)
    }

    pub(crate) fn data_at_mut(&mut self, index: usize) -> Option<&mut T> {
        self.data.get_mut(index)
    }

    /// Returns the shared slot for `entity`, creating it if needed.
    pub(crate) fn acquire_weak(&self, entity: Entity) -> Option<Arc<WeakSlot>> {
        let index = self.live_index(entity)?;
        let mut weak = self.weak.lock();
        match weak.binary_search_by_key(&entity, |s| s.entity) {
            Ok(w) => {
                let slot = Arc::clone(&weak[w]);
                slot.acquire();
                slot.set_index(Some(index));
                Some(slot)
            }
            Err(w) => {
                let slot = Arc::new(WeakSlot::new(entity, index));
                weak.insert(w, Arc::clone(&slot));
                Some(slot)
            }
        }
    }

    /// Forgets the slot for `entity` once nothing uses it.
    pub(crate) fn prune_weak(&self, entity: Entity) {
        let mut weak = self.weak.lock();
        if let Ok(w) = weak.binary_search_by_key(&entity, |s| s.entity) {
            if weak[w].uses() == 0 {
                weak.remove(w);
            }
        }
    }

    /// Current position of the slot's live record, refreshing its cache.
    pub(crate) fn resolve_slot(&self, slot: &WeakSlot) -> Option<usize> {
        if let Some(i) = slot.index() {
            if self.entities.get(i) == Some(&slot.entity) && !self.tombstones[i] {
                return Some(i);
            }
        }
        let found = self.live_index(slot.entity);
        slot.set_index(found);
        found
    }

    fn touch_weak(&self, entity: Entity, index: usize) {
        let weak = self.weak.lock();
        if let Ok(w) = weak.binary_search_by_key(&entity, |s| s.entity) {
            weak[w].set_index(Some(index));
        }
    }

    /// Every slot after `entity` moved one position right.
    fn shift_weak(&self, entity: Entity, index: usize) {
        let weak = self.weak.lock();
        let start = weak.partition_point(|s| s.entity < entity);
        for slot in &weak[start..] {
            if slot.entity == entity {
                slot.set_index(Some(index));
            } else {
                slot.shift_right();
            }
        }
    }
}

impl<T: Component> Default for ComponentStore<T> {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

impl<T: Component> fmt::Debug for ComponentStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentStore")
            .field("component", &T::UUID)
            .field("live", &self.live)
            .field("raw_len", &self.entities.len())
            .field("capacity", &self.capacity())
            .finish_non_exhaustive()
    }
}

/// Shared handle to a component store.
///
/// Cloning is cheap; every clone and every shallow copy of the world sees the
/// same records.
pub struct StoreHandle<T: Component> {
    inner: Arc<RwLock<ComponentStore<T>>>,
}

impl<T: Component> StoreHandle<T> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ComponentStore::with_capacity(capacity))),
        }
    }

    /// Shared access to the store.
    ///
    /// # Panics
    ///
    /// Panics if the store is mutably borrowed, e.g. by a live query item.
    pub fn read(&self) -> RwLockReadGuard<'_, ComponentStore<T>> {
        read_store(&self.inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, ComponentStore<T>> {
        write_store(&self.inner)
    }

    /// Creates or shares a weak reference to `entity`'s record.
    ///
    /// Returns `None` if the entity has no live record in this store.
    pub fn weak_ref(&self, entity: Entity) -> Option<WeakRef<T>> {
        let slot = self.read().acquire_weak(entity)?;
        Some(WeakRef::new(self, slot))
    }

    /// Attaches a watcher with no callbacks yet; see [`ComponentWatcher`].
    pub fn watch(&self) -> ComponentWatcher<T> {
        ComponentWatcher::attach(self)
    }

    pub(crate) fn downgrade(&self) -> Weak<RwLock<ComponentStore<T>>> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn erased(&self) -> Arc<dyn ErasedStore> {
        Arc::clone(&self.inner) as Arc<dyn ErasedStore>
    }
}

impl<T: Component> Clone for StoreHandle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Component> fmt::Debug for StoreHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StoreHandle").field(&T::UUID).finish()
    }
}

fn read_store<T: Component>(lock: &RwLock<ComponentStore<T>>) -> RwLockReadGuard<'_, ComponentStore<T>> {
    lock.try_read()
        .unwrap_or_else(|| fatal(EcsError::StoreBorrowed { uuid: T::UUID }))
}

fn write_store<T: Component>(
    lock: &RwLock<ComponentStore<T>>,
) -> RwLockWriteGuard<'_, ComponentStore<T>> {
    lock.try_write()
        .unwrap_or_else(|| fatal(EcsError::StoreBorrowed { uuid: T::UUID }))
}

/// Type-erased view of a store, used by the registry for whole-entity
/// operations and by snapshots.
pub(crate) trait ErasedStore: Send + Sync {
    fn uuid(&self) -> &'static str;
    fn capacity(&self) -> usize;
    /// Removes `entity`'s record and emits `ComponentRemoved`. Returns `false` if absent.
    fn remove_into(&self, entity: Entity, events: &EventBus, origin: usize) -> bool;
    fn gc(&self) -> usize;
    /// Grows to `capacity`; returns `false` if the store is borrowed.
    fn grow_to(&self, capacity: usize) -> bool;
    fn set_affinity(&self, group: Arc<AffinityGroup>);
    fn export(&self, entity: Entity) -> Option<Result<toml::Value, SnapshotError>>;
    fn decode(&self, value: &toml::Value) -> Result<Box<dyn ComponentValue>, SnapshotError>;
}

impl<T: Component> ErasedStore for RwLock<ComponentStore<T>> {
    fn uuid(&self) -> &'static str {
        T::UUID
    }

    fn capacity(&self) -> usize {
        read_store(self).capacity()
    }

    fn remove_into(&self, entity: Entity, events: &EventBus, origin: usize) -> bool {
        let removed = write_store(self).remove(entity);
        match removed {
            Some(data) => {
                events.send(ComponentRemoved { entity, data }, origin);
                true
            }
            None => false,
        }
    }

    fn gc(&self) -> usize {
        write_store(self).gc()
    }

    fn grow_to(&self, capacity: usize) -> bool {
        match self.try_write() {
            Some(mut store) => {
                store.reserve_to(capacity);
                true
            }
            None => false,
        }
    }

    fn set_affinity(&self, group: Arc<AffinityGroup>) {
        write_store(self).affinity = Some(group);
    }

    fn export(&self, entity: Entity) -> Option<Result<toml::Value, SnapshotError>> {
        let store = read_store(self);
        let data = store.get(entity)?;
        Some(encode_payload(data).map_err(|source| SnapshotError::Encode { uuid: T::UUID, source }))
    }

    fn decode(&self, value: &toml::Value) -> Result<Box<dyn ComponentValue>, SnapshotError> {
        let data: T = decode_payload(value)
            .map_err(|source| SnapshotError::Decode { uuid: T::UUID, source })?;
        Ok(Box::new(data))
    }
}

/// TOML has no unit value; data-less components travel as an empty table.
fn encode_payload<T: Component>(data: &T) -> Result<toml::Value, toml::ser::Error> {
    match toml::Value::try_from(data) {
        Err(_) if size_of::<T>() == 0 => Ok(toml::Value::Table(toml::Table::new())),
        encoded => encoded,
    }
}

fn decode_payload<T: Component>(value: &toml::Value) -> Result<T, toml::de::Error> {
    match value.clone().try_into::<T>() {
        Err(err) if size_of::<T>() == 0 && value.as_table().is_some_and(toml::Table::is_empty) => {
            let unit: UnitDeserializer<ValueError> = ().into_deserializer();
            T::deserialize(unit).map_err(|_| err)
        }
        decoded => decoded,
    }
}

/// Stores that grow together.
///
/// When any member reallocates, every other member is reserved to the same
/// capacity so jointly iterated columns stay comparably sized.
pub struct AffinityGroup {
    members: Vec<(TypeId, &'static str, Weak<dyn ErasedStore>)>,
}

impl AffinityGroup {
    pub(crate) fn sync(&self, origin: TypeId, capacity: usize) {
        for (type_id, uuid, member) in &self.members {
            if *type_id == origin {
                continue;
            }
            let Some(store) = member.upgrade() else {
                continue;
            };
            if !store.grow_to(capacity) {
                warn!(component = uuid, capacity, "affinity sibling is borrowed, growth skipped");
            }
        }
    }

    /// Uuids of the member component types.
    pub fn uuids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.members.iter().map(|(_, uuid, _)| *uuid)
    }

    /// Number of member stores.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns `true` if the group has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl fmt::Debug for AffinityGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.uuids()).finish()
    }
}

/// Builds an [`AffinityGroup`]. Obtained from [`World::affinity`].
pub struct AffinityBuilder<'w> {
    world: &'w World,
    members: Vec<(TypeId, Arc<dyn ErasedStore>)>,
}

impl<'w> AffinityBuilder<'w> {
    pub(crate) fn new(world: &'w World) -> Self {
        Self {
            world,
            members: Vec::new(),
        }
    }

    /// Adds the store of component `T`, registering the type if needed.
    #[must_use]
    pub fn with<T: Component>(mut self) -> Self {
        let type_id = TypeId::of::<T>();
        if !self.members.iter().any(|(id, _)| *id == type_id) {
            self.members.push((type_id, self.world.store::<T>().erased()));
        }
        self
    }

    /// Links the member stores and aligns them to the largest capacity.
    pub fn build(self) -> Arc<AffinityGroup> {
        let group = Arc::new(AffinityGroup {
            members: self
                .members
                .iter()
                .map(|(id, store)| (*id, store.uuid(), Arc::downgrade(store)))
                .collect(),
        });
        let capacity = self
            .members
            .iter()
            .map(|(_, store)| store.capacity())
            .max()
            .unwrap_or(0);
        for (_, store) in &self.members {
            store.set_affinity(Arc::clone(&group));
            store.grow_to(capacity);
        }
        debug!(members = ?group, capacity, "affinity group built");
        group
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::component::tests::{Frozen, Position, Velocity};

    fn e(raw: u64) -> Entity {
        Entity::from_raw(raw)
    }

    fn live_entities<T: Component>(store: &ComponentStore<T>) -> Vec<u64> {
        store.iter().map(|(entity, _)| entity.raw()).collect()
    }

    #[test]
    fn test_append_and_shift_insert_keep_order() {
        let mut store = ComponentStore::<Position>::default();
        for raw in [5, 1, 9, 3, 7] {
            assert_eq!(store.insert(e(raw), Position::default()), InsertOutcome::Added);
        }
        assert_eq!(live_entities(&store), vec![1, 3, 5, 7, 9]);
        assert_eq!(store.len(), 5);
    }

    #[test]
    fn test_insert_overwrites_live_record() {
        let mut store = ComponentStore::<Position>::default();
        store.insert(e(1), Position { x: 1, y: 1 });
        assert_eq!(
            store.insert(e(1), Position { x: 2, y: 2 }),
            InsertOutcome::Replaced
        );
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(e(1)), Some(&Position { x: 2, y: 2 }));
    }

    #[test]
    fn test_remove_tombstones_and_returns_copy() {
        let mut store = ComponentStore::<Position>::default();
        store.insert(e(1), Position { x: 4, y: 2 });
        store.insert(e(2), Position::default());

        assert_eq!(store.remove(e(1)), Some(Position { x: 4, y: 2 }));
        assert!(store.remove(e(1)).is_none());
        assert!(store.get(e(1)).is_none());
        assert_eq!(store.len(), 1);
        assert_eq!(store.raw_len(), 2);
    }

    #[test]
    fn test_reinsert_revives_tombstone() {
        let mut store = ComponentStore::<Position>::default();
        store.insert(e(1), Position::default());
        store.insert(e(2), Position::default());
        store.remove(e(1));
        assert_eq!(
            store.insert(e(1), Position { x: 9, y: 9 }),
            InsertOutcome::Added
        );
        assert_eq!(store.raw_len(), 2);
        assert_eq!(store.get(e(1)).unwrap().x, 9);
    }

    #[test]
    fn test_gc_compacts_in_order() {
        let mut store = ComponentStore::<Position>::default();
        for raw in 1..=6 {
            store.insert(e(raw), Position { x: i32::try_from(raw).unwrap(), y: 0 });
        }
        store.remove(e(2));
        store.remove(e(5));
        assert_eq!(store.gc(), 2);
        assert_eq!(store.raw_len(), 4);
        assert_eq!(live_entities(&store), vec![1, 3, 4, 6]);
        assert_eq!(store.get(e(6)).unwrap().x, 6);
        assert_eq!(store.gc(), 0);
    }

    #[test]
    fn test_empty_store_lookups() {
        let mut store = ComponentStore::<Position>::default();
        assert!(store.get(e(1)).is_none());
        assert!(store.remove(e(1)).is_none());
        store.insert(e(1), Position::default());
        store.remove(e(1));
        assert!(store.get(e(1)).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_reserve_to_grows_every_column() {
        let mut store = ComponentStore::<Position>::default();
        store.reserve_to(64);
        assert!(store.capacity() >= 64);
        let (entities, tombstones, data) = store.columns_mut();
        assert!(entities.is_empty() && tombstones.is_empty() && data.is_empty());
    }

    #[test]
    fn test_erased_remove_emits_event() {
        let handle = StoreHandle::<Position>::with_capacity(0);
        handle.write().insert(e(3), Position { x: 1, y: 2 });
        let events = EventBus::default();

        let erased = handle.erased();
        assert!(erased.remove_into(e(3), &events, 0));
        assert!(!erased.remove_into(e(3), &events, 0));

        let removed = events.read::<ComponentRemoved<Position>>(0);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].entity, e(3));
        assert_eq!(removed[0].data, Position { x: 1, y: 2 });
    }

    #[test]
    fn test_erased_export_decode() {
        let handle = StoreHandle::<Position>::with_capacity(0);
        handle.write().insert(e(1), Position { x: 3, y: -4 });
        let erased = handle.erased();

        let value = erased.export(e(1)).unwrap().unwrap();
        assert!(erased.export(e(2)).is_none());
        let decoded = erased.decode(&value).unwrap();
        assert_eq!(decoded.key().uuid(), Position::UUID);

        let bad = toml::Value::String("nope".into());
        assert!(matches!(erased.decode(&bad), Err(SnapshotError::Decode { .. })));
    }

    #[test]
    fn test_unit_component_exports_as_empty_table() {
        let handle = StoreHandle::<Frozen>::with_capacity(0);
        handle.write().insert(e(4), Frozen);
        let erased = handle.erased();

        let value = erased.export(e(4)).unwrap().unwrap();
        assert_eq!(value, toml::Value::Table(toml::Table::new()));
        assert_eq!(erased.decode(&value).unwrap().key().uuid(), Frozen::UUID);

        let bad = toml::Value::Integer(1);
        assert!(matches!(erased.decode(&bad), Err(SnapshotError::Decode { .. })));
    }

    #[test]
    fn test_affinity_group_grows_siblings() {
        let world = World::new();
        let group = world.affinity().with::<Position>().with::<Velocity>().build();
        assert_eq!(group.len(), 2);

        let positions = world.store::<Position>();
        let velocities = world.store::<Velocity>();
        for raw in 1..=100 {
            positions.write().insert(e(raw), Position::default());
        }
        assert!(velocities.read().capacity() >= positions.read().capacity());
        assert!(velocities.read().is_empty());
    }

    #[test]
    #[should_panic(expected = "is already borrowed")]
    fn test_conflicting_borrow_is_fatal() {
        let handle = StoreHandle::<Position>::with_capacity(0);
        let _guard = handle.write();
        let _ = handle.read();
    }
}
