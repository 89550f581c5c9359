//! # Entity Management
//!
//! Entities are opaque 64-bit ids handed out in increasing order and never
//! reused within a world. The [`EntityTable`] keeps one [`EntityRecord`] per
//! entity, sorted by id, and is the source of truth for which component
//! types an entity owns.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::mask::ComponentMask;

/// Unique identifier for an entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct Entity(u64);

impl Entity {
    /// Null/invalid entity.
    pub const NULL: Self = Self(u64::MAX);

    /// Wraps a raw id.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Checks if this entity is null/invalid.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u64::MAX
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Entity with its membership mask.
#[derive(Clone, Debug)]
pub struct EntityRecord {
    /// The entity id.
    pub entity: Entity,
    /// Bit `i` is set iff the store owning bit `i` has a live record for this entity.
    pub membership: ComponentMask,
    /// Set by `remove`; the record is dropped on the next `gc`.
    pub removed: bool,
}

/// Entity-sorted table of [`EntityRecord`]s.
#[derive(Debug)]
pub struct EntityTable {
    records: Vec<EntityRecord>,
    next_id: u64,
    removed_count: usize,
    needs_sorting: bool,
}

impl EntityTable {
    /// Creates an empty table with room for `capacity` entities.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
            next_id: 1,
            removed_count: 0,
            needs_sorting: false,
        }
    }

    /// Allocates the next id and appends an empty record for it.
    pub fn new_entity(&mut self) -> Entity {
        let entity = Entity(self.next_id);
        self.next_id += 1;
        self.push(entity);
        entity
    }

    fn push(&mut self, entity: Entity) {
        if self.records.last().is_some_and(|last| last.entity > entity) {
            self.needs_sorting = true;
        }
        self.records.push(EntityRecord {
            entity,
            membership: ComponentMask::new(),
            removed: false,
        });
    }

    /// Position of `entity` in the table, removed or not.
    fn index_of(&self, entity: Entity) -> Option<usize> {
        // Sequential spawns make the last record the common hit.
        if let Some(last) = self.records.last() {
            if last.entity == entity {
                return Some(self.records.len() - 1);
            }
        }
        if self.needs_sorting {
            return self.records.iter().position(|r| r.entity == entity);
        }
        self.records
            .binary_search_by_key(&entity, |r| r.entity)
            .ok()
    }

    /// Returns the live record for `entity`.
    #[must_use]
    pub fn get(&self, entity: Entity) -> Option<&EntityRecord> {
        self.index_of(entity)
            .map(|i| &self.records[i])
            .filter(|r| !r.removed)
    }

    fn get_mut(&mut self, entity: Entity) -> Option<&mut EntityRecord> {
        self.index_of(entity)
            .map(|i| &mut self.records[i])
            .filter(|r| !r.removed)
    }

    /// Checks if `entity` exists and was not removed.
    #[inline]
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.get(entity).is_some()
    }

    /// Sets the membership bit for a component type.
    ///
    /// Returns `false` when the entity does not exist.
    pub fn set_bit(&mut self, entity: Entity, bit: usize) -> bool {
        match self.get_mut(entity) {
            Some(record) => {
                record.membership.set(bit);
                true
            }
            None => false,
        }
    }

    /// Clears the membership bit for a component type.
    pub fn clear_bit(&mut self, entity: Entity, bit: usize) -> bool {
        match self.get_mut(entity) {
            Some(record) => {
                record.membership.clear(bit);
                true
            }
            None => false,
        }
    }

    /// Marks `entity` removed and returns the membership it had.
    ///
    /// The record stays in place until [`gc`](Self::gc).
    pub fn remove(&mut self, entity: Entity) -> Option<ComponentMask> {
        let record = self.get_mut(entity)?;
        record.removed = true;
        let membership = record.membership.take();
        self.removed_count += 1;
        Some(membership)
    }

    /// Drops removed records. Returns how many were dropped.
    pub fn gc(&mut self) -> usize {
        let before = self.records.len();
        self.records.retain(|r| !r.removed);
        self.removed_count = 0;
        before - self.records.len()
    }

    /// Whether an out-of-order id was appended since the last sort.
    #[inline]
    #[must_use]
    pub fn needs_sorting(&self) -> bool {
        self.needs_sorting
    }

    /// Re-sorts the table if an out-of-order id was appended.
    ///
    /// Returns `true` if a sort happened.
    pub fn sort_if_needed(&mut self) -> bool {
        if !self.needs_sorting {
            return false;
        }
        self.records.sort_by_key(|r| r.entity);
        self.needs_sorting = false;
        true
    }

    /// Number of live entities.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len() - self.removed_count
    }

    /// Returns `true` if there are no live entities.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of records still held, including removed ones awaiting `gc`.
    #[inline]
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Iterates live records in id order.
    pub fn iter(&self) -> impl Iterator<Item = &EntityRecord> {
        self.records.iter().filter(|r| !r.removed)
    }

    #[cfg(test)]
    pub(crate) fn push_raw(&mut self, entity: Entity) {
        self.push(entity);
    }
}

impl Default for EntityTable {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}
