//! # Registries
//!
//! [`ComponentRegistry`] is a world's table of component stores, assigning
//! each type the next free membership bit. [`Registry`] is a declaration
//! list built by application code and applied when a world is constructed.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::warn;

use super::component::{Component, ComponentKey};
use super::storage::{ErasedStore, StoreHandle};
use super::system::System;
use super::world::World;
use crate::error::{fatal, EcsError, EcsResult};

pub(crate) struct StoreEntry {
    pub(crate) bit: usize,
    pub(crate) key: ComponentKey,
    pub(crate) erased: Arc<dyn ErasedStore>,
    typed: Box<dyn Any + Send + Sync>,
}

/// Component stores of one world, indexed by bit, type and uuid.
pub(crate) struct ComponentRegistry {
    entries: Vec<StoreEntry>,
    by_type: HashMap<TypeId, usize>,
    by_uuid: HashMap<&'static str, usize>,
    limit: usize,
    store_capacity: usize,
}

impl ComponentRegistry {
    pub(crate) fn new(limit: usize, store_capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            by_type: HashMap::new(),
            by_uuid: HashMap::new(),
            limit,
            store_capacity,
        }
    }

    /// Creates the store for `T` and assigns it the next bit.
    pub(crate) fn register<T: Component>(&mut self) -> EcsResult<(usize, StoreHandle<T>)> {
        let key = ComponentKey::of::<T>();
        if self.by_type.contains_key(&key.type_id()) {
            return Err(EcsError::DuplicateComponent { uuid: T::UUID });
        }
        if self.by_uuid.contains_key(T::UUID) {
            return Err(EcsError::ConflictingUuid { uuid: T::UUID });
        }
        if self.entries.len() >= self.limit {
            return Err(EcsError::ComponentLimit { limit: self.limit });
        }

        let bit = self.entries.len();
        let handle = StoreHandle::<T>::with_capacity(self.store_capacity);
        self.entries.push(StoreEntry {
            bit,
            key,
            erased: handle.erased(),
            typed: Box::new(handle.clone()),
        });
        self.by_type.insert(key.type_id(), bit);
        self.by_uuid.insert(T::UUID, bit);
        Ok((bit, handle))
    }

    pub(crate) fn handle<T: Component>(&self) -> Option<(usize, StoreHandle<T>)> {
        let bit = *self.by_type.get(&TypeId::of::<T>())?;
        let handle = self.entries[bit].typed.downcast_ref::<StoreHandle<T>>()?;
        Some((bit, handle.clone()))
    }

    pub(crate) fn bit_of(&self, type_id: TypeId) -> Option<usize> {
        self.by_type.get(&type_id).copied()
    }

    pub(crate) fn erased_by_type(&self, type_id: TypeId) -> Option<(usize, Arc<dyn ErasedStore>)> {
        let bit = self.bit_of(type_id)?;
        Some((bit, Arc::clone(&self.entries[bit].erased)))
    }

    pub(crate) fn erased_by_uuid(&self, uuid: &str) -> Option<(usize, Arc<dyn ErasedStore>)> {
        let bit = *self.by_uuid.get(uuid)?;
        Some((bit, Arc::clone(&self.entries[bit].erased)))
    }

    pub(crate) fn erased_at(&self, bit: usize) -> Option<Arc<dyn ErasedStore>> {
        self.entries.get(bit).map(|entry| Arc::clone(&entry.erased))
    }

    pub(crate) fn entries(&self) -> &[StoreEntry] {
        &self.entries
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("components", &self.entries.iter().map(|e| e.key).collect::<Vec<_>>())
            .field("limit", &self.limit)
            .finish()
    }
}

/// Builds a boxed system each time a registry is applied.
pub type SystemFactory = Box<dyn Fn() -> Box<dyn System> + Send + Sync>;

struct ComponentDecl {
    key: ComponentKey,
    register: fn(&World) -> EcsResult<usize>,
}

struct SystemDecl {
    uuid: &'static str,
    priority: i32,
    factory: SystemFactory,
}

/// Component and system declarations for constructing worlds.
///
/// # Example
///
/// ```rust,ignore
/// let mut registry = Registry::new();
/// registry
///     .component::<Position>()
///     .component::<Velocity>()
///     .system("game.movement", 0, || Box::new(FnSystem::new("movement", movement)));
///
/// let world = World::with_registry(WorldConfig::default(), &registry);
/// ```
#[derive(Default)]
pub struct Registry {
    components: Vec<ComponentDecl>,
    systems: Vec<SystemDecl>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares component `T`.
    ///
    /// # Panics
    ///
    /// Panics if `T`, or another type with `T`'s uuid, was declared before.
    pub fn component<T: Component>(&mut self) -> &mut Self {
        let key = ComponentKey::of::<T>();
        if let Some(existing) = self.components.iter().find(|decl| decl.key.uuid() == T::UUID) {
            if existing.key == key {
                fatal(EcsError::DuplicateComponent { uuid: T::UUID });
            }
            fatal(EcsError::ConflictingUuid { uuid: T::UUID });
        }
        self.components.push(ComponentDecl {
            key,
            register: World::try_register_component::<T>,
        });
        self
    }

    /// Declares a system built by `factory`.
    ///
    /// # Panics
    ///
    /// Panics if `uuid` was declared before.
    pub fn system(
        &mut self,
        uuid: &'static str,
        priority: i32,
        factory: impl Fn() -> Box<dyn System> + Send + Sync + 'static,
    ) -> &mut Self {
        if self.systems.iter().any(|decl| decl.uuid == uuid) {
            fatal(EcsError::DuplicateSystem { uuid });
        }
        self.systems.push(SystemDecl {
            uuid,
            priority,
            factory: Box::new(factory),
        });
        self
    }

    /// Number of declared components.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Number of declared systems.
    #[must_use]
    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// Registers every component and adds a fresh instance of every system.
    ///
    /// Components the world already knows are skipped with a warning.
    pub(crate) fn apply(&self, world: &mut World) {
        for decl in &self.components {
            match (decl.register)(world) {
                Ok(_) => {}
                Err(EcsError::DuplicateComponent { uuid }) => {
                    warn!(component = uuid, "component already registered, skipping");
                }
                Err(err) => fatal(err),
            }
        }
        for decl in &self.systems {
            world.add_system(decl.priority, (decl.factory)());
        }
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field(
                "components",
                &self.components.iter().map(|d| d.key).collect::<Vec<_>>(),
            )
            .field(
                "systems",
                &self.systems.iter().map(|d| d.uuid).collect::<Vec<_>>(),
            )
            .finish()
    }
}
