//! # ECS World
//!
//! The central container: component stores, the entity table, resources
//! and stable ids (shared with shallow copies), plus a system schedule,
//! event channels and query cache of its own.
//!
//! Each [`step`](World::step) walks the scheduler states:
//!
//! ```text
//! Idle -> RunningStartup -> RunningSystems -> Committing -> Idle
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, trace, warn};

use super::component::{Bundle, Component, ComponentKey};
use super::context::{Context, ContextKind};
use super::entity::{Entity, EntityTable};
use super::events::{ComponentAdded, ComponentRemoved, Event, EventBus};
use super::mask::ComponentMask;
use super::query::{Query, QueryData, TypeTape};
use super::registry::{ComponentRegistry, Registry};
use super::resource::{Res, Resource, Resources};
use super::stable::{StableId, StableIds};
use super::storage::{AffinityBuilder, InsertOutcome, StoreHandle};
use super::system::{FnSystem, Schedule, SchedulerState, System, SystemId};
use super::watcher::ComponentWatcher;
use super::weak::WeakRef;
use crate::config::WorldConfig;
use crate::error::{fatal, EcsError, EcsResult};

/// State shared by a world and all of its shallow copies.
pub(crate) struct Shared {
    pub(crate) components: RwLock<ComponentRegistry>,
    pub(crate) entities: RwLock<EntityTable>,
    pub(crate) resources: RwLock<Resources>,
    pub(crate) stable_ids: Mutex<StableIds>,
}

/// Counts reported by [`World::gc`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GcStats {
    /// Removed entity records dropped from the entity table.
    pub entities: usize,
    /// Tombstoned component records compacted out of stores.
    pub records: usize,
    /// Stable-id bindings of removed entities.
    pub stable_ids: usize,
}

/// The ECS World - entities, component stores, resources and systems.
///
/// # Example
///
/// ```rust,ignore
/// let mut world = World::new();
/// let e = world.spawn_bundle((Position { x: 1, y: 2 }, Velocity { x: 1, y: 1 }));
///
/// world.add_system_fn("movement", 0, |ctx| {
///     let mut query = ctx.query::<(Position, Velocity)>();
///     while query.next() {
///         let (_, mut pos, vel) = query.item();
///         pos.x += vel.x;
///         pos.y += vel.y;
///     }
/// });
/// world.step();
/// ```
pub struct World {
    pub(crate) shared: Arc<Shared>,
    config: WorldConfig,
    schedule: Schedule,
    events: EventBus,
    queries: Mutex<HashMap<TypeTape, Box<dyn Any + Send>>>,
    state: SchedulerState,
    step_count: u64,
}

impl World {
    /// Creates a world with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(WorldConfig::default())
    }

    /// Creates a world with `config`.
    ///
    /// # Panics
    ///
    /// Panics if `config` fails [`WorldConfig::validate`].
    #[must_use]
    pub fn with_config(config: WorldConfig) -> Self {
        if let Err(err) = config.validate() {
            tracing::error!(error = %err, "rejected world configuration");
            panic!("{err}");
        }
        let shared = Shared {
            components: RwLock::new(ComponentRegistry::new(
                config.max_component_types,
                config.store_capacity,
            )),
            entities: RwLock::new(EntityTable::with_capacity(config.entity_capacity)),
            resources: RwLock::new(Resources::default()),
            stable_ids: Mutex::new(StableIds::new(config.stable_id_seed)),
        };
        debug!(?config, "world created");
        Self {
            shared: Arc::new(shared),
            config,
            schedule: Schedule::default(),
            events: EventBus::new(),
            queries: Mutex::new(HashMap::new()),
            state: SchedulerState::Idle,
            step_count: 0,
        }
    }

    /// Creates a world and applies `registry` to it.
    #[must_use]
    pub fn with_registry(config: WorldConfig, registry: &Registry) -> Self {
        let mut world = Self::with_config(config);
        registry.apply(&mut world);
        world
    }

    /// A view sharing this world's stores, entities, resources and stable
    /// ids, with its own systems, events and query cache.
    #[must_use]
    pub fn shallow_copy(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            config: self.config.clone(),
            schedule: Schedule::default(),
            events: EventBus::new(),
            queries: Mutex::new(HashMap::new()),
            state: SchedulerState::Idle,
            step_count: 0,
        }
    }

    /// The configuration the world was built with.
    #[must_use]
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    // =========================================================================
    // Component registration
    // =========================================================================

    /// Registers `T` and returns its membership bit.
    ///
    /// # Panics
    ///
    /// Panics if `T` is already registered, its uuid is taken, or the
    /// component type limit is reached.
    pub fn register_component<T: Component>(&self) -> usize {
        self.try_register_component::<T>()
            .unwrap_or_else(|err| fatal(err))
    }

    /// Registers `T` and returns its membership bit.
    ///
    /// # Errors
    ///
    /// See [`register_component`](Self::register_component).
    pub fn try_register_component<T: Component>(&self) -> EcsResult<usize> {
        self.register_entry::<T>().map(|(bit, _)| bit)
    }

    fn register_entry<T: Component>(&self) -> EcsResult<(usize, StoreHandle<T>)> {
        let entry = self.shared.components.write().register::<T>()?;
        debug!(component = T::UUID, bit = entry.0, "component registered");
        T::setup(self);
        Ok(entry)
    }

    /// Bit and store of `T`, registering it on first use.
    fn component_entry<T: Component>(&self) -> (usize, StoreHandle<T>) {
        if let Some(found) = self.shared.components.read().handle::<T>() {
            return found;
        }
        self.register_entry::<T>().unwrap_or_else(|err| fatal(err))
    }

    fn lookup<T: Component>(&self) -> Option<StoreHandle<T>> {
        self.shared
            .components
            .read()
            .handle::<T>()
            .map(|(_, handle)| handle)
    }

    /// Store of `T`, registering the type on first use.
    pub fn store<T: Component>(&self) -> StoreHandle<T> {
        self.component_entry::<T>().1
    }

    /// Membership bit of `T`, if registered.
    #[must_use]
    pub fn component_bit<T: Component>(&self) -> Option<usize> {
        self.shared.components.read().bit_of(TypeId::of::<T>())
    }

    /// Number of registered component types.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.shared.components.read().len()
    }

    /// Starts an affinity group over component stores.
    #[must_use]
    pub fn affinity(&self) -> AffinityBuilder<'_> {
        AffinityBuilder::new(self)
    }

    // =========================================================================
    // Entities and components
    // =========================================================================

    /// Creates an entity without components.
    pub fn spawn(&mut self) -> Entity {
        self.spawn_entity()
    }

    /// Creates an entity holding `bundle`.
    pub fn spawn_bundle(&mut self, bundle: impl Bundle) -> Entity {
        let entity = self.spawn_entity();
        for value in bundle.into_values() {
            value.insert_into(self, entity, 0);
        }
        entity
    }

    /// Adds or overwrites component `T`. Returns `false` if `entity` does not exist.
    pub fn insert<T: Component>(&mut self, entity: Entity, value: T) -> bool {
        self.insert_component(entity, value, 0)
    }

    /// Removes component `T` and returns it.
    pub fn remove<T: Component>(&mut self, entity: Entity) -> Option<T> {
        let (bit, store) = self.component_entry::<T>();
        let mut entities = self.shared.entities.write();
        if !entities.contains(entity) {
            return None;
        }
        let data = store.write().remove(entity)?;
        entities.clear_bit(entity, bit);
        drop(entities);
        self.events.send(
            ComponentRemoved {
                entity,
                data: data.clone(),
            },
            0,
        );
        Some(data)
    }

    /// Removes `entity` and all its components. Returns `false` if it did not exist.
    pub fn remove_entity(&mut self, entity: Entity) -> bool {
        self.remove_entity_at(entity, 0)
    }

    /// Whether `entity` exists.
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.shared.entities.read().contains(entity)
    }

    /// Whether `entity` owns component `T`, per its membership mask.
    #[must_use]
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        let Some(bit) = self.component_bit::<T>() else {
            return false;
        };
        self.shared
            .entities
            .read()
            .get(entity)
            .is_some_and(|record| record.membership.contains(bit))
    }

    /// Copy of `entity`'s component `T`.
    #[must_use]
    pub fn get<T: Component>(&self, entity: Entity) -> Option<T> {
        self.with::<T, _>(entity, T::clone)
    }

    /// Runs `f` on `entity`'s component `T`.
    pub fn with<T: Component, R>(&self, entity: Entity, f: impl FnOnce(&T) -> R) -> Option<R> {
        let store = self.lookup::<T>()?;
        let guard = store.read();
        guard.get(entity).map(f)
    }

    /// Runs `f` on `entity`'s component `T` mutably, in place.
    pub fn with_mut<T: Component, R>(
        &self,
        entity: Entity,
        f: impl FnOnce(&mut T) -> R,
    ) -> Option<R> {
        let store = self.lookup::<T>()?;
        let mut guard = store.write();
        guard.get_mut(entity).map(f)
    }

    /// Creates or shares a weak reference to `entity`'s component `T`.
    #[must_use]
    pub fn weak_ref<T: Component>(&self, entity: Entity) -> Option<WeakRef<T>> {
        self.lookup::<T>()?.weak_ref(entity)
    }

    /// Attaches a synchronous add/remove watcher to `T`'s store,
    /// registering the type on first use.
    pub fn watch<T: Component>(&self) -> ComponentWatcher<T> {
        self.store::<T>().watch()
    }

    /// Copy of `entity`'s membership mask.
    #[must_use]
    pub fn membership(&self, entity: Entity) -> Option<ComponentMask> {
        self.shared
            .entities
            .read()
            .get(entity)
            .map(|record| record.membership.clone())
    }

    /// Number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.shared.entities.read().len()
    }

    /// Live entities in id order.
    #[must_use]
    pub fn entities(&self) -> Vec<Entity> {
        self.shared
            .entities
            .read()
            .iter()
            .map(|record| record.entity)
            .collect()
    }

    /// Compacts removed entities, tombstoned records and stale stable ids.
    pub fn gc(&mut self) -> GcStats {
        let entities = self.shared.entities.write().gc();
        let stores: Vec<_> = self
            .shared
            .components
            .read()
            .entries()
            .iter()
            .map(|entry| Arc::clone(&entry.erased))
            .collect();
        let records = stores.iter().map(|store| store.gc()).sum();
        let stable_ids = {
            let table = self.shared.entities.read();
            self.shared
                .stable_ids
                .lock()
                .retain(|entity| table.contains(entity))
        };
        let stats = GcStats {
            entities,
            records,
            stable_ids,
        };
        debug!(?stats, "garbage collected");
        stats
    }

    /// Stable id of `entity`, assigned on first request.
    #[must_use]
    pub fn stable_id(&self, entity: Entity) -> Option<StableId> {
        if !self.contains(entity) {
            return None;
        }
        Some(self.shared.stable_ids.lock().get_or_assign(entity))
    }

    /// Entity currently bound to `id`.
    #[must_use]
    pub fn entity_by_stable_id(&self, id: StableId) -> Option<Entity> {
        let entity = self.shared.stable_ids.lock().entity(id)?;
        self.contains(entity).then_some(entity)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Reset cursor over every entity owning all of `Q`'s types.
    ///
    /// Resolved stores are cached per type tape.
    ///
    /// # Panics
    ///
    /// Panics if `Q` names a type twice.
    #[must_use]
    pub fn query<Q: QueryData>(&self) -> Query<Q> {
        let tape = TypeTape::of::<Q>();
        if let Some(cached) = self
            .queries
            .lock()
            .get(&tape)
            .and_then(|any| any.downcast_ref::<Query<Q>>())
        {
            let mut query = cached.clone();
            query.reset();
            return query;
        }
        // Resolving may register types and run their setup hooks, so the
        // cache lock is not held across it.
        let query = Query::<Q>::new(self);
        self.queries.lock().insert(tape, Box::new(query.clone()));
        query
    }

    // =========================================================================
    // Resources
    // =========================================================================

    /// Stores `R::default()` as a resource.
    ///
    /// # Panics
    ///
    /// Panics if `R` was initialized before.
    pub fn init_resource<R: Resource + Default>(&self) -> Res<R> {
        self.insert_resource(R::default())
    }

    /// Stores `value` as a resource.
    ///
    /// # Panics
    ///
    /// Panics if `R` was initialized before.
    pub fn insert_resource<R: Resource>(&self, value: R) -> Res<R> {
        self.try_insert_resource(value)
            .unwrap_or_else(|err| fatal(err))
    }

    /// Stores `value` as a resource.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::DuplicateResource`] if `R` was initialized before.
    pub fn try_insert_resource<R: Resource>(&self, value: R) -> EcsResult<Res<R>> {
        let res = self.shared.resources.write().insert(value)?;
        debug!(resource = std::any::type_name::<R>(), "resource initialized");
        Ok(res)
    }

    /// Handle to resource `R`.
    #[must_use]
    pub fn resource<R: Resource>(&self) -> Option<Res<R>> {
        self.shared.resources.read().get::<R>()
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Emits `event` at position 0.
    pub fn send_event<E: Event>(&self, event: E) {
        self.events.send(event, 0);
    }

    /// Events of type `E` visible at position 0, i.e. between steps.
    #[must_use]
    pub fn read_events<E: Event>(&self) -> Vec<E> {
        self.events.read::<E>(0)
    }

    /// This world's event channels.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    // =========================================================================
    // Scheduling
    // =========================================================================

    /// Adds `system` at `priority`; lower priorities run first.
    pub fn add_system(&mut self, priority: i32, system: Box<dyn System>) -> SystemId {
        let name = system.name().to_owned();
        let id = self.schedule.add(priority, system);
        debug!(system = %name, priority, ?id, "system added");
        id
    }

    /// Adds a closure as a system.
    pub fn add_system_fn(
        &mut self,
        name: impl Into<String>,
        priority: i32,
        f: impl FnMut(&mut Context<'_>) + Send + 'static,
    ) -> SystemId {
        self.add_system(priority, Box::new(FnSystem::new(name, f)))
    }

    /// Removes a system. Returns `false` if it was not registered.
    pub fn remove_system(&mut self, id: SystemId) -> bool {
        self.schedule.remove(id)
    }

    /// Queues a routine for the start of the next step.
    pub fn add_startup(&mut self, f: impl FnOnce(&mut Context<'_>) + Send + 'static) {
        self.schedule.add_startup(Box::new(f));
    }

    /// Number of scheduled systems.
    #[must_use]
    pub fn system_count(&self) -> usize {
        self.schedule.len()
    }

    /// `(id, name, priority)` of every system, in execution order.
    #[must_use]
    pub fn systems(&self) -> Vec<(SystemId, String, i32)> {
        self.schedule.describe()
    }

    /// Current scheduler phase.
    #[must_use]
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Completed steps.
    #[must_use]
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Runs `f` at position 0 and applies its commands immediately.
    pub fn run_once<R>(&mut self, f: impl FnOnce(&mut Context<'_>) -> R) -> R {
        let mut ctx = Context::new(self, 0, ContextKind::AdHoc, None);
        let out = f(&mut ctx);
        ctx.flush();
        out
    }

    /// Runs pending startup routines, then every system, then commits.
    pub fn step(&mut self) {
        let startup = self.schedule.take_startup();
        if !startup.is_empty() {
            self.state = SchedulerState::RunningStartup;
            let count = startup.len();
            for routine in startup {
                let mut ctx = Context::new(self, 0, ContextKind::Startup, None);
                routine(&mut ctx);
                ctx.flush();
            }
            info!(routines = count, "startup complete");
        }

        self.state = SchedulerState::RunningSystems;
        let mut systems = self.schedule.take_systems();
        for (i, entry) in systems.iter_mut().enumerate() {
            let mut ctx = Context::new(self, i + 1, ContextKind::System, Some(&mut entry.locals));
            entry.system.run(&mut ctx);
            ctx.flush();
        }
        self.schedule.restore_systems(systems);

        self.state = SchedulerState::Committing;
        self.commit();
        self.state = SchedulerState::Idle;
    }

    fn commit(&mut self) {
        self.events.advance();
        if self.shared.entities.write().sort_if_needed() {
            warn!("entity table was out of order and has been re-sorted");
        }
        self.step_count += 1;
        let interval = u64::from(self.config.gc_interval);
        if interval > 0 && self.step_count % interval == 0 {
            self.gc();
        }
        trace!(step = self.step_count, "step committed");
    }

    // =========================================================================
    // Mutation primitives used by commands
    // =========================================================================

    pub(crate) fn spawn_entity(&self) -> Entity {
        self.shared.entities.write().new_entity()
    }

    pub(crate) fn require_entity(&self, entity: Entity) {
        if !self.contains(entity) {
            fatal(EcsError::EntityNotFound(entity));
        }
    }

    pub(crate) fn insert_component<T: Component>(
        &self,
        entity: Entity,
        value: T,
        origin: usize,
    ) -> bool {
        let (bit, store) = self.component_entry::<T>();
        let mut entities = self.shared.entities.write();
        if !entities.contains(entity) {
            return false;
        }
        let outcome = store.write().insert(entity, value);
        entities.set_bit(entity, bit);
        drop(entities);
        if outcome == InsertOutcome::Added {
            self.events.send(ComponentAdded::<T>::new(entity), origin);
        }
        true
    }

    pub(crate) fn remove_component_by_key(
        &self,
        entity: Entity,
        component: ComponentKey,
        origin: usize,
    ) -> bool {
        let Some((bit, store)) = self
            .shared
            .components
            .read()
            .erased_by_type(component.type_id())
        else {
            return false;
        };
        if !self.shared.entities.write().clear_bit(entity, bit) {
            return false;
        }
        store.remove_into(entity, &self.events, origin)
    }

    pub(crate) fn remove_entity_at(&self, entity: Entity, origin: usize) -> bool {
        let Some(membership) = self.shared.entities.write().remove(entity) else {
            return false;
        };
        let stores: Vec<_> = {
            let registry = self.shared.components.read();
            membership
                .iter()
                .filter_map(|bit| registry.erased_at(bit))
                .collect()
        };
        for store in stores {
            store.remove_into(entity, &self.events, origin);
        }
        trace!(%entity, "entity removed");
        true
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.entity_count())
            .field("components", &self.component_count())
            .field("schedule", &self.schedule)
            .field("state", &self.state)
            .field("step_count", &self.step_count)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::component::tests::{Name, Position, Velocity};

    #[test]
    fn test_spawn_and_membership() {
        let mut world = World::new();
        let e = world.spawn_bundle((Position { x: 1, y: 2 }, Velocity::default()));
        assert!(world.contains(e));
        assert!(world.has::<Position>(e));
        assert!(world.has::<Velocity>(e));
        assert!(!world.has::<Name>(e));
        assert_eq!(world.membership(e).unwrap().count(), 2);
        assert_eq!(world.component_bit::<Velocity>(), Some(1));
    }

    #[test]
    fn test_insert_emits_added_once() {
        let mut world = World::new();
        let e = world.spawn();
        assert!(world.insert(e, Position::default()));
        assert!(world.insert(e, Position { x: 1, y: 1 }));
        assert_eq!(world.read_events::<ComponentAdded<Position>>().len(), 1);
        assert!(!world.insert(Entity::from_raw(999), Position::default()));
    }

    #[test]
    fn test_remove_component_clears_bit() {
        let mut world = World::new();
        let e = world.spawn_bundle((Position { x: 4, y: 4 },));
        assert_eq!(world.remove::<Position>(e), Some(Position { x: 4, y: 4 }));
        assert!(!world.has::<Position>(e));
        assert!(world.remove::<Position>(e).is_none());
        let removed = world.read_events::<ComponentRemoved<Position>>();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].data.x, 4);
    }

    #[test]
    fn test_remove_entity_removes_every_component() {
        let mut world = World::new();
        let e = world.spawn_bundle((Position::default(), Velocity::default(), Name("x".into())));
        assert!(world.remove_entity(e));
        assert!(!world.remove_entity(e));
        assert!(!world.contains(e));
        assert!(world.get::<Name>(e).is_none());
        assert_eq!(world.read_events::<ComponentRemoved<Name>>().len(), 1);
        assert_eq!(world.read_events::<ComponentRemoved<Velocity>>().len(), 1);
        assert_eq!(world.store::<Position>().read().len(), 0);
    }

    #[test]
    fn test_with_mut_updates_in_place() {
        let mut world = World::new();
        let e = world.spawn_bundle((Position::default(),));
        world.with_mut::<Position, _>(e, |p| p.x = 10);
        assert_eq!(world.with::<Position, _>(e, |p| p.x), Some(10));
        assert!(world.with::<Velocity, _>(e, |v| v.x).is_none());
    }

    #[test]
    fn test_gc_compacts_everything() {
        let mut world = World::new();
        let a = world.spawn_bundle((Position::default(),));
        let b = world.spawn_bundle((Position::default(),));
        let _ = world.stable_id(a);
        world.remove_entity(a);
        let stats = world.gc();
        assert_eq!(
            stats,
            GcStats {
                entities: 1,
                records: 1,
                stable_ids: 1
            }
        );
        assert!(world.contains(b));
        assert_eq!(world.store::<Position>().read().raw_len(), 1);
    }

    #[test]
    fn test_auto_gc_interval() {
        let mut world = World::with_config(WorldConfig::default().with_gc_interval(2));
        let e = world.spawn_bundle((Position::default(),));
        world.remove_entity(e);
        world.step();
        assert_eq!(world.store::<Position>().read().raw_len(), 1);
        world.step();
        assert_eq!(world.store::<Position>().read().raw_len(), 0);
        assert_eq!(world.step_count(), 2);
    }

    #[test]
    fn test_startup_runs_once_before_systems() {
        let mut world = World::new();
        world.init_resource::<Vec<&'static str>>();
        world.add_startup(|ctx| {
            ctx.resource::<Vec<&'static str>>().unwrap().write().push("startup");
        });
        world.add_system_fn("tick", 0, |ctx| {
            ctx.resource::<Vec<&'static str>>().unwrap().write().push("tick");
        });
        world.step();
        world.step();
        let log = world.resource::<Vec<&'static str>>().unwrap();
        assert_eq!(*log.read(), vec!["startup", "tick", "tick"]);
        assert_eq!(world.state(), SchedulerState::Idle);
    }

    #[test]
    fn test_systems_see_earlier_systems_commits() {
        let mut world = World::new();
        world.add_system_fn("spawner", 0, |ctx| ctx.spawn((Position::default(),)));
        world.add_system_fn("counter", 1, |ctx| {
            let n = ctx.query::<(Position,)>().count();
            ctx.send(n);
        });
        world.step();
        world.step();
        // Position 2's events from the last step are visible to readers at 0.
        assert_eq!(world.read_events::<usize>(), vec![2]);
    }

    #[test]
    fn test_system_state_inside_step() {
        let mut world = World::new();
        world.add_system_fn("probe", 0, |ctx| {
            ctx.send(ctx.world().state());
        });
        world.step();
        assert_eq!(
            world.read_events::<SchedulerState>(),
            vec![SchedulerState::RunningSystems]
        );
    }

    #[test]
    fn test_remove_system() {
        let mut world = World::new();
        let id = world.add_system_fn("a", 0, |_| {});
        world.add_system_fn("b", 0, |_| {});
        assert!(world.remove_system(id));
        assert_eq!(world.system_count(), 1);
        assert_eq!(world.systems()[0].1, "b");
    }

    #[test]
    fn test_shallow_copy_shares_storage() {
        let mut world = World::new();
        let e = world.spawn_bundle((Position::default(),));
        world.add_system_fn("a", 0, |_| {});

        let mut view = world.shallow_copy();
        assert_eq!(view.system_count(), 0);
        view.insert(e, Position { x: 8, y: 8 });
        assert_eq!(world.get::<Position>(e), Some(Position { x: 8, y: 8 }));
        // Events stay with the copy that produced them.
        assert_eq!(world.read_events::<ComponentAdded<Position>>().len(), 1);
        assert!(view.read_events::<ComponentAdded<Position>>().is_empty());
        let spawned = view.spawn();
        assert!(world.contains(spawned));
    }

    #[test]
    fn test_stable_id_lookup() {
        let mut world = World::with_config(WorldConfig::default().with_seed(5));
        let e = world.spawn();
        let id = world.stable_id(e).unwrap();
        assert_eq!(world.stable_id(e), Some(id));
        assert_eq!(world.entity_by_stable_id(id), Some(e));
        world.remove_entity(e);
        assert!(world.entity_by_stable_id(id).is_none());
        assert!(world.stable_id(e).is_none());
    }

    #[test]
    #[should_panic(expected = "component type limit reached")]
    fn test_component_limit() {
        let world = World::with_config(WorldConfig::default().with_max_component_types(2));
        world.register_component::<Position>();
        world.register_component::<Velocity>();
        world.register_component::<Name>();
    }

    #[test]
    #[should_panic(expected = "is already registered")]
    fn test_double_registration_is_fatal() {
        let world = World::new();
        world.register_component::<Position>();
        world.register_component::<Position>();
    }

    #[test]
    #[should_panic(expected = "is already initialized")]
    fn test_double_resource_is_fatal() {
        let world = World::new();
        world.init_resource::<u32>();
        world.init_resource::<u32>();
    }
}
