//! # Execution Context
//!
//! The handle a system, startup routine or ad-hoc closure receives. Reads
//! go straight to the world; structural writes are queued and applied when
//! the context is flushed.

use std::fmt;

use tracing::trace;

use super::commands::Command;
use super::component::{Bundle, Component};
use super::entity::Entity;
use super::events::Event;
use super::query::{Query, QueryData};
use super::resource::{LocalResources, Res, Resource};
use super::world::World;
use crate::error::{fatal, EcsError};

/// What kind of code owns a context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextKind {
    /// A startup routine.
    Startup,
    /// A scheduled system.
    System,
    /// A closure passed to [`World::run_once`].
    AdHoc,
}

/// Per-run view of the world with a command buffer.
pub struct Context<'w> {
    world: &'w World,
    commands: Vec<Command>,
    system_index: usize,
    kind: ContextKind,
    locals: Option<&'w mut LocalResources>,
}

impl<'w> Context<'w> {
    pub(crate) fn new(
        world: &'w World,
        system_index: usize,
        kind: ContextKind,
        locals: Option<&'w mut LocalResources>,
    ) -> Self {
        Self {
            world,
            commands: Vec::new(),
            system_index,
            kind,
            locals,
        }
    }

    /// The world being run.
    #[inline]
    #[must_use]
    pub fn world(&self) -> &'w World {
        self.world
    }

    /// Execution position used to tag and filter events; `0` outside systems.
    #[inline]
    #[must_use]
    pub fn system_index(&self) -> usize {
        self.system_index
    }

    /// Who owns this context.
    #[must_use]
    pub fn kind(&self) -> ContextKind {
        self.kind
    }

    /// Fresh cursor over `Q`.
    #[must_use]
    pub fn query<Q: QueryData>(&self) -> Query<Q> {
        self.world.query::<Q>()
    }

    /// Copy of `entity`'s component `T`.
    #[must_use]
    pub fn get<T: Component>(&self, entity: Entity) -> Option<T> {
        self.world.get::<T>(entity)
    }

    /// Whether `entity` owns component `T`.
    #[must_use]
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.world.has::<T>(entity)
    }

    /// Whether `entity` exists.
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.world.contains(entity)
    }

    /// Handle to resource `R`.
    #[must_use]
    pub fn resource<R: Resource>(&self) -> Option<Res<R>> {
        self.world.resource::<R>()
    }

    /// Value of type `L` private to the running system, created on first use.
    ///
    /// # Panics
    ///
    /// Panics outside a scheduled system.
    pub fn local<L: Default + Send + 'static>(&mut self) -> &mut L {
        match self.locals.as_deref_mut() {
            Some(locals) => locals.get_or_insert_default::<L>(),
            None => fatal(EcsError::LocalOutsideSystem),
        }
    }

    /// Emits `event` tagged with this context's position.
    pub fn send<E: Event>(&self, event: E) {
        self.world.events().send(event, self.system_index);
    }

    /// Events of type `E` visible at this context's position.
    #[must_use]
    pub fn read<E: Event>(&self) -> Vec<E> {
        self.world.events().read::<E>(self.system_index)
    }

    /// Queues a spawn.
    pub fn spawn(&mut self, bundle: impl Bundle) {
        self.push(Command::spawn(bundle));
    }

    /// Queues a spawn whose callback receives the new entity.
    pub fn spawn_with(
        &mut self,
        bundle: impl Bundle,
        f: impl FnOnce(&mut Context<'_>, Entity) + Send + 'static,
    ) {
        self.push(Command::spawn(bundle).with_callback(f));
    }

    /// Queues adding (or overwriting) component `T` on `entity`.
    pub fn add_component<T: Component>(&mut self, entity: Entity, value: T) {
        self.push(Command::add(entity, value));
    }

    /// Queues an add whose callback runs once the component is stored.
    pub fn add_component_with<T: Component>(
        &mut self,
        entity: Entity,
        value: T,
        f: impl FnOnce(&mut Context<'_>, Entity) + Send + 'static,
    ) {
        self.push(Command::add(entity, value).with_callback(f));
    }

    /// Queues removing component `T` from `entity`.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) {
        self.push(Command::remove::<T>(entity));
    }

    /// Queues removing `entity` with all its components.
    pub fn remove_entity(&mut self, entity: Entity) {
        self.push(Command::remove_entity(entity));
    }

    /// Queues an arbitrary command.
    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    /// Number of queued commands.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.commands.len()
    }

    /// The queued commands, oldest first.
    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Applies every queued command, oldest first.
    pub(crate) fn flush(&mut self) {
        while !self.commands.is_empty() {
            let batch = std::mem::take(&mut self.commands);
            trace!(commands = batch.len(), system = self.system_index, "flushing");
            for command in batch {
                command.apply(self);
            }
        }
    }

    /// Context for a command callback: same world, position and locals, own buffer.
    pub(crate) fn child(&mut self) -> Context<'_> {
        Context {
            world: self.world,
            commands: Vec::new(),
            system_index: self.system_index,
            kind: self.kind,
            locals: self.locals.as_deref_mut(),
        }
    }
}

impl fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("kind", &self.kind)
            .field("system_index", &self.system_index)
            .field("pending", &self.commands.len())
            .finish_non_exhaustive()
    }
}
