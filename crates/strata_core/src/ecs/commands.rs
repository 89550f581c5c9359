//! # Deferred Commands
//!
//! Structural changes requested while a system runs are queued as
//! [`Command`]s on its [`Context`] and applied in FIFO order right after the
//! system body returns. A command that targets a missing entity is a
//! contract violation.

use std::fmt;

use tracing::trace;

use super::component::{Bundle, Component, ComponentKey, ComponentValue};
use super::context::Context;
use super::entity::Entity;

/// Callback run with the entity a command spawned or modified.
///
/// Commands it queues are applied before the triggering flush continues.
pub type EntityCallback = Box<dyn FnOnce(&mut Context<'_>, Entity) + Send>;

/// A queued structural mutation.
pub enum Command {
    /// Creates an entity holding `components`.
    Spawn {
        /// Initial components.
        components: Vec<Box<dyn ComponentValue>>,
        /// Runs once the entity exists.
        callback: Option<EntityCallback>,
    },
    /// Adds or overwrites one component.
    AddComponent {
        /// Target entity.
        entity: Entity,
        /// The component payload.
        value: Box<dyn ComponentValue>,
        /// Runs after the component was stored.
        callback: Option<EntityCallback>,
    },
    /// Removes one component type from an entity.
    RemoveComponent {
        /// Target entity.
        entity: Entity,
        /// The component type to remove.
        component: ComponentKey,
    },
    /// Removes an entity and every component it owns.
    RemoveEntity {
        /// Target entity.
        entity: Entity,
    },
}

impl Command {
    /// Spawn command for `bundle`.
    pub fn spawn(bundle: impl Bundle) -> Self {
        Self::Spawn {
            components: bundle.into_values(),
            callback: None,
        }
    }

    /// Add-component command.
    pub fn add<T: Component>(entity: Entity, value: T) -> Self {
        Self::AddComponent {
            entity,
            value: Box::new(value),
            callback: None,
        }
    }

    /// Remove-component command.
    #[must_use]
    pub fn remove<T: Component>(entity: Entity) -> Self {
        Self::RemoveComponent {
            entity,
            component: ComponentKey::of::<T>(),
        }
    }

    /// Remove-entity command.
    #[must_use]
    pub fn remove_entity(entity: Entity) -> Self {
        Self::RemoveEntity { entity }
    }

    /// Attaches a callback to a spawn or add-component command.
    ///
    /// Other commands have no entity to hand over and ignore it.
    #[must_use]
    pub fn with_callback(
        mut self,
        f: impl FnOnce(&mut Context<'_>, Entity) + Send + 'static,
    ) -> Self {
        match &mut self {
            Self::Spawn { callback, .. } | Self::AddComponent { callback, .. } => {
                *callback = Some(Box::new(f));
            }
            Self::RemoveComponent { .. } | Self::RemoveEntity { .. } => {}
        }
        self
    }

    /// The entity this command targets; `None` for a spawn.
    #[must_use]
    pub fn target(&self) -> Option<Entity> {
        match self {
            Self::Spawn { .. } => None,
            Self::AddComponent { entity, .. }
            | Self::RemoveComponent { entity, .. }
            | Self::RemoveEntity { entity } => Some(*entity),
        }
    }

    pub(crate) fn apply(self, ctx: &mut Context<'_>) {
        let world = ctx.world();
        let origin = ctx.system_index();
        match self {
            Self::Spawn {
                components,
                callback,
            } => {
                let entity = world.spawn_entity();
                for value in components {
                    value.insert_into(world, entity, origin);
                }
                trace!(%entity, "spawned");
                if let Some(callback) = callback {
                    run_callback(ctx, callback, entity);
                }
            }
            Self::AddComponent {
                entity,
                value,
                callback,
            } => {
                world.require_entity(entity);
                value.insert_into(world, entity, origin);
                if let Some(callback) = callback {
                    run_callback(ctx, callback, entity);
                }
            }
            Self::RemoveComponent { entity, component } => {
                world.require_entity(entity);
                world.remove_component_by_key(entity, component, origin);
            }
            Self::RemoveEntity { entity } => {
                world.require_entity(entity);
                world.remove_entity_at(entity, origin);
            }
        }
    }
}

fn run_callback(ctx: &mut Context<'_>, callback: EntityCallback, entity: Entity) {
    let mut child = ctx.child();
    callback(&mut child, entity);
    child.flush();
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn {
                components,
                callback,
            } => f
                .debug_struct("Spawn")
                .field("components", components)
                .field("callback", &callback.is_some())
                .finish(),
            Self::AddComponent {
                entity,
                value,
                callback,
            } => f
                .debug_struct("AddComponent")
                .field("entity", entity)
                .field("value", value)
                .field("callback", &callback.is_some())
                .finish(),
            Self::RemoveComponent { entity, component } => f
                .debug_struct("RemoveComponent")
                .field("entity", entity)
                .field("component", component)
                .finish(),
            Self::RemoveEntity { entity } => {
                f.debug_struct("RemoveEntity").field("entity", entity).finish()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::component::tests::{Position, Velocity};
    use crate::ecs::events::ComponentRemoved;
    use crate::ecs::world::World;

    #[test]
    fn test_commands_apply_in_order() {
        let mut world = World::new();
        let e = world.spawn();
        world.run_once(|ctx| {
            ctx.push(Command::add(e, Position { x: 1, y: 1 }));
            ctx.push(Command::add(e, Position { x: 2, y: 2 }));
            ctx.push(Command::add(e, Velocity::default()));
            ctx.push(Command::remove::<Velocity>(e));
            assert_eq!(ctx.pending(), 4);
        });
        assert_eq!(world.get::<Position>(e), Some(Position { x: 2, y: 2 }));
        assert!(!world.has::<Velocity>(e));
        assert_eq!(world.read_events::<ComponentRemoved<Velocity>>().len(), 1);
    }

    #[test]
    fn test_spawn_callback_sees_entity() {
        let mut world = World::new();
        world.run_once(|ctx| {
            ctx.push(
                Command::spawn((Position::default(),)).with_callback(|ctx, entity| {
                    ctx.add_component(entity, Velocity { x: 3, y: 0 });
                }),
            );
        });
        let mut query = world.query::<(Position, Velocity)>();
        assert!(query.next());
        let (_, _, vel) = query.item();
        assert_eq!(vel.x, 3);
    }

    #[test]
    fn test_nested_callbacks_run_before_next_command() {
        let mut world = World::new();
        let first = world.spawn();
        world.run_once(|ctx| {
            ctx.push(
                Command::add(first, Position::default()).with_callback(|ctx, _| {
                    ctx.spawn_with((Velocity { x: 9, y: 9 },), |ctx, inner| {
                        ctx.add_component(inner, Position { x: 1, y: 1 });
                    });
                }),
            );
            // Queued after the callback chain; it must observe the chain's result.
            ctx.push(Command::spawn((Velocity::default(),)).with_callback(|ctx, _| {
                assert_eq!(ctx.world().query::<(Position, Velocity)>().count(), 1);
            }));
        });
        assert_eq!(world.entity_count(), 3);
    }

    #[test]
    fn test_target() {
        let e = Entity::from_raw(4);
        assert_eq!(Command::remove_entity(e).target(), Some(e));
        assert_eq!(Command::spawn((Position::default(),)).target(), None);
    }

    #[test]
    #[should_panic(expected = "entity #42 does not exist")]
    fn test_missing_target_is_fatal() {
        let mut world = World::new();
        world.run_once(|ctx| ctx.push(Command::add(Entity::from_raw(42), Position::default())));
    }

    #[test]
    fn test_debug_lists_payload_types() {
        let command = Command::spawn((Position::default(), Velocity::default()));
        let text = format!("{command:?}");
        assert!(text.contains("test.position"));
        assert!(text.contains("test.velocity"));
    }
}
