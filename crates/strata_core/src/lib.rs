//! # STRATA Core
//!
//! An in-process columnar entity store with step-based system scheduling:
//! - Entity-sorted dense component stores with tombstone deletion
//! - N-way merge-join queries over any combination of component types
//! - Deferred command buffers so iteration never observes its own writes
//! - Double-buffered events ordered by system position
//!
//! ## Architecture Rules
//!
//! 1. **Sorted columns** - every store stays sorted by entity id
//! 2. **Deferred structure** - systems mutate structure only through commands
//! 3. **Membership is truth** - an entity's mask bit is set iff the store holds a live record
//!
//! ## Example
//!
//! ```rust,ignore
//! use strata_core::{Context, World};
//!
//! let mut world = World::new();
//! world.spawn_bundle((Position { x: 1, y: 2 }, Velocity { x: 1, y: 1 }));
//! world.add_system_fn("movement", 0, |ctx: &mut Context<'_>| {
//!     let mut query = ctx.query::<(Position, Velocity)>();
//!     while query.next() {
//!         let (_, mut pos, vel) = query.item();
//!         pos.x += vel.x;
//!     }
//! });
//! world.step();
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod ecs;
pub mod error;

pub use config::WorldConfig;
pub use ecs::{
    AffinityGroup, Bundle, Command, Component, ComponentAdded, ComponentKey, ComponentMask,
    ComponentMut, ComponentRemoved, ComponentStore, ComponentWatcher, Context, ContextKind,
    Entity, Event, EventBus, FnSystem, GcStats, Query, QueryData, Registry, Res, Resource,
    SchedulerState, StableId, StoreHandle, System, SystemId, WeakRef, World, WorldSnapshot,
};
pub use error::{ConfigError, EcsError, EcsResult, SnapshotError};

/// Everything needed to declare components and write systems.
pub mod prelude {
    pub use crate::config::WorldConfig;
    pub use crate::ecs::{
        Bundle, Command, Component, ComponentAdded, ComponentRemoved, Context, Entity, Query,
        Registry, Res, System, World,
    };
}
