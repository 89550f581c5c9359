//! # Entity Component System
//!
//! Columnar storage for typed data keyed by entity, with merge-join queries
//! and step-based scheduling.
//!
//! ## Design Philosophy
//!
//! - One entity-sorted dense store per component type
//! - Deletion tombstones in place; garbage collection compacts
//! - Structural changes during a step are deferred to command buffers
//! - Per-entity membership masks are the source of truth for ownership

mod commands;
mod component;
mod context;
mod entity;
mod events;
mod mask;
mod query;
mod registry;
mod resource;
mod snapshot;
mod stable;
mod storage;
mod system;
mod watcher;
mod weak;
mod world;

pub use commands::{Command, EntityCallback};
pub use component::{Bundle, Component, ComponentKey, ComponentValue};
pub use context::{Context, ContextKind};
pub use entity::{Entity, EntityRecord, EntityTable};
pub use events::{ComponentAdded, ComponentRemoved, Event, EventBus, EventRecord};
pub use mask::{ComponentMask, MaskIter};
pub use query::{ComponentMut, JoinCursor, Query, QueryData, TypeTape, MAX_QUERY_ARITY};
pub use registry::{Registry, SystemFactory};
pub use resource::{Res, Resource};
pub use snapshot::{ComponentIndexEntry, ComponentSnapshot, EntitySnapshot, WorldSnapshot};
pub use stable::{ParseStableIdError, StableId};
pub use storage::{AffinityBuilder, AffinityGroup, ComponentStore, InsertOutcome, StoreHandle};
pub use system::{FnSystem, SchedulerState, StartupFn, System, SystemId};
pub use watcher::ComponentWatcher;
pub use weak::WeakRef;
pub use world::{GcStats, World};
