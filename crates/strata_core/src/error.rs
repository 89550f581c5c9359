//! # Error Types
//!
//! Two tiers of failure exist in the engine:
//!
//! 1. **Expected absence** - a missing entity or component. Signalled with
//!    `Option`/`bool`, never with an error.
//! 2. **Contract violations** - programming errors such as registering a
//!    component twice. Described by [`EcsError`] and raised through
//!    [`fatal`], which logs and aborts the current step by panicking.
//!
//! Recoverable data errors (snapshot import, config loading) have their own
//! enums.

use thiserror::Error;

use crate::ecs::{Entity, StableId};

/// Contract violations raised by the engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// The component type was registered into this world before.
    #[error("component `{uuid}` is already registered")]
    DuplicateComponent {
        /// Stable identifier of the component type.
        uuid: &'static str,
    },

    /// Two distinct Rust types claim the same component uuid.
    #[error("component uuid `{uuid}` is claimed by two different types")]
    ConflictingUuid {
        /// The contested uuid.
        uuid: &'static str,
    },

    /// No membership bit is left for another component type.
    #[error("component type limit reached: {limit} types already registered")]
    ComponentLimit {
        /// Configured maximum number of component types.
        limit: usize,
    },

    /// The resource type was initialized before.
    #[error("resource `{name}` is already initialized")]
    DuplicateResource {
        /// Type name of the resource.
        name: &'static str,
    },

    /// A command or lookup targeted an entity that does not exist.
    #[error("entity {0} does not exist")]
    EntityNotFound(Entity),

    /// The component store is locked by a live query item or guard.
    #[error("component store `{uuid}` is already borrowed")]
    StoreBorrowed {
        /// Stable identifier of the component type.
        uuid: &'static str,
    },

    /// A resource is locked by a live guard.
    #[error("resource `{name}` is already borrowed")]
    ResourceBorrowed {
        /// Type name of the resource.
        name: &'static str,
    },

    /// A weak reference outlived the store it points into.
    #[error("weak reference to entity {0} used after its component store was dropped")]
    StoreDropped(Entity),

    /// A query named the same component type twice or too many types.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// A system uuid was registered twice.
    #[error("system `{uuid}` is already registered")]
    DuplicateSystem {
        /// Stable identifier of the system.
        uuid: &'static str,
    },

    /// Local resources only exist for scheduled systems.
    #[error("local resources are only available to scheduled systems")]
    LocalOutsideSystem,
}

/// Result type for fallible engine operations.
pub type EcsResult<T> = Result<T, EcsError>;

/// Logs a contract violation and aborts the current step.
#[track_caller]
#[cold]
pub(crate) fn fatal(err: EcsError) -> ! {
    tracing::error!(error = %err, "contract violation");
    panic!("{err}")
}

/// Errors raised while exporting or importing a world snapshot.
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// The snapshot references a component uuid this world never registered.
    #[error("unknown component `{0}` in snapshot")]
    UnknownComponent(String),

    /// A component entry points outside the snapshot's component index.
    #[error("component index {0} is not in the snapshot's component table")]
    IndexOutOfRange(usize),

    /// A component payload could not be encoded.
    #[error("failed to encode component `{uuid}`: {source}")]
    Encode {
        /// Component uuid.
        uuid: &'static str,
        /// Underlying serializer error.
        #[source]
        source: toml::ser::Error,
    },

    /// A component payload could not be decoded.
    #[error("failed to decode component `{uuid}`: {source}")]
    Decode {
        /// Component uuid.
        uuid: &'static str,
        /// Underlying deserializer error.
        #[source]
        source: toml::de::Error,
    },

    /// The stable id already belongs to an entity of this world.
    #[error("stable id {0} is already bound to an entity")]
    DuplicateStableId(StableId),
}

/// Errors raised while loading a [`WorldConfig`](crate::WorldConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The TOML text could not be parsed.
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of its allowed range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
