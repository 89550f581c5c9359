//! # Component System
//!
//! Components are plain data attached to entities, one value per entity per
//! type. Every component type describes itself with a stable uuid string and
//! may run a setup hook the first time it is registered into a world.

use std::any::TypeId;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::entity::Entity;
use super::world::World;

/// Marker trait for ECS components.
///
/// Components must be:
/// - `Clone`: removed payloads are copied into component-removed events
/// - `Send + Sync`: stores are shared between shallow copies of a world
/// - `Serialize + DeserializeOwned`: payloads travel in world snapshots
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Clone, Debug, Serialize, Deserialize)]
/// struct Position {
///     x: f32,
///     y: f32,
/// }
///
/// impl Component for Position {
///     const UUID: &'static str = "game.position";
/// }
/// ```
pub trait Component: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Stable unique identifier. Two types sharing a uuid cannot live in one world.
    const UUID: &'static str;

    /// Called once when the type is first registered into a world.
    fn setup(_world: &World) {}
}

/// Type identity of a component, usable without the type parameter.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentKey {
    type_id: TypeId,
    uuid: &'static str,
}

impl ComponentKey {
    /// Key for component type `T`.
    #[inline]
    #[must_use]
    pub fn of<T: Component>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            uuid: T::UUID,
        }
    }

    /// Rust type id of the component.
    #[inline]
    #[must_use]
    pub fn type_id(self) -> TypeId {
        self.type_id
    }

    /// Stable uuid of the component.
    #[inline]
    #[must_use]
    pub fn uuid(self) -> &'static str {
        self.uuid
    }
}

impl fmt::Debug for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.uuid)
    }
}

/// A type-erased component payload, as carried by commands and snapshots.
pub trait ComponentValue: Send {
    /// Identity of the payload's component type.
    fn key(&self) -> ComponentKey;

    /// Inserts the payload for `entity`. Returns `false` if the entity is gone.
    fn insert_into(self: Box<Self>, world: &World, entity: Entity, origin: usize) -> bool;
}

impl<T: Component> ComponentValue for T {
    fn key(&self) -> ComponentKey {
        ComponentKey::of::<T>()
    }

    fn insert_into(self: Box<Self>, world: &World, entity: Entity, origin: usize) -> bool {
        world.insert_component(entity, *self, origin)
    }
}

impl fmt::Debug for dyn ComponentValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentValue({:?})", self.key())
    }
}

/// A set of components spawned together.
///
/// Implemented for tuples of up to eight components and for pre-boxed values.
pub trait Bundle: Send + 'static {
    /// Splits the bundle into type-erased payloads, in declaration order.
    fn into_values(self) -> Vec<Box<dyn ComponentValue>>;
}

impl Bundle for Vec<Box<dyn ComponentValue>> {
    fn into_values(self) -> Vec<Box<dyn ComponentValue>> {
        self
    }
}

macro_rules! impl_bundle {
    ($($T:ident $i:tt),+) => {
        impl<$($T: Component),+> Bundle for ($($T,)+) {
            fn into_values(self) -> Vec<Box<dyn ComponentValue>> {
                vec![$(Box::new(self.$i) as Box<dyn ComponentValue>),+]
            }
        }
    };
}

impl_bundle!(A 0);
impl_bundle!(A 0, B 1);
impl_bundle!(A 0, B 1, C 2);
impl_bundle!(A 0, B 1, C 2, D 3);
impl_bundle!(A 0, B 1, C 2, D 3, E 4);
impl_bundle!(A 0, B 1, C 2, D 3, E 4, F 5);
impl_bundle!(A 0, B 1, C 2, D 3, E 4, F 5, G 6);
impl_bundle!(A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7);

#[cfg(test)]
pub(crate) mod tests {
    use serde::Deserialize;

    use super::*;

    /// Position component used across the crate's unit tests.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
    pub struct Position {
        pub x: i32,
        pub y: i32,
    }

    impl Component for Position {
        const UUID: &'static str = "test.position";
    }

    /// Velocity component used across the crate's unit tests.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
    pub struct Velocity {
        pub x: i32,
        pub y: i32,
    }

    impl Component for Velocity {
        const UUID: &'static str = "test.velocity";
    }

    /// String component used across the crate's unit tests.
    #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
    pub struct Name(pub String);

    impl Component for Name {
        const UUID: &'static str = "test.name";
    }

    /// Data-less marker component.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
    pub struct Frozen;

    impl Component for Frozen {
        const UUID: &'static str = "test.frozen";
    }

    #[test]
    fn test_component_key() {
        let key = ComponentKey::of::<Position>();
        assert_eq!(key.uuid(), "test.position");
        assert_eq!(key, ComponentKey::of::<Position>());
        assert_ne!(key, ComponentKey::of::<Velocity>());
    }

    #[test]
    fn test_bundle_preserves_order() {
        let values = (Position::default(), Velocity::default(), Name("a".into())).into_values();
        let uuids: Vec<_> = values.iter().map(|v| v.key().uuid()).collect();
        assert_eq!(uuids, vec!["test.position", "test.velocity", "test.name"]);
    }
}
