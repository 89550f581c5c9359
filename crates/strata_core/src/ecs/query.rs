//! # Query Engine
//!
//! An n-way merge-join over entity-sorted component stores.
//!
//! Every store contributes its entity column. The cursor keeps one position
//! per store and repeatedly jumps the lagging positions forward to the
//! largest entity under any cursor, until all of them agree (a match) or one
//! runs off its column (end of results). Matches whose record is tombstoned
//! in any store are skipped.
//!
//! ```rust,ignore
//! let mut query = world.query::<(Position, Velocity)>();
//! while query.next() {
//!     let (_, mut pos, vel) = query.item();
//!     pos.x += vel.x;
//! }
//! ```

use std::any::TypeId;
use std::fmt;

use parking_lot::{MappedRwLockWriteGuard, RwLockWriteGuard};

use super::component::{Component, ComponentKey};
use super::entity::Entity;
use super::storage::StoreHandle;
use super::world::World;
use crate::error::{fatal, EcsError};

/// Maximum number of component types in one type tape.
pub const MAX_QUERY_ARITY: usize = 16;

/// Exclusive access to one component of a query match.
pub type ComponentMut<'a, T> = MappedRwLockWriteGuard<'a, T>;

/// Ordered list of component types identifying a query.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeTape(Vec<TypeId>);

impl TypeTape {
    /// Builds a tape from component keys.
    ///
    /// # Panics
    ///
    /// Panics if `keys` is empty, longer than [`MAX_QUERY_ARITY`], or names
    /// a type twice.
    #[must_use]
    pub fn new(keys: &[ComponentKey]) -> Self {
        if keys.is_empty() || keys.len() > MAX_QUERY_ARITY {
            fatal(EcsError::InvalidQuery(format!(
                "a query needs 1..={MAX_QUERY_ARITY} component types, got {}",
                keys.len()
            )));
        }
        for (i, key) in keys.iter().enumerate() {
            if keys[..i].contains(key) {
                fatal(EcsError::InvalidQuery(format!(
                    "component `{}` appears twice",
                    key.uuid()
                )));
            }
        }
        Self(keys.iter().map(|key| key.type_id()).collect())
    }

    /// Tape of query `Q`.
    #[must_use]
    pub fn of<Q: QueryData>() -> Self {
        Self::new(&Q::keys())
    }

    /// Number of component types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` for an empty tape.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CursorState {
    BeforeFirst,
    Active,
    Exhausted,
}

/// Merge-join position over a set of entity columns.
#[derive(Clone, Debug)]
pub struct JoinCursor {
    positions: Vec<usize>,
    state: CursorState,
    current: Entity,
}

impl JoinCursor {
    /// A cursor before the first match of an `arity`-way join.
    #[must_use]
    pub fn new(arity: usize) -> Self {
        Self {
            positions: vec![0; arity],
            state: CursorState::BeforeFirst,
            current: Entity::NULL,
        }
    }

    /// Moves to the next entity live in every column.
    ///
    /// `columns` holds one `(entities, tombstones)` pair per joined store.
    pub fn advance(&mut self, columns: &[(&[Entity], &[bool])]) -> bool {
        match self.state {
            CursorState::Exhausted => return false,
            CursorState::BeforeFirst => {
                self.positions.iter_mut().for_each(|p| *p = 0);
                self.state = CursorState::Active;
            }
            CursorState::Active => self.positions.iter_mut().for_each(|p| *p += 1),
        }

        loop {
            let mut target = None;
            for (k, (entities, _)) in columns.iter().enumerate() {
                match entities.get(self.positions[k]) {
                    Some(&entity) => target = target.max(Some(entity)),
                    None => return self.exhaust(),
                }
            }
            let Some(target) = target else {
                return self.exhaust();
            };

            let mut aligned = true;
            for (k, (entities, _)) in columns.iter().enumerate() {
                let pos = self.positions[k];
                if entities[pos] < target {
                    self.positions[k] = pos + entities[pos..].partition_point(|&e| e < target);
                    aligned = false;
                }
            }
            if !aligned {
                continue;
            }

            let dead = columns
                .iter()
                .enumerate()
                .any(|(k, (_, tombstones))| tombstones[self.positions[k]]);
            if dead {
                self.positions.iter_mut().for_each(|p| *p += 1);
                continue;
            }

            self.current = target;
            return true;
        }
    }

    /// Back to before-first.
    pub fn reset(&mut self) {
        self.state = CursorState::BeforeFirst;
        self.current = Entity::NULL;
    }

    /// The matched entity, if positioned on a match.
    #[must_use]
    pub fn current(&self) -> Option<Entity> {
        (self.state == CursorState::Active).then_some(self.current)
    }

    /// Array position of the match inside store `k`.
    #[must_use]
    pub fn position(&self, k: usize) -> usize {
        self.positions[k]
    }

    fn exhaust(&mut self) -> bool {
        self.state = CursorState::Exhausted;
        self.current = Entity::NULL;
        false
    }
}

/// A combination of component types that can be joined.
///
/// Implemented for tuples of one to sixteen distinct components.
pub trait QueryData: 'static {
    /// Resolved store handles, one per component type.
    type Stores: Clone + Send + 'static;
    /// One match: the entity plus exclusive access to each component.
    type Item<'q>;
    /// Number of joined component types.
    const ARITY: usize;

    /// Keys of the joined types, in order.
    fn keys() -> Vec<ComponentKey>;
    /// Looks up (registering if needed) every store.
    fn resolve(world: &World) -> Self::Stores;
    /// Advances `cursor` over the stores' columns.
    fn advance(stores: &Self::Stores, cursor: &mut JoinCursor) -> bool;
    /// Borrows the components under `cursor`.
    fn fetch<'q>(stores: &'q Self::Stores, cursor: &JoinCursor, entity: Entity) -> Self::Item<'q>;
}

/// Reusable cursor over every entity owning all of `Q`'s component types.
pub struct Query<Q: QueryData> {
    stores: Q::Stores,
    cursor: JoinCursor,
}

impl<Q: QueryData> Query<Q> {
    pub(crate) fn new(world: &World) -> Self {
        Self {
            stores: Q::resolve(world),
            cursor: JoinCursor::new(Q::ARITY),
        }
    }

    /// Advances to the next match. Returns `false` at the end.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> bool {
        Q::advance(&self.stores, &mut self.cursor)
    }

    /// The current match.
    ///
    /// Valid until the next call to [`next`](Self::next); the returned guards
    /// lock the underlying stores while alive.
    ///
    /// # Panics
    ///
    /// Panics if the cursor is not on a match or a store is already borrowed.
    pub fn item(&self) -> Q::Item<'_> {
        let entity = self.cursor.current().unwrap_or_else(|| {
            fatal(EcsError::InvalidQuery(
                "item() called while the cursor is not on a match".into(),
            ))
        });
        Q::fetch(&self.stores, &self.cursor, entity)
    }

    /// Entity of the current match.
    #[must_use]
    pub fn entity(&self) -> Option<Entity> {
        self.cursor.current()
    }

    /// Rewinds to before the first match.
    pub fn reset(&mut self) {
        self.cursor.reset();
    }

    /// Number of matches, without moving this cursor.
    #[must_use]
    pub fn count(&self) -> usize {
        let mut cursor = JoinCursor::new(Q::ARITY);
        let mut n = 0;
        while Q::advance(&self.stores, &mut cursor) {
            n += 1;
        }
        n
    }

    /// All matching entities in ascending order, without moving this cursor.
    #[must_use]
    pub fn entities(&self) -> Vec<Entity> {
        let mut cursor = JoinCursor::new(Q::ARITY);
        let mut out = Vec::new();
        while Q::advance(&self.stores, &mut cursor) {
            out.extend(cursor.current());
        }
        out
    }
}

impl<Q: QueryData> Clone for Query<Q> {
    fn clone(&self) -> Self {
        Self {
            stores: self.stores.clone(),
            cursor: self.cursor.clone(),
        }
    }
}

impl<Q: QueryData> fmt::Debug for Query<Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let uuids: Vec<_> = Q::keys().iter().map(|k| k.uuid()).collect();
        f.debug_struct("Query")
            .field("components", &uuids)
            .field("current", &self.cursor.current())
            .finish()
    }
}

macro_rules! impl_query {
    ($arity:expr; $($T:ident $i:tt),+) => {
        impl<$($T: Component),+> QueryData for ($($T,)+) {
            type Stores = ($(StoreHandle<$T>,)+);
            type Item<'q> = (Entity, $(ComponentMut<'q, $T>,)+);
            const ARITY: usize = $arity;

            fn keys() -> Vec<ComponentKey> {
                vec![$(ComponentKey::of::<$T>()),+]
            }

            fn resolve(world: &World) -> Self::Stores {
                ($(world.store::<$T>(),)+)
            }

            fn advance(stores: &Self::Stores, cursor: &mut JoinCursor) -> bool {
                let guards = ($(stores.$i.read(),)+);
                let columns = [$(guards.$i.columns()),+];
                cursor.advance(&columns)
            }

            fn fetch<'q>(
                stores: &'q Self::Stores,
                cursor: &JoinCursor,
                entity: Entity,
            ) -> Self::Item<'q> {
                (
                    entity,
                    $(RwLockWriteGuard::map(stores.$i.write(), |store| {
                        store.record_mut(entity, cursor.position($i))
                    }),)+
                )
            }
        }

        impl<$($T: Component),+> Query<($($T,)+)> {
            /// Runs `f` on every match, holding each store locked for the whole pass.
            pub fn for_each(&self, mut f: impl FnMut(Entity, $(&mut $T),+)) {
                let mut guards = ($(self.stores.$i.write(),)+);
                let mut parts = ($(guards.$i.columns_mut(),)+);
                let columns = [$((parts.$i.0, parts.$i.1)),+];
                let mut cursor = JoinCursor::new($arity);
                while cursor.advance(&columns) {
                    let entity = cursor.current;
                    f(entity, $(&mut parts.$i.2[cursor.position($i)]),+);
                }
            }
        }
    };
}

impl_query!(1; A 0);
impl_query!(2; A 0, B 1);
impl_query!(3; A 0, B 1, C 2);
impl_query!(4; A 0, B 1, C 2, D 3);
impl_query!(5; A 0, B 1, C 2, D 3, E 4);
impl_query!(6; A 0, B 1, C 2, D 3, E 4, F 5);
impl_query!(7; A 0, B 1, C 2, D 3, E 4, F 5, G 6);
impl_query!(8; A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7);
impl_query!(9; A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7, I 8);
impl_query!(10; A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7, I 8, J 9);
impl_query!(11; A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7, I 8, J 9, K 10);
impl_query!(12; A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7, I 8, J 9, K 10, L 11);
impl_query!(13; A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7, I 8, J 9, K 10, L 11, M 12);
impl_query!(14; A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7, I 8, J 9, K 10, L 11, M 12, N 13);
impl_query!(15; A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7, I 8, J 9, K 10, L 11, M 12, N 13, O 14);
impl_query!(16; A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7, I 8, J 9, K 10, L 11, M 12, N 13, O 14, P 15);
