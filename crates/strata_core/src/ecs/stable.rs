//! # Stable Identifiers
//!
//! Entity ids are a per-world sequence and differ between runs. A
//! [`StableId`] is a random 128-bit name assigned lazily to an entity, so
//! snapshots and cross-session references survive re-numbering.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::entity::Entity;
use crate::error::SnapshotError;

/// Random 128-bit entity name, written as 32 hex digits.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct StableId(u128);

impl StableId {
    /// Wraps a raw value.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u128) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u128 {
        self.0
    }
}

impl fmt::Display for StableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl fmt::Debug for StableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StableId({self})")
    }
}

/// A string that is not 32 hex digits.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("`{0}` is not a 32-digit hex stable id")]
pub struct ParseStableIdError(String);

impl FromStr for StableId {
    type Err = ParseStableIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 32 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ParseStableIdError(s.to_owned()));
        }
        u128::from_str_radix(s, 16)
            .map(Self)
            .map_err(|_| ParseStableIdError(s.to_owned()))
    }
}

impl From<StableId> for String {
    fn from(id: StableId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for StableId {
    type Error = ParseStableIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Two-way map between entities and their stable ids.
pub(crate) struct StableIds {
    by_entity: HashMap<Entity, StableId>,
    by_id: HashMap<StableId, Entity>,
    rng: ChaCha8Rng,
}

impl StableIds {
    pub(crate) fn new(seed: Option<u64>) -> Self {
        let seed = seed.unwrap_or_else(clock_seed);
        Self {
            by_entity: HashMap::new(),
            by_id: HashMap::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub(crate) fn get(&self, entity: Entity) -> Option<StableId> {
        self.by_entity.get(&entity).copied()
    }

    pub(crate) fn entity(&self, id: StableId) -> Option<Entity> {
        self.by_id.get(&id).copied()
    }

    /// Returns `entity`'s id, drawing a fresh one on first request.
    pub(crate) fn get_or_assign(&mut self, entity: Entity) -> StableId {
        if let Some(id) = self.get(entity) {
            return id;
        }
        let id = loop {
            let candidate = StableId(self.rng.gen());
            if !self.by_id.contains_key(&candidate) {
                break candidate;
            }
        };
        self.by_entity.insert(entity, id);
        self.by_id.insert(id, entity);
        id
    }

    /// Binds an id taken from outside, e.g. a snapshot.
    ///
    /// An id still held by an entity for which `live` returns `false` is
    /// taken over; removed entities keep their binding until the next gc.
    pub(crate) fn bind(
        &mut self,
        entity: Entity,
        id: StableId,
        live: impl Fn(Entity) -> bool,
    ) -> Result<(), SnapshotError> {
        if let Some(&owner) = self.by_id.get(&id) {
            if live(owner) {
                return Err(SnapshotError::DuplicateStableId(id));
            }
            self.by_entity.remove(&owner);
        }
        if let Some(old) = self.by_entity.insert(entity, id) {
            self.by_id.remove(&old);
        }
        self.by_id.insert(id, entity);
        Ok(())
    }

    /// Drops bindings of entities rejected by `keep`. Returns how many were dropped.
    pub(crate) fn retain(&mut self, mut keep: impl FnMut(Entity) -> bool) -> usize {
        let before = self.by_entity.len();
        let by_id = &mut self.by_id;
        self.by_entity.retain(|&entity, id| {
            let kept = keep(entity);
            if !kept {
                by_id.remove(id);
            }
            kept
        });
        before - self.by_entity.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_entity.len()
    }
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() ^ u64::from(d.subsec_nanos()).rotate_left(32))
        .unwrap_or_default()
}
