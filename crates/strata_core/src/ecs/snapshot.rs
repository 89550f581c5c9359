//! # World Snapshots
//!
//! A serde-friendly image of every live entity: its stable id plus one
//! `(component index, payload)` pair per component it owns. Payloads are
//! `toml::Value`s, so a snapshot can be written as TOML text directly:
//!
//! ```toml
//! [[component_index]]
//! uuid = "game.position"
//! index = 0
//!
//! [[entities]]
//! stable_id = "5f0c7e0b4c1d2a9e8f7a6b5c4d3e2f10"
//!
//! [[entities.components]]
//! component = 0
//! data = { x = 1, y = 2 }
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::component::ComponentValue;
use super::entity::Entity;
use super::stable::StableId;
use super::storage::ErasedStore;
use super::world::World;
use crate::error::SnapshotError;

/// Maps a snapshot-local component index to a component uuid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentIndexEntry {
    /// Component uuid.
    pub uuid: String,
    /// Index used by [`ComponentSnapshot::component`].
    pub index: usize,
}

/// One component of one entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComponentSnapshot {
    /// Index into the snapshot's component table.
    pub component: usize,
    /// Encoded payload.
    pub data: toml::Value,
}

/// One entity and its components.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// The entity's stable id.
    pub stable_id: StableId,
    /// Components in membership-bit order.
    pub components: Vec<ComponentSnapshot>,
}

/// Image of a world's entities and components.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Component table.
    pub component_index: Vec<ComponentIndexEntry>,
    /// Entities in id order.
    pub entities: Vec<EntitySnapshot>,
}

impl WorldSnapshot {
    /// Renders the snapshot as TOML text.
    ///
    /// # Errors
    ///
    /// Returns the serializer's error if a payload has no TOML form.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }

    /// Parses a snapshot from TOML text.
    ///
    /// # Errors
    ///
    /// Returns the deserializer's error on malformed input.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

impl World {
    /// Captures every live entity, assigning stable ids where missing.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Encode`] if a component cannot be encoded.
    pub fn export_snapshot(&self) -> Result<WorldSnapshot, SnapshotError> {
        let (component_index, stores): (Vec<_>, Vec<_>) = {
            let registry = self.shared.components.read();
            registry
                .entries()
                .iter()
                .map(|entry| {
                    (
                        ComponentIndexEntry {
                            uuid: entry.key.uuid().to_owned(),
                            index: entry.bit,
                        },
                        Arc::clone(&entry.erased),
                    )
                })
                .unzip()
        };

        let members: Vec<_> = self
            .shared
            .entities
            .read()
            .iter()
            .map(|record| (record.entity, record.membership.clone()))
            .collect();

        let mut entities = Vec::with_capacity(members.len());
        for (entity, membership) in members {
            let mut components = Vec::with_capacity(membership.count());
            for bit in membership.iter() {
                if let Some(data) = stores.get(bit).and_then(|store| store.export(entity)) {
                    components.push(ComponentSnapshot {
                        component: bit,
                        data: data?,
                    });
                }
            }
            entities.push(EntitySnapshot {
                stable_id: self.shared.stable_ids.lock().get_or_assign(entity),
                components,
            });
        }

        debug!(entities = entities.len(), "snapshot exported");
        Ok(WorldSnapshot {
            component_index,
            entities,
        })
    }

    /// Spawns one fresh entity per snapshot entity, adopting its stable id.
    ///
    /// Every payload is validated and decoded before the world is touched,
    /// so a failed import leaves the world unchanged. Imported additions are
    /// reported as component-added events at position 0.
    ///
    /// # Errors
    ///
    /// - [`SnapshotError::UnknownComponent`] for a uuid this world never registered
    /// - [`SnapshotError::IndexOutOfRange`] for an entry missing from the component table
    /// - [`SnapshotError::Decode`] for a payload of the wrong shape
    /// - [`SnapshotError::DuplicateStableId`] for an id already in use
    pub fn import_snapshot(&mut self, snapshot: &WorldSnapshot) -> Result<Vec<Entity>, SnapshotError> {
        let table: HashMap<usize, Arc<dyn ErasedStore>> = {
            let registry = self.shared.components.read();
            snapshot
                .component_index
                .iter()
                .map(|entry| {
                    registry
                        .erased_by_uuid(&entry.uuid)
                        .map(|(_, store)| (entry.index, store))
                        .ok_or_else(|| SnapshotError::UnknownComponent(entry.uuid.clone()))
                })
                .collect::<Result<_, _>>()?
        };

        let mut seen = HashSet::new();
        let mut decoded: Vec<(StableId, Vec<Box<dyn ComponentValue>>)> =
            Vec::with_capacity(snapshot.entities.len());
        {
            let entities = self.shared.entities.read();
            let stable_ids = self.shared.stable_ids.lock();
            for entity in &snapshot.entities {
                let taken = stable_ids
                    .entity(entity.stable_id)
                    .is_some_and(|owner| entities.contains(owner));
                if taken || !seen.insert(entity.stable_id) {
                    return Err(SnapshotError::DuplicateStableId(entity.stable_id));
                }
                let values = entity
                    .components
                    .iter()
                    .map(|component| {
                        table
                            .get(&component.component)
                            .ok_or(SnapshotError::IndexOutOfRange(component.component))?
                            .decode(&component.data)
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                decoded.push((entity.stable_id, values));
            }
        }

        let mut spawned = Vec::with_capacity(decoded.len());
        for (stable_id, values) in decoded {
            let entity = self.spawn_entity();
            for value in values {
                value.insert_into(self, entity, 0);
            }
            let entities = self.shared.entities.read();
            self.shared
                .stable_ids
                .lock()
                .bind(entity, stable_id, |owner| entities.contains(owner))?;
            spawned.push(entity);
        }
        debug!(entities = spawned.len(), "snapshot imported");
        Ok(spawned)
    }
}
