//! Stable persisted shape of a world and its load/save surface.
//!
//! ## Purpose
//! The on-disk shape is stable and affects portability even though the
//! transport (files, databases, wire formats) lives outside the engine:
//!
//! ```text
//! SerializedWorld ::= {
//!   nextId:     u64,
//!   entities:   [EntityId],
//!   components: { ComponentName -> { EntityId-as-string -> ComponentData } }
//! }
//! ```
//!
//! `ComponentData` mirrors the schema: scalars encode directly,
//! fixed-array fields encode as ordered length-N sequences, strings as
//! strings. Tag components are absent from the map.
//!
//! ## Round-trip guarantee
//! A freshly reconstituted world contains exactly the entities in
//! `entities`, including those with zero components, and each entity's
//! component set equals the union of names under which it appears.
//! Loading clears all prior state (entities, archetypes, caches) first;
//! an unknown component name is ignored for that component's row data,
//! with the entities still created.

use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::engine::column::Record;
use crate::engine::registry::ComponentDef;
use crate::engine::types::{EntityId, Signature};
use crate::engine::world::World;

/// Stable persisted state of a world.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedWorld {
    /// Next id the allocator will issue, preserving never-reuse across
    /// sessions.
    pub next_id: EntityId,
    /// Every live entity id, componentless ones included.
    pub entities: Vec<EntityId>,
    /// Component name → entity-id-as-string → row data.
    pub components: BTreeMap<String, BTreeMap<String, Record>>,
}

impl World {
    /// Captures the world into the stable persisted shape.
    pub fn save(&self) -> SerializedWorld {
        let mut out = SerializedWorld {
            next_id: self.directory.next_id(),
            entities: self.directory.ids().collect(),
            components: BTreeMap::new(),
        };

        for entity in &out.entities {
            let Some(table) = self.directory.placement_of(*entity) else { continue };
            let archetype = self.index.archetype(table);
            let Some(row) = archetype.row_of(*entity) else { continue };

            for component_id in archetype.signature().iterate_over_components() {
                let Some(info) = self.registry.info_by_id(component_id) else { continue };
                if info.is_tag() {
                    continue;
                }
                out.components
                    .entry(info.name.clone())
                    .or_default()
                    .insert(entity.to_string(), archetype.read_component(row, component_id));
            }
        }

        out
    }

    /// Replaces the world's contents with a persisted state.
    ///
    /// ## Behavior
    /// Clears all prior entities, archetypes, and caches, then recreates
    /// each listed id and rebuilds one row per entity from the union of
    /// component names it appears under. Component definitions must
    /// already be registered; rows under unknown names are ignored. No
    /// lifecycle events are buffered for the loaded rows.
    pub fn load(&mut self, snapshot: &SerializedWorld) {
        debug!(
            "loading persisted world: {} entities, {} component maps",
            snapshot.entities.len(),
            snapshot.components.len()
        );
        self.clear();
        self.directory.set_next_id(snapshot.next_id);
        for &entity in &snapshot.entities {
            self.directory.insert_known(entity);
        }

        let mut rows: BTreeMap<EntityId, Vec<(ComponentDef, &Record)>> = BTreeMap::new();
        for (name, per_entity) in &snapshot.components {
            let Some(def) = self.registry.find_by_name(name) else { continue };
            for (entity_text, record) in per_entity {
                let Ok(entity) = entity_text.parse::<EntityId>() else { continue };
                if !self.directory.contains(entity) {
                    continue;
                }
                rows.entry(entity).or_default().push((def, record));
            }
        }

        for (entity, components) in rows {
            let defs: Vec<ComponentDef> = components.iter().map(|(def, _)| *def).collect();
            let signature = Signature::from_defs(&defs);
            let table = self.index.get_or_create(&signature, &self.registry);
            let archetype = self.index.archetype_mut(table);
            let row = archetype.add_row(entity);
            for (def, record) in components {
                archetype.write_component(row, def.bit_index(), Some(record));
            }
            self.directory.place(entity, table);
        }
    }
}
