//! Entity directory: id allocation and archetype placement.
//!
//! ## Purpose
//! Tracks which entity identifiers are alive and, for entities that carry
//! at least one component, which archetype table currently stores their
//! row.
//!
//! ## Design
//! - Identifiers are issued monotonically starting at 1 and never reused
//!   within a session; there is no free list and no generation counter.
//! - `known` is the set of live ids. An entity may be known with no
//!   placement: it exists, carries zero components, and can receive
//!   components later.
//! - `placement` maps an id to the arena index of its archetype. The
//!   archetype itself maps the id to a row.
//!
//! ## Invariants
//! - Every placed id is known.
//! - Ids without placement appear in no archetype's row map.

use std::collections::{BTreeSet, HashMap};

use crate::engine::types::EntityId;

/// Entity id allocator plus id → archetype placement map.
#[derive(Debug, Default)]
pub struct EntityDirectory {
    next_id: EntityId,
    known: BTreeSet<EntityId>,
    placement: HashMap<EntityId, usize>,
}

impl EntityDirectory {
    /// Creates an empty directory; the first allocated id is 1.
    pub fn new() -> Self {
        Self { next_id: 1, known: BTreeSet::new(), placement: HashMap::new() }
    }

    /// Allocates the next entity id and marks it known.
    pub fn allocate(&mut self) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        self.known.insert(id);
        id
    }

    /// Returns the id the next allocation will produce.
    #[inline]
    pub fn next_id(&self) -> EntityId {
        self.next_id
    }

    /// Returns `true` if the id is currently live.
    #[inline]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.known.contains(&entity)
    }

    /// Returns the number of live entities.
    #[inline]
    pub fn len(&self) -> usize {
        self.known.len()
    }

    /// Returns `true` if no entities are live.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    /// Returns the archetype arena index holding the entity's row, if the
    /// entity has any components.
    #[inline]
    pub fn placement_of(&self, entity: EntityId) -> Option<usize> {
        self.placement.get(&entity).copied()
    }

    /// Records the entity's archetype placement.
    pub fn place(&mut self, entity: EntityId, archetype: usize) {
        debug_assert!(self.known.contains(&entity));
        self.placement.insert(entity, archetype);
    }

    /// Clears the entity's placement, leaving it known but componentless.
    pub fn unplace(&mut self, entity: EntityId) {
        self.placement.remove(&entity);
    }

    /// Forgets a destroyed entity entirely.
    pub fn remove(&mut self, entity: EntityId) {
        self.known.remove(&entity);
        self.placement.remove(&entity);
    }

    /// Re-registers an id as known without allocating.
    ///
    /// Used by the persisted-state loader, which replays ids verbatim.
    pub fn insert_known(&mut self, entity: EntityId) {
        self.known.insert(entity);
    }

    /// Overrides the next id to allocate.
    ///
    /// Used by the persisted-state loader to restore the monotone
    /// never-reuse guarantee across sessions.
    pub fn set_next_id(&mut self, next_id: EntityId) {
        self.next_id = next_id.max(1);
    }

    /// Iterates over all known ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.known.iter().copied()
    }

    /// Drops all entities and placements and restarts ids at 1.
    pub fn clear(&mut self) {
        self.next_id = 1;
        self.known.clear();
        self.placement.clear();
    }
}
