//! Query views over matched archetype tables.
//!
//! ## Purpose
//! `for_each` visits every non-empty table matching an include/exclude
//! constraint pair and hands the callback a [`TableView`]: a cheap token
//! that exposes the table's entity-id prefix, row count, column backing
//! stores, strides, and snapshot columns.
//!
//! ## Execution model
//! The callback receives the world back alongside the view, so nested
//! queries, per-field reads and writes, and (deferred) structural
//! mutation all remain available during iteration. Column slices
//! borrowed through the view are valid only between world calls; any
//! operation that grows a column invalidates previously obtained slices
//! for that archetype.
//!
//! Iteration order is archetype insertion order, then row-index
//! ascending within a table.

use crate::engine::column::Column;
use crate::engine::types::{EntityId, FieldRef};
use crate::engine::world::World;

/// Lightweight handle to one matched table, valid for the duration of
/// the `for_each` callback that produced it.
#[derive(Clone, Copy, Debug)]
pub struct TableView {
    pub(crate) table: usize,
}

impl TableView {
    /// Returns the number of live rows.
    pub fn len(&self, world: &World) -> usize {
        world.index.archetype(self.table).len()
    }

    /// Returns `true` if the table currently has no rows.
    pub fn is_empty(&self, world: &World) -> bool {
        self.len(world) == 0
    }

    /// Returns the dense row → entity prefix (`entity_ids[0..len)`).
    pub fn entity_ids<'a>(&self, world: &'a World) -> &'a [EntityId] {
        world.index.archetype(self.table).entity_ids()
    }

    /// Returns the backing column for a field, if this table stores it.
    ///
    /// The storage covers the full capacity; the first `len × stride`
    /// elements correspond 1:1 with `entity_ids[0..len)`. Callers must
    /// not read past that prefix.
    pub fn column<'a>(&self, world: &'a World, field: FieldRef) -> Option<&'a Column> {
        world
            .index
            .archetype(self.table)
            .column_set(field.component.bit_index())
            .and_then(|set| set.column(field.field))
    }

    /// Mutable access to the backing column for a field.
    pub fn column_mut<'a>(&self, world: &'a mut World, field: FieldRef) -> Option<&'a mut Column> {
        world
            .index
            .archetype_mut(self.table)
            .column_set_mut(field.component.bit_index())
            .and_then(|set| set.column_mut(field.field))
    }

    /// Returns the field's stride, if this table stores it.
    pub fn stride(&self, world: &World, field: FieldRef) -> Option<usize> {
        self.column(world, field).map(|column| column.stride())
    }

    /// Returns the snapshot-mirror column for a field, if the table is
    /// tracked and stores the field.
    pub fn snapshot_column<'a>(&self, world: &'a World, field: FieldRef) -> Option<&'a Column> {
        world
            .index
            .archetype(self.table)
            .snapshot_column_set(field.component.bit_index())
            .and_then(|set| set.column(field.field))
    }

    /// Returns the entity-id prefix captured by the last snapshot flush.
    pub fn snapshot_entity_ids<'a>(&self, world: &'a World) -> Option<&'a [EntityId]> {
        world.index.archetype(self.table).snapshot_entity_ids()
    }

    /// Returns the row count captured by the last snapshot flush.
    pub fn snapshot_len(&self, world: &World) -> Option<usize> {
        world.index.archetype(self.table).snapshot_len()
    }
}
