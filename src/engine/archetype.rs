//! Archetype tables: dense row storage for one component set.
//!
//! ## Purpose
//! An [`Archetype`] owns columnar storage for every schema'd component in
//! its mask and keeps entities densely packed using swap-remove. It is
//! the unit of iteration: queries hand out its column slices, and the
//! bulk-apply engine runs directly over them.
//!
//! ## Design
//! - Identity is the component-set mask ([`Signature`]); mask ↔ table is
//!   1:1 within an index.
//! - `entity_ids[0..n)` maps row → entity; `row_of` maps entity → row.
//! - Capacity starts at [`INITIAL_CAPACITY`] rows and doubles on growth;
//!   it never shrinks.
//! - Tag components occupy a mask bit but no column storage.
//! - An optional snapshot mirror holds columns of the same shapes plus a
//!   copy of the entity-id prefix, populated by explicit flushes.
//!
//! ## Invariants
//! - `row_of[entity_ids[i]] == i` for every `i ∈ [0, n)`.
//! - Every column holds exactly `n` rows of live data followed by unused
//!   capacity.
//! - The snapshot mirror's capacity tracks the live capacity so a flush
//!   never allocates beyond growth.

use std::collections::HashMap;

use crate::engine::column::{ColumnSet, Record};
use crate::engine::registry::ComponentRegistry;
use crate::engine::types::{ComponentId, EntityId, Signature};

/// Initial row capacity of a freshly created archetype.
pub const INITIAL_CAPACITY: usize = 64;

/// Snapshot mirror of an archetype's committed column state.
#[derive(Debug)]
pub struct SnapshotMirror {
    columns: Vec<Option<ColumnSet>>,
    entity_ids: Vec<EntityId>,
    len: usize,
}

/// Stores entities that share an identical component signature.
#[derive(Debug)]
pub struct Archetype {
    signature: Signature,
    len: usize,
    capacity: usize,
    entity_ids: Vec<EntityId>,
    row_of: HashMap<EntityId, usize>,
    /// Column sets indexed by component bit index; `None` for tags and
    /// components outside the mask.
    columns: Vec<Option<ColumnSet>>,
    snapshot: Option<SnapshotMirror>,
}

impl Archetype {
    /// Creates an empty archetype for the given mask.
    ///
    /// ## Behavior
    /// Allocates a zero-filled column set for every schema'd component in
    /// the mask; tags get no storage. The table starts with
    /// [`INITIAL_CAPACITY`] rows of capacity and no members.
    pub fn new(signature: Signature, registry: &ComponentRegistry) -> Self {
        let slots = signature
            .iterate_over_components()
            .last()
            .map(|id| id as usize + 1)
            .unwrap_or(0);

        let mut columns: Vec<Option<ColumnSet>> = (0..slots).map(|_| None).collect();
        for component_id in signature.iterate_over_components() {
            if let Some(info) = registry.info_by_id(component_id) {
                if !info.is_tag() {
                    columns[component_id as usize] = Some(ColumnSet::new(info, INITIAL_CAPACITY));
                }
            }
        }

        Self {
            signature,
            len: 0,
            capacity: INITIAL_CAPACITY,
            entity_ids: Vec::new(),
            row_of: HashMap::new(),
            columns,
            snapshot: None,
        }
    }

    /// Returns the number of live rows.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the table has no members.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the current row capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the archetype's component mask.
    #[inline]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Returns the dense row → entity mapping for the live prefix.
    #[inline]
    pub fn entity_ids(&self) -> &[EntityId] {
        &self.entity_ids
    }

    /// Returns the row index of an entity, if it is a member.
    #[inline]
    pub fn row_of(&self, entity: EntityId) -> Option<usize> {
        self.row_of.get(&entity).copied()
    }

    /// Returns the column set for a component, if it stores data here.
    #[inline]
    pub fn column_set(&self, component_id: ComponentId) -> Option<&ColumnSet> {
        self.columns.get(component_id as usize).and_then(|slot| slot.as_ref())
    }

    /// Mutable access to the column set for a component.
    #[inline]
    pub fn column_set_mut(&mut self, component_id: ComponentId) -> Option<&mut ColumnSet> {
        self.columns.get_mut(component_id as usize).and_then(|slot| slot.as_mut())
    }

    fn grow(&mut self) {
        self.capacity *= 2;
        for column_set in self.columns.iter_mut().flatten() {
            column_set.grow(self.capacity);
        }
        if let Some(snapshot) = &mut self.snapshot {
            for column_set in snapshot.columns.iter_mut().flatten() {
                column_set.grow(self.capacity);
            }
        }
    }

    /// Appends a zero-filled row for `entity` and returns its index.
    ///
    /// ## Behavior
    /// Doubles capacity first if the table is full (growing the snapshot
    /// mirror in lockstep). Component data is written afterwards via
    /// [`Archetype::write_component`].
    pub fn add_row(&mut self, entity: EntityId) -> usize {
        if self.len == self.capacity {
            self.grow();
        }
        let row = self.len;
        for column_set in self.columns.iter_mut().flatten() {
            column_set.write(row, None);
        }
        self.entity_ids.push(entity);
        self.row_of.insert(entity, row);
        self.len += 1;
        row
    }

    /// Writes one component's data at an existing row.
    ///
    /// Zero-fills when `data` is absent. No-op for tags.
    pub fn write_component(&mut self, row: usize, component_id: ComponentId, data: Option<&Record>) {
        if let Some(column_set) = self.column_set_mut(component_id) {
            column_set.write(row, data);
        }
    }

    /// Reads one component's row into a freshly allocated record.
    ///
    /// Returns an empty record for tags in the mask.
    pub fn read_component(&self, row: usize, component_id: ComponentId) -> Record {
        match self.column_set(component_id) {
            Some(column_set) => column_set.read(row),
            None => Record::new(),
        }
    }

    /// Removes an entity's row via swap-remove.
    ///
    /// ## Behavior
    /// If the removed row is not the last, the last row is moved into its
    /// place across every column and the moved entity's row mapping is
    /// updated. Capacity never shrinks.
    ///
    /// ## Returns
    /// The id of the entity that was relocated, if any.
    ///
    /// ## Panics
    /// Panics if the entity is not in the row map: the caller resolved a
    /// directory placement pointing here, so a missing row means storage
    /// corruption and recovery is not attempted.
    pub fn swap_remove(&mut self, entity: EntityId) -> Option<EntityId> {
        let row = match self.row_of.remove(&entity) {
            Some(row) => row,
            None => panic!("row map out of sync with directory placement for entity {entity}"),
        };
        let last = self.len - 1;

        let moved = if row != last {
            for column_set in self.columns.iter_mut().flatten() {
                column_set.swap(row, last);
            }
            self.entity_ids.swap(row, last);
            let moved_entity = self.entity_ids[row];
            self.row_of.insert(moved_entity, row);
            Some(moved_entity)
        } else {
            None
        };

        self.entity_ids.truncate(last);
        self.len = last;
        moved
    }

    /// Returns `true` if a snapshot mirror has been allocated.
    #[inline]
    pub fn has_snapshot(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Allocates the snapshot mirror if not already present.
    ///
    /// Mirror columns have the same shapes and capacity as the live
    /// columns; the mirrored prefix is empty until the first flush.
    pub fn ensure_snapshot(&mut self, registry: &ComponentRegistry) {
        if self.snapshot.is_some() {
            return;
        }
        let mut columns: Vec<Option<ColumnSet>> = (0..self.columns.len()).map(|_| None).collect();
        for component_id in self.signature.iterate_over_components() {
            if let Some(info) = registry.info_by_id(component_id) {
                if !info.is_tag() {
                    columns[component_id as usize] = Some(ColumnSet::new(info, self.capacity));
                }
            }
        }
        self.snapshot = Some(SnapshotMirror { columns, entity_ids: Vec::new(), len: 0 });
    }

    /// Copies the committed column prefix into the snapshot mirror.
    ///
    /// No-op when no mirror is allocated. Does not allocate beyond what
    /// capacity growth already reserved.
    pub fn flush_snapshot(&mut self) {
        let len = self.len;
        let Some(snapshot) = &mut self.snapshot else { return };

        for (slot, live) in snapshot.columns.iter_mut().zip(self.columns.iter()) {
            if let (Some(mirror), Some(source)) = (slot.as_mut(), live.as_ref()) {
                mirror.copy_prefix_from(source, len);
            }
        }
        snapshot.entity_ids.clear();
        snapshot.entity_ids.extend_from_slice(&self.entity_ids);
        snapshot.len = len;
    }

    /// Returns the mirrored column set for a component, if present.
    pub fn snapshot_column_set(&self, component_id: ComponentId) -> Option<&ColumnSet> {
        self.snapshot
            .as_ref()
            .and_then(|snapshot| snapshot.columns.get(component_id as usize))
            .and_then(|slot| slot.as_ref())
    }

    /// Returns the mirrored entity-id prefix from the last flush.
    pub fn snapshot_entity_ids(&self) -> Option<&[EntityId]> {
        self.snapshot.as_ref().map(|snapshot| snapshot.entity_ids.as_slice())
    }

    /// Returns the mirrored row count from the last flush.
    pub fn snapshot_len(&self) -> Option<usize> {
        self.snapshot.as_ref().map(|snapshot| snapshot.len)
    }
}
