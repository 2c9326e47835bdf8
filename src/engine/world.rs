//! World facade: entity lifecycle, structural mutation, and access.
//!
//! This is the central orchestration layer of the engine, responsible
//! for:
//!
//! * owning the registry, archetype index, directory, hook bus, and
//!   apply engine,
//! * executing structural mutations (create / destroy / add / remove)
//!   with archetype migration,
//! * deferring structural change while iteration is in flight,
//! * buffering lifecycle events for explicit flush boundaries,
//! * exposing query, per-field access, and bulk-apply entry points.
//!
//! ## Concurrency model
//!
//! The world is **single-threaded by contract**: all operations on one
//! instance must come from a single owner, and no internal
//! synchronization is provided. Reentrancy exists only across `for_each`
//! callbacks, which receive the world back and may read, write fields,
//! and request structural changes (executed at the outermost iteration
//! exit, in call order).
//!
//! ## Ordering guarantees during a tick
//!
//! 1. Per-field writes via [`World::set`] are immediately visible to
//!    later reads in the same callback.
//! 2. [`World::add_component`] on a component the entity already has is
//!    an immediate in-place overwrite; every other structural operation
//!    issued during iteration is deferred.
//! 3. Hook events fire only inside [`World::flush_hooks`];
//!    [`World::commit_removals`] retires removed-row tombstones.
//! 4. Query cache validity is governed by the structural epoch: archetype
//!    creation invalidates it, row churn does not.

use std::collections::BTreeSet;

use log::debug;

use crate::engine::apply::{ApplyEngine, ApplyFilter, Expr};
use crate::engine::column::{FieldValue, Record};
use crate::engine::commands::Command;
use crate::engine::directory::EntityDirectory;
use crate::engine::error::{EngineResult, InvalidOperandError, InvalidOperandKind};
use crate::engine::hooks::{HookBus, HookHandle, HookKind};
use crate::engine::index::ArchetypeIndex;
use crate::engine::query::TableView;
use crate::engine::registry::{ComponentDef, ComponentRegistry};
use crate::engine::simd::SimdProbe;
use crate::engine::types::{ComponentId, EntityId, FieldRef, Signature};

/// Structural deltas accumulated since the last [`World::flush_changes`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Entities created into archetypes overlapping the tracking filter.
    pub created: BTreeSet<EntityId>,
    /// Entities destroyed out of (or stripped of) tracked components.
    pub destroyed: BTreeSet<EntityId>,
}

/// Archetype-backed entity store with deferred structural mutation,
/// buffered lifecycle hooks, and a SIMD-capable bulk-apply path.
pub struct World {
    pub(crate) registry: ComponentRegistry,
    pub(crate) index: ArchetypeIndex,
    pub(crate) directory: EntityDirectory,
    pub(crate) hooks: HookBus,
    deferred: Vec<Command>,
    iteration_depth: usize,
    apply_engine: ApplyEngine,
    probe: SimdProbe,
    created: BTreeSet<EntityId>,
    destroyed: BTreeSet<EntityId>,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Creates an empty world, probing the host for SIMD support.
    pub fn new() -> Self {
        Self::with_probe(SimdProbe::detect())
    }

    /// Creates an empty world with an explicit SIMD probe.
    ///
    /// Useful for forcing the scalar apply path under test.
    pub fn with_probe(probe: SimdProbe) -> Self {
        Self {
            registry: ComponentRegistry::new(),
            index: ArchetypeIndex::new(),
            directory: EntityDirectory::new(),
            hooks: HookBus::new(),
            deferred: Vec::new(),
            iteration_depth: 0,
            apply_engine: ApplyEngine::default(),
            probe,
            created: BTreeSet::new(),
            destroyed: BTreeSet::new(),
        }
    }

    // ────────────────────────────────────────────────────────────────────
    // Component definitions
    // ────────────────────────────────────────────────────────────────────

    /// Defines a tag component: membership only, no per-row data.
    pub fn define_tag(&mut self, name: &str) -> ComponentDef {
        self.registry.define_tag(name)
    }

    /// Defines a component whose fields all share one type token.
    pub fn define_uniform(
        &mut self,
        name: &str,
        kind_token: &str,
        fields: &[&str],
    ) -> EngineResult<ComponentDef> {
        self.registry.define_uniform(name, kind_token, fields)
    }

    /// Defines a component with per-field type tokens.
    pub fn define_schema(&mut self, name: &str, fields: &[(&str, &str)]) -> EngineResult<ComponentDef> {
        self.registry.define_schema(name, fields)
    }

    /// Returns the dense bit index assigned to a definition.
    pub fn bit_index_of(&self, def: ComponentDef) -> ComponentId {
        self.registry.bit_index_of(def)
    }

    /// Resolves a field name to a [`FieldRef`], if the field exists.
    pub fn field_ref(&self, def: ComponentDef, field: &str) -> Option<FieldRef> {
        self.registry.field_ref(def, field)
    }

    /// Read access to the component registry.
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    // ────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ────────────────────────────────────────────────────────────────────

    /// Allocates a fresh entity with no components. No hooks fire.
    pub fn create_entity(&mut self) -> EntityId {
        self.directory.allocate()
    }

    /// Allocates a fresh entity and writes its full row in one step.
    ///
    /// ## Behavior
    /// The target archetype is found or created from the supplied
    /// component set, the row is written once (no migrations), and one
    /// add-event per distinct component is buffered. If change tracking
    /// is enabled and the mask overlaps the filter, the id is recorded as
    /// created.
    pub fn create_entity_with(&mut self, components: &[(ComponentDef, Record)]) -> EntityId {
        let entity = self.directory.allocate();
        if components.is_empty() {
            return entity;
        }

        let defs: Vec<ComponentDef> = components.iter().map(|(def, _)| *def).collect();
        let signature = Signature::from_defs(&defs);
        let table = self.index.get_or_create(&signature, &self.registry);

        let archetype = self.index.archetype_mut(table);
        let row = archetype.add_row(entity);
        for (def, record) in components {
            archetype.write_component(row, def.bit_index(), Some(record));
        }
        self.directory.place(entity, table);

        for component_id in signature.iterate_over_components() {
            self.hooks.enqueue_added(component_id, entity);
        }
        if self.index.track_filter().overlaps(&signature) {
            self.created.insert(entity);
        }
        entity
    }

    /// Destroys an entity; deferred while iteration is in flight.
    ///
    /// ## Behavior
    /// Unknown ids are a silent no-op. For each component present: row
    /// data is tombstoned when a remove observer exists, and one
    /// remove-event is buffered. The row is then swap-removed and the id
    /// forgotten. Tracked masks record the id as destroyed.
    pub fn destroy_entity(&mut self, entity: EntityId) {
        if self.iteration_depth > 0 {
            self.deferred.push(Command::Destroy { entity });
            return;
        }
        if !self.directory.contains(entity) {
            return;
        }

        if let Some(table) = self.directory.placement_of(entity) {
            let signature = self.index.archetype(table).signature().clone();
            let row = self.row_in(table, entity);

            for component_id in signature.iterate_over_components() {
                if self.hooks.wants_removed(component_id) {
                    let record = self.index.archetype(table).read_component(row, component_id);
                    self.hooks.set_tombstone(entity, component_id, record);
                }
                self.hooks.enqueue_removed(component_id, entity);
            }

            self.index.archetype_mut(table).swap_remove(entity);
            self.directory.unplace(entity);

            if self.index.track_filter().overlaps(&signature) {
                self.destroyed.insert(entity);
            }
        }

        self.directory.remove(entity);
    }

    // ────────────────────────────────────────────────────────────────────
    // Structure
    // ────────────────────────────────────────────────────────────────────

    /// Adds a component to an entity, migrating its row if needed.
    ///
    /// ## Behavior
    /// - If the entity already has the component, this is an **in-place
    ///   overwrite** of the existing row: immediate at any iteration
    ///   depth and never a hook event.
    /// - Otherwise, during iteration the add is deferred.
    /// - Otherwise the entity enters the singleton archetype (no prior
    ///   placement) or migrates to `old mask ∪ {component}` with all
    ///   preserved columns copied, and one add-event is buffered.
    ///
    /// Zero-fills the component's fields when `data` is absent.
    pub fn add_component(&mut self, entity: EntityId, component: ComponentDef, data: Option<&Record>) {
        if !self.directory.contains(entity) {
            return;
        }

        if self.has_component(entity, component) {
            let table = self.directory.placement_of(entity).expect("has_component implies placement");
            let row = self.row_in(table, entity);
            self.index.archetype_mut(table).write_component(row, component.bit_index(), data);
            return;
        }

        if self.iteration_depth > 0 {
            self.deferred.push(Command::Add { entity, component, data: data.cloned() });
            return;
        }

        match self.directory.placement_of(entity) {
            None => {
                let signature = Signature::from_defs(&[component]);
                let table = self.index.get_or_create(&signature, &self.registry);
                let archetype = self.index.archetype_mut(table);
                let row = archetype.add_row(entity);
                archetype.write_component(row, component.bit_index(), data);
                self.directory.place(entity, table);
                self.hooks.enqueue_added(component.bit_index(), entity);
            }
            Some(source) => {
                let source_signature = self.index.archetype(source).signature().clone();
                let mut target_signature = source_signature.clone();
                target_signature.set(component.bit_index());
                let target = self.index.get_or_create(&target_signature, &self.registry);

                let row = self.row_in(source, entity);
                let staged = self.stage_row(source, row, &source_signature);

                let (source_table, target_table) = self.index.pair_mut(source, target);
                let new_row = target_table.add_row(entity);
                for (component_id, record) in &staged {
                    target_table.write_component(new_row, *component_id, Some(record));
                }
                target_table.write_component(new_row, component.bit_index(), data);
                source_table.swap_remove(entity);

                self.directory.place(entity, target);
                self.hooks.enqueue_added(component.bit_index(), entity);
            }
        }
    }

    /// Removes a component from an entity; deferred during iteration.
    ///
    /// ## Behavior
    /// A silent no-op when the entity lacks the component. Row data is
    /// tombstoned when a remove observer exists and one remove-event is
    /// buffered. A single-component archetype drops the row outright
    /// (the entity stays known with no placement); otherwise the row
    /// migrates to `old mask \ {component}`.
    ///
    /// When the source mask overlaps the tracking filter the id is
    /// recorded in the **destroyed** delta even though the entity remains
    /// alive; see [`World::flush_changes`].
    pub fn remove_component(&mut self, entity: EntityId, component: ComponentDef) {
        if self.iteration_depth > 0 {
            self.deferred.push(Command::Remove { entity, component });
            return;
        }
        if !self.directory.contains(entity) {
            return;
        }
        let Some(source) = self.directory.placement_of(entity) else { return };
        let source_signature = self.index.archetype(source).signature().clone();
        if !source_signature.has(component.bit_index()) {
            return;
        }

        let row = self.row_in(source, entity);
        if self.hooks.wants_removed(component.bit_index()) {
            let record = self.index.archetype(source).read_component(row, component.bit_index());
            self.hooks.set_tombstone(entity, component.bit_index(), record);
        }
        self.hooks.enqueue_removed(component.bit_index(), entity);

        if source_signature.count() == 1 {
            self.index.archetype_mut(source).swap_remove(entity);
            self.directory.unplace(entity);
        } else {
            let mut target_signature = source_signature.clone();
            target_signature.clear(component.bit_index());
            let target = self.index.get_or_create(&target_signature, &self.registry);

            let staged = self.stage_row(source, row, &target_signature);

            let (source_table, target_table) = self.index.pair_mut(source, target);
            let new_row = target_table.add_row(entity);
            for (component_id, record) in &staged {
                target_table.write_component(new_row, *component_id, Some(record));
            }
            source_table.swap_remove(entity);
            self.directory.place(entity, target);
        }

        if self.index.track_filter().overlaps(&source_signature) {
            self.destroyed.insert(entity);
        }
    }

    /// Returns `true` iff the entity's archetype mask contains the
    /// component.
    pub fn has_component(&self, entity: EntityId, component: ComponentDef) -> bool {
        self.directory
            .placement_of(entity)
            .map(|table| self.index.archetype(table).signature().has(component.bit_index()))
            .unwrap_or(false)
    }

    // ────────────────────────────────────────────────────────────────────
    // Access
    // ────────────────────────────────────────────────────────────────────

    /// Reads an entity's component into a fresh record.
    ///
    /// Falls back to the tombstone map for recently removed rows, so
    /// remove observers can read the deceased state until
    /// [`World::commit_removals`].
    pub fn get_component(&self, entity: EntityId, component: ComponentDef) -> Option<Record> {
        let component_id = component.bit_index();
        if let Some(table) = self.directory.placement_of(entity) {
            let archetype = self.index.archetype(table);
            if archetype.signature().has(component_id) {
                let row = self.row_in(table, entity);
                return Some(archetype.read_component(row, component_id));
            }
        }
        self.hooks.tombstone(entity, component_id).cloned()
    }

    /// Reads a single field without materializing the full record.
    ///
    /// Fixed-array fields produce a freshly allocated length-N sequence.
    /// The same tombstone fallback as [`World::get_component`] applies.
    pub fn get(&self, entity: EntityId, field: FieldRef) -> Option<FieldValue> {
        let component_id = field.component.bit_index();
        if let Some(table) = self.directory.placement_of(entity) {
            let archetype = self.index.archetype(table);
            if archetype.signature().has(component_id) {
                let row = self.row_in(table, entity);
                return archetype
                    .column_set(component_id)
                    .and_then(|set| set.column(field.field))
                    .map(|column| column.read(row));
            }
        }
        let info = self.registry.info_by_id(component_id)?;
        let name = info.fields.get(field.field)?.name.as_str();
        self.hooks.tombstone(entity, component_id)?.get(name).cloned()
    }

    /// Writes a single field of a live row.
    ///
    /// Silent no-op if the entity, component, or field is absent; never
    /// writes tombstoned data.
    pub fn set(&mut self, entity: EntityId, field: FieldRef, value: impl Into<FieldValue>) {
        let component_id = field.component.bit_index();
        let Some(table) = self.directory.placement_of(entity) else { return };
        if !self.index.archetype(table).signature().has(component_id) {
            return;
        }
        let row = self.row_in(table, entity);
        let value = value.into();
        if let Some(column) = self
            .index
            .archetype_mut(table)
            .column_set_mut(component_id)
            .and_then(|set| set.column_mut(field.field))
        {
            column.write_value(row, &value);
        }
    }

    /// Enumerates all known ids in ascending order, including entities
    /// with zero components.
    pub fn entities(&self) -> Vec<EntityId> {
        self.directory.ids().collect()
    }

    /// Returns the number of live entities.
    pub fn len(&self) -> usize {
        self.directory.len()
    }

    /// Returns `true` if no entities are live.
    pub fn is_empty(&self) -> bool {
        self.directory.is_empty()
    }

    // ────────────────────────────────────────────────────────────────────
    // Query
    // ────────────────────────────────────────────────────────────────────

    /// Collects the ids of all entities matching the constraints.
    ///
    /// Matched tables are concatenated in archetype insertion order, row
    /// order within each table. Allocates.
    pub fn query(&mut self, include: &[ComponentDef], exclude: &[ComponentDef]) -> Vec<EntityId> {
        let include_signature = Signature::from_defs(include);
        let exclude_signature = Signature::from_defs(exclude);
        let tables = self.index.matches(&include_signature, &exclude_signature).to_vec();
        let mut out = Vec::new();
        for table in tables {
            out.extend_from_slice(self.index.archetype(table).entity_ids());
        }
        out
    }

    /// Counts entities matching the constraints without collecting them.
    pub fn count(&mut self, include: &[ComponentDef], exclude: &[ComponentDef]) -> usize {
        let include_signature = Signature::from_defs(include);
        let exclude_signature = Signature::from_defs(exclude);
        self.index.matched_row_count(&include_signature, &exclude_signature)
    }

    /// Invokes `callback` once per matched non-empty table.
    ///
    /// ## Behavior
    /// The iteration depth is raised before the first callback; while it
    /// is non-zero, structural mutations are captured by the deferral
    /// queue (in-place overwrites and per-field writes stay immediate).
    /// When the outermost iteration exits, the queue drains in FIFO order
    /// through the ordinary mutation paths before `for_each` returns.
    pub fn for_each(
        &mut self,
        include: &[ComponentDef],
        exclude: &[ComponentDef],
        mut callback: impl FnMut(&mut World, TableView),
    ) {
        let include_signature = Signature::from_defs(include);
        let exclude_signature = Signature::from_defs(exclude);
        let tables = self.index.matches(&include_signature, &exclude_signature).to_vec();

        self.iteration_depth += 1;
        for table in tables {
            if self.index.archetype(table).is_empty() {
                continue;
            }
            callback(self, TableView { table });
        }
        self.iteration_depth -= 1;

        if self.iteration_depth == 0 {
            self.drain_deferred();
        }
    }

    fn drain_deferred(&mut self) {
        while !self.deferred.is_empty() {
            let commands = std::mem::take(&mut self.deferred);
            for command in commands {
                match command {
                    Command::Add { entity, component, data } => {
                        self.add_component(entity, component, data.as_ref());
                    }
                    Command::Remove { entity, component } => self.remove_component(entity, component),
                    Command::Destroy { entity } => self.destroy_entity(entity),
                }
            }
        }
    }

    // ────────────────────────────────────────────────────────────────────
    // Bulk apply
    // ────────────────────────────────────────────────────────────────────

    /// Evaluates `expr` into `target` across every matching archetype.
    ///
    /// ## Behavior
    /// The required component set is everything mentioned by `target` and
    /// the expression's field leaves; `filter.with` narrows further and
    /// `filter.without` excludes. Dispatches to four-lane SIMD when every
    /// involved field is `f32` and the host probe passed, otherwise to a
    /// scalar loop with the same observable result. Fires no hooks and
    /// changes no membership.
    ///
    /// ## Errors
    /// `InvalidOperand` if the target or any operand references a tag
    /// component, an unknown field, a string field, or a field whose
    /// stride differs from the target's. No column is modified on error.
    pub fn apply(&mut self, target: FieldRef, expr: &Expr, filter: &ApplyFilter) -> EngineResult<()> {
        let mut operand_fields: Vec<FieldRef> = Vec::new();
        expr.for_each_field(&mut |field| operand_fields.push(field));

        let target_stride = self.validate_operand(target)?;
        for field in &operand_fields {
            let stride = self.validate_operand(*field)?;
            if stride != target_stride {
                let info = self.registry.info(field.component);
                return Err(InvalidOperandError {
                    component: info.name.clone(),
                    kind: InvalidOperandKind::StrideMismatch,
                }
                .into());
            }
        }

        let mut include = Signature::new();
        include.set(target.component.bit_index());
        for field in &operand_fields {
            include.set(field.component.bit_index());
        }
        for def in &filter.with {
            include.set(def.bit_index());
        }
        let exclude = Signature::from_defs(&filter.without);

        let tables = self.index.matches(&include, &exclude).to_vec();
        for table in tables {
            let archetype = self.index.archetype_mut(table);
            self.apply_engine
                .run_table(table, archetype, &self.probe, target, expr, &operand_fields);
        }
        Ok(())
    }

    fn validate_operand(&self, field: FieldRef) -> EngineResult<usize> {
        let info = self.registry.info(field.component);
        if info.is_tag() {
            return Err(InvalidOperandError {
                component: info.name.clone(),
                kind: InvalidOperandKind::TagComponent,
            }
            .into());
        }
        let Some(schema) = info.fields.get(field.field) else {
            return Err(InvalidOperandError {
                component: info.name.clone(),
                kind: InvalidOperandKind::UnknownField,
            }
            .into());
        };
        if !schema.kind.elem.is_numeric() {
            return Err(InvalidOperandError {
                component: info.name.clone(),
                kind: InvalidOperandKind::NotNumeric,
            }
            .into());
        }
        Ok(schema.kind.stride)
    }

    // ────────────────────────────────────────────────────────────────────
    // Hooks
    // ────────────────────────────────────────────────────────────────────

    /// Registers an observer fired after a component is added to an
    /// entity. Returns a handle for [`World::remove_hook`].
    pub fn on_add(
        &mut self,
        component: ComponentDef,
        callback: impl FnMut(&mut World, EntityId) + 'static,
    ) -> HookHandle {
        self.hooks.subscribe(component.bit_index(), HookKind::Added, Box::new(callback))
    }

    /// Registers an observer fired after a component is removed from an
    /// entity (or the entity destroyed). Returns a handle for
    /// [`World::remove_hook`].
    pub fn on_remove(
        &mut self,
        component: ComponentDef,
        callback: impl FnMut(&mut World, EntityId) + 'static,
    ) -> HookHandle {
        self.hooks.subscribe(component.bit_index(), HookKind::Removed, Box::new(callback))
    }

    /// Removes an observer by the identity handle it was registered
    /// under.
    pub fn remove_hook(&mut self, handle: HookHandle) {
        self.hooks.unsubscribe(handle);
    }

    /// Fires all buffered lifecycle events and clears the buffers.
    ///
    /// ## Behavior
    /// Pending add-events fire first (components in first-subscription
    /// order, each component's observers in registration order per id),
    /// then pending remove-events. Idempotent when nothing intervened:
    /// a second consecutive call fires nothing.
    pub fn flush_hooks(&mut self) {
        let order = self.hooks.component_order();
        for kind in [HookKind::Added, HookKind::Removed] {
            for &component in &order {
                let Some((pending, mut slots)) = self.hooks.take(component, kind) else { continue };
                for &entity in &pending {
                    for slot in slots.iter_mut() {
                        if self.hooks.is_dead(slot.id) {
                            continue;
                        }
                        (slot.callback)(self, entity);
                    }
                }
                self.hooks.restore(component, kind, slots);
            }
        }
    }

    /// Clears the removed-row tombstone map. Idempotent.
    ///
    /// Observers that need to read a deceased row must do so before the
    /// next commit boundary.
    pub fn commit_removals(&mut self) {
        self.hooks.commit_removals();
    }

    // ────────────────────────────────────────────────────────────────────
    // Change tracking and snapshots
    // ────────────────────────────────────────────────────────────────────

    /// Adds a component to the change-tracking filter.
    ///
    /// Existing archetypes overlapping the filter are swept retroactively
    /// (snapshot mirrors allocated); future archetypes are registered at
    /// creation.
    pub fn enable_tracking(&mut self, component: ComponentDef) {
        let mut filter = self.index.track_filter().clone();
        filter.set(component.bit_index());
        self.index.set_track_filter(filter, &self.registry);
    }

    /// Returns and resets the accumulated change deltas.
    ///
    /// Component *removal* from a tracked mask records the id in
    /// `destroyed` even though the entity remains alive in a reduced
    /// archetype; downstream consumers rely on that conflation.
    pub fn flush_changes(&mut self) -> ChangeSet {
        ChangeSet {
            created: std::mem::take(&mut self.created),
            destroyed: std::mem::take(&mut self.destroyed),
        }
    }

    /// Copies every tracked table's committed column prefix into its
    /// snapshot mirror. Allocates nothing beyond capacity growth.
    pub fn flush_snapshots(&mut self) {
        for archetype in self.index.iter_mut() {
            archetype.flush_snapshot();
        }
    }

    // ────────────────────────────────────────────────────────────────────
    // Maintenance
    // ────────────────────────────────────────────────────────────────────

    /// Resets entities, archetypes, caches, pending events, tombstones,
    /// and deltas. Component definitions, observer registrations, and the
    /// tracking filter survive.
    pub fn clear(&mut self) {
        debug!("clearing world state");
        self.index.clear();
        self.directory.clear();
        self.hooks.clear_transient();
        self.deferred.clear();
        self.apply_engine.clear();
        self.created.clear();
        self.destroyed.clear();
    }

    fn row_in(&self, table: usize, entity: EntityId) -> usize {
        match self.index.archetype(table).row_of(entity) {
            Some(row) => row,
            None => panic!("directory placement for entity {entity} has no row in its archetype"),
        }
    }

    /// Reads the preserved columns of one row into a staging list, ready
    /// to be rewritten in a migration target.
    fn stage_row(&self, table: usize, row: usize, keep: &Signature) -> Vec<(ComponentId, Record)> {
        let archetype = self.index.archetype(table);
        keep.iterate_over_components()
            .filter(|&component_id| archetype.column_set(component_id).is_some())
            .map(|component_id| (component_id, archetype.read_component(row, component_id)))
            .collect()
    }
}
