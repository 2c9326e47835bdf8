//! Lifecycle hook bus: add/remove observers, pending buffers, tombstones.
//!
//! ## Purpose
//! Observes structural change coherently with iteration. Mutation paths
//! *buffer* the affected entity ids; nothing fires until the user calls
//! `flush_hooks`, so observers always run at a well-defined boundary.
//!
//! ## Design
//! - Observers are boxed closures keyed by component id, held in
//!   registration order. Unsubscription is by identity via the handle
//!   returned at registration.
//! - Pending buffers are ordered multisets. A component's buffers exist
//!   only while it has observers: the first subscription allocates them,
//!   the last unsubscription drops them, and mutation paths enqueue only
//!   when a matching observer exists.
//! - Flush order: pending *adds* for every component in
//!   first-subscription order, then pending *removes*, invoking each
//!   component's observers in registration order per id.
//! - The **tombstone map** preserves the last-known row data of removed
//!   components (captured only when a remove observer exists) so
//!   observers can read the deceased state through the ordinary
//!   accessors until `commit_removals` clears it.
//!
//! ## Reentrancy
//! Observers run with full mutable access to the world. While a
//! component's observer list is being dispatched it is temporarily taken
//! off the bus; subscriptions and unsubscriptions made by observers are
//! merged back in afterwards, preserving registration order for
//! survivors.

use std::collections::{HashMap, HashSet};

use crate::engine::column::Record;
use crate::engine::types::{ComponentId, EntityId};
use crate::engine::world::World;

/// Identity of a single observer registration.
pub type HookId = u64;

/// Which lifecycle edge an observer watches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HookKind {
    /// Component added to an entity.
    Added,
    /// Component removed from an entity (or entity destroyed).
    Removed,
}

/// Handle returned by observer registration; removes the entry by
/// identity when passed back to the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HookHandle {
    pub(crate) component: ComponentId,
    pub(crate) kind: HookKind,
    pub(crate) id: HookId,
}

/// Observer callback. Receives the world and the affected entity id.
pub type HookFn = Box<dyn FnMut(&mut World, EntityId)>;

/// One registered observer.
pub(crate) struct HookSlot {
    pub(crate) id: HookId,
    pub(crate) callback: HookFn,
}

#[derive(Default)]
struct ComponentHooks {
    added: Vec<HookSlot>,
    removed: Vec<HookSlot>,
    added_count: usize,
    removed_count: usize,
    pending_added: Vec<EntityId>,
    pending_removed: Vec<EntityId>,
}

impl ComponentHooks {
    fn observer_count(&self) -> usize {
        self.added_count + self.removed_count
    }
}

/// Buffered lifecycle event dispatch, per component.
#[derive(Default)]
pub struct HookBus {
    next_id: HookId,
    /// Components in first-subscription order; drives flush ordering.
    order: Vec<ComponentId>,
    entries: HashMap<ComponentId, ComponentHooks>,
    /// Row data of recently removed components, keyed entity → component.
    tombstones: HashMap<EntityId, HashMap<ComponentId, Record>>,
    /// Handles unsubscribed while their slot was out for dispatch.
    dead: HashSet<HookId>,
    /// Components whose observer list is currently taken for dispatch.
    in_flight: HashSet<(ComponentId, HookKind)>,
}

impl HookBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    fn entry_mut(&mut self, component: ComponentId) -> &mut ComponentHooks {
        if !self.entries.contains_key(&component) {
            self.entries.insert(component, ComponentHooks::default());
            self.order.push(component);
        }
        self.entries.get_mut(&component).expect("entry just inserted")
    }

    /// Registers an observer; the first observer for a component
    /// allocates its pending buffers.
    pub fn subscribe(&mut self, component: ComponentId, kind: HookKind, callback: HookFn) -> HookHandle {
        let id = self.next_id;
        self.next_id += 1;

        let entry = self.entry_mut(component);
        let slot = HookSlot { id, callback };
        match kind {
            HookKind::Added => {
                entry.added.push(slot);
                entry.added_count += 1;
            }
            HookKind::Removed => {
                entry.removed.push(slot);
                entry.removed_count += 1;
            }
        }

        HookHandle { component, kind, id }
    }

    /// Removes an observer by identity; the last observer for a
    /// component drops its pending buffers.
    pub fn unsubscribe(&mut self, handle: HookHandle) {
        let Some(entry) = self.entries.get_mut(&handle.component) else { return };

        let slots = match handle.kind {
            HookKind::Added => &mut entry.added,
            HookKind::Removed => &mut entry.removed,
        };

        if let Some(position) = slots.iter().position(|slot| slot.id == handle.id) {
            slots.remove(position);
        } else if self.in_flight.contains(&(handle.component, handle.kind)) {
            if !self.dead.insert(handle.id) {
                return;
            }
        } else {
            return;
        }

        match handle.kind {
            HookKind::Added => entry.added_count -= 1,
            HookKind::Removed => entry.removed_count -= 1,
        }
        self.cleanup(handle.component);
    }

    fn cleanup(&mut self, component: ComponentId) {
        let drop_entry = self
            .entries
            .get(&component)
            .map(|entry| entry.observer_count() == 0)
            .unwrap_or(false);
        if drop_entry {
            self.entries.remove(&component);
            self.order.retain(|&id| id != component);
        }
    }

    /// Returns `true` if the component has at least one add observer.
    #[inline]
    pub fn wants_added(&self, component: ComponentId) -> bool {
        self.entries.get(&component).map(|entry| entry.added_count > 0).unwrap_or(false)
    }

    /// Returns `true` if the component has at least one remove observer.
    #[inline]
    pub fn wants_removed(&self, component: ComponentId) -> bool {
        self.entries.get(&component).map(|entry| entry.removed_count > 0).unwrap_or(false)
    }

    /// Buffers an added-event for the entity, if anyone is listening.
    pub fn enqueue_added(&mut self, component: ComponentId, entity: EntityId) {
        if let Some(entry) = self.entries.get_mut(&component) {
            if entry.added_count > 0 {
                entry.pending_added.push(entity);
            }
        }
    }

    /// Buffers a removed-event for the entity, if anyone is listening.
    pub fn enqueue_removed(&mut self, component: ComponentId, entity: EntityId) {
        if let Some(entry) = self.entries.get_mut(&component) {
            if entry.removed_count > 0 {
                entry.pending_removed.push(entity);
            }
        }
    }

    /// Snapshot of the component flush order.
    pub(crate) fn component_order(&self) -> Vec<ComponentId> {
        self.order.clone()
    }

    /// Takes a component's pending ids and observer list for dispatch.
    pub(crate) fn take(
        &mut self,
        component: ComponentId,
        kind: HookKind,
    ) -> Option<(Vec<EntityId>, Vec<HookSlot>)> {
        // A nested flush must not steal a list already out for dispatch.
        if self.in_flight.contains(&(component, kind)) {
            return None;
        }
        let entry = self.entries.get_mut(&component)?;
        self.in_flight.insert((component, kind));
        match kind {
            HookKind::Added => Some((
                std::mem::take(&mut entry.pending_added),
                std::mem::take(&mut entry.added),
            )),
            HookKind::Removed => Some((
                std::mem::take(&mut entry.pending_removed),
                std::mem::take(&mut entry.removed),
            )),
        }
    }

    /// Returns `true` if the handle id was unsubscribed mid-dispatch.
    #[inline]
    pub(crate) fn is_dead(&self, id: HookId) -> bool {
        self.dead.contains(&id)
    }

    /// Restores a taken observer list, merging dispatch-time changes.
    pub(crate) fn restore(&mut self, component: ComponentId, kind: HookKind, mut slots: Vec<HookSlot>) {
        self.in_flight.remove(&(component, kind));
        slots.retain(|slot| !self.dead.remove(&slot.id));

        if let Some(entry) = self.entries.get_mut(&component) {
            let list = match kind {
                HookKind::Added => &mut entry.added,
                HookKind::Removed => &mut entry.removed,
            };
            // Subscriptions made during dispatch land after the survivors.
            let appended = std::mem::take(list);
            slots.extend(appended);
            *list = slots;
        }
        self.cleanup(component);
    }

    /// Preserves the last-known row data of a removed component.
    pub fn set_tombstone(&mut self, entity: EntityId, component: ComponentId, record: Record) {
        self.tombstones.entry(entity).or_default().insert(component, record);
    }

    /// Reads tombstoned row data, if it has not been committed away.
    pub fn tombstone(&self, entity: EntityId, component: ComponentId) -> Option<&Record> {
        self.tombstones.get(&entity).and_then(|per_component| per_component.get(&component))
    }

    /// Clears the tombstone map. Idempotent.
    pub fn commit_removals(&mut self) {
        self.tombstones.clear();
    }

    /// Drops pending events and tombstones; subscriptions survive.
    pub fn clear_transient(&mut self) {
        for entry in self.entries.values_mut() {
            entry.pending_added.clear();
            entry.pending_removed.clear();
        }
        self.tombstones.clear();
    }
}
