use crate::engine::column::Record;
use crate::engine::registry::ComponentDef;
use crate::engine::types::EntityId;

/// Structural mutation captured while iteration is in flight.
///
/// Payload data is owned at enqueue time; callers may reuse their buffers
/// immediately after deferring.
pub enum Command {
    /// Add (or first-time insert) a component on an entity.
    Add {
        /// Target entity.
        entity: EntityId,
        /// Component to add.
        component: ComponentDef,
        /// Row data; zero-filled when absent.
        data: Option<Record>,
    },
    /// Remove a component from an entity.
    Remove {
        /// Target entity.
        entity: EntityId,
        /// Component to remove.
        component: ComponentDef,
    },
    /// Destroy an entity outright.
    Destroy {
        /// Target entity.
        entity: EntityId,
    },
}
