//! # sim_ecs
//!
//! Archetype-based Entity-Component-System storage engine for
//! interactive simulations with large populations.
//!
//! ## Design Goals
//! - Archetype storage indexed by component-set bitmask
//! - Struct-of-arrays columns with swap-remove for cache-friendly iteration
//! - Runtime-defined component schemas (no compile-time component types)
//! - Deferred structural change during iteration
//! - Buffered lifecycle hooks with removed-row tombstones
//! - SIMD-accelerated bulk-apply over f32 columns with a bit-identical
//!   scalar fallback

#![forbid(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

pub mod engine;

// ─────────────────────────────────────────────────────────────────────────────
// Re-exports (Public API)
// ─────────────────────────────────────────────────────────────────────────────

pub use engine::world::{ChangeSet, World};

pub use engine::registry::{
    ComponentDef,
    ComponentInfo,
    ComponentRegistry,
    ElemKind,
    FieldKind,
    FieldSchema,
};

pub use engine::types::{ComponentId, EntityId, FieldRef, Signature, Tick};

pub use engine::column::{Column, ColumnData, FieldValue, Record};

pub use engine::query::TableView;

pub use engine::apply::{ApplyFilter, Expr};

pub use engine::hooks::{HookHandle, HookId, HookKind};

pub use engine::random::LcgQuad;

pub use engine::simd::SimdProbe;

pub use engine::serialize::SerializedWorld;

pub use engine::error::{
    EngineError,
    EngineResult,
    InvalidOperandError,
    InvalidOperandKind,
    UnknownTypeError,
};

// ─────────────────────────────────────────────────────────────────────────────
// Prelude (Optional but recommended)
// ─────────────────────────────────────────────────────────────────────────────

/// Commonly used engine types.
///
/// Import with:
/// ```rust
/// use sim_ecs::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        ApplyFilter,
        ChangeSet,
        ComponentDef,
        EntityId,
        Expr,
        FieldRef,
        FieldValue,
        Record,
        TableView,
        World,
    };
}
