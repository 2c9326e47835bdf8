//! Component registry: identities, schemas, and field type parsing.
//!
//! This module interns component definitions, assigns each a dense bit
//! index on first observation, and holds the per-component schema used by
//! archetype column allocation.
//!
//! ## Purpose
//! The registry decouples component identity (an opaque [`ComponentDef`]
//! token) from runtime storage, enabling archetypes to allocate typed
//! column sets from a schema without any compile-time knowledge of the
//! component's shape.
//!
//! ## Design
//! - Definitions are identified by a compact, copyable [`ComponentDef`]
//!   whose bit index doubles as the component's signature bit.
//! - Defining a component is idempotent per *identity*, never per name:
//!   two calls with the same name produce two distinct components.
//! - A component with no fields is a **tag**: membership only, no data.
//! - Field indices are resolved once via [`ComponentRegistry::field_ref`]
//!   so per-access lookup is an array index, not a string lookup.
//!
//! ## Invariants
//! - Bit indices are dense, unique, and stable for the registry lifetime.
//! - A schema, once defined, is immutable.

use crate::engine::error::{EngineResult, UnknownTypeError};
use crate::engine::types::{ComponentId, FieldRef};

/// Element kind of a single field slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElemKind {
    /// 32-bit IEEE-754 float.
    F32,
    /// 64-bit IEEE-754 float.
    F64,
    /// Signed 8-bit integer.
    I8,
    /// Signed 16-bit integer.
    I16,
    /// Signed 32-bit integer.
    I32,
    /// Unsigned 8-bit integer.
    U8,
    /// Unsigned 16-bit integer.
    U16,
    /// Unsigned 32-bit integer.
    U32,
    /// Heap-allocated string value.
    Str,
}

impl ElemKind {
    /// Returns `true` for the numeric element kinds.
    #[inline]
    pub fn is_numeric(self) -> bool {
        !matches!(self, ElemKind::Str)
    }
}

/// Shape of one field: an element kind plus a fixed stride.
///
/// Stride 1 denotes a scalar (or a single string); stride `N > 1` denotes
/// a fixed-length numeric array stored flat within the column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FieldKind {
    /// Element kind of the field.
    pub elem: ElemKind,
    /// Number of elements per row; always 1 for strings.
    pub stride: usize,
}

impl FieldKind {
    /// Parses a field type token.
    ///
    /// ## Behavior
    /// Recognizes `f32`, `f64`, `i8`, `i16`, `i32`, `u8`, `u16`, `u32`,
    /// and `string`, optionally followed by `[N]` with `N ≥ 1` denoting a
    /// fixed-stride array. Arrays of strings are rejected.
    ///
    /// ## Errors
    /// Returns [`UnknownTypeError`] for any other token. No state is
    /// mutated on failure.
    pub fn parse(token: &str) -> Result<FieldKind, UnknownTypeError> {
        let unknown = || UnknownTypeError { token: token.to_string() };

        let (base, stride) = match token.find('[') {
            Some(open) => {
                let close = token.rfind(']').filter(|&c| c == token.len() - 1);
                let close = close.ok_or_else(unknown)?;
                let count: usize = token[open + 1..close].parse().map_err(|_| unknown())?;
                if count == 0 {
                    return Err(unknown());
                }
                (&token[..open], count)
            }
            None => (token, 1),
        };

        let elem = match base {
            "f32" => ElemKind::F32,
            "f64" => ElemKind::F64,
            "i8" => ElemKind::I8,
            "i16" => ElemKind::I16,
            "i32" => ElemKind::I32,
            "u8" => ElemKind::U8,
            "u16" => ElemKind::U16,
            "u32" => ElemKind::U32,
            "string" => ElemKind::Str,
            _ => return Err(unknown()),
        };

        if elem == ElemKind::Str && stride != 1 {
            return Err(unknown());
        }

        Ok(FieldKind { elem, stride })
    }
}

/// One named field within a component schema.
#[derive(Clone, Debug)]
pub struct FieldSchema {
    /// Field name, unique within the component.
    pub name: String,
    /// Shape of the field.
    pub kind: FieldKind,
}

/// Metadata for a registered component.
#[derive(Clone, Debug)]
pub struct ComponentInfo {
    /// User-facing component name. Not required to be unique.
    pub name: String,
    /// Ordered field schemas; empty for tags.
    pub fields: Vec<FieldSchema>,
}

impl ComponentInfo {
    /// Returns `true` if the component carries no per-row data.
    #[inline]
    pub fn is_tag(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Opaque identity token for a registered component.
///
/// Cheap to copy and compare; the wrapped value is the component's dense
/// bit index within archetype signatures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ComponentDef(pub(crate) ComponentId);

impl ComponentDef {
    /// Returns the dense bit index assigned to this component.
    #[inline]
    pub fn bit_index(self) -> ComponentId {
        self.0
    }
}

/// Interns component definitions and their schemas.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    infos: Vec<ComponentInfo>,
}

impl ComponentRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of registered components.
    #[inline]
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    /// Returns `true` if no components have been registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    fn intern(&mut self, info: ComponentInfo) -> ComponentDef {
        let id = self.infos.len() as ComponentId;
        self.infos.push(info);
        ComponentDef(id)
    }

    /// Defines a tag component: membership only, no per-row data.
    pub fn define_tag(&mut self, name: &str) -> ComponentDef {
        self.intern(ComponentInfo { name: name.to_string(), fields: Vec::new() })
    }

    /// Defines a component whose fields all share one type token.
    ///
    /// ## Errors
    /// Returns [`UnknownTypeError`] if the token is unparseable; the
    /// registry is left unchanged.
    pub fn define_uniform(
        &mut self,
        name: &str,
        kind_token: &str,
        fields: &[&str],
    ) -> EngineResult<ComponentDef> {
        let kind = FieldKind::parse(kind_token)?;
        let fields = fields
            .iter()
            .map(|field| FieldSchema { name: (*field).to_string(), kind })
            .collect();
        Ok(self.intern(ComponentInfo { name: name.to_string(), fields }))
    }

    /// Defines a component with per-field type tokens.
    ///
    /// ## Errors
    /// Returns [`UnknownTypeError`] on the first unparseable token; the
    /// registry is left unchanged.
    pub fn define_schema(
        &mut self,
        name: &str,
        fields: &[(&str, &str)],
    ) -> EngineResult<ComponentDef> {
        let mut schemas = Vec::with_capacity(fields.len());
        for (field, token) in fields {
            let kind = FieldKind::parse(token)?;
            schemas.push(FieldSchema { name: (*field).to_string(), kind });
        }
        Ok(self.intern(ComponentInfo { name: name.to_string(), fields: schemas }))
    }

    /// Returns the dense bit index for a definition. Idempotent.
    #[inline]
    pub fn bit_index_of(&self, def: ComponentDef) -> ComponentId {
        def.bit_index()
    }

    /// Returns the metadata for a definition.
    #[inline]
    pub fn info(&self, def: ComponentDef) -> &ComponentInfo {
        &self.infos[def.0 as usize]
    }

    /// Returns the metadata for a raw component id, if registered.
    #[inline]
    pub fn info_by_id(&self, id: ComponentId) -> Option<&ComponentInfo> {
        self.infos.get(id as usize)
    }

    /// Resolves a field name to a [`FieldRef`], if the field exists.
    pub fn field_ref(&self, def: ComponentDef, field: &str) -> Option<FieldRef> {
        let info = self.info(def);
        info.fields
            .iter()
            .position(|schema| schema.name == field)
            .map(|index| FieldRef { component: def, field: index })
    }

    /// Returns the first definition registered under `name`, if any.
    ///
    /// ## Notes
    /// Names are not unique; this exists for the persisted-state loader,
    /// which addresses components by name.
    pub fn find_by_name(&self, name: &str) -> Option<ComponentDef> {
        self.infos
            .iter()
            .position(|info| info.name == name)
            .map(|index| ComponentDef(index as ComponentId))
    }

    /// Iterates over all registered definitions.
    pub fn defs(&self) -> impl Iterator<Item = ComponentDef> + '_ {
        (0..self.infos.len()).map(|index| ComponentDef(index as ComponentId))
    }
}
