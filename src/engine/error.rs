//! Error types for component definition and bulk-apply evaluation.
//!
//! This module declares focused, composable error types used across the
//! storage engine. Each error carries enough context to make failures
//! actionable while remaining small and cheap to pass around or convert
//! into the aggregate [`EngineError`].
//!
//! ## Goals
//! * **Specificity:** Each error type models a single failure mode (an
//!   unparseable field type token, an expression operand that cannot be
//!   evaluated).
//! * **Ergonomics:** All errors implement [`std::error::Error`] and
//!   [`fmt::Display`], and provide `From<T>` conversions into the
//!   aggregate error.
//! * **Silence where the contract says so:** structural no-ops (removing
//!   a component an entity lacks, setting a field on an absent entity,
//!   destroying an unknown id) are *not* errors; they return normally and
//!   mutate nothing.
//!
//! ## Fatal conditions
//! A directory placement that disagrees with an archetype's row map is a
//! corruption of internal invariants, not a recoverable condition. The
//! engine panics on it rather than surfacing an error value.
//!
//! ## Display vs. Debug
//! * [`fmt::Display`] is optimized for operator logs (short, imperative
//!   phrasing).
//! * [`fmt::Debug`] (derived) retains full structure for diagnostics.

use std::fmt;

/// Returned when a field type token cannot be parsed at component
/// definition time.
///
/// The recognized token set is `f32`, `f64`, `i8`, `i16`, `i32`, `u8`,
/// `u16`, `u32`, and `string`, optionally followed by `[N]` with `N ≥ 1`
/// for fixed-stride numeric arrays. Anything else fails with this error
/// and no registry state is mutated.
///
/// ### Fields
/// * `token` — The offending type token, verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTypeError {
    /// The unparseable type token as supplied by the caller.
    pub token: String,
}

impl fmt::Display for UnknownTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown field type token {:?}", self.token)
    }
}

impl std::error::Error for UnknownTypeError {}

/// Why an apply-expression operand could not be evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidOperandKind {
    /// The operand references a tag component, which carries no data.
    TagComponent,
    /// The operand references a field index outside the component schema.
    UnknownField,
    /// The operand references a string field, which has no arithmetic.
    NotNumeric,
    /// The operand's stride does not match the target field's stride.
    StrideMismatch,
}

/// Returned when an apply-expression references an operand that cannot be
/// read: a tag component, a non-existent field, or a field whose stride
/// does not line up with the target.
///
/// The target column is left unchanged when this error is surfaced.
///
/// ### Fields
/// * `component` — Name of the offending component.
/// * `kind` — The specific way the operand was invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidOperandError {
    /// Name of the component referenced by the operand.
    pub component: String,
    /// The specific failure mode.
    pub kind: InvalidOperandKind,
}

impl fmt::Display for InvalidOperandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            InvalidOperandKind::TagComponent => {
                write!(f, "component {:?} is a tag and has no fields", self.component)
            }
            InvalidOperandKind::UnknownField => {
                write!(f, "component {:?} has no field at the referenced index", self.component)
            }
            InvalidOperandKind::NotNumeric => {
                write!(f, "referenced field of component {:?} is not numeric", self.component)
            }
            InvalidOperandKind::StrideMismatch => {
                write!(
                    f,
                    "operand stride of component {:?} does not match the target field",
                    self.component
                )
            }
        }
    }
}

impl std::error::Error for InvalidOperandError {}

/// Aggregate error for public engine operations.
///
/// Conversions (`From<T>`) are implemented for the focused error types so
/// callers can write `?` and still return a single, expressive type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A field type token could not be parsed at definition time.
    UnknownType(UnknownTypeError),

    /// An apply-expression operand could not be evaluated.
    InvalidOperand(InvalidOperandError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::UnknownType(e) => write!(f, "{e}"),
            EngineError::InvalidOperand(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::UnknownType(e) => Some(e),
            EngineError::InvalidOperand(e) => Some(e),
        }
    }
}

impl From<UnknownTypeError> for EngineError {
    fn from(e: UnknownTypeError) -> Self {
        EngineError::UnknownType(e)
    }
}

impl From<InvalidOperandError> for EngineError {
    fn from(e: InvalidOperandError) -> Self {
        EngineError::InvalidOperand(e)
    }
}

/// Convenience result alias for public engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
