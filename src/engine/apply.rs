//! Bulk-apply engine: archetype-wide arithmetic over matching columns.
//!
//! ## Purpose
//! Interprets a small arithmetic expression tree over the columns of
//! every archetype matching the target's component requirements, writing
//! the result into the target field. This is the engine's answer to
//! "advance a million positions by a million velocities" without a
//! per-entity callback.
//!
//! ## Execution model
//! - The **required set** is every component mentioned by the target and
//!   by the expression's `Field` leaves; the match set is
//!   `(required ∪ filter.with)` excluding `filter.without`.
//! - When every involved field is 32-bit float and the host probe passes,
//!   the expression is computed in lanes of four with a scalar remainder;
//!   otherwise a scalar loop produces the same observable result.
//! - `Random` draws come from a per-(archetype, target field) [`LcgQuad`]
//!   persisted between invocations; full lane groups address lane
//!   `i % 4`, the scalar remainder advances lane 0 only. The SIMD and
//!   scalar paths emit identical streams.
//! - No hooks fire and no membership changes: only cell values move.
//! - Steady state performs no allocation; operand resolution reuses a
//!   scratch buffer owned by the engine.
//!
//! ## Failure semantics
//! A table lacking the target's column is skipped silently. A tag
//! component, unknown field, string field, or stride mismatch in operand
//! position fails with `InvalidOperand` before any column is touched.

use std::collections::HashMap;

use crate::engine::archetype::Archetype;
use crate::engine::column::ColumnData;
use crate::engine::random::LcgQuad;
use crate::engine::registry::ComponentDef;
use crate::engine::simd::SimdProbe;
use crate::engine::types::{ComponentId, FieldRef};

/// Arithmetic expression over component fields.
///
/// `Field` reads an operand column row-wise; `Random` fills from the
/// deterministic per-archetype generator. Binary nodes combine lane-wise.
#[derive(Clone, Debug)]
pub enum Expr {
    /// Read the referenced field.
    Field(FieldRef),
    /// Uniform draw in `[min, max)`.
    Random {
        /// Inclusive lower bound.
        min: f32,
        /// Exclusive upper bound.
        max: f32,
    },
    /// Lane-wise addition.
    Add(Box<Expr>, Box<Expr>),
    /// Lane-wise subtraction.
    Sub(Box<Expr>, Box<Expr>),
    /// Lane-wise multiplication.
    Mul(Box<Expr>, Box<Expr>),
    /// Multiply by a scalar constant.
    Scale(Box<Expr>, f32),
}

impl Expr {
    /// Reads the referenced field.
    pub fn field(field: FieldRef) -> Expr {
        Expr::Field(field)
    }

    /// Uniform draw in `[min, max)`.
    pub fn random(min: f32, max: f32) -> Expr {
        Expr::Random { min, max }
    }

    /// `a + b`.
    pub fn add(a: Expr, b: Expr) -> Expr {
        Expr::Add(Box::new(a), Box::new(b))
    }

    /// `a - b`.
    pub fn sub(a: Expr, b: Expr) -> Expr {
        Expr::Sub(Box::new(a), Box::new(b))
    }

    /// `a * b`.
    pub fn mul(a: Expr, b: Expr) -> Expr {
        Expr::Mul(Box::new(a), Box::new(b))
    }

    /// `a * s` for a scalar constant.
    pub fn scale(a: Expr, s: f32) -> Expr {
        Expr::Scale(Box::new(a), s)
    }

    /// Visits every `Field` leaf.
    pub(crate) fn for_each_field(&self, visit: &mut impl FnMut(FieldRef)) {
        match self {
            Expr::Field(field) => visit(*field),
            Expr::Random { .. } => {}
            Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Mul(a, b) => {
                a.for_each_field(visit);
                b.for_each_field(visit);
            }
            Expr::Scale(a, _) => a.for_each_field(visit),
        }
    }

    /// Returns `true` if any `Random` leaf is present.
    pub(crate) fn uses_random(&self) -> bool {
        match self {
            Expr::Field(_) => false,
            Expr::Random { .. } => true,
            Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Mul(a, b) => a.uses_random() || b.uses_random(),
            Expr::Scale(a, _) => a.uses_random(),
        }
    }
}

/// Optional component constraints narrowing an apply's match set.
#[derive(Clone, Debug, Default)]
pub struct ApplyFilter {
    /// Components that must additionally be present.
    pub with: Vec<ComponentDef>,
    /// Components that must be absent.
    pub without: Vec<ComponentDef>,
}

/// Typed raw pointer into one operand column's backing storage.
#[derive(Clone, Copy)]
enum OperandPtr {
    F32(*mut f32),
    F64(*mut f64),
    I8(*mut i8),
    I16(*mut i16),
    I32(*mut i32),
    U8(*mut u8),
    U16(*mut u16),
    U32(*mut u32),
}

impl OperandPtr {
    #[inline]
    fn is_f32(&self) -> bool {
        matches!(self, OperandPtr::F32(_))
    }

    /// # Safety
    /// `index` must be within the column's live element prefix.
    #[inline]
    unsafe fn read(&self, index: usize) -> f32 {
        unsafe {
            match self {
                OperandPtr::F32(p) => *p.add(index),
                OperandPtr::F64(p) => *p.add(index) as f32,
                OperandPtr::I8(p) => *p.add(index) as f32,
                OperandPtr::I16(p) => *p.add(index) as f32,
                OperandPtr::I32(p) => *p.add(index) as f32,
                OperandPtr::U8(p) => *p.add(index) as f32,
                OperandPtr::U16(p) => *p.add(index) as f32,
                OperandPtr::U32(p) => *p.add(index) as f32,
            }
        }
    }

    /// # Safety
    /// `index` must be within the column's live element prefix.
    #[inline]
    unsafe fn write(&self, index: usize, value: f32) {
        unsafe {
            match self {
                OperandPtr::F32(p) => *p.add(index) = value,
                OperandPtr::F64(p) => *p.add(index) = value as f64,
                OperandPtr::I8(p) => *p.add(index) = value as i8,
                OperandPtr::I16(p) => *p.add(index) = value as i16,
                OperandPtr::I32(p) => *p.add(index) = value as i32,
                OperandPtr::U8(p) => *p.add(index) = value as u8,
                OperandPtr::U16(p) => *p.add(index) = value as u16,
                OperandPtr::U32(p) => *p.add(index) = value as u32,
            }
        }
    }
}

struct ResolvedOperand {
    field: FieldRef,
    ptr: OperandPtr,
}

type RngKey = (usize, ComponentId, usize);

/// Executes expressions over matched tables; owns the persistent RNG
/// states and the operand scratch buffer.
#[derive(Default)]
pub(crate) struct ApplyEngine {
    rng: HashMap<RngKey, LcgQuad>,
    operands: Vec<ResolvedOperand>,
}

impl ApplyEngine {
    /// Drops persisted RNG states (table indices are about to change).
    pub(crate) fn clear(&mut self) {
        self.rng.clear();
        self.operands.clear();
    }

    /// Runs `expr` into `target` across one table's rows.
    ///
    /// Components and fields were validated by the caller; a table that
    /// nevertheless lacks the target column is skipped silently.
    pub(crate) fn run_table(
        &mut self,
        table_index: usize,
        archetype: &mut Archetype,
        probe: &SimdProbe,
        target: FieldRef,
        expr: &Expr,
        operand_fields: &[FieldRef],
    ) {
        let rows = archetype.len();
        if rows == 0 {
            return;
        }

        self.operands.clear();
        if !push_operand(archetype, &mut self.operands, target) {
            return;
        }
        let stride = column_stride(archetype, target).unwrap_or(1);

        for &field in operand_fields {
            if !push_operand(archetype, &mut self.operands, field) {
                return;
            }
        }

        let len = rows * stride;
        let target_ptr = self.operands[0].ptr;

        let mut scratch_rng = LcgQuad::new();
        let rng: &mut LcgQuad = if expr.uses_random() {
            self.rng
                .entry((table_index, target.component.bit_index(), target.field))
                .or_default()
        } else {
            &mut scratch_rng
        };

        let all_f32 = self.operands.iter().all(|op| op.ptr.is_f32());

        #[cfg(target_arch = "x86_64")]
        if all_f32 && probe.lanes4() {
            if let OperandPtr::F32(dst) = target_ptr {
                // Validated above: probe passed and every operand is f32.
                unsafe { run_lanes4(expr, &self.operands, dst, len, rng) };
                return;
            }
        }

        let _ = (all_f32, probe);
        let len4 = len - len % 4;
        for index in 0..len {
            let lane = if index < len4 { index % 4 } else { 0 };
            let value = eval_scalar(expr, &self.operands, index, rng, lane);
            unsafe { target_ptr.write(index, value) };
        }
    }
}

fn push_operand(
    archetype: &mut Archetype,
    operands: &mut Vec<ResolvedOperand>,
    field: FieldRef,
) -> bool {
    if operands.iter().any(|op| op.field == field) {
        return true;
    }
    match resolve(archetype, field) {
        Some(ptr) => {
            operands.push(ResolvedOperand { field, ptr });
            true
        }
        None => false,
    }
}

fn column_stride(archetype: &Archetype, field: FieldRef) -> Option<usize> {
    archetype
        .column_set(field.component.bit_index())
        .and_then(|set| set.column(field.field))
        .map(|column| column.stride())
}

fn resolve(archetype: &mut Archetype, field: FieldRef) -> Option<OperandPtr> {
    let set = archetype.column_set_mut(field.component.bit_index())?;
    let column = set.column_mut(field.field)?;
    Some(match column.data_mut() {
        ColumnData::F32(v) => OperandPtr::F32(v.as_mut_ptr()),
        ColumnData::F64(v) => OperandPtr::F64(v.as_mut_ptr()),
        ColumnData::I8(v) => OperandPtr::I8(v.as_mut_ptr()),
        ColumnData::I16(v) => OperandPtr::I16(v.as_mut_ptr()),
        ColumnData::I32(v) => OperandPtr::I32(v.as_mut_ptr()),
        ColumnData::U8(v) => OperandPtr::U8(v.as_mut_ptr()),
        ColumnData::U16(v) => OperandPtr::U16(v.as_mut_ptr()),
        ColumnData::U32(v) => OperandPtr::U32(v.as_mut_ptr()),
        ColumnData::Str(_) => return None,
    })
}

fn operand(operands: &[ResolvedOperand], field: FieldRef) -> OperandPtr {
    operands
        .iter()
        .find(|op| op.field == field)
        .map(|op| op.ptr)
        .expect("expression operand resolved before evaluation")
}

fn eval_scalar(
    expr: &Expr,
    operands: &[ResolvedOperand],
    index: usize,
    rng: &mut LcgQuad,
    lane: usize,
) -> f32 {
    match expr {
        Expr::Field(field) => unsafe { operand(operands, *field).read(index) },
        Expr::Random { min, max } => rng.next_range(lane, *min, *max),
        Expr::Add(a, b) => {
            eval_scalar(a, operands, index, rng, lane) + eval_scalar(b, operands, index, rng, lane)
        }
        Expr::Sub(a, b) => {
            eval_scalar(a, operands, index, rng, lane) - eval_scalar(b, operands, index, rng, lane)
        }
        Expr::Mul(a, b) => {
            eval_scalar(a, operands, index, rng, lane) * eval_scalar(b, operands, index, rng, lane)
        }
        Expr::Scale(a, s) => eval_scalar(a, operands, index, rng, lane) * s,
    }
}

/// Four-lane evaluation with a lane-0 scalar remainder.
///
/// # Safety
/// Requires SSE4.1 and that every operand (target included) is an f32
/// column whose live prefix covers `len` elements.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse4.1")]
unsafe fn run_lanes4(
    expr: &Expr,
    operands: &[ResolvedOperand],
    dst: *mut f32,
    len: usize,
    rng: &mut LcgQuad,
) {
    use crate::engine::simd::x86;

    let len4 = len - len % 4;
    let mut state = rng.state();

    let mut index = 0;
    while index < len4 {
        let value = unsafe { eval_lanes4(expr, operands, index, &mut state) };
        unsafe { x86::store(dst.add(index), value) };
        index += 4;
    }
    rng.set_state(state);

    for index in len4..len {
        let value = eval_scalar(expr, operands, index, rng, 0);
        unsafe { *dst.add(index) = value };
    }
}

/// # Safety
/// Same requirements as [`run_lanes4`]; `index + 4 <= len`.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse4.1")]
unsafe fn eval_lanes4(
    expr: &Expr,
    operands: &[ResolvedOperand],
    index: usize,
    state: &mut [u32; 4],
) -> std::arch::x86_64::__m128 {
    use crate::engine::simd::x86;

    unsafe {
        match expr {
            Expr::Field(field) => match operand(operands, *field) {
                OperandPtr::F32(p) => x86::load(p.add(index) as *const f32),
                _ => unreachable!("lane dispatch requires f32 operands"),
            },
            Expr::Random { min, max } => x86::random(state, *min, *max),
            Expr::Add(a, b) => x86::add(
                eval_lanes4(a, operands, index, state),
                eval_lanes4(b, operands, index, state),
            ),
            Expr::Sub(a, b) => x86::sub(
                eval_lanes4(a, operands, index, state),
                eval_lanes4(b, operands, index, state),
            ),
            Expr::Mul(a, b) => x86::mul(
                eval_lanes4(a, operands, index, state),
                eval_lanes4(b, operands, index, state),
            ),
            Expr::Scale(a, s) => x86::mul(eval_lanes4(a, operands, index, state), x86::splat(*s)),
        }
    }
}
