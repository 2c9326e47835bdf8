//! Struct-of-arrays column storage for one component within one archetype.
//!
//! ## Purpose
//! Each component with a schema owns one [`ColumnSet`] per archetype: one
//! dense typed array per scalar field, one flat array per fixed-stride
//! array field, and one generic array for string fields. All columns are
//! sized by the archetype's capacity (× stride); the first
//! `row_count × stride` elements are live.
//!
//! ## Invariants
//! - All columns within a set share the same capacity.
//! - Unused capacity holds zeroed / empty elements, so a freshly grown or
//!   swap-vacated slot is always in a defined state.
//! - Callers must not read past the live prefix.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::engine::registry::{ComponentInfo, ElemKind, FieldKind};

/// Value of one field, as read from or written to a row.
///
/// Numeric values travel as `f64` regardless of the column's element
/// kind; the column narrows on write and widens on read. Fixed-array
/// fields travel as freshly allocated sequences.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Scalar numeric value.
    Num(f64),
    /// Fixed-length numeric array value.
    Arr(Vec<f64>),
    /// String value.
    Str(String),
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Num(v)
    }
}

impl From<f32> for FieldValue {
    fn from(v: f32) -> Self {
        FieldValue::Num(v as f64)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Num(v as f64)
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        FieldValue::Num(v as f64)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Str(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Str(v)
    }
}

impl From<Vec<f64>> for FieldValue {
    fn from(v: Vec<f64>) -> Self {
        FieldValue::Arr(v)
    }
}

impl FieldValue {
    /// Returns the scalar numeric value, if this is one.
    pub fn as_num(&self) -> Option<f64> {
        match self {
            FieldValue::Num(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the array value, if this is one.
    pub fn as_arr(&self) -> Option<&[f64]> {
        match self {
            FieldValue::Arr(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the string value, if this is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(v) => Some(v),
            _ => None,
        }
    }
}

/// Per-row component data keyed by field name.
///
/// Used both as the write payload for structural operations and as the
/// allocating read result. Unknown fields are ignored on write; missing
/// fields are zero-filled.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, FieldValue>,
}

impl Record {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field assignment.
    pub fn with(mut self, field: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    /// Inserts or replaces a field value.
    pub fn insert(&mut self, field: &str, value: impl Into<FieldValue>) {
        self.fields.insert(field.to_string(), value.into());
    }

    /// Returns the value of a field, if present.
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Returns `true` if the record holds no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over `(name, value)` pairs in field-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }
}

/// Typed backing storage of one column.
#[derive(Clone, Debug)]
pub enum ColumnData {
    /// 32-bit float storage.
    F32(Vec<f32>),
    /// 64-bit float storage.
    F64(Vec<f64>),
    /// Signed 8-bit storage.
    I8(Vec<i8>),
    /// Signed 16-bit storage.
    I16(Vec<i16>),
    /// Signed 32-bit storage.
    I32(Vec<i32>),
    /// Unsigned 8-bit storage.
    U8(Vec<u8>),
    /// Unsigned 16-bit storage.
    U16(Vec<u16>),
    /// Unsigned 32-bit storage.
    U32(Vec<u32>),
    /// String storage.
    Str(Vec<String>),
}

impl ColumnData {
    fn zeroed(elem: ElemKind, len: usize) -> Self {
        match elem {
            ElemKind::F32 => ColumnData::F32(vec![0.0; len]),
            ElemKind::F64 => ColumnData::F64(vec![0.0; len]),
            ElemKind::I8 => ColumnData::I8(vec![0; len]),
            ElemKind::I16 => ColumnData::I16(vec![0; len]),
            ElemKind::I32 => ColumnData::I32(vec![0; len]),
            ElemKind::U8 => ColumnData::U8(vec![0; len]),
            ElemKind::U16 => ColumnData::U16(vec![0; len]),
            ElemKind::U32 => ColumnData::U32(vec![0; len]),
            ElemKind::Str => ColumnData::Str(vec![String::new(); len]),
        }
    }

    fn len(&self) -> usize {
        match self {
            ColumnData::F32(v) => v.len(),
            ColumnData::F64(v) => v.len(),
            ColumnData::I8(v) => v.len(),
            ColumnData::I16(v) => v.len(),
            ColumnData::I32(v) => v.len(),
            ColumnData::U8(v) => v.len(),
            ColumnData::U16(v) => v.len(),
            ColumnData::U32(v) => v.len(),
            ColumnData::Str(v) => v.len(),
        }
    }

    fn resize(&mut self, len: usize) {
        match self {
            ColumnData::F32(v) => v.resize(len, 0.0),
            ColumnData::F64(v) => v.resize(len, 0.0),
            ColumnData::I8(v) => v.resize(len, 0),
            ColumnData::I16(v) => v.resize(len, 0),
            ColumnData::I32(v) => v.resize(len, 0),
            ColumnData::U8(v) => v.resize(len, 0),
            ColumnData::U16(v) => v.resize(len, 0),
            ColumnData::U32(v) => v.resize(len, 0),
            ColumnData::Str(v) => v.resize(len, String::new()),
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        match self {
            ColumnData::F32(v) => v.swap(a, b),
            ColumnData::F64(v) => v.swap(a, b),
            ColumnData::I8(v) => v.swap(a, b),
            ColumnData::I16(v) => v.swap(a, b),
            ColumnData::I32(v) => v.swap(a, b),
            ColumnData::U8(v) => v.swap(a, b),
            ColumnData::U16(v) => v.swap(a, b),
            ColumnData::U32(v) => v.swap(a, b),
            ColumnData::Str(v) => v.swap(a, b),
        }
    }

    fn write_num(&mut self, index: usize, value: f64) {
        match self {
            ColumnData::F32(v) => v[index] = value as f32,
            ColumnData::F64(v) => v[index] = value,
            ColumnData::I8(v) => v[index] = value as i8,
            ColumnData::I16(v) => v[index] = value as i16,
            ColumnData::I32(v) => v[index] = value as i32,
            ColumnData::U8(v) => v[index] = value as u8,
            ColumnData::U16(v) => v[index] = value as u16,
            ColumnData::U32(v) => v[index] = value as u32,
            ColumnData::Str(_) => {}
        }
    }

    fn read_num(&self, index: usize) -> f64 {
        match self {
            ColumnData::F32(v) => v[index] as f64,
            ColumnData::F64(v) => v[index],
            ColumnData::I8(v) => v[index] as f64,
            ColumnData::I16(v) => v[index] as f64,
            ColumnData::I32(v) => v[index] as f64,
            ColumnData::U8(v) => v[index] as f64,
            ColumnData::U16(v) => v[index] as f64,
            ColumnData::U32(v) => v[index] as f64,
            ColumnData::Str(_) => 0.0,
        }
    }

    fn copy_prefix_from(&mut self, source: &ColumnData, len: usize) {
        match (self, source) {
            (ColumnData::F32(dst), ColumnData::F32(src)) => dst[..len].copy_from_slice(&src[..len]),
            (ColumnData::F64(dst), ColumnData::F64(src)) => dst[..len].copy_from_slice(&src[..len]),
            (ColumnData::I8(dst), ColumnData::I8(src)) => dst[..len].copy_from_slice(&src[..len]),
            (ColumnData::I16(dst), ColumnData::I16(src)) => dst[..len].copy_from_slice(&src[..len]),
            (ColumnData::I32(dst), ColumnData::I32(src)) => dst[..len].copy_from_slice(&src[..len]),
            (ColumnData::U8(dst), ColumnData::U8(src)) => dst[..len].copy_from_slice(&src[..len]),
            (ColumnData::U16(dst), ColumnData::U16(src)) => dst[..len].copy_from_slice(&src[..len]),
            (ColumnData::U32(dst), ColumnData::U32(src)) => dst[..len].copy_from_slice(&src[..len]),
            (ColumnData::Str(dst), ColumnData::Str(src)) => dst[..len].clone_from_slice(&src[..len]),
            _ => unreachable!("snapshot column kind diverged from live column kind"),
        }
    }
}

/// Dense storage for one field across all rows of an archetype.
#[derive(Clone, Debug)]
pub struct Column {
    kind: FieldKind,
    data: ColumnData,
}

impl Column {
    /// Allocates a zero-filled column for `capacity` rows.
    pub fn new(kind: FieldKind, capacity: usize) -> Self {
        Self { kind, data: ColumnData::zeroed(kind.elem, capacity * kind.stride) }
    }

    /// Returns the field's stride (elements per row).
    #[inline]
    pub fn stride(&self) -> usize {
        self.kind.stride
    }

    /// Returns the field's element kind.
    #[inline]
    pub fn elem(&self) -> ElemKind {
        self.kind.elem
    }

    /// Returns the whole backing storage as typed data.
    ///
    /// The storage covers the full capacity; only the first
    /// `row_count × stride` elements are live.
    #[inline]
    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    /// Mutable access to the whole backing storage.
    #[inline]
    pub fn data_mut(&mut self) -> &mut ColumnData {
        &mut self.data
    }

    /// Returns the backing storage as `&[f32]`, if that is its kind.
    pub fn as_f32(&self) -> Option<&[f32]> {
        match &self.data {
            ColumnData::F32(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the backing storage as `&mut [f32]`, if that is its kind.
    pub fn as_f32_mut(&mut self) -> Option<&mut [f32]> {
        match &mut self.data {
            ColumnData::F32(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the backing storage as `&[f64]`, if that is its kind.
    pub fn as_f64(&self) -> Option<&[f64]> {
        match &self.data {
            ColumnData::F64(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the backing storage as `&[i32]`, if that is its kind.
    pub fn as_i32(&self) -> Option<&[i32]> {
        match &self.data {
            ColumnData::I32(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the backing storage as `&mut [i32]`, if that is its kind.
    pub fn as_i32_mut(&mut self) -> Option<&mut [i32]> {
        match &mut self.data {
            ColumnData::I32(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the backing storage as `&[u32]`, if that is its kind.
    pub fn as_u32(&self) -> Option<&[u32]> {
        match &self.data {
            ColumnData::U32(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the backing storage as `&[String]`, if that is its kind.
    pub fn as_str(&self) -> Option<&[String]> {
        match &self.data {
            ColumnData::Str(v) => Some(v),
            _ => None,
        }
    }

    /// Zeroes one row (numeric fields → 0, string fields → empty).
    pub fn write_zero(&mut self, row: usize) {
        let base = row * self.kind.stride;
        if let ColumnData::Str(strings) = &mut self.data {
            strings[base].clear();
            return;
        }
        for offset in 0..self.kind.stride {
            self.data.write_num(base + offset, 0.0);
        }
    }

    /// Writes one row from a field value.
    ///
    /// ## Behavior
    /// - Scalar fields accept `Num`; arrays accept `Arr` (elements beyond
    ///   the source length are zeroed); strings accept `Str`.
    /// - A value of the wrong shape is treated as missing: the row is
    ///   zeroed.
    pub fn write_value(&mut self, row: usize, value: &FieldValue) {
        let base = row * self.kind.stride;
        if let ColumnData::Str(strings) = &mut self.data {
            strings[base].clear();
            if let FieldValue::Str(s) = value {
                strings[base].push_str(s);
            }
            return;
        }
        match value {
            FieldValue::Num(n) if self.kind.stride == 1 => self.data.write_num(base, *n),
            FieldValue::Arr(values) => {
                for offset in 0..self.kind.stride {
                    let element = values.get(offset).copied().unwrap_or(0.0);
                    self.data.write_num(base + offset, element);
                }
            }
            _ => self.write_zero(row),
        }
    }

    /// Reads one row into a freshly allocated field value.
    pub fn read(&self, row: usize) -> FieldValue {
        let base = row * self.kind.stride;
        match &self.data {
            ColumnData::Str(v) => FieldValue::Str(v[base].clone()),
            _ if self.kind.stride == 1 => FieldValue::Num(self.data.read_num(base)),
            _ => FieldValue::Arr(
                (0..self.kind.stride)
                    .map(|offset| self.data.read_num(base + offset))
                    .collect(),
            ),
        }
    }

    /// Element-wise swap of two rows, honoring stride.
    pub fn swap(&mut self, row_a: usize, row_b: usize) {
        if row_a == row_b {
            return;
        }
        let base_a = row_a * self.kind.stride;
        let base_b = row_b * self.kind.stride;
        for offset in 0..self.kind.stride {
            self.data.swap(base_a + offset, base_b + offset);
        }
    }

    /// Reallocates to `capacity` rows, preserving the existing prefix.
    pub fn grow(&mut self, capacity: usize) {
        let target = capacity * self.kind.stride;
        debug_assert!(target >= self.data.len());
        self.data.resize(target);
    }

    /// Copies the first `rows` rows from `source` into this column.
    ///
    /// ## Panics
    /// Panics if the columns disagree on element kind; live and snapshot
    /// columns are allocated from the same schema, so divergence here is
    /// storage corruption.
    pub fn copy_prefix_from(&mut self, source: &Column, rows: usize) {
        debug_assert_eq!(self.kind, source.kind);
        self.data.copy_prefix_from(&source.data, rows * self.kind.stride);
    }
}

/// All columns of one component within one archetype, in schema order.
#[derive(Clone, Debug)]
pub struct ColumnSet {
    names: Vec<String>,
    columns: Vec<Column>,
}

impl ColumnSet {
    /// Allocates zero-filled columns for every field in the schema.
    pub fn new(info: &ComponentInfo, capacity: usize) -> Self {
        let names = info.fields.iter().map(|field| field.name.clone()).collect();
        let columns = info
            .fields
            .iter()
            .map(|field| Column::new(field.kind, capacity))
            .collect();
        Self { names, columns }
    }

    /// Returns the number of fields.
    #[inline]
    pub fn field_count(&self) -> usize {
        self.columns.len()
    }

    /// Returns the column at a schema field index.
    #[inline]
    pub fn column(&self, field: usize) -> Option<&Column> {
        self.columns.get(field)
    }

    /// Mutable access to the column at a schema field index.
    #[inline]
    pub fn column_mut(&mut self, field: usize) -> Option<&mut Column> {
        self.columns.get_mut(field)
    }

    /// Writes one row across all fields.
    ///
    /// ## Behavior
    /// If `data` is absent the row is zeroed. Otherwise each named field
    /// is copied from `data`; unknown fields in `data` are ignored and
    /// missing fields are zeroed.
    pub fn write(&mut self, row: usize, data: Option<&Record>) {
        for (index, column) in self.columns.iter_mut().enumerate() {
            match data.and_then(|record| record.get(&self.names[index])) {
                Some(value) => column.write_value(row, value),
                None => column.write_zero(row),
            }
        }
    }

    /// Reads one row into a freshly allocated record.
    pub fn read(&self, row: usize) -> Record {
        let mut record = Record::new();
        for (index, column) in self.columns.iter().enumerate() {
            record.insert(&self.names[index], column.read(row));
        }
        record
    }

    /// Element-wise swap of two rows across all fields.
    pub fn swap(&mut self, row_a: usize, row_b: usize) {
        for column in &mut self.columns {
            column.swap(row_a, row_b);
        }
    }

    /// Reallocates every column to `capacity` rows.
    pub fn grow(&mut self, capacity: usize) {
        for column in &mut self.columns {
            column.grow(capacity);
        }
    }

    /// Copies the first `rows` rows of every column from `source`.
    pub fn copy_prefix_from(&mut self, source: &ColumnSet, rows: usize) {
        for (dst, src) in self.columns.iter_mut().zip(source.columns.iter()) {
            dst.copy_prefix_from(src, rows);
        }
    }
}
