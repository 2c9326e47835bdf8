//! Core identifiers and bit-level component signatures.
//!
//! This module defines the **fundamental types, identifiers, and bitset
//! signatures** shared across all subsystems of the engine: the registry,
//! archetype storage, queries, hooks, and the bulk-apply engine.
//!
//! ## Design Philosophy
//!
//! The engine is designed around:
//!
//! - **Dense storage**
//! - **Bitset-based signatures**
//! - **Stable numeric identifiers**
//! - **Explicit field resolution at definition time**
//!
//! ## Entity Representation
//!
//! Entities are plain 64-bit identifiers, issued monotonically from 1 and
//! never reused within a session. Unlike generation-versioned handles, a
//! dead identifier simply stops resolving; there is nothing to unpack.
//!
//! ## Components and Signatures
//!
//! Components are identified by compact [`ComponentId`] values assigned
//! densely at definition time. Archetypes are described by [`Signature`]
//! bitsets indicating which components their members carry.
//!
//! Component signatures:
//!
//! - grow to cover the highest bit set (no fixed component cap),
//! - support fast bitwise subset / disjoint / overlap tests,
//! - produce a stable textual key used to index archetypes and queries,
//! - compare by value, never by identity.
//!
//! ## Field References
//!
//! A [`FieldRef`] names one field of one component. The field index is
//! resolved once, when the reference is constructed from the registry, so
//! per-access lookup is an array index rather than a string lookup.

use crate::engine::registry::ComponentDef;

/// Globally unique entity identifier.
pub type EntityId = u64;

/// Dense identifier for a registered component; doubles as its bit index.
pub type ComponentId = u32;

/// Simulation tick counter.
pub type Tick = u64;

/// Bitset representing a set of components.
///
/// ## Invariants
/// - The limb vector never ends in a zero word, so equal sets always have
///   equal representations and equal textual keys.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Signature {
    words: Vec<u64>,
}

impl Signature {
    /// Creates an empty signature.
    #[inline]
    pub fn new() -> Self {
        Self { words: Vec::new() }
    }

    /// Builds a signature from a list of component definitions.
    pub fn from_defs(defs: &[ComponentDef]) -> Self {
        let mut signature = Self::new();
        for def in defs {
            signature.set(def.bit_index());
        }
        signature
    }

    /// Sets the bit corresponding to `component_id`, growing as needed.
    pub fn set(&mut self, component_id: ComponentId) {
        let index = (component_id as usize) / 64;
        let bit = (component_id as usize) % 64;
        if index >= self.words.len() {
            self.words.resize(index + 1, 0);
        }
        self.words[index] |= 1u64 << bit;
    }

    /// Clears the bit corresponding to `component_id`.
    pub fn clear(&mut self, component_id: ComponentId) {
        let index = (component_id as usize) / 64;
        let bit = (component_id as usize) % 64;
        if index < self.words.len() {
            self.words[index] &= !(1u64 << bit);
        }
        self.normalize();
    }

    /// Returns `true` if `component_id` is present in this signature.
    #[inline]
    pub fn has(&self, component_id: ComponentId) -> bool {
        let index = (component_id as usize) / 64;
        let bit = (component_id as usize) % 64;
        match self.words.get(index) {
            Some(word) => (word >> bit) & 1 == 1,
            None => false,
        }
    }

    /// Returns `true` if no bits are set.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Returns the number of set bits.
    pub fn count(&self) -> u32 {
        self.words.iter().map(|word| word.count_ones()).sum()
    }

    /// Returns `true` if all components in `other` are present (`self ⊇ other`).
    pub fn contains_all(&self, other: &Signature) -> bool {
        if other.words.len() > self.words.len() {
            return false;
        }
        self.words
            .iter()
            .zip(other.words.iter())
            .all(|(word_a, word_b)| (word_a & word_b) == *word_b)
    }

    /// Returns `true` if the two signatures share no components.
    pub fn disjoint(&self, other: &Signature) -> bool {
        !self.overlaps(other)
    }

    /// Returns `true` if the two signatures share at least one component.
    pub fn overlaps(&self, other: &Signature) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .any(|(word_a, word_b)| (word_a & word_b) != 0)
    }

    /// Returns a stable textual key for this signature.
    ///
    /// ## Notes
    /// The key is the comma-joined decimal rendering of the limb words.
    /// Equal signatures always produce equal keys; the normalization
    /// invariant guarantees no trailing-zero ambiguity.
    pub fn key(&self) -> String {
        let mut out = String::new();
        for (index, word) in self.words.iter().enumerate() {
            if index > 0 {
                out.push(',');
            }
            out.push_str(&word.to_string());
        }
        out
    }

    /// Iterates over all component IDs set in this signature.
    pub fn iterate_over_components(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.words
            .iter()
            .enumerate()
            .flat_map(|(word_index, &word)| {
                let base = word_index * 64;
                let mut bits = word;
                std::iter::from_fn(move || {
                    if bits == 0 {
                        return None;
                    }
                    let tz = bits.trailing_zeros() as usize;
                    bits &= bits - 1;
                    Some((base + tz) as ComponentId)
                })
            })
    }

    fn normalize(&mut self) {
        while self.words.last() == Some(&0) {
            self.words.pop();
        }
    }
}

/// Reference to one field of one component.
///
/// ## Invariants
/// A `FieldRef` is only valid for entities whose archetype mask includes
/// the referenced component. The field index is resolved against the
/// component's schema at construction time and is stable for the life of
/// the definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FieldRef {
    /// The component the field belongs to.
    pub component: ComponentDef,
    /// Index of the field within the component's schema.
    pub field: usize,
}
