//! Archetype index: mask-keyed table arena, query cache, and epochs.
//!
//! ## Purpose
//! Owns every [`Archetype`] in the world, keyed by the stable textual key
//! of its component mask, and answers query-match requests against them.
//!
//! ## Design
//! - Tables live in a `Vec` arena; everything else refers to them by
//!   index (no pointer graph between entities and tables).
//! - A monotone **structural epoch** increments whenever a table is
//!   created. Cached query results carry the epoch they were built at and
//!   are rebuilt lazily when stale; row-level changes never invalidate
//!   them.
//! - Match lists preserve archetype insertion order.
//! - The change-tracking filter mask lives here so newly created tables
//!   can be registered as tracked (snapshot mirror allocated) the moment
//!   they appear; enabling tracking late sweeps existing tables
//!   retroactively.

use std::collections::HashMap;

use log::debug;

use crate::engine::archetype::Archetype;
use crate::engine::registry::ComponentRegistry;
use crate::engine::types::Signature;

struct CachedMatch {
    epoch: u64,
    tables: Vec<usize>,
}

/// Mask-keyed owner of all archetype tables.
#[derive(Default)]
pub struct ArchetypeIndex {
    archetypes: Vec<Archetype>,
    by_key: HashMap<String, usize>,
    epoch: u64,
    cache: HashMap<String, CachedMatch>,
    track_filter: Signature,
}

impl ArchetypeIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self {
            archetypes: Vec::new(),
            by_key: HashMap::new(),
            epoch: 0,
            cache: HashMap::new(),
            track_filter: Signature::new(),
        }
    }

    /// Returns the number of tables.
    #[inline]
    pub fn len(&self) -> usize {
        self.archetypes.len()
    }

    /// Returns `true` if no tables exist.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.archetypes.is_empty()
    }

    /// Returns the current structural epoch.
    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Returns the table at an arena index.
    #[inline]
    pub fn archetype(&self, index: usize) -> &Archetype {
        &self.archetypes[index]
    }

    /// Mutable access to the table at an arena index.
    #[inline]
    pub fn archetype_mut(&mut self, index: usize) -> &mut Archetype {
        &mut self.archetypes[index]
    }

    /// Iterates over all tables in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Archetype> {
        self.archetypes.iter()
    }

    /// Mutable iteration over all tables in insertion order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Archetype> {
        self.archetypes.iter_mut()
    }

    /// Returns the arena index for a mask, creating the table on miss.
    ///
    /// ## Behavior
    /// On miss: allocates the table, registers its key, and increments
    /// the structural epoch (invalidating cached query results). When the
    /// tracking filter overlaps the mask, the table's snapshot mirror is
    /// allocated immediately.
    pub fn get_or_create(&mut self, signature: &Signature, registry: &ComponentRegistry) -> usize {
        let key = signature.key();
        if let Some(&index) = self.by_key.get(&key) {
            return index;
        }

        let index = self.archetypes.len();
        let mut archetype = Archetype::new(signature.clone(), registry);
        if !self.track_filter.is_empty() && self.track_filter.overlaps(signature) {
            archetype.ensure_snapshot(registry);
        }
        self.archetypes.push(archetype);
        self.by_key.insert(key.clone(), index);
        self.epoch += 1;
        debug!("archetype created: key={key} index={index} epoch={}", self.epoch);
        index
    }

    fn cache_key(include: &Signature, exclude: &Signature) -> String {
        format!("{}:{}", include.key(), exclude.key())
    }

    fn refresh(&mut self, key: &str, include: &Signature, exclude: &Signature) {
        let stale = match self.cache.get(key) {
            Some(cached) => cached.epoch != self.epoch,
            None => true,
        };
        if !stale {
            return;
        }

        let tables: Vec<usize> = self
            .archetypes
            .iter()
            .enumerate()
            .filter(|(_, archetype)| {
                archetype.signature().contains_all(include)
                    && (exclude.is_empty() || archetype.signature().disjoint(exclude))
            })
            .map(|(index, _)| index)
            .collect();
        self.cache.insert(key.to_string(), CachedMatch { epoch: self.epoch, tables });
    }

    /// Returns the arena indices of tables matching `(include, exclude)`.
    ///
    /// ## Behavior
    /// Results are cached per include/exclude key pair and reused while
    /// the structural epoch is unchanged. A table matches iff its mask is
    /// a superset of `include` and disjoint from `exclude`. Order is
    /// archetype insertion order.
    pub fn matches(&mut self, include: &Signature, exclude: &Signature) -> &[usize] {
        let key = Self::cache_key(include, exclude);
        self.refresh(&key, include, exclude);
        &self.cache[&key].tables
    }

    /// Sums live row counts across matching tables without collecting
    /// them.
    pub fn matched_row_count(&mut self, include: &Signature, exclude: &Signature) -> usize {
        let key = Self::cache_key(include, exclude);
        self.refresh(&key, include, exclude);
        self.cache[&key]
            .tables
            .iter()
            .map(|&table| self.archetypes[table].len())
            .sum()
    }

    /// Sets the change-tracking filter and sweeps existing tables.
    ///
    /// Every table whose mask overlaps the filter gets a snapshot mirror,
    /// regardless of when it was created.
    pub fn set_track_filter(&mut self, filter: Signature, registry: &ComponentRegistry) {
        self.track_filter = filter;
        if self.track_filter.is_empty() {
            return;
        }
        for archetype in &mut self.archetypes {
            if self.track_filter.overlaps(archetype.signature()) {
                archetype.ensure_snapshot(registry);
            }
        }
    }

    /// Returns the current change-tracking filter mask.
    #[inline]
    pub fn track_filter(&self) -> &Signature {
        &self.track_filter
    }

    /// Mutable access to two distinct tables at once.
    ///
    /// ## Panics
    /// Panics if the indices are equal.
    pub fn pair_mut(&mut self, a: usize, b: usize) -> (&mut Archetype, &mut Archetype) {
        assert!(a != b, "source and destination archetype must differ");
        let (low, high) = if a < b { (a, b) } else { (b, a) };
        let (head, tail) = self.archetypes.split_at_mut(high);
        let low_ref = &mut head[low];
        let high_ref = &mut tail[0];
        if a < b {
            (low_ref, high_ref)
        } else {
            (high_ref, low_ref)
        }
    }

    /// Drops all tables and cached matches; the tracking filter survives.
    pub fn clear(&mut self) {
        self.archetypes.clear();
        self.by_key.clear();
        self.cache.clear();
        self.epoch += 1;
    }
}
