//! Cell index (C4): `CellKey -> entry` mapping plus the entries themselves.

use std::collections::HashMap;

use crate::cell::{CellKey, PointId};

/// All points currently living in one cell, plus how many of them belong to
/// a "searching" set (spec.md 3: `searching_count` = count of members whose
/// set has at least one outgoing activation).
#[derive(Clone, Debug, Default)]
pub struct CellEntry {
    pub indices: Vec<PointId>,
    pub searching_count: usize,
}

impl CellEntry {
    /// Duplicates allowed; add never dedups.
    pub(crate) fn add(&mut self, p: PointId, searching: bool) {
        self.indices.push(p);
        if searching {
            self.searching_count += 1;
        }
    }

    /// First-match swap-remove. Returns whether a matching point was found.
    pub(crate) fn remove(&mut self, p: PointId, searching: bool) -> bool {
        if let Some(pos) = self.indices.iter().position(|&x| x == p) {
            self.indices.swap_remove(pos);
            if searching {
                self.searching_count = self.searching_count.saturating_sub(1);
            }
            true
        } else {
            false
        }
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// `CellKey -> usize` mapping into an append-only `entries` vector. Gaps
/// left by eviction are compacted by `compact`.
#[derive(Clone, Debug, Default)]
pub struct CellIndex {
    map: HashMap<CellKey, usize>,
    pub entries: Vec<CellEntry>,
}

impl CellIndex {
    pub fn new() -> Self {
        CellIndex {
            map: HashMap::new(),
            entries: Vec::new(),
        }
    }

    pub fn clear(&mut self) {
        self.map.clear();
        self.entries.clear();
    }

    pub fn get(&self, key: CellKey) -> Option<usize> {
        self.map.get(&key).copied()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Look up (or create) the entry for `key`, append `p` to it, and bump
    /// `searching_count` if `searching`. Returns the entry index.
    pub fn insert(&mut self, key: CellKey, p: PointId, searching: bool) -> usize {
        let idx = *self.map.entry(key).or_insert_with(|| {
            self.entries.push(CellEntry::default());
            self.entries.len() - 1
        });
        self.entries[idx].add(p, searching);
        idx
    }

    /// Remove `p` from the entry at `key`. Returns `Some(entry_idx)` if the
    /// entry existed (whether or not `p` was actually found in it — callers
    /// use the index to decide whether to schedule it for eviction).
    pub fn remove(&mut self, key: CellKey, p: PointId, searching: bool) -> Option<usize> {
        let idx = *self.map.get(&key)?;
        self.entries[idx].remove(p, searching);
        Some(idx)
    }

    /// Snapshot `(key, entry_idx)` pairs in a fixed order, frozen for the
    /// duration of a query so parallel workers never touch the map
    /// concurrently with map mutation (spec.md 4.6 / design notes).
    pub fn snapshot(&self) -> Vec<(CellKey, usize)> {
        self.map.iter().map(|(&k, &v)| (k, v)).collect()
    }

    /// Compact `entries`, removing the indices in `to_delete` (must be
    /// sorted descending, duplicates allowed) and rewriting `map` values to
    /// match the new, shorter `entries`. Two passes, as the design notes
    /// specify: compact first, then fix up the map.
    pub fn compact(&mut self, mut to_delete: Vec<usize>) {
        if to_delete.is_empty() {
            return;
        }
        to_delete.sort_unstable_by(|a, b| b.cmp(a));
        to_delete.dedup();

        for &idx in &to_delete {
            self.entries.remove(idx);
        }

        // Build the remap: old index -> new index, by counting how many
        // deleted indices were smaller.
        let mut remap = vec![usize::MAX; self.entries.len() + to_delete.len()];
        let mut next_new = 0usize;
        let deleted: std::collections::HashSet<usize> = to_delete.into_iter().collect();
        for old_idx in 0..remap.len() {
            if deleted.contains(&old_idx) {
                continue;
            }
            remap[old_idx] = next_new;
            next_new += 1;
        }

        self.map.retain(|_, v| {
            let new_v = remap[*v];
            if new_v == usize::MAX {
                false
            } else {
                *v = new_v;
                true
            }
        });
    }
}
