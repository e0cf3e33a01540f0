//! The Searcher (C6): glues the cell index, point sets, and activation
//! matrix together, and owns the lifecycle operations that keep them
//! consistent (`refresh`, `update_point_sets`, `update_activation`,
//! `resize_point_set`, `zort`).
//!
//! The query-time traversal (`find_neighbors`) lives in `query.rs`.

use num_traits::Float;

use crate::activation::{ActivationFlags, ActivationMatrix};
use crate::cell::{CellKey, PointId};
use crate::error::Result;
use crate::index::CellIndex;
use crate::morton::morton_code;
use crate::point_set::PointSet;

/// A single edit to the activation matrix, applied through
/// [`Searcher::set_active`].
#[derive(Clone, Copy, Debug)]
pub enum ActivationEdit {
    /// Set every cell to `active`.
    All(bool),
    /// Set a single directed pair.
    Pair(usize, usize, bool),
    /// Apply [`ActivationFlags`] to the column/row/diagonal of set `i`, per
    /// spec.md 4.3's `set_pairs`.
    Pairs(usize, ActivationFlags),
}

/// Consuming builder for [`Searcher`], in the same shape as the teacher
/// crate's `Builder` (chained setters, a single terminal `build()`).
pub struct SearcherBuilder<T: Float> {
    radius: Option<T>,
    erase_empty_cells: bool,
    #[cfg(feature = "rayon")]
    workers: Option<usize>,
}

impl<T: Float> Default for SearcherBuilder<T> {
    fn default() -> Self {
        SearcherBuilder {
            radius: None,
            erase_empty_cells: true,
            #[cfg(feature = "rayon")]
            workers: None,
        }
    }
}

impl<T: Float> SearcherBuilder<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cutoff radius: also the cell side length. Required before `build()`.
    pub fn radius(mut self, radius: T) -> Self {
        debug_assert!(radius > T::zero(), "radius must be positive");
        self.radius = Some(radius);
        self
    }

    /// Whether an entry that becomes empty during incremental maintenance
    /// is evicted and `entries` compacted. Default `true`.
    pub fn erase_empty_cells(mut self, value: bool) -> Self {
        self.erase_empty_cells = value;
        self
    }

    /// Use a dedicated `rayon::ThreadPool` with this many threads instead of
    /// the global pool. Mainly useful for asserting the edge set produced
    /// by `AllPairs` is independent of worker count.
    #[cfg(feature = "rayon")]
    pub fn workers(mut self, n: usize) -> Self {
        self.workers = Some(n);
        self
    }

    pub fn build(self) -> Searcher<T> {
        let radius = self
            .radius
            .expect("SearcherBuilder::radius must be set before build()");
        Searcher {
            radius,
            radius_sq: radius * radius,
            inv_radius: T::one() / radius,
            erase_empty_cells: self.erase_empty_cells,
            requires_refresh: false,
            index: CellIndex::new(),
            sets: Vec::new(),
            activation: ActivationMatrix::new(),
            old_activation: ActivationMatrix::new(),
            #[cfg(feature = "rayon")]
            pool: self.workers.map(|n| {
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .expect("failed to build dedicated rayon thread pool")
            }),
        }
    }
}

/// Owns the radius, the cell index, every registered point set, and the
/// activation matrix that decides which directed pairs produce edges.
pub struct Searcher<T: Float> {
    pub(crate) radius: T,
    pub(crate) radius_sq: T,
    pub(crate) inv_radius: T,
    pub(crate) erase_empty_cells: bool,
    pub(crate) requires_refresh: bool,
    pub(crate) index: CellIndex,
    pub(crate) sets: Vec<PointSet<T>>,
    pub(crate) activation: ActivationMatrix,
    old_activation: ActivationMatrix,
    #[cfg(feature = "rayon")]
    pub(crate) pool: Option<rayon::ThreadPool>,
}

impl<T: Float> Searcher<T> {
    pub fn builder() -> SearcherBuilder<T> {
        SearcherBuilder::new()
    }

    pub fn radius(&self) -> T {
        self.radius
    }

    pub fn set_count(&self) -> usize {
        self.sets.len()
    }

    pub fn point_set(&self, set_id: usize) -> &PointSet<T> {
        &self.sets[set_id]
    }

    pub fn point_set_mut(&mut self, set_id: usize) -> &mut PointSet<T> {
        &mut self.sets[set_id]
    }

    /// Register a new point set. Returns its set id (a dense index).
    pub fn add_point_set(
        &mut self,
        positions: Vec<[T; 3]>,
        n: usize,
        dynamic: bool,
        flags: ActivationFlags,
    ) -> usize {
        let set_id = self.sets.len();
        self.sets.push(PointSet::new(positions, n, dynamic));
        self.activation.add_set(flags);
        self.old_activation.add_set(ActivationFlags::default());
        self.requires_refresh = true;
        log::debug!("add_point_set: set {set_id} with {n} points (dynamic={dynamic})");
        set_id
    }

    /// Edit the activation matrix. Marks `requires_refresh` so the next
    /// `update_point_sets` rebuilds the index before `update_activation`
    /// snapshots, per spec.md section 6.
    pub fn set_active(&mut self, edit: ActivationEdit) {
        match edit {
            ActivationEdit::All(active) => self.activation.set_all(active),
            ActivationEdit::Pair(i, j, active) => self.activation.set_pair(i, j, active),
            ActivationEdit::Pairs(i, flags) => self.activation.set_pairs(i, flags),
        }
        self.requires_refresh = true;
    }

    /// Discard and rebuild `entries`/the key->index map from every current
    /// position. Also adopts `new_radius` if given.
    pub fn refresh(&mut self, new_radius: Option<T>) -> Result<()> {
        if let Some(r) = new_radius {
            debug_assert!(r > T::zero(), "radius must be positive");
            self.radius = r;
            self.radius_sq = r * r;
            self.inv_radius = T::one() / r;
        }

        self.index.clear();
        for (set_idx, set) in self.sets.iter_mut().enumerate() {
            let searching = self.activation.is_searching(set_idx);
            for i in 0..set.len() {
                let key = CellKey::from_point(*set.point(i), self.inv_radius);
                set.keys[i] = key;
                set.old_keys[i] = key;
                self.index
                    .insert(key, PointId::new(set_idx as u32, i as u32), searching);
            }
        }

        log::debug!(
            "refresh: {} set(s), {} entries",
            self.sets.len(),
            self.index.entry_count()
        );
        self.requires_refresh = false;
        Ok(())
    }

    /// Incrementally re-hash any dynamic set whose points moved since the
    /// last call, then evict any cells that emptied out.
    pub fn update_point_sets(&mut self) -> Result<()> {
        if self.requires_refresh {
            self.refresh(None)?;
        }

        for set in self.sets.iter_mut() {
            if !set.dynamic {
                continue;
            }
            std::mem::swap(&mut set.keys, &mut set.old_keys);
            for i in 0..set.len() {
                set.keys[i] = CellKey::from_point(*set.point(i), self.inv_radius);
            }
        }

        let to_delete = self.update_hash_table();
        if self.erase_empty_cells && !to_delete.is_empty() {
            log::trace!("update_point_sets: evicting {} empty entr(y/ies)", to_delete.len());
            self.index.compact(to_delete);
        }
        Ok(())
    }

    /// For each point whose key changed since the last update, move it
    /// between entries. Returns entry indices scheduled for eviction (only
    /// populated when `erase_empty_cells` is set).
    fn update_hash_table(&mut self) -> Vec<usize> {
        let mut to_delete = Vec::new();
        for (set_idx, set) in self.sets.iter_mut().enumerate() {
            let searching = self.activation.is_searching(set_idx);
            for i in 0..set.len() {
                if set.keys[i] == set.old_keys[i] {
                    continue;
                }
                let pid = PointId::new(set_idx as u32, i as u32);
                self.index.insert(set.keys[i], pid, searching);
                if let Some(old_idx) = self.index.remove(set.old_keys[i], pid, searching) {
                    if self.erase_empty_cells && self.index.entries[old_idx].is_empty() {
                        to_delete.push(old_idx);
                    }
                }
            }
        }
        to_delete
    }

    /// Rebuild every entry's `searching_count` if the activation matrix
    /// changed since the last propagation, then snapshot it.
    pub fn update_activation(&mut self) {
        if self.activation == self.old_activation {
            return;
        }
        for entry in self.index.entries.iter_mut() {
            entry.searching_count = entry
                .indices
                .iter()
                .filter(|p| self.activation.is_searching(p.set_id as usize))
                .count();
        }
        self.old_activation = self.activation.clone();
        log::debug!("update_activation: activation matrix changed, searching_count rebuilt");
    }

    /// Grow or shrink a point set's backing storage and its cell membership.
    /// Requires no refresh to be pending (spec.md section 4.4/7).
    pub fn resize_point_set(
        &mut self,
        set_id: usize,
        new_positions: Vec<[T; 3]>,
        new_n: usize,
    ) -> Result<()> {
        if self.requires_refresh {
            return Err(crate::error::SearchError::InvalidState);
        }

        let old_n = self.sets[set_id].len();
        let searching = self.activation.is_searching(set_id);
        let mut to_delete = Vec::new();

        if new_n < old_n {
            for i in new_n..old_n {
                let key = self.sets[set_id].keys[i];
                let pid = PointId::new(set_id as u32, i as u32);
                if let Some(old_idx) = self.index.remove(key, pid, searching) {
                    if self.erase_empty_cells && self.index.entries[old_idx].is_empty() {
                        to_delete.push(old_idx);
                    }
                }
            }
        }

        self.sets[set_id].resize_storage(new_positions, new_n)?;

        if new_n > old_n {
            for i in old_n..new_n {
                let key = CellKey::from_point(*self.sets[set_id].point(i), self.inv_radius);
                self.sets[set_id].keys[i] = key;
                self.sets[set_id].old_keys[i] = key;
                let pid = PointId::new(set_id as u32, i as u32);
                self.index.insert(key, pid, searching);
            }
        }

        if self.erase_empty_cells && !to_delete.is_empty() {
            self.index.compact(to_delete);
        }

        log::debug!("resize_point_set: set {set_id} {old_n} -> {new_n} points");
        Ok(())
    }

    /// Compute a Morton-order permutation of each set's points and store it
    /// as that set's `sort_table`. Physically renumbers this `Searcher`'s
    /// own copy of each set's positions to match (see DESIGN.md for why:
    /// `zort` is a *renumbering* pass, not just a lookup table, so cache
    /// locality in subsequent traversals actually improves). External
    /// callers apply the same permutation to their own mirrored attribute
    /// arrays via `PointSet::sort`.
    pub fn zort(&mut self) -> Result<()> {
        for set in self.sets.iter_mut() {
            let n = set.len();
            if n == 0 {
                continue;
            }
            let mut table: Vec<u32> = (0..n as u32).collect();
            let inv_radius = self.inv_radius;
            table.sort_unstable_by_key(|&i| {
                morton_code(CellKey::from_point(*set.point(i as usize), inv_radius))
            });

            let reordered: Vec<[T; 3]> = table
                .iter()
                .map(|&src| set.positions()[src as usize])
                .collect();
            set.positions_mut().copy_from_slice(&reordered);

            set.keys.iter_mut().for_each(|k| *k = CellKey::SENTINEL);
            set.old_keys.iter_mut().for_each(|k| *k = CellKey::SENTINEL);
            set.set_sort_table(table);
        }

        self.requires_refresh = true;
        log::debug!("zort: renumbered {} set(s) by Morton order", self.sets.len());
        Ok(())
    }
}
