//! Point sets (C2): owned positions, cell keys, and per-pair neighbor lists.

use num_traits::Float;
use parking_lot::Mutex;

use crate::cell::CellKey;
use crate::error::{try_reserve, Result, SearchError};

/// Squared Euclidean distance between two points, used everywhere the
/// two-pass traversal needs a `d^2 < r^2` comparison (spec.md is explicit
/// that implementations must not mix `d < r` and `d^2 < r^2`; this crate
/// only ever computes the squared form).
pub fn squared_distance<T: Float>(a: [T; 3], b: [T; 3]) -> T {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    dx * dx + dy * dy + dz * dz
}

/// A homogeneous collection of 3D points participating in neighborhood
/// queries.
///
/// `neighbors[j][i]` holds the ids (within set `j`) that are currently
/// neighbors of point `i` of this set. It is guarded by its own
/// `parking_lot::Mutex` rather than a separate `locks` array: spec.md
/// models `locks[j][i]` and `neighbors[j][i]` as two parallel structures,
/// but wrapping the list directly in its own mutex is the idiomatic Rust
/// rendition of "a fine-grained mutex per directed pair" without reaching
/// for an `UnsafeCell` to let a separate lock array guard data it doesn't
/// own — see DESIGN.md.
pub struct PointSet<T: Float> {
    positions: Vec<[T; 3]>,
    /// Whether positions may change between `find_neighbors` calls.
    pub dynamic: bool,
    /// Cell key as of the most recent `update_point_sets`/`refresh`.
    pub(crate) keys: Vec<CellKey>,
    /// Cell key as of the previous `update_point_sets`/`refresh`.
    pub(crate) old_keys: Vec<CellKey>,
    /// `neighbors[j][i]`: ids in set `j` that are neighbors of point `i` of
    /// this set.
    neighbors: Vec<Vec<Mutex<Vec<u32>>>>,
    sort_table: Vec<u32>,
}

impl<T: Float> PointSet<T> {
    pub(crate) fn new(positions: Vec<[T; 3]>, n: usize, dynamic: bool) -> Self {
        debug_assert_eq!(positions.len(), n);
        PointSet {
            positions,
            dynamic,
            keys: vec![CellKey::SENTINEL; n],
            old_keys: vec![CellKey::SENTINEL; n],
            neighbors: Vec::new(),
            sort_table: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn point(&self, i: usize) -> &[T; 3] {
        debug_assert!(i < self.positions.len());
        &self.positions[i]
    }

    /// Mutable access to a single point's position, for dynamic sets whose
    /// owner moves points between queries. The new position only takes
    /// effect in the cell index after the next `update_point_sets`/
    /// `refresh` call.
    pub fn point_mut(&mut self, i: usize) -> &mut [T; 3] {
        debug_assert!(i < self.positions.len());
        &mut self.positions[i]
    }

    pub(crate) fn positions(&self) -> &[[T; 3]] {
        &self.positions
    }

    pub(crate) fn positions_mut(&mut self) -> &mut [[T; 3]] {
        &mut self.positions
    }

    /// Ensure `neighbors` has a row for set index `other_set` (growing with
    /// empty per-point lists if needed), matching "for each other set j,
    /// resize neighbors[j] to n_i" from spec.md 4.6.
    pub(crate) fn ensure_partner(&mut self, other_set: usize) {
        while self.neighbors.len() <= other_set {
            self.neighbors.push(Vec::new());
        }
        let n = self.positions.len();
        let row = &mut self.neighbors[other_set];
        row.resize_with(n, || Mutex::new(Vec::new()));
    }

    pub(crate) fn clear_partner(&mut self, other_set: usize) {
        if let Some(row) = self.neighbors.get(other_set) {
            for cell in row {
                cell.lock().clear();
            }
        }
    }

    pub(crate) fn lock_list(&self, other_set: usize, i: usize) -> &Mutex<Vec<u32>> {
        &self.neighbors[other_set][i]
    }

    pub fn neighbor_count(&self, other_set: usize, i: usize) -> usize {
        match self.neighbors.get(other_set) {
            Some(row) => row.get(i).map(|m| m.lock().len()).unwrap_or(0),
            None => 0,
        }
    }

    pub fn fetch_neighbor(&self, other_set: usize, i: usize, k: usize) -> u32 {
        let list = self.neighbors[other_set][i].lock();
        debug_assert!(k < list.len());
        list[k]
    }

    pub fn fetch_neighbor_list(&self, other_set: usize, i: usize) -> Vec<u32> {
        match self.neighbors.get(other_set).and_then(|row| row.get(i)) {
            Some(m) => m.lock().clone(),
            None => Vec::new(),
        }
    }

    /// Reorder `array` in place by the permutation computed by the last
    /// `zort` call.
    pub fn sort<U>(&self, array: &mut [U]) -> Result<()>
    where
        U: Clone,
    {
        if self.sort_table.is_empty() || array.is_empty() {
            return Err(SearchError::InvalidOrMissingTable);
        }
        debug_assert_eq!(array.len(), self.sort_table.len());

        let reordered: Vec<U> = self
            .sort_table
            .iter()
            .map(|&src| array[src as usize].clone())
            .collect();
        array.clone_from_slice(&reordered);
        Ok(())
    }

    pub(crate) fn sort_table(&self) -> &[u32] {
        &self.sort_table
    }

    pub(crate) fn set_sort_table(&mut self, table: Vec<u32>) {
        self.sort_table = table;
    }

    /// Trim or extend per-point data structures to `new_n` points, backed
    /// by `new_positions`. Preserves keys up to `min(old, new)`; growth
    /// leaves the new slots at the sentinel key so the caller's next
    /// `update_point_sets`/`refresh` rehashes them.
    pub(crate) fn resize_storage(&mut self, new_positions: Vec<[T; 3]>, new_n: usize) -> Result<()> {
        debug_assert_eq!(new_positions.len(), new_n);
        let old_n = self.positions.len();

        if new_n > old_n {
            try_reserve(&mut self.keys, new_n - old_n, "PointSet::keys")?;
            try_reserve(&mut self.old_keys, new_n - old_n, "PointSet::old_keys")?;
        }

        self.positions = new_positions;
        self.keys.resize(new_n, CellKey::SENTINEL);
        self.old_keys.resize(new_n, CellKey::SENTINEL);
        for row in &mut self.neighbors {
            row.resize_with(new_n, || Mutex::new(Vec::new()));
        }
        // A sort table computed for the old point count is meaningless now.
        self.sort_table.clear();
        Ok(())
    }
}
