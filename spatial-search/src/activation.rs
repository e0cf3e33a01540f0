//! Directed activation adjacency matrix between point sets (C3).

/// Flags supplied when a new point set is added, controlling how the
/// activation matrix grows to accommodate it.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ActivationFlags {
    /// Whether this set's points should search for neighbors in other sets
    /// (fills the new row).
    pub search_neighbors: bool,
    /// Whether other sets should find this set as a neighbor (fills the new
    /// column).
    pub find_neighbors: bool,
}

/// Square, row-major 0/1 table over point-set indices.
///
/// `is_active(i, j)` answers "does set `i` searching produce edges into set
/// `j`" (entry `[i][j]`). `is_searching(i)` is the OR of row `i`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ActivationMatrix {
    n: usize,
    // Row-major, flattened: cell (i, j) lives at rows[i * n + j].
    cells: Vec<bool>,
}

impl ActivationMatrix {
    pub fn new() -> Self {
        ActivationMatrix {
            n: 0,
            cells: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    #[inline]
    fn idx(&self, i: usize, j: usize) -> usize {
        debug_assert!(i < self.n && j < self.n);
        i * self.n + j
    }

    pub fn is_active(&self, i: usize, j: usize) -> bool {
        self.cells[self.idx(i, j)]
    }

    /// OR of row `i`: true if set `i` has at least one outgoing activation.
    pub fn is_searching(&self, i: usize) -> bool {
        debug_assert!(i < self.n);
        let start = i * self.n;
        self.cells[start..start + self.n].iter().any(|&b| b)
    }

    pub fn set_pair(&mut self, i: usize, j: usize, active: bool) {
        let idx = self.idx(i, j);
        self.cells[idx] = active;
    }

    pub fn set_all(&mut self, active: bool) {
        self.cells.iter_mut().for_each(|c| *c = active);
    }

    /// `set_pairs` from spec.md 4.3: column `i` <- `find`, row `i` <- `search`,
    /// diagonal `[i][i]` <- `find AND search`.
    pub fn set_pairs(&mut self, i: usize, flags: ActivationFlags) {
        debug_assert!(i < self.n);
        for j in 0..self.n {
            self.set_pair(j, i, flags.find_neighbors);
            self.set_pair(i, j, flags.search_neighbors);
        }
        self.set_pair(i, i, flags.find_neighbors && flags.search_neighbors);
    }

    /// Grow the table by one row/column for a newly added point set, per
    /// spec.md 4.3: new column <- `find_neighbors`, new row <- `search_neighbors`,
    /// new diagonal follows the same rule as the new row's fill.
    pub fn add_set(&mut self, flags: ActivationFlags) -> usize {
        let new_n = self.n + 1;
        let mut next = vec![false; new_n * new_n];
        for i in 0..self.n {
            for j in 0..self.n {
                next[i * new_n + j] = self.cells[i * self.n + j];
            }
        }
        let new_idx = self.n;
        for i in 0..self.n {
            next[i * new_n + new_idx] = flags.find_neighbors; // new column
            next[new_idx * new_n + i] = flags.search_neighbors; // new row
        }
        next[new_idx * new_n + new_idx] = flags.search_neighbors;

        self.cells = next;
        self.n = new_n;
        new_idx
    }
}
