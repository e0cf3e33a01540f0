//! Query-time traversal (C6): `find_neighbors` and its three variants.

use num_traits::Float;
use parking_lot::Mutex;

use crate::cell::{CellKey, PointId};
use crate::error::Result;
use crate::point_set::squared_distance;
use crate::searcher::Searcher;

/// Which flavor of neighbor query to run.
pub enum QueryVariant<T: Float> {
    /// Populate every active set's neighbor lists from every other active
    /// set, over the whole cell index. `points_changed` should be `true`
    /// unless the caller knows no position has moved since the previous
    /// query, in which case `update_point_sets` is skipped.
    AllPairs { points_changed: bool },
    /// Ad-hoc query for a point already registered in a set: walks the
    /// point's own cell and its 26 neighbors, filtered by the activation
    /// row for `set_id`, excluding the point itself.
    SinglePointInSet { set_id: usize, point_id: usize },
    /// Ad-hoc query for a bare coordinate with no registered set: walks the
    /// 27 cells around `position` across every set, unfiltered by
    /// activation (there is no originating row to consult).
    SinglePoint { position: [T; 3] },
}

/// One candidate produced by [`Searcher::find_neighbors`] in its
/// single-point variants.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Neighbor<T: Float> {
    pub set_id: usize,
    pub id: u32,
    pub distance_sq: T,
}

/// The 26 cell offsets surrounding (but excluding) the origin cell, plus the
/// origin itself makes 27; Pass A handles the origin, Pass B this list.
const NEIGHBOR_OFFSETS: [(i32, i32, i32); 26] = [
    (-1, -1, -1), (-1, -1, 0), (-1, -1, 1),
    (-1, 0, -1), (-1, 0, 0), (-1, 0, 1),
    (-1, 1, -1), (-1, 1, 0), (-1, 1, 1),
    (0, -1, -1), (0, -1, 0), (0, -1, 1),
    (0, 0, -1), (0, 0, 1),
    (0, 1, -1), (0, 1, 0), (0, 1, 1),
    (1, -1, -1), (1, -1, 0), (1, -1, 1),
    (1, 0, -1), (1, 0, 0), (1, 0, 1),
    (1, 1, -1), (1, 1, 0), (1, 1, 1),
];

/// Linearized delta index of the origin (Δx=Δy=Δz=0) in the
/// `9(Δx+1)+3(Δy+1)+(Δz+1)` scheme used by Pass B's visited bitmask. Pass A
/// owns this direction; Pass B skips it.
const CENTER_DELTA: usize = 13;

/// The cell offset `(Δx, Δy, Δz)` for a linearized delta in `0..27`, the
/// inverse of `9(Δx+1)+3(Δy+1)+(Δz+1)`.
fn offset_for_delta(d: usize) -> (i32, i32, i32) {
    let dx = (d / 9) as i32 - 1;
    let dy = ((d / 3) % 3) as i32 - 1;
    let dz = (d % 3) as i32 - 1;
    (dx, dy, dz)
}

impl<T: Float + Send + Sync> Searcher<T> {
    /// Run a neighbor query. `AllPairs` mutates every active pair's
    /// neighbor lists in place and returns `None`; the single-point
    /// variants leave stored state untouched and return the match list.
    pub fn find_neighbors(&mut self, variant: QueryVariant<T>) -> Result<Option<Vec<Neighbor<T>>>> {
        match variant {
            QueryVariant::AllPairs { points_changed } => {
                if points_changed {
                    self.update_point_sets()?;
                }
                self.update_activation();
                self.all_pairs()?;
                Ok(None)
            }
            QueryVariant::SinglePointInSet { set_id, point_id } => {
                Ok(Some(self.single_point_in_set(set_id, point_id)))
            }
            QueryVariant::SinglePoint { position } => Ok(Some(self.single_point(position))),
        }
    }

    /// Clear every active (i, j) pair's neighbor lists, then two-pass
    /// traverse the whole cell index: Pass A handles same-cell pairs, Pass
    /// B handles the 26 surrounding cells, with a per-entry 27-bit-wide
    /// visited mask preventing a cell pair from being processed twice from
    /// opposite directions.
    fn all_pairs(&mut self) -> Result<()> {
        let n_sets = self.sets.len();
        for i in 0..n_sets {
            for j in 0..n_sets {
                self.sets[i].ensure_partner(j);
                // Every (i, j) pair is cleared regardless of current
                // activation: a pair that was active on a previous query
                // and has since been deactivated must not leave stale
                // neighbor lists behind.
                self.sets[i].clear_partner(j);
            }
        }

        let snapshot = self.index.snapshot();
        // Built fresh for this query and dropped at the end (spec.md
        // section 5): one 27-bit visited mask per entry in the snapshot.
        let visited: Vec<Mutex<[bool; 27]>> = (0..self.index.entries.len())
            .map(|_| Mutex::new([false; 27]))
            .collect();

        #[cfg(feature = "rayon")]
        {
            use rayon::iter::ParallelIterator;
            use rayon::slice::ParallelSlice;

            // Aim for a handful of chunks per core so work balances across
            // workers even when cells are unevenly occupied.
            let workers = self
                .pool
                .as_ref()
                .map(|p| p.current_num_threads())
                .unwrap_or_else(num_cpus::get);
            let chunk_size = (snapshot.len() / (workers * 4).max(1)).max(1);

            let run = || {
                snapshot.par_chunks(chunk_size).for_each(|chunk| {
                    for &(key, entry_idx) in chunk {
                        self.process_entry(key, entry_idx, &visited);
                    }
                });
            };
            match &self.pool {
                Some(pool) => pool.install(run),
                None => run(),
            }
        }

        #[cfg(not(feature = "rayon"))]
        {
            for &(key, entry_idx) in &snapshot {
                self.process_entry(key, entry_idx, &visited);
            }
        }

        Ok(())
    }

    /// Pass A (same cell) then Pass B (26 neighbors) for one cell entry.
    /// Takes `&self`: all mutation happens through the per-pair `Mutex`
    /// lists inside each `PointSet` and the per-entry visited masks passed
    /// in, so concurrent workers never need `&mut self`.
    fn process_entry(&self, key: CellKey, entry_idx: usize, visited: &[Mutex<[bool; 27]>]) {
        let entry = &self.index.entries[entry_idx];

        // Pass A: same-cell pairs, each unordered pair considered once.
        // Gated on searching_count since no edge can originate here
        // otherwise; Pass B below is NOT gated this way, since an entry
        // with no searching member of its own may still be the target of
        // an edge from a searching neighbor entry.
        if entry.searching_count > 0 {
            for a in 0..entry.indices.len() {
                let pa = entry.indices[a];
                for b in (a + 1)..entry.indices.len() {
                    let pb = entry.indices[b];
                    self.maybe_link(pa, pb);
                    self.maybe_link(pb, pa);
                }
            }
        }

        // Pass B: the 26 surrounding cells. A fast skip is safe here (no
        // directed activation can fire if neither side has a searching
        // member), but which side carries out the work is decided by the
        // visited bitmask below, never by comparing snapshot indices: that
        // would silently drop edges when the lower-indexed entry isn't the
        // searching one.
        for delta in 0..27 {
            if delta == CENTER_DELTA {
                continue;
            }
            let (dx, dy, dz) = offset_for_delta(delta);
            let neighbor_key = CellKey {
                kx: key.kx + dx,
                ky: key.ky + dy,
                kz: key.kz + dz,
            };
            let Some(neighbor_idx) = self.index.get(neighbor_key) else {
                continue;
            };
            let other = &self.index.entries[neighbor_idx];
            if entry.searching_count == 0 && other.searching_count == 0 {
                continue;
            }
            if !self.mark_visited(visited, entry_idx, neighbor_idx, delta) {
                continue;
            }
            for &pa in &entry.indices {
                for &pb in &other.indices {
                    self.maybe_link(pa, pb);
                    self.maybe_link(pb, pa);
                }
            }
        }
    }

    /// Claim the pair `(e, e')` in the visited bitmask for the direction
    /// `d` (as seen from `e`), returning `true` exactly once across however
    /// many times this unordered pair is reached from either side.
    ///
    /// Checked under a lock on `e` alone; if unclaimed, claimed under locks
    /// on both `e` and `e'` acquired in canonical ascending index order
    /// (spec.md section 5), re-checking after acquiring the lower-index
    /// lock to close the race between the initial check and the claim.
    fn mark_visited(
        &self,
        visited: &[Mutex<[bool; 27]>],
        e: usize,
        e_prime: usize,
        d: usize,
    ) -> bool {
        if visited[e].lock()[d] {
            return false;
        }

        let (lo, hi) = if e <= e_prime { (e, e_prime) } else { (e_prime, e) };
        let d_lo = if e == lo { d } else { 26 - d };
        let d_hi = if e == lo { 26 - d } else { d };

        let mut v_lo = visited[lo].lock();
        if v_lo[d_lo] {
            return false;
        }
        v_lo[d_lo] = true;
        drop(v_lo);

        if hi != lo {
            visited[hi].lock()[d_hi] = true;
        }
        true
    }

    /// If `searcher` is active for `(from.set_id, to.set_id)` and the two
    /// points are within radius, append `to.id` to `from`'s neighbor list.
    /// Locks are acquired in canonical `(set_id, id)` order: here there is
    /// only ever one lock (the destination list for `from`), so no
    /// ordering hazard arises from this call alone; canonical ordering
    /// matters when two directed edges for the same unordered point pair
    /// are being recorded concurrently by different workers, which is
    /// guaranteed safe because each list has its own independent mutex.
    fn maybe_link(&self, from: PointId, to: PointId) {
        if !self.activation.is_active(from.set_id as usize, to.set_id as usize) {
            return;
        }
        let from_set = &self.sets[from.set_id as usize];
        let to_set = &self.sets[to.set_id as usize];
        let d2 = squared_distance(*from_set.point(from.id as usize), *to_set.point(to.id as usize));
        if d2 >= self.radius_sq {
            return;
        }
        let list = from_set.lock_list(to.set_id as usize, from.id as usize);
        let mut list = list.lock();
        if !list.contains(&to.id) {
            list.push(to.id);
        }
    }

    /// `SinglePointInSet`: scan the point's own cell and its 26 neighbors,
    /// filtered by `is_active(set_id, candidate.set_id)`, excluding the
    /// point itself.
    fn single_point_in_set(&self, set_id: usize, point_id: usize) -> Vec<Neighbor<T>> {
        let origin = *self.sets[set_id].point(point_id);
        let key = CellKey::from_point(origin, self.inv_radius);
        let self_pid = PointId::new(set_id as u32, point_id as u32);

        let mut out = Vec::new();
        self.scan_27(key, |cand| {
            if cand == self_pid {
                return;
            }
            if !self.activation.is_active(set_id, cand.set_id as usize) {
                return;
            }
            let cand_pos = *self.sets[cand.set_id as usize].point(cand.id as usize);
            let d2 = squared_distance(origin, cand_pos);
            if d2 < self.radius_sq {
                out.push(Neighbor {
                    set_id: cand.set_id as usize,
                    id: cand.id,
                    distance_sq: d2,
                });
            }
        });
        out
    }

    /// `SinglePoint`: scan the 27 cells around an ad-hoc coordinate across
    /// every set. No self to exclude and no originating activation row, so
    /// every candidate within radius is returned.
    fn single_point(&self, position: [T; 3]) -> Vec<Neighbor<T>> {
        let key = CellKey::from_point(position, self.inv_radius);
        let mut out = Vec::new();
        self.scan_27(key, |cand| {
            let cand_pos = *self.sets[cand.set_id as usize].point(cand.id as usize);
            let d2 = squared_distance(position, cand_pos);
            if d2 < self.radius_sq {
                out.push(Neighbor {
                    set_id: cand.set_id as usize,
                    id: cand.id,
                    distance_sq: d2,
                });
            }
        });
        out
    }

    fn scan_27(&self, origin_key: CellKey, mut visit: impl FnMut(PointId)) {
        if let Some(idx) = self.index.get(origin_key) {
            for &p in &self.index.entries[idx].indices {
                visit(p);
            }
        }
        for &(dx, dy, dz) in &NEIGHBOR_OFFSETS {
            let key = CellKey {
                kx: origin_key.kx + dx,
                ky: origin_key.ky + dy,
                kz: origin_key.kz + dz,
            };
            if let Some(idx) = self.index.get(key) {
                for &p in &self.index.entries[idx].indices {
                    visit(p);
                }
            }
        }
    }
}
