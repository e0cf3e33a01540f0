//! Cell key and spatial hash (C1).
//!
//! Cell size always equals the cutoff radius `r`, so two points closer than
//! `r` can only ever land in the same cell or an adjacent one.

use num_traits::Float;

/// A point's address in the integer lattice, one cell of side `r`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct CellKey {
    pub kx: i32,
    pub ky: i32,
    pub kz: i32,
}

impl CellKey {
    /// Sentinel used by `PointSet::keys`/`old_keys` to mean "not yet placed".
    pub const SENTINEL: CellKey = CellKey {
        kx: i32::MIN,
        ky: i32::MIN,
        kz: i32::MIN,
    };

    pub(crate) fn is_sentinel(self) -> bool {
        self == Self::SENTINEL
    }

    /// `cell_index(p)` from spec.md 4.1: `floor(c / r)` per coordinate,
    /// computed as `trunc(c * inv_r)` with a -1 correction for negative `c`
    /// (`trunc` rounds toward zero, `floor` rounds toward negative infinity;
    /// they only disagree when `c` is negative and not an exact multiple of
    /// `r`).
    pub fn from_point<T: Float>(p: [T; 3], inv_r: T) -> CellKey {
        CellKey {
            kx: floor_to_i32(p[0], inv_r),
            ky: floor_to_i32(p[1], inv_r),
            kz: floor_to_i32(p[2], inv_r),
        }
    }

    /// 64-bit spatial hash from spec.md section 3: the wrapping XOR of three
    /// large-prime multiplications, reinterpreted as unsigned.
    pub fn spatial_hash(self) -> u64 {
        let x = (self.kx as u64).wrapping_mul(73856093);
        let y = (self.ky as u64).wrapping_mul(19349663);
        let z = (self.kz as u64).wrapping_mul(83492791);
        x ^ y ^ z
    }
}

fn floor_to_i32<T: Float>(c: T, inv_r: T) -> i32 {
    let scaled = c * inv_r;
    let truncated = scaled.trunc();
    let floored = if scaled < T::zero() && truncated != scaled {
        truncated - T::one()
    } else {
        truncated
    };
    // Values this far outside i32 range would already have made the cutoff
    // radius meaningless; spec.md treats that as caller misuse.
    debug_assert!(floored.abs() < T::from(i32::MAX).unwrap());
    floored.to_i32().unwrap()
}

/// An index into a point set: `(set_id, id)`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct PointId {
    pub set_id: u32,
    pub id: u32,
}

impl PointId {
    pub fn new(set_id: u32, id: u32) -> Self {
        PointId { set_id, id }
    }
}
