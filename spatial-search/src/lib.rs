//! Parallel neighborhood search over 3D point clouds.
//!
//! Points live in one or more [`PointSet`]s. A directed
//! [`ActivationMatrix`] says which sets search for neighbors in which other
//! sets. A [`Searcher`] hashes every active point into a uniform grid of
//! cells sized to the cutoff radius, then [`Searcher::find_neighbors`]
//! walks that grid to produce per-point neighbor lists, either for every
//! active pair at once or for a single ad-hoc query point.
//!
//! ```
//! use spatial_search::{ActivationFlags, QueryVariant, Searcher};
//!
//! let mut searcher = Searcher::<f32>::builder().radius(1.0).build();
//! let set = searcher.add_point_set(
//!     vec![[0.0, 0.0, 0.0], [0.5, 0.0, 0.0]],
//!     2,
//!     false,
//!     ActivationFlags {
//!         search_neighbors: true,
//!         find_neighbors: true,
//!     },
//! );
//! searcher.find_neighbors(QueryVariant::AllPairs { points_changed: true }).unwrap();
//! assert_eq!(searcher.point_set(set).fetch_neighbor_list(set, 0), vec![1]);
//! ```

mod activation;
mod cell;
mod error;
mod index;
mod morton;
mod point_set;
mod query;
mod searcher;

pub use activation::{ActivationFlags, ActivationMatrix};
pub use cell::{CellKey, PointId};
pub use error::{Result, SearchError};
pub use point_set::PointSet;
pub use query::{Neighbor, QueryVariant};
pub use searcher::{ActivationEdit, Searcher, SearcherBuilder};
