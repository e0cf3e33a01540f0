//! Builds a small cubic lattice, runs an `AllPairs` query, and prints how
//! many neighbors each point picked up. Run with `cargo run --example lattice`.

use spatial_search::{ActivationFlags, QueryVariant, Searcher};

fn main() {
    env_logger::init();

    let spacing = 0.9;
    let dim = 6usize;
    let mut positions = Vec::with_capacity(dim * dim * dim);
    for x in 0..dim {
        for y in 0..dim {
            for z in 0..dim {
                positions.push([x as f64 * spacing, y as f64 * spacing, z as f64 * spacing]);
            }
        }
    }

    let mut searcher = Searcher::<f64>::builder().radius(1.0).build();
    let set = searcher.add_point_set(
        positions,
        dim * dim * dim,
        true,
        ActivationFlags {
            search_neighbors: true,
            find_neighbors: true,
        },
    );

    searcher.find_neighbors(QueryVariant::AllPairs { points_changed: true }).unwrap();

    let point_set = searcher.point_set(set);
    for i in 0..dim * dim * dim {
        let count = point_set.neighbor_count(set, i);
        if count != 6 {
            println!("point {i}: {count} neighbor(s) (boundary or corner)");
        }
    }
    println!("done: {} points on a {dim}^3 lattice", dim * dim * dim);
}
