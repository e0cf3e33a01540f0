use std::collections::HashSet;

use spatial_search::{ActivationEdit, ActivationFlags, QueryVariant, Searcher};

fn both_ways() -> ActivationFlags {
    ActivationFlags {
        search_neighbors: true,
        find_neighbors: true,
    }
}

fn neighbors_of(searcher: &Searcher<f64>, set: usize, point: usize) -> HashSet<u32> {
    searcher.point_set(set).fetch_neighbor_list(set, point).into_iter().collect()
}

#[test]
fn scenario_1_three_collinear_points() {
    let mut s = Searcher::<f64>::builder().radius(1.0).build();
    let set = s.add_point_set(
        vec![[0.0, 0.0, 0.0], [0.5, 0.0, 0.0], [2.0, 0.0, 0.0]],
        3,
        true,
        both_ways(),
    );
    s.find_neighbors(QueryVariant::AllPairs { points_changed: true }).unwrap();

    assert_eq!(neighbors_of(&s, set, 0), HashSet::from([1]));
    assert_eq!(neighbors_of(&s, set, 1), HashSet::from([0]));
    assert_eq!(neighbors_of(&s, set, 2), HashSet::new());
}

#[test]
fn scenario_2_chain_of_three() {
    let mut s = Searcher::<f64>::builder().radius(1.0).build();
    let set = s.add_point_set(
        vec![[0.0, 0.0, 0.0], [0.0, 0.0, 0.9], [0.0, 0.0, 1.1]],
        3,
        true,
        both_ways(),
    );
    s.find_neighbors(QueryVariant::AllPairs { points_changed: true }).unwrap();

    assert_eq!(neighbors_of(&s, set, 0), HashSet::from([1]));
    assert_eq!(neighbors_of(&s, set, 1), HashSet::from([0, 2]));
    assert_eq!(neighbors_of(&s, set, 2), HashSet::from([1]));
}

#[test]
fn scenario_3_directed_activation_between_two_sets() {
    let mut s = Searcher::<f64>::builder().radius(1.0).build();
    let set_a = s.add_point_set(
        vec![[0.0, 0.0, 0.0]],
        1,
        true,
        ActivationFlags {
            search_neighbors: false,
            find_neighbors: false,
        },
    );
    let set_b = s.add_point_set(
        vec![[0.5, 0.0, 0.0]],
        1,
        true,
        ActivationFlags {
            search_neighbors: false,
            find_neighbors: false,
        },
    );
    s.set_active(ActivationEdit::Pair(set_a, set_b, true));

    s.find_neighbors(QueryVariant::AllPairs { points_changed: true }).unwrap();

    assert_eq!(
        s.point_set(set_a).fetch_neighbor_list(set_b, 0),
        vec![0],
        "A searching into B should find point 0 of B"
    );
    assert_eq!(
        s.point_set(set_b).fetch_neighbor_list(set_a, 0),
        Vec::<u32>::new(),
        "B never searches, so it records no neighbors in A"
    );
}

#[test]
fn scenario_4_zort_orders_by_morton_code() {
    let mut s = Searcher::<f64>::builder().radius(2.0).build();
    let set = s.add_point_set(
        vec![[0.0, 0.0, 0.0], [1.5, 0.0, 0.0], [-1.5, 0.0, 0.0]],
        3,
        true,
        both_ways(),
    );
    s.find_neighbors(QueryVariant::AllPairs { points_changed: true }).unwrap();
    assert_eq!(neighbors_of(&s, set, 0), HashSet::from([1, 2]));

    s.zort().unwrap();
    // After zort, positions are physically permuted; re-running AllPairs
    // must reproduce the same unordered edge set regardless of which
    // internal index each original point now lives at.
    s.find_neighbors(QueryVariant::AllPairs { points_changed: true }).unwrap();
    let total_edges: usize = (0..3).map(|i| neighbors_of(&s, set, i).len()).sum();
    assert_eq!(total_edges, 4); // 0-1 and 0-2, each recorded from both sides
}

#[test]
fn scenario_5_moving_a_point_updates_cell_membership() {
    let mut s = Searcher::<f64>::builder().radius(1.0).build();
    let set = s.add_point_set(
        vec![[0.0, 0.0, 0.0], [0.5, 0.0, 0.0]],
        2,
        true,
        both_ways(),
    );
    s.find_neighbors(QueryVariant::AllPairs { points_changed: true }).unwrap();
    assert_eq!(neighbors_of(&s, set, 0), HashSet::from([1]));

    *s.point_set_mut(set).point_mut(1) = [3.0, 0.0, 0.0];
    s.update_point_sets().unwrap();

    s.find_neighbors(QueryVariant::AllPairs { points_changed: true }).unwrap();
    assert_eq!(neighbors_of(&s, set, 0), HashSet::new());
}

#[test]
fn resize_point_set_grows_and_shrinks_cell_membership() {
    let mut s = Searcher::<f64>::builder().radius(1.0).build();
    let set = s.add_point_set(
        vec![[0.0, 0.0, 0.0], [0.5, 0.0, 0.0]],
        2,
        true,
        both_ways(),
    );
    s.find_neighbors(QueryVariant::AllPairs { points_changed: true }).unwrap();
    assert_eq!(neighbors_of(&s, set, 0), HashSet::from([1]));

    // Grow to three points, the new one a neighbor of point 0.
    s.resize_point_set(
        set,
        vec![[0.0, 0.0, 0.0], [0.5, 0.0, 0.0], [0.2, 0.0, 0.0]],
        3,
    )
    .unwrap();
    s.find_neighbors(QueryVariant::AllPairs { points_changed: true }).unwrap();
    assert_eq!(neighbors_of(&s, set, 0), HashSet::from([1, 2]));

    // Shrink back down to one point.
    s.resize_point_set(set, vec![[0.0, 0.0, 0.0]], 1).unwrap();
    s.find_neighbors(QueryVariant::AllPairs { points_changed: true }).unwrap();
    assert_eq!(neighbors_of(&s, set, 0), HashSet::new());
}

#[test]
fn scenario_6_uniform_lattice_interior_points_have_six_neighbors() {
    let spacing = 0.9_f64;
    let dim = 10usize; // 10^3 = 1000 points
    let mut positions = Vec::with_capacity(dim * dim * dim);
    for x in 0..dim {
        for y in 0..dim {
            for z in 0..dim {
                positions.push([x as f64 * spacing, y as f64 * spacing, z as f64 * spacing]);
            }
        }
    }

    let mut s = Searcher::<f64>::builder().radius(1.0).build();
    let set = s.add_point_set(positions, dim * dim * dim, true, both_ways());
    s.find_neighbors(QueryVariant::AllPairs { points_changed: true }).unwrap();

    let idx = |x: usize, y: usize, z: usize| x * dim * dim + y * dim + z;
    // Interior points (not touching any face) must have exactly 6 neighbors.
    for x in 1..dim - 1 {
        for y in 1..dim - 1 {
            for z in 1..dim - 1 {
                let count = s.point_set(set).neighbor_count(set, idx(x, y, z));
                assert_eq!(count, 6, "interior point ({x},{y},{z}) had {count} neighbors");
            }
        }
    }
}

#[test]
fn activation_matrix_stays_square_after_edits() {
    let mut s = Searcher::<f64>::builder().radius(1.0).build();
    s.add_point_set(vec![[0.0, 0.0, 0.0]], 1, false, both_ways());
    s.add_point_set(vec![[1.0, 0.0, 0.0]], 1, false, both_ways());
    s.add_point_set(vec![[2.0, 0.0, 0.0]], 1, false, both_ways());
    s.set_active(ActivationEdit::Pair(0, 2, true));
    s.set_active(ActivationEdit::All(false));
    assert_eq!(s.set_count(), 3);
}

#[test]
fn radius_correctness_excludes_points_on_the_boundary() {
    let mut s = Searcher::<f64>::builder().radius(1.0).build();
    let set = s.add_point_set(
        vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]],
        2,
        true,
        both_ways(),
    );
    s.find_neighbors(QueryVariant::AllPairs { points_changed: true }).unwrap();
    // Distance is exactly r, so d^2 == r^2 is NOT strictly less than r^2.
    assert_eq!(neighbors_of(&s, set, 0), HashSet::new());
    assert_eq!(neighbors_of(&s, set, 1), HashSet::new());
}

#[test]
fn refresh_is_idempotent_without_position_changes() {
    let mut s = Searcher::<f64>::builder().radius(1.0).build();
    let set = s.add_point_set(
        vec![[0.0, 0.0, 0.0], [0.5, 0.0, 0.0], [5.0, 5.0, 5.0]],
        3,
        true,
        both_ways(),
    );
    s.refresh(None).unwrap();
    s.find_neighbors(QueryVariant::AllPairs { points_changed: true }).unwrap();
    let first: Vec<HashSet<u32>> = (0..3).map(|i| neighbors_of(&s, set, i)).collect();

    s.refresh(None).unwrap();
    s.find_neighbors(QueryVariant::AllPairs { points_changed: true }).unwrap();
    let second: Vec<HashSet<u32>> = (0..3).map(|i| neighbors_of(&s, set, i)).collect();

    assert_eq!(first, second);
}

#[test]
fn single_point_in_set_excludes_self_and_respects_activation() {
    let mut s = Searcher::<f64>::builder().radius(1.0).build();
    let set = s.add_point_set(
        vec![[0.0, 0.0, 0.0], [0.5, 0.0, 0.0]],
        2,
        true,
        ActivationFlags {
            search_neighbors: false,
            find_neighbors: false,
        },
    );
    s.set_active(ActivationEdit::Pair(set, set, true));

    let hits = s
        .find_neighbors(QueryVariant::SinglePointInSet {
            set_id: set,
            point_id: 0,
        })
        .unwrap()
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, 1);
}

#[test]
fn single_point_query_ignores_activation_and_finds_across_sets() {
    let mut s = Searcher::<f64>::builder().radius(1.0).build();
    s.add_point_set(
        vec![[0.0, 0.0, 0.0]],
        1,
        true,
        ActivationFlags {
            search_neighbors: false,
            find_neighbors: false,
        },
    );
    s.add_point_set(
        vec![[0.5, 0.0, 0.0]],
        1,
        true,
        ActivationFlags {
            search_neighbors: false,
            find_neighbors: false,
        },
    );

    let hits = s
        .find_neighbors(QueryVariant::SinglePoint {
            position: [0.0, 0.0, 0.0],
        })
        .unwrap()
        .unwrap();
    let ids: HashSet<(usize, u32)> = hits.into_iter().map(|n| (n.set_id, n.id)).collect();
    assert!(ids.contains(&(1, 0)));
}

#[cfg(feature = "rayon")]
#[test]
fn edge_set_is_independent_of_worker_count() {
    let build_and_query = |workers: usize| {
        let mut s = Searcher::<f64>::builder().radius(1.0).workers(workers).build();
        let set = s.add_point_set(
            (0..64)
                .map(|i| [(i % 4) as f64 * 0.3, (i / 4 % 4) as f64 * 0.3, (i / 16) as f64 * 0.3])
                .collect(),
            64,
            true,
            both_ways(),
        );
        s.find_neighbors(QueryVariant::AllPairs { points_changed: true }).unwrap();
        (0..64)
            .flat_map(|i| {
                neighbors_of(&s, set, i)
                    .into_iter()
                    .map(move |j| if i < j as usize { (i as u32, j) } else { (j, i as u32) })
            })
            .collect::<HashSet<_>>()
    };

    let single = build_and_query(1);
    let multi = build_and_query(4);
    assert_eq!(single, multi);
}
