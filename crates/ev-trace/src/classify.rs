use ev_core::{DIRS, EdgeGrid, Xy};

/// Classifies the whole grid. Returns the cells erased as bristles.
pub fn classify(grid: &mut EdgeGrid) -> Vec<Xy> {
    let cells: Vec<Xy> = grid.positions().collect();
    for &c in &cells {
        apply_predicate(grid, c);
    }
    prune_bristles(grid, cells)
}

/// Re-applies the node predicate around `cells` after an edit. The cells'
/// neighbours are recounted too since their degrees may have changed.
/// Returns the cells erased as bristles, which may lie outside `cells`.
pub fn classify_cells(grid: &mut EdgeGrid, cells: &[Xy]) -> Vec<Xy> {
    let mut work = Vec::new();
    for &c in cells {
        if !grid.contains(c) {
            continue;
        }
        let c = grid.normalize(c);
        work.push(c);
        for dir in DIRS {
            if let Some(q) = grid.neighbour(c, dir) {
                work.push(q);
            }
        }
    }
    work.sort_unstable();
    work.dedup();

    for &c in &work {
        apply_predicate(grid, c);
    }
    prune_bristles(grid, work)
}

fn apply_predicate(grid: &mut EdgeGrid, c: Xy) {
    if !grid.is_edge(c) {
        grid.set_node(c, false);
        return;
    }
    let n = grid.count_edge_neighbours(c);
    grid.set_node(c, n != 2);
}

/// A bristle is an edge pixel whose only edge neighbour is a node. No graph
/// assignment of such a pixel is consistent, so it is dropped from the grid
/// and the neighbourhood is reclassified until the erasure settles.
fn is_bristle(grid: &EdgeGrid, c: Xy) -> bool {
    if !grid.is_edge(c) {
        return false;
    }
    let mut nb = grid.edge_neighbours(c);
    let Some((_, only)) = nb.next() else {
        return false;
    };
    if nb.next().is_some() {
        return false;
    }
    grid.is_node(only)
}

fn prune_bristles(grid: &mut EdgeGrid, seed: Vec<Xy>) -> Vec<Xy> {
    let mut work = seed;
    let mut erased = Vec::new();
    while let Some(c) = work.pop() {
        if !is_bristle(grid, c) {
            continue;
        }
        grid.set_edge(c, false);
        erased.push(c);
        for dir in DIRS {
            let Some(q) = grid.neighbour(c, dir) else {
                continue;
            };
            apply_predicate(grid, q);
            work.push(q);
        }
    }
    erased
}

#[cfg(test)]
mod tests {
    use super::{classify, classify_cells};
    use ev_core::{EdgeGrid, Xy};

    fn grid_from(rows: &[&str]) -> EdgeGrid {
        let height = rows.len();
        let width = rows[0].len();
        let mut bytes = Vec::with_capacity(width * height);
        for row in rows {
            for ch in row.bytes() {
                bytes.push(if ch == b'#' { 1 } else { 0 });
            }
        }
        EdgeGrid::from_edges(width, height, false, &bytes).expect("valid fixture")
    }

    #[test]
    fn line_ends_become_nodes() {
        let mut g = grid_from(&[
            "..........",
            "..........",
            ".########.",
            "..........",
        ]);
        classify(&mut g);

        assert!(g.is_node(Xy::new(1, 2)));
        assert!(g.is_node(Xy::new(8, 2)));
        for x in 2..8 {
            assert!(!g.is_node(Xy::new(x, 2)));
        }
    }

    #[test]
    fn junction_and_stem_end_become_nodes() {
        let mut g = grid_from(&[
            ".......",
            ".###...",
            "..#....",
            "..#....",
            "..#....",
            ".......",
        ]);
        classify(&mut g);

        assert!(g.is_node(Xy::new(2, 1)));
        assert!(g.is_node(Xy::new(2, 4)));
        assert!(!g.is_node(Xy::new(2, 3)));
    }

    #[test]
    fn singleton_flagged_but_kept() {
        let mut g = grid_from(&[
            "...",
            ".#.",
            "...",
        ]);
        classify(&mut g);

        let p = Xy::new(1, 1);
        assert!(g.is_edge(p));
        assert!(g.is_node(p));
        assert_eq!(g.count_edge_neighbours(p), 0);
    }

    #[test]
    fn diagonal_stub_on_junction_erased() {
        // Each leaf touches only the centre. Pruning stops as soon as the
        // centre drops to degree 2.
        let mut g = grid_from(&[
            ".....",
            ".#.#.",
            "..#..",
            "...#.",
            ".....",
        ]);
        let erased = classify(&mut g);

        assert_eq!(erased, vec![Xy::new(3, 3)]);
        assert!(!g.is_edge(Xy::new(3, 3)));
        // What remains is a plain two-link path.
        assert!(!g.is_node(Xy::new(2, 2)));
        assert!(g.is_node(Xy::new(1, 1)));
        assert!(g.is_node(Xy::new(3, 1)));
    }

    #[test]
    fn diagonal_cross_prunes_until_path_remains() {
        let mut g = grid_from(&[
            ".....",
            ".#.#.",
            "..#..",
            ".#.#.",
            ".....",
        ]);
        let erased = classify(&mut g);

        assert_eq!(erased.len(), 2);
        let survivors: Vec<Xy> = g.positions().filter(|&p| g.is_edge(p)).collect();
        assert_eq!(survivors.len(), 3);
        assert!(!g.is_node(Xy::new(2, 2)));
    }

    #[test]
    fn two_pixel_island_leaves_one_singleton() {
        let mut g = grid_from(&[
            "....",
            ".##.",
            "....",
        ]);
        classify(&mut g);

        let survivors: Vec<Xy> = g.positions().filter(|&p| g.is_edge(p)).collect();
        assert_eq!(survivors.len(), 1);
        assert!(g.is_node(survivors[0]));
        assert_eq!(g.count_edge_neighbours(survivors[0]), 0);
    }

    #[test]
    fn scoped_reclassification_matches_full() {
        let mut full = grid_from(&[
            "..........",
            ".########.",
            "..........",
        ]);
        classify(&mut full);

        let mut scoped = full.clone();
        // Knock out an interior pixel and reclassify just around it.
        scoped.set_edge(Xy::new(4, 1), false);
        classify_cells(&mut scoped, &[Xy::new(4, 1)]);

        let mut reference = full.clone();
        reference.set_edge(Xy::new(4, 1), false);
        classify(&mut reference);

        assert_eq!(scoped, reference);
        assert!(scoped.is_node(Xy::new(3, 1)));
        assert!(scoped.is_node(Xy::new(5, 1)));
    }
}
