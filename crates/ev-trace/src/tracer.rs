use ev_core::{DIRS, EdgeGrid, Xy, opposite_dir};

/// Distinct pixels a chain must hold before it may close on its start node.
pub const MIN_LOOP_PIXELS: usize = 5;

/// Chains with this many pixels or fewer are discarded as noise.
pub const MIN_CHAIN_PIXELS: usize = 3;

/// Chain walker with per-pixel link marks.
///
/// Every traversed link is marked in both directions, so each corridor is
/// walked exactly once no matter which end it is entered from. For
/// incremental rebuilds the marks can be pre-seeded from chains that
/// survive the edit, which keeps re-tracing from boundary nodes from
/// duplicating them.
pub struct Tracer {
    used: Vec<u8>,
}

struct Walk {
    pixels: Vec<Xy>,
    ensured: Option<Xy>,
}

impl Tracer {
    pub fn new(grid: &EdgeGrid) -> Self {
        Self {
            used: vec![0; grid.len()],
        }
    }

    /// Marks every link along an existing chain as consumed.
    pub fn seed_chain(&mut self, grid: &EdgeGrid, pixels: &[Xy]) {
        for w in pixels.windows(2) {
            if let Some(dir) = dir_between(grid, w[0], w[1]) {
                self.mark_link(grid, w[0], dir, w[1]);
            }
        }
    }

    /// Walks every unconsumed corridor leaving the given node positions.
    /// Danglers register their terminal pixel as a node and are queued as
    /// further start points. Runs of `MIN_CHAIN_PIXELS` or fewer pixels are
    /// dropped.
    pub fn trace_from_nodes(&mut self, grid: &mut EdgeGrid, nodes: &[Xy]) -> Vec<Vec<Xy>> {
        let mut queue: Vec<Xy> = nodes.iter().map(|&n| grid.normalize(n)).collect();
        let mut chains = Vec::new();
        let mut qi = 0;

        while qi < queue.len() {
            let n = queue[qi];
            qi += 1;
            if !grid.is_node(n) {
                continue;
            }

            for dir in DIRS {
                let Some(first) = grid.neighbour(n, dir) else {
                    continue;
                };
                if !grid.is_edge(first) || self.link_used(grid, n, dir) {
                    continue;
                }

                let walk = self.walk(grid, n, first, dir);
                if let Some(e) = walk.ensured {
                    queue.push(e);
                }
                if walk.pixels.len() >= MIN_CHAIN_PIXELS {
                    chains.push(walk.pixels);
                }
            }
        }

        chains
    }

    /// Finds components with no node at all among `cells`, anchors each at
    /// its first unconsumed pixel, and walks the loop back to the anchor.
    /// Rings too short to close are erased from the grid.
    pub fn scan_loops(&mut self, grid: &mut EdgeGrid, cells: &[Xy]) -> Vec<Vec<Xy>> {
        let mut chains = Vec::new();
        for &c in cells {
            let c = grid.normalize(c);
            if !grid.is_edge(c) || grid.is_node(c) {
                continue;
            }

            for dir in DIRS {
                let Some(first) = grid.neighbour(c, dir) else {
                    continue;
                };
                if !grid.is_edge(first) || self.link_used(grid, c, dir) {
                    continue;
                }

                grid.set_node(c, true);
                let walk = self.walk(grid, c, first, dir);
                let closed = walk.pixels.len() > 1 && walk.pixels.last() == Some(&c);
                if closed {
                    chains.push(walk.pixels);
                } else {
                    // A ring below the closing threshold. Nothing consistent
                    // can be built from it, so it goes away entirely.
                    for &p in &walk.pixels {
                        grid.set_edge(p, false);
                    }
                }
            }
        }
        chains
    }

    fn walk(&mut self, grid: &mut EdgeGrid, start: Xy, first: Xy, dir0: u8) -> Walk {
        let mut pixels = vec![start];
        let mut prev = start;
        let mut cur = first;
        let mut dir = dir0;
        let mut ensured = None;

        let max_steps = grid.len() + 1;
        for _ in 0..max_steps {
            self.mark_link(grid, prev, dir, cur);
            pixels.push(cur);

            if cur == start {
                break;
            }
            if grid.is_node(cur) {
                break;
            }

            match self.next_step(grid, cur, prev, start, pixels.len()) {
                Some((next_dir, next)) => {
                    prev = cur;
                    cur = next;
                    dir = next_dir;
                }
                None => {
                    // Dangling end: the terminal pixel becomes a node.
                    grid.set_node(cur, true);
                    ensured = Some(cur);
                    break;
                }
            }
        }

        Walk { pixels, ensured }
    }

    fn next_step(
        &self,
        grid: &EdgeGrid,
        cur: Xy,
        prev: Xy,
        start: Xy,
        count: usize,
    ) -> Option<(u8, Xy)> {
        let mut cont = None;
        for dir in DIRS {
            let Some(nb) = grid.neighbour(cur, dir) else {
                continue;
            };
            if !grid.is_edge(nb) || nb == prev || self.link_used(grid, cur, dir) {
                continue;
            }
            if nb == start && count < MIN_LOOP_PIXELS {
                continue;
            }
            if grid.is_node(nb) {
                // Branch points end the chain immediately.
                return Some((dir, nb));
            }
            if cont.is_none() {
                cont = Some((dir, nb));
            }
        }
        cont
    }

    fn link_used(&self, grid: &EdgeGrid, p: Xy, dir: u8) -> bool {
        grid.index_of(p)
            .is_some_and(|i| self.used[i] & (1_u8 << dir) != 0)
    }

    fn mark_link(&mut self, grid: &EdgeGrid, a: Xy, dir_ab: u8, b: Xy) {
        if let Some(i) = grid.index_of(a) {
            self.used[i] |= 1_u8 << dir_ab;
        }
        if let Some(j) = grid.index_of(b) {
            self.used[j] |= 1_u8 << opposite_dir(dir_ab);
        }
    }
}

fn dir_between(grid: &EdgeGrid, a: Xy, b: Xy) -> Option<u8> {
    DIRS.into_iter()
        .find(|&dir| grid.neighbour(a, dir) == Some(b))
}

/// Traces every chain in a classified grid: first all corridors incident to
/// registered nodes, then the pure-loop components.
pub fn trace_all(grid: &mut EdgeGrid) -> Vec<Vec<Xy>> {
    let cells: Vec<Xy> = grid.positions().collect();
    let nodes: Vec<Xy> = cells
        .iter()
        .copied()
        .filter(|&p| grid.is_node(p) && grid.count_edge_neighbours(p) > 0)
        .collect();

    let mut tracer = Tracer::new(grid);
    let mut chains = tracer.trace_from_nodes(grid, &nodes);
    chains.extend(tracer.scan_loops(grid, &cells));
    chains
}

#[cfg(test)]
mod tests {
    use super::{Tracer, trace_all};
    use crate::classify::classify;
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

    fn classified(rows: &[&str]) -> EdgeGrid {
        let mut g = grid_from(rows);
        classify(&mut g);
        g
    }

    #[test]
    fn straight_line_is_one_chain() {
        let mut g = classified(&[
            "..........",
            ".########.",
            "..........",
        ]);
        let chains = trace_all(&mut g);

        assert_eq!(chains.len(), 1);
        let c = &chains[0];
        assert_eq!(c.len(), 8);
        let ends = [c[0], c[c.len() - 1]];
        assert!(ends.contains(&Xy::new(1, 1)));
        assert!(ends.contains(&Xy::new(8, 1)));
    }

    #[test]
    fn t_junction_produces_three_chains() {
        let mut g = classified(&[
            ".........",
            "....#....",
            "....#....",
            "....#....",
            "....#....",
            "....#....",
            "....#....",
            "....#....",
            ".........",
        ]);
        // Grow a horizontal arm to the right of the vertical line's middle.
        for x in 5..=7 {
            g.set_edge(Xy::new(x, 4), true);
        }
        classify(&mut g);
        let chains = trace_all(&mut g);

        assert_eq!(chains.len(), 3);
        for c in &chains {
            assert!(c.len() >= 3);
        }
    }

    #[test]
    fn diamond_ring_becomes_anchored_loop() {
        // Every pixel has exactly two neighbours, so no node exists anywhere.
        let mut g = classified(&[
            ".......",
            "...#...",
            "..#.#..",
            ".#...#.",
            "..#.#..",
            "...#...",
            ".......",
        ]);
        assert!(g.positions().all(|p| !g.is_node(p)));

        let chains = trace_all(&mut g);

        assert_eq!(chains.len(), 1);
        let c = &chains[0];
        assert_eq!(c.first(), c.last());
        assert_eq!(c.len(), 9);

        let anchor = c[0];
        assert!(g.is_node(anchor));
        assert_eq!(g.count_edge_neighbours(anchor), 2);
    }

    #[test]
    fn tiny_ring_is_erased() {
        let mut g = classified(&[
            ".....",
            ".##..",
            ".#...",
            ".....",
        ]);
        // Three mutually adjacent pixels, each of degree 2.
        assert!(!g.is_node(Xy::new(1, 1)));
        let chains = trace_all(&mut g);

        assert!(chains.is_empty());
        assert!(g.positions().all(|p| !g.is_edge(p)));
    }

    #[test]
    fn three_pixel_chain_is_kept() {
        let mut g = classified(&[
            ".....",
            ".###.",
            ".....",
        ]);
        // Ends are nodes, the middle is the only corridor pixel.
        let chains = trace_all(&mut g);
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].len(), 3);
    }

    #[test]
    fn cross_keeps_arms_and_drops_cluster_links() {
        // The centre of the cross classifies as a five-pixel node cluster.
        // Runs between adjacent cluster nodes are too short to keep, so
        // only the four arms survive.
        let mut g = classified(&[
            ".........",
            "....#....",
            "....#....",
            "....#....",
            ".#######.",
            "....#....",
            "....#....",
            "....#....",
            ".........",
        ]);
        let chains = trace_all(&mut g);
        assert_eq!(chains.len(), 4);
        assert!(chains.iter().all(|c| c.len() == 3));
    }

    #[test]
    fn seeded_links_are_not_retraced() {
        let mut g = classified(&[
            "..........",
            ".########.",
            "..........",
        ]);
        let chains = trace_all(&mut g);
        assert_eq!(chains.len(), 1);

        let mut fresh = Tracer::new(&g);
        fresh.seed_chain(&g, &chains[0]);
        let again = fresh.trace_from_nodes(&mut g, &[Xy::new(1, 1), Xy::new(8, 1)]);
        assert!(again.is_empty());
    }

    #[test]
    fn wrapped_row_traces_as_loop() {
        let mut bytes = vec![0_u8; 8 * 3];
        for x in 0..8 {
            bytes[8 + x] = 1;
        }
        let mut g = EdgeGrid::from_edges(8, 3, true, &bytes).expect("valid mask");
        classify(&mut g);
        // Every pixel has two neighbours across the seam, so no nodes.
        assert!(g.positions().all(|p| !g.is_node(p)));

        let chains = trace_all(&mut g);
        assert_eq!(chains.len(), 1);
        let c = &chains[0];
        assert_eq!(c.first(), c.last());
        assert_eq!(c.len(), 9);
    }
}
