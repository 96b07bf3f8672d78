//! Vector planar graph over binary edge bitmaps.
//!
//! [`PixelMap`] is the aggregate root: the flag grid, the node registry,
//! the fitted chain collection and the spatial segment index, kept
//! consistent through every operation. A map is built in one pass from a
//! bitmap (classify, trace, fit in parallel, index), then edited
//! incrementally: pixel flips and chain deletions retrace only the
//! neighbourhood they disturb, batches defer that work to a single
//! consolidated rebuild, and the whole map can be refitted in place when
//! the fitting parameters change.
//!
//! The structural invariants binding grid, registry and chains together
//! are spelled out in [`validate`]; debug builds assert them after every
//! rebuild. Maps serialize to a JSON layout with a run-length-packed grid
//! ([`to_json`] / [`from_json`]); a corrupt payload loads as an empty map
//! rather than an error, since the vector form is always re-derivable
//! from its bitmap.

mod edit;
mod equalize;
mod persist;
mod pixelmap;
mod validate;

pub use equalize::{EqualizeThresholds, EqualizeValues};
pub use persist::{PersistError, from_json, load_or_empty, to_json};
pub use pixelmap::{MapConfig, PixelMap};
pub use validate::{ConsistencyError, debug_validate, validate};

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use ev_core::{Point2f, Xy};

    use super::{MapConfig, PixelMap, validate};

    fn bitmap_from(rows: &[&str]) -> (usize, usize, Vec<u8>) {
        let height = rows.len();
        let width = rows[0].len();
        let mut bytes = Vec::with_capacity(width * height);
        for row in rows {
            for ch in row.bytes() {
                bytes.push(u8::from(ch == b'#'));
            }
        }
        (width, height, bytes)
    }

    fn map_from(rows: &[&str]) -> PixelMap {
        let (width, height, bytes) = bitmap_from(rows);
        PixelMap::from_bitmap(width, height, false, &bytes, MapConfig::default())
            .expect("valid fixture")
    }

    const LINE: &[&str] = &[
        "..........",
        "..........",
        "..........",
        "..........",
        "..........",
        ".########.",
        "..........",
        "..........",
        "..........",
        "..........",
    ];

    #[test]
    fn straight_line_builds_one_chain() {
        let map = map_from(LINE);

        assert_eq!(map.chain_count(), 1);
        assert_eq!(map.node_count(), 2);
        let (_, chain) = map.chains().next().expect("one chain");
        assert_eq!(chain.pixel_count(), 8);
        assert_eq!(chain.segments().len(), 1);
        assert!((chain.length() - 0.7).abs() < 1e-6);

        let end = map.node_at(Xy::new(1, 5)).expect("endpoint registered");
        assert_eq!(end.degree(), 1);
        assert_eq!(validate(&map), Ok(()));
    }

    #[test]
    fn knocking_out_an_interior_pixel_splits_the_chain() {
        let mut map = map_from(LINE);
        map.pixel_off(Xy::new(4, 5)).expect("in bounds");

        assert_eq!(map.chain_count(), 2);
        assert_eq!(map.node_count(), 4);
        let mut counts: Vec<usize> = map.chains().map(|(_, c)| c.pixel_count()).collect();
        counts.sort_unstable();
        assert_eq!(counts, vec![3, 4]);
        assert!(!map.grid().is_edge(Xy::new(4, 5)));
        assert_eq!(validate(&map), Ok(()));
    }

    #[test]
    fn bridging_pixel_merges_two_chains() {
        let mut map = map_from(&[
            "..........",
            "..........",
            "..........",
            "..........",
            "..........",
            ".###.####.",
            "..........",
            "..........",
            "..........",
            "..........",
        ]);
        assert_eq!(map.chain_count(), 2);

        map.pixel_on(Xy::new(4, 5)).expect("in bounds");

        assert_eq!(map.chain_count(), 1);
        assert_eq!(map.node_count(), 2);
        let (_, chain) = map.chains().next().expect("merged chain");
        assert_eq!(chain.pixel_count(), 8);
        assert_eq!(validate(&map), Ok(()));
    }

    #[test]
    fn batched_edits_commit_once() {
        let mut map = map_from(LINE);

        let seen_inside = map.edit_batch(|m| {
            m.pixel_off(Xy::new(4, 5)).expect("in bounds");
            m.pixel_off(Xy::new(6, 5)).expect("in bounds");
            assert!(!m.auto_track_changes());
            // Bookkeeping is deferred: the old chain is still in place.
            m.chain_count()
        });
        assert_eq!(seen_inside, 1);
        assert!(map.auto_track_changes());

        // One consolidated rebuild: x=5 and x=8 are stranded as singletons
        // ((7,5) goes with them as a bristle), only x=1..3 remains a chain.
        assert_eq!(map.chain_count(), 1);
        let (_, chain) = map.chains().next().expect("left stub");
        assert_eq!(chain.pixel_count(), 3);
        for x in [5, 8] {
            let p = Xy::new(x, 5);
            assert!(map.grid().is_edge(p));
            assert!(map.grid().is_node(p));
            assert!(map.node_at(p).is_none());
        }
        assert!(!map.grid().is_edge(Xy::new(7, 5)));
        assert_eq!(validate(&map), Ok(()));
    }

    #[test]
    fn nested_batches_commit_at_the_outermost_level() {
        let mut map = map_from(LINE);

        map.edit_batch(|m| {
            m.edit_batch(|inner| {
                inner.pixel_off(Xy::new(4, 5)).expect("in bounds");
            });
            // The inner batch must not have committed.
            assert_eq!(m.chain_count(), 1);
            assert!(!m.auto_track_changes());
        });

        assert_eq!(map.chain_count(), 2);
        assert_eq!(validate(&map), Ok(()));
    }

    #[test]
    fn tracking_toggle_defers_the_rebuild() {
        let mut map = map_from(LINE);

        map.set_auto_track_changes(false);
        map.pixel_off(Xy::new(4, 5)).expect("in bounds");
        assert_eq!(map.chain_count(), 1);

        map.set_auto_track_changes(true);
        assert_eq!(map.chain_count(), 2);
        assert_eq!(validate(&map), Ok(()));
    }

    #[test]
    fn deleting_a_chain_merges_the_remaining_arms() {
        let mut map = map_from(&[
            ".........",
            ".#######.",
            "....#....",
            "....#....",
            "....#....",
            ".........",
        ]);
        let stem = map
            .chains()
            .find(|(_, c)| c.covers(Xy::new(4, 3)))
            .map(|(id, _)| id)
            .expect("stem chain");

        let removed = map.delete_chain(stem).expect("stem existed");
        assert_eq!(removed.pixel_count(), 3);
        assert!(map.delete_chain(stem).is_none());

        // The stem is gone from the grid and the junction dissolved, so the
        // two arms fuse back into one straight chain.
        for y in 2..=4 {
            assert!(!map.grid().is_edge(Xy::new(4, y)));
        }
        assert_eq!(map.chain_count(), 1);
        assert_eq!(map.node_count(), 2);
        let (_, chain) = map.chains().next().expect("merged arms");
        assert_eq!(chain.pixel_count(), 7);
        assert_eq!(validate(&map), Ok(()));
    }

    #[test]
    fn incremental_rebuild_matches_a_fresh_build() {
        let rows = LINE;
        let mut edited = map_from(rows);
        edited.pixel_off(Xy::new(4, 5)).expect("in bounds");

        let (width, height, mut bytes) = bitmap_from(rows);
        bytes[5 * width + 4] = 0;
        let fresh = PixelMap::from_bitmap(width, height, false, &bytes, MapConfig::default())
            .expect("valid fixture");

        assert_eq!(edited.grid(), fresh.grid());
        let keys = |m: &PixelMap| -> Vec<Xy> { m.nodes().map(|n| n.position).collect() };
        assert_eq!(keys(&edited), keys(&fresh));

        let pixel_sets = |m: &PixelMap| -> BTreeSet<Vec<Xy>> {
            m.chains().map(|(_, c)| c.pixels().to_vec()).collect()
        };
        assert_eq!(pixel_sets(&edited), pixel_sets(&fresh));
    }

    #[test]
    fn opening_a_loop_far_from_its_anchor_matches_a_fresh_build() {
        // A pure ring anchors at its first scanned pixel, at the top here.
        // Knocking out a bottom pixel must demote that anchor back to a
        // corridor even though it sits well outside the edited cells.
        let rows = &[
            "............",
            "............",
            "......#.....",
            ".....#.#....",
            "....#...#...",
            "...#.....#..",
            "..#.......#.",
            "...#.....#..",
            "....#...#...",
            ".....#.#....",
            "......#.....",
            "............",
        ];
        let mut edited = map_from(rows);
        assert_eq!(edited.chain_count(), 1);
        let (_, ring) = edited.chains().next().expect("ring chain");
        assert!(ring.is_loop());
        let anchor = Xy::new(6, 2);
        assert!(edited.node_at(anchor).is_some());

        edited.pixel_off(Xy::new(6, 10)).expect("in bounds");

        assert!(!edited.grid().is_node(anchor));
        assert!(edited.node_at(anchor).is_none());

        let (width, height, mut bytes) = bitmap_from(rows);
        bytes[10 * width + 6] = 0;
        let fresh = PixelMap::from_bitmap(width, height, false, &bytes, MapConfig::default())
            .expect("valid fixture");

        assert_eq!(edited.grid(), fresh.grid());
        let keys = |m: &PixelMap| -> Vec<Xy> { m.nodes().map(|n| n.position).collect() };
        assert_eq!(keys(&edited), keys(&fresh));
        let pixel_sets = |m: &PixelMap| -> BTreeSet<Vec<Xy>> {
            m.chains().map(|(_, c)| c.pixels().to_vec()).collect()
        };
        assert_eq!(pixel_sets(&edited), pixel_sets(&fresh));
        assert_eq!(validate(&edited), Ok(()));
    }

    #[test]
    fn rebuilding_an_unchanged_bitmap_is_identical() {
        let rows = &[
            "...........",
            ".#######...",
            "....#......",
            "....#......",
            "....#..#...",
            "...........",
        ];
        let (width, height, bytes) = bitmap_from(rows);
        let build = || {
            PixelMap::from_bitmap(width, height, false, &bytes, MapConfig::default())
                .expect("valid fixture")
        };
        let a = build();
        let b = build();

        assert_eq!(a.grid(), b.grid());
        let keys = |m: &PixelMap| -> Vec<Xy> { m.nodes().map(|n| n.position).collect() };
        assert_eq!(keys(&a), keys(&b));
        let chains = |m: &PixelMap| -> Vec<_> {
            m.chains().map(|(id, c)| (id, c.clone())).collect()
        };
        assert_eq!(chains(&a), chains(&b));
    }

    #[test]
    fn chains_partition_the_edge_cells() {
        let map = map_from(&[
            "...........",
            ".#######...",
            "....#......",
            "....#......",
            "....#..#...",
            "...........",
        ]);

        let grid = map.grid();
        let edges: BTreeSet<Xy> = grid.positions().filter(|&p| grid.is_edge(p)).collect();

        let mut covered: BTreeSet<Xy> = map.nodes().map(|n| n.position).collect();
        let mut interior_hits: BTreeMap<Xy, usize> = BTreeMap::new();
        for (_, chain) in map.chains() {
            for &p in chain.pixels() {
                covered.insert(p);
                if !grid.is_node(p) {
                    *interior_hits.entry(p).or_default() += 1;
                }
            }
        }
        // Singletons belong to no chain but stay flagged in the grid.
        covered.extend(
            grid.positions()
                .filter(|&p| grid.is_node(p) && grid.count_edge_neighbours(p) == 0),
        );

        assert_eq!(covered, edges);
        assert!(interior_hits.values().all(|&hits| hits == 1));
    }

    #[test]
    fn seam_loop_wraps_and_answers_queries() {
        let mut bytes = vec![0u8; 8 * 4];
        for x in 0..8 {
            bytes[2 * 8 + x] = 1;
        }
        let map =
            PixelMap::from_bitmap(8, 4, true, &bytes, MapConfig::default()).expect("seam fixture");

        assert_eq!(map.chain_count(), 1);
        assert_eq!(map.node_count(), 1);
        let (_, chain) = map.chains().next().expect("seam loop");
        assert!(chain.is_loop());
        assert_eq!(chain.pixel_count(), 9);

        // Query just past the seam, one pixel above the run. The wrapped
        // point lands at (0.05, 0.75), straight over the loop, so the
        // distance is exactly one pixel rather than the diagonal to the
        // unwrapped end.
        let hit = map.nearest_segment(Point2f { x: 2.05, y: 0.75 }, 4.0);
        let (_, dist) = hit.expect("within radius");
        assert!((dist - 0.25).abs() < 1e-3);
        assert_eq!(validate(&map), Ok(()));
    }

    #[test]
    fn set_config_refits_in_place() {
        let mut bytes = vec![0u8; 16 * 16];
        for x in 1..=6 {
            bytes[16 + x] = 1;
        }
        for y in 2..=6 {
            bytes[y * 16 + 6] = 1;
        }
        let mut map =
            PixelMap::from_bitmap(16, 16, false, &bytes, MapConfig::default()).expect("fixture");
        let (id, chain) = map.chains().next().expect("corner chain");
        assert_eq!(chain.segments().len(), 2);
        let pixels = chain.pixels().to_vec();

        map.set_config(MapConfig {
            curve_preference: 2.0,
            ..MapConfig::default()
        });

        let refit = map.chain(id).expect("id survives refits");
        assert_eq!(refit.segments().len(), 1);
        assert!(refit.segments()[0].is_curve());
        assert_eq!(refit.pixels(), pixels);
        assert_eq!(validate(&map), Ok(()));
    }

    #[test]
    fn out_of_bounds_edits_are_rejected() {
        let mut map = map_from(LINE);
        assert!(map.pixel_on(Xy::new(-1, 3)).is_err());
        assert!(map.pixel_off(Xy::new(3, 10)).is_err());

        // In 360 mode the x axis wraps instead.
        let mut seam = PixelMap::empty(8, 4, true, MapConfig::default());
        seam.pixel_on(Xy::new(-1, 2)).expect("wraps");
        assert!(seam.grid().is_edge(Xy::new(7, 2)));
    }
}
