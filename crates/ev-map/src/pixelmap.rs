use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;

use ev_core::{DIRS, EdgeGrid, Point2f, Xy};
use ev_fit::{FitParams, fit_chain, refit_chain};
use ev_graph::{ChainId, Node, PixelChain, Segment, ThicknessPx};
use ev_index::{SegmentIndex, SegmentRef};
use ev_trace::{Tracer, classify, classify_cells, trace_all};

/// Fitting and rendering knobs shared by every chain of a map.
#[derive(Debug, Clone)]
pub struct MapConfig {
    /// Straight-fit tolerance in pixels.
    pub tolerance_px: f32,
    /// Multiplier applied to the tolerance when judging curve merges.
    pub curve_preference: f32,
    /// Stroke width per thickness class, in pixels.
    pub thickness_px: ThicknessPx,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            tolerance_px: 1.0,
            curve_preference: 1.0,
            thickness_px: ThicknessPx::default(),
        }
    }
}

impl MapConfig {
    pub(crate) fn fit_params(&self, height: usize) -> FitParams {
        FitParams::from_pixels(self.tolerance_px, self.curve_preference, height)
    }
}

/// Vector planar graph over an edge bitmap.
///
/// Holds the flag grid, the node registry, the fitted chains and the spatial
/// segment index, and keeps all four consistent across edits. Chains are
/// keyed by [`ChainId`]; ids are never reused within one map.
///
/// Singleton pixels (edge pixels with no edge neighbour) stay flagged in the
/// grid but never enter the node registry and belong to no chain.
#[derive(Debug, Clone)]
pub struct PixelMap {
    pub(crate) grid: EdgeGrid,
    pub(crate) nodes: BTreeMap<Xy, Node>,
    pub(crate) chains: BTreeMap<ChainId, PixelChain>,
    pub(crate) index: SegmentIndex,
    pub(crate) config: MapConfig,
    pub(crate) next_chain: u32,
    pub(crate) auto_track: bool,
    pub(crate) pending: Vec<Xy>,
}

impl PixelMap {
    /// A map with no edge pixels at all.
    pub fn empty(width: usize, height: usize, is_360: bool, config: MapConfig) -> Self {
        Self::with_grid(EdgeGrid::new(width, height, is_360), config)
    }

    /// Vectorizes a row-major mask where nonzero bytes are edge pixels.
    pub fn from_bitmap(
        width: usize,
        height: usize,
        is_360: bool,
        edges: &[u8],
        config: MapConfig,
    ) -> Result<Self, ev_core::Error> {
        let grid = EdgeGrid::from_edges(width, height, is_360, edges)?;
        Ok(Self::from_grid(grid, config))
    }

    /// Vectorizes an existing grid: classifies nodes, traces every chain and
    /// fits them all in parallel.
    pub fn from_grid(mut grid: EdgeGrid, config: MapConfig) -> Self {
        classify(&mut grid);
        let runs = trace_all(&mut grid);

        let params = config.fit_params(grid.height());
        let fitted: Vec<PixelChain> = runs
            .par_iter()
            .map(|run| fit_chain(&grid, run, &params))
            .collect();

        let mut map = Self::with_grid(grid, config);
        map.register_classified_nodes();
        for chain in fitted {
            map.install_chain(chain);
        }
        map
    }

    /// Wraps an already classified and traced grid without touching it.
    pub(crate) fn with_grid(grid: EdgeGrid, config: MapConfig) -> Self {
        let index = SegmentIndex::new(&grid);
        Self {
            grid,
            nodes: BTreeMap::new(),
            chains: BTreeMap::new(),
            index,
            config,
            next_chain: 0,
            auto_track: true,
            pending: Vec::new(),
        }
    }

    /// Registers every NODE-flagged pixel with at least one edge neighbour.
    /// Singletons keep their flag but stay out of the registry.
    pub(crate) fn register_classified_nodes(&mut self) {
        let nodes: Vec<Xy> = self
            .grid
            .positions()
            .filter(|&p| self.grid.is_node(p) && self.grid.count_edge_neighbours(p) > 0)
            .collect();
        for p in nodes {
            self.nodes.entry(p).or_insert_with(|| Node::new(p));
        }
    }

    pub fn grid(&self) -> &EdgeGrid {
        &self.grid
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    /// Swaps the fitting knobs and refits every chain under them. Index
    /// footprints depend on the stroke widths, so the refit is not optional.
    pub fn set_config(&mut self, config: MapConfig) {
        self.config = config;
        self.reapproximate();
    }

    pub fn width(&self) -> usize {
        self.grid.width()
    }

    pub fn height(&self) -> usize {
        self.grid.height()
    }

    pub fn is_360(&self) -> bool {
        self.grid.is_360()
    }

    pub fn chains(&self) -> impl Iterator<Item = (ChainId, &PixelChain)> + '_ {
        self.chains.iter().map(|(&id, chain)| (id, chain))
    }

    pub fn chain_count(&self) -> usize {
        self.chains.len()
    }

    pub fn chain(&self, id: ChainId) -> Option<&PixelChain> {
        self.chains.get(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Registry entry at a pixel, if that pixel is a registered node.
    pub fn node_at(&self, p: Xy) -> Option<&Node> {
        self.nodes.get(&self.grid.normalize(p))
    }

    pub fn index(&self) -> &SegmentIndex {
        &self.index
    }

    pub fn auto_track_changes(&self) -> bool {
        self.auto_track
    }

    /// Stroke width of a chain under the current thickness table.
    pub fn draw_px(&self, chain: &PixelChain) -> f32 {
        chain.thickness().draw_px(&self.config.thickness_px)
    }

    /// Segments whose indexed footprint intersects the unit-space rectangle.
    pub fn segments_in_rect(&self, min: Point2f, max: Point2f) -> Vec<SegmentRef> {
        self.index.lookup_rect(min, max)
    }

    /// Closest segment to `p` within `max_radius_px`, with its unit-space
    /// distance.
    pub fn nearest_segment(&self, p: Point2f, max_radius_px: f32) -> Option<(SegmentRef, f32)> {
        self.index
            .nearest_segment(p, |sref| self.segment(sref), max_radius_px)
    }

    /// Resolves a segment reference against the live chain set.
    pub fn segment(&self, sref: SegmentRef) -> Option<&Segment> {
        self.chains
            .get(&sref.chain)
            .and_then(|c| c.segments().get(sref.segment as usize))
    }

    /// Refits every chain against the current config. Pixels, nodes and ids
    /// are untouched; vertices and segments are rebuilt in parallel.
    pub fn reapproximate(&mut self) {
        let params = self.config.fit_params(self.grid.height());
        let grid = &self.grid;
        let refit: Vec<(ChainId, PixelChain)> = self
            .chains
            .par_iter()
            .map(|(&id, chain)| (id, refit_chain(grid, chain, &params)))
            .collect();

        let mut index = SegmentIndex::new(&self.grid);
        for (id, chain) in &refit {
            index.insert_chain(*id, chain, self.draw_px(chain));
        }
        self.index = index;
        self.chains = refit.into_iter().collect();
    }

    /// Installs a fitted chain under a fresh id.
    pub(crate) fn install_chain(&mut self, chain: PixelChain) -> ChainId {
        let id = ChainId(self.next_chain);
        self.install_chain_with_id(id, chain);
        id
    }

    /// Installs a fitted chain under a caller-chosen id, indexing its
    /// segments and attaching both endpoints to the node registry.
    pub(crate) fn install_chain_with_id(&mut self, id: ChainId, chain: PixelChain) {
        self.next_chain = self.next_chain.max(id.0.saturating_add(1));

        self.index.insert_chain(id, &chain, self.draw_px(&chain));
        let (a, b) = chain.endpoints();
        self.attach_endpoint(a, id);
        if b != a {
            self.attach_endpoint(b, id);
        }
        self.chains.insert(id, chain);
    }

    fn attach_endpoint(&mut self, p: Xy, id: ChainId) {
        self.nodes
            .entry(p)
            .or_insert_with(|| Node::new(p))
            .chains
            .insert(id);
    }

    /// Removes a chain from the map, the index and both endpoints' incident
    /// sets. Node registry entries are left in place even when they become
    /// empty; callers decide whether the node itself survives.
    pub(crate) fn remove_chain_entry(&mut self, id: ChainId) -> Option<PixelChain> {
        let chain = self.chains.remove(&id)?;
        self.index.remove_chain(id, &chain, self.draw_px(&chain));

        let (a, b) = chain.endpoints();
        if let Some(node) = self.nodes.get_mut(&a) {
            node.chains.remove(&id);
        }
        if b != a
            && let Some(node) = self.nodes.get_mut(&b)
        {
            node.chains.remove(&id);
        }
        Some(chain)
    }

    /// Rebuilds the graph in the neighbourhood of edited cells.
    ///
    /// The affected region is the edited cells plus their neighbours, widened
    /// by whatever reclassification erases. Chains covering any region pixel
    /// are dropped and their corridors retraced; chains wholly outside keep
    /// their links seeded so tracing never walks into them.
    pub(crate) fn rebuild_around(&mut self, cells: &[Xy]) {
        let mut region: BTreeSet<Xy> = BTreeSet::new();
        for &c in cells {
            if !self.grid.contains(c) {
                continue;
            }
            let c = self.grid.normalize(c);
            region.insert(c);
            for dir in DIRS {
                if let Some(q) = self.grid.neighbour(c, dir) {
                    region.insert(q);
                }
            }
        }
        if region.is_empty() {
            return;
        }

        // Bristle pruning may erase pixels past the initial neighbourhood.
        let erased = classify_cells(&mut self.grid, cells);
        for p in erased {
            region.insert(p);
            for dir in DIRS {
                if let Some(q) = self.grid.neighbour(p, dir) {
                    region.insert(q);
                }
            }
        }

        let doomed: Vec<ChainId> = self
            .chains
            .iter()
            .filter(|(_, chain)| chain.pixels().iter().any(|p| region.contains(p)))
            .map(|(&id, _)| id)
            .collect();

        let mut starts: BTreeSet<Xy> = BTreeSet::new();
        for id in doomed {
            if let Some(chain) = self.remove_chain_entry(id) {
                let (a, b) = chain.endpoints();
                starts.insert(a);
                starts.insert(b);
            }
        }

        // A dropped chain can end past the classified region, and the flag
        // there may be owed to the chain alone: a ring's anchor is a node
        // with just its own two corridor neighbours. Reclassify such
        // endpoints and widen the region so the sweep below covers them.
        let outside: Vec<Xy> = starts
            .iter()
            .copied()
            .filter(|p| !region.contains(p))
            .collect();
        if !outside.is_empty() {
            let erased = classify_cells(&mut self.grid, &outside);
            for p in outside.into_iter().chain(erased) {
                region.insert(p);
                for dir in DIRS {
                    if let Some(q) = self.grid.neighbour(p, dir) {
                        region.insert(q);
                    }
                }
            }
        }

        // Reconcile the registry with the reclassified flags. Pixels that
        // became nodes seed new walks; pixels that stopped being nodes (or
        // stopped being edges) leave the registry.
        for &p in &region {
            if self.grid.is_node(p) && self.grid.count_edge_neighbours(p) > 0 {
                self.nodes.entry(p).or_insert_with(|| Node::new(p));
                starts.insert(p);
            } else if let Some(node) = self.nodes.get(&p) {
                debug_assert!(
                    node.chains.is_empty(),
                    "demoted node {p:?} still has incident chains"
                );
                self.nodes.remove(&p);
            }
        }
        starts.retain(|&p| self.nodes.contains_key(&p));

        // Seed the links of every intact chain incident to a start so walks
        // stop at their borders instead of retracing them.
        let mut tracer = Tracer::new(&self.grid);
        let mut seeded: BTreeSet<ChainId> = BTreeSet::new();
        for p in &starts {
            if let Some(node) = self.nodes.get(p) {
                for &id in &node.chains {
                    if let Some(chain) = self.chains.get(&id)
                        && seeded.insert(id)
                    {
                        tracer.seed_chain(&self.grid, chain.pixels());
                    }
                }
            }
        }

        let start_list: Vec<Xy> = starts.into_iter().collect();
        let mut runs = tracer.trace_from_nodes(&mut self.grid, &start_list);
        let region_cells: Vec<Xy> = region.into_iter().collect();
        runs.extend(tracer.scan_loops(&mut self.grid, &region_cells));

        let params = self.config.fit_params(self.grid.height());
        for run in runs {
            let chain = fit_chain(&self.grid, &run, &params);
            self.install_chain(chain);
        }

        crate::validate::debug_validate(self);
    }
}
