//! Spatial lookup accelerator for chain segments.
//!
//! The index maps pixel-sized grid cells to the segments whose expanded
//! bounding box touches them, so proximity queries only run the exact
//! distance check against a handful of candidates instead of every segment
//! in the map. Cells are keyed in pixel units; segment geometry stays in
//! unit space. On 360 bitmaps the x key wraps, and distance checks try
//! the query point at both sides of the seam.

use std::collections::HashMap;

use ev_core::{EdgeGrid, Point2f};
use ev_graph::{ChainId, PixelChain, Segment};

/// One segment of one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentRef {
    pub chain: ChainId,
    pub segment: u32,
}

#[derive(Debug, Clone)]
pub struct SegmentIndex {
    cells: HashMap<(i32, i32), Vec<SegmentRef>>,
    width: i32,
    px_per_unit: f32,
    wrap: bool,
}

impl SegmentIndex {
    pub fn new(grid: &EdgeGrid) -> Self {
        Self {
            cells: HashMap::new(),
            width: grid.width() as i32,
            px_per_unit: grid.height().max(1) as f32,
            wrap: grid.is_360(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cell containing a unit-space point.
    pub fn cell_of(&self, p: Point2f) -> (i32, i32) {
        (
            (p.x * self.px_per_unit).floor() as i32,
            (p.y * self.px_per_unit).floor() as i32,
        )
    }

    fn key(&self, cx: i32, cy: i32) -> (i32, i32) {
        if self.wrap {
            (cx.rem_euclid(self.width.max(1)), cy)
        } else {
            (cx, cy)
        }
    }

    fn cell_span(&self, seg: &Segment, margin_px: f32) -> ((i32, i32), (i32, i32)) {
        let (min, max) = seg.bounds();
        let m = margin_px / self.px_per_unit;
        (
            self.cell_of(Point2f {
                x: min.x - m,
                y: min.y - m,
            }),
            self.cell_of(Point2f {
                x: max.x + m,
                y: max.y + m,
            }),
        )
    }

    /// Record every segment of `chain` in the cells its bounding box,
    /// expanded by `margin_px`, touches.
    pub fn insert_chain(&mut self, id: ChainId, chain: &PixelChain, margin_px: f32) {
        for (i, seg) in chain.segments().iter().enumerate() {
            let sref = SegmentRef {
                chain: id,
                segment: i as u32,
            };
            let ((x0, y0), (x1, y1)) = self.cell_span(seg, margin_px);
            for cy in y0..=y1 {
                for cx in x0..=x1 {
                    let k = self.key(cx, cy);
                    self.cells.entry(k).or_default().push(sref);
                }
            }
        }
    }

    /// Drop every entry of `id` from the cells `chain` was inserted into.
    /// Must be called with the same chain value and margin used at insert.
    pub fn remove_chain(&mut self, id: ChainId, chain: &PixelChain, margin_px: f32) {
        for seg in chain.segments() {
            let ((x0, y0), (x1, y1)) = self.cell_span(seg, margin_px);
            for cy in y0..=y1 {
                for cx in x0..=x1 {
                    let k = self.key(cx, cy);
                    if let Some(refs) = self.cells.get_mut(&k) {
                        refs.retain(|r| r.chain != id);
                        if refs.is_empty() {
                            self.cells.remove(&k);
                        }
                    }
                }
            }
        }
    }

    pub fn lookup_cell(&self, cx: i32, cy: i32) -> &[SegmentRef] {
        self.cells
            .get(&self.key(cx, cy))
            .map_or(&[], Vec::as_slice)
    }

    /// De-duplicated candidates over a unit-space rectangle.
    pub fn lookup_rect(&self, min: Point2f, max: Point2f) -> Vec<SegmentRef> {
        let (x0, y0) = self.cell_of(min);
        let (x1, y1) = self.cell_of(max);
        let mut out = Vec::new();
        for cy in y0..=y1 {
            for cx in x0..=x1 {
                out.extend_from_slice(self.lookup_cell(cx, cy));
            }
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    /// De-duplicated candidates within `radius_px` of `p`.
    pub fn lookup_near(&self, p: Point2f, radius_px: f32) -> Vec<SegmentRef> {
        let r = radius_px / self.px_per_unit;
        self.lookup_rect(
            Point2f {
                x: p.x - r,
                y: p.y - r,
            },
            Point2f {
                x: p.x + r,
                y: p.y + r,
            },
        )
    }

    /// Closest segment to `p` within `max_radius_px`, with its unit-space
    /// distance. Cells are visited in expanding rings; the search stops once
    /// the next ring cannot beat the best hit.
    pub fn nearest_segment<'a, C>(
        &self,
        p: Point2f,
        chains: C,
        max_radius_px: f32,
    ) -> Option<(SegmentRef, f32)>
    where
        C: Fn(SegmentRef) -> Option<&'a Segment>,
    {
        let (cx, cy) = self.cell_of(p);
        let max_ring = max_radius_px.ceil() as i32 + 1;
        let mut seen: Vec<SegmentRef> = Vec::new();
        let mut best: Option<(SegmentRef, f32)> = None;

        for ring in 0..=max_ring {
            if let Some((_, d)) = best {
                if (ring - 1) as f32 > d * self.px_per_unit {
                    break;
                }
            }
            self.for_ring(cx, cy, ring, |cell| {
                for &sref in self.lookup_cell(cell.0, cell.1) {
                    if seen.contains(&sref) {
                        continue;
                    }
                    seen.push(sref);
                    let Some(seg) = chains(sref) else {
                        continue;
                    };
                    let d = self.distance(seg, p);
                    let in_range = d * self.px_per_unit <= max_radius_px;
                    if in_range && best.is_none_or(|(_, bd)| d < bd) {
                        best = Some((sref, d));
                    }
                }
            });
        }
        best
    }

    fn for_ring(&self, cx: i32, cy: i32, r: i32, mut f: impl FnMut((i32, i32))) {
        if r == 0 {
            f((cx, cy));
            return;
        }
        for x in cx - r..=cx + r {
            f((x, cy - r));
            f((x, cy + r));
        }
        for y in cy - r + 1..cy + r {
            f((cx - r, y));
            f((cx + r, y));
        }
    }

    /// Exact distance, probing across the seam on 360 bitmaps.
    fn distance(&self, seg: &Segment, p: Point2f) -> f32 {
        let d = seg.distance_to(p);
        if !self.wrap {
            return d;
        }
        let w = self.width as f32 / self.px_per_unit;
        d.min(seg.distance_to(Point2f { x: p.x + w, y: p.y }))
            .min(seg.distance_to(Point2f { x: p.x - w, y: p.y }))
    }
}
