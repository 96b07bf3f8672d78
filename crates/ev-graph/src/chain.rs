use core::fmt;

use ev_core::{Point2f, Xy};

use crate::segment::Segment;
use crate::thickness::Thickness;
use crate::vertex::Vertex;

/// Stable chain identifier, assigned monotonically by the owning map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChainId(pub u32);

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chain {}", self.0)
    }
}

/// Pixel run between two nodes with its fitted geometry.
///
/// `pixels` runs from the start node to the end node; closed loops repeat
/// the anchor position at both ends. The pixel list is never empty.
/// Construction renormalizes segment windows so they tile `[0, length]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelChain {
    pixels: Vec<Xy>,
    vertices: Vec<Vertex>,
    segments: Vec<Segment>,
    thickness: Thickness,
    length: f32,
}

impl PixelChain {
    pub fn new(pixels: Vec<Xy>, vertices: Vec<Vertex>, mut segments: Vec<Segment>) -> Self {
        debug_assert!(!pixels.is_empty());
        debug_assert_eq!(segments.len() + 1, vertices.len().max(1));
        let length = renormalize(&mut segments);
        Self {
            pixels,
            vertices,
            segments,
            thickness: Thickness::None,
            length,
        }
    }

    pub fn with_thickness(mut self, thickness: Thickness) -> Self {
        self.thickness = thickness;
        self
    }

    pub fn pixels(&self) -> &[Xy] {
        &self.pixels
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn thickness(&self) -> Thickness {
        self.thickness
    }

    /// Total arc length in unit coordinates.
    pub fn length(&self) -> f32 {
        self.length
    }

    pub fn pixel_count(&self) -> usize {
        self.pixels.len()
    }

    pub fn first_pixel(&self) -> Xy {
        self.pixels[0]
    }

    pub fn last_pixel(&self) -> Xy {
        self.pixels[self.pixels.len() - 1]
    }

    pub fn endpoints(&self) -> (Xy, Xy) {
        (self.first_pixel(), self.last_pixel())
    }

    pub fn is_loop(&self) -> bool {
        self.pixels.len() > 1 && self.first_pixel() == self.last_pixel()
    }

    /// Pixels strictly between the two endpoint nodes.
    pub fn interior_pixels(&self) -> &[Xy] {
        if self.pixels.len() < 2 {
            &[]
        } else {
            &self.pixels[1..self.pixels.len() - 1]
        }
    }

    pub fn covers(&self, p: Xy) -> bool {
        self.pixels.contains(&p)
    }

    /// Smallest and largest pixel coordinates along the run.
    pub fn pixel_bounds(&self) -> (Xy, Xy) {
        let mut min = self.pixels[0];
        let mut max = self.pixels[0];
        for p in &self.pixels[1..] {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        (min, max)
    }

    /// Point at chain parameter `t` in `[0, length]`.
    pub fn point_at(&self, t: f32) -> Point2f {
        let t = t.clamp(0.0, self.length);
        let i = self.segments.partition_point(|s| s.end_param() < t);
        let i = i.min(self.segments.len().saturating_sub(1));
        match self.segments.get(i) {
            Some(s) => s.point_at(t),
            None => self.vertices.first().map_or(Point2f::default(), |v| v.point),
        }
    }

    /// Chain parameter of the closest point to `p`.
    pub fn closest_param(&self, p: Point2f) -> f32 {
        let mut best_t = 0.0;
        let mut best_d = f32::INFINITY;
        for s in &self.segments {
            let t = s.closest_param(p);
            let d = s.point_at(t).dist(p);
            if d < best_d {
                best_d = d;
                best_t = t;
            }
        }
        best_t
    }

    pub fn distance_to(&self, p: Point2f) -> f32 {
        self.point_at(self.closest_param(p)).dist(p)
    }
}

fn renormalize(segments: &mut [Segment]) -> f32 {
    let mut acc = 0.0;
    for s in segments {
        s.set_start(acc);
        acc += s.length();
    }
    acc
}
