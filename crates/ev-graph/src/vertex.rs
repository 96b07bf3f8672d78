use ev_core::Point2f;

/// Chain vertex: an index into the chain's pixel run plus the unit-space
/// position of that pixel. Positions are computed when the chain is built
/// and on every rebuild; they are never deferred.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub pixel_index: usize,
    pub point: Point2f,
}

impl Vertex {
    pub fn new(pixel_index: usize, point: Point2f) -> Self {
        Self { pixel_index, point }
    }
}
