use crate::geom::Point2f;

/// Integer grid position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Xy {
    pub x: i32,
    pub y: i32,
}

// Clockwise from north: N, NE, E, SE, S, SW, W, NW.
const DX: [i32; 8] = [0, 1, 1, 1, 0, -1, -1, -1];
const DY: [i32; 8] = [-1, -1, 0, 1, 1, 1, 0, -1];

/// The canonical neighbour directions, in enumeration order.
pub const DIRS: [u8; 8] = [0, 1, 2, 3, 4, 5, 6, 7];

impl Xy {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Neighbouring position in direction `dir`, without bounds handling.
    pub fn offset(self, dir: u8) -> Self {
        Self {
            x: self.x + DX[dir as usize],
            y: self.y + DY[dir as usize],
        }
    }

    /// Unit-space position for a grid with the given `1/height` scale.
    pub fn to_point(self, scale: f32) -> Point2f {
        Point2f {
            x: self.x as f32 * scale,
            y: self.y as f32 * scale,
        }
    }
}

#[inline]
pub fn opposite_dir(dir: u8) -> u8 {
    (dir + 4) & 7
}
