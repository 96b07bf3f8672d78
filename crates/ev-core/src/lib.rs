//! Foundational primitives for edge-bitmap vectorization.
//!
//! ## Grid Flags
//! Each cell carries two flag bits. EDGE marks pixels set by the upstream
//! edge filter; NODE marks pixels classified as topologically significant.
//! A NODE cell is always also an EDGE cell.
//!
//! ## Neighbour Order
//! All neighbour enumeration uses the fixed clockwise order N, NE, E, SE,
//! S, SW, W, NW. Opposite directions differ by 4 modulo 8.
//!
//! ## Unit Coordinates
//! Continuous geometry divides pixel coordinates by the image height, so one
//! pixel spans `1/height` units regardless of resolution and aspect ratio is
//! preserved. Tolerances given in pixels are converted the same way.
//!
//! ## 360 Mode
//! Grids built from full panoramas wrap horizontally: x coordinates are
//! reduced modulo the width and the left and right columns are neighbours.
//! Vertical coordinates never wrap.

mod error;
mod geom;
mod grid;
mod xy;

pub use error::Error;
pub use geom::{Line2f, Point2f, Vec2f};
pub use grid::EdgeGrid;
pub use xy::{DIRS, Xy, opposite_dir};
