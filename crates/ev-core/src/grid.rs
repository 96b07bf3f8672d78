use crate::error::Error;
use crate::xy::{DIRS, Xy};

/// Flag-bit raster over the edge bitmap.
///
/// Cells combine [`EdgeGrid::EDGE`] and [`EdgeGrid::NODE`] bits. Positions
/// outside the grid read as empty; writes outside the grid are ignored, so
/// callers validate arguments with [`EdgeGrid::contains`] first. In 360 mode
/// x coordinates wrap around the horizontal seam.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeGrid {
    width: usize,
    height: usize,
    is_360: bool,
    cells: Vec<u8>,
}

impl EdgeGrid {
    pub const EDGE: u8 = 0b01;
    pub const NODE: u8 = 0b10;

    pub fn new(width: usize, height: usize, is_360: bool) -> Self {
        Self {
            width,
            height,
            is_360,
            cells: vec![0; width.saturating_mul(height)],
        }
    }

    /// Builds a grid from a row-major mask where nonzero bytes are edges.
    pub fn from_edges(width: usize, height: usize, is_360: bool, edges: &[u8]) -> Result<Self, Error> {
        let expected = checked_len(width, height)?;
        if edges.len() != expected {
            return Err(Error::SizeMismatch {
                expected,
                actual: edges.len(),
            });
        }

        let cells = edges
            .iter()
            .map(|&e| if e != 0 { Self::EDGE } else { 0 })
            .collect();
        Ok(Self {
            width,
            height,
            is_360,
            cells,
        })
    }

    /// Rebuilds a grid from previously stored flag bytes. Unknown bits are
    /// masked off.
    pub fn from_cells(width: usize, height: usize, is_360: bool, mut cells: Vec<u8>) -> Result<Self, Error> {
        let expected = checked_len(width, height)?;
        if cells.len() != expected {
            return Err(Error::SizeMismatch {
                expected,
                actual: cells.len(),
            });
        }

        for c in &mut cells {
            *c &= Self::EDGE | Self::NODE;
        }
        Ok(Self {
            width,
            height,
            is_360,
            cells,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_360(&self) -> bool {
        self.is_360
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    /// Units per pixel: `1 / height`.
    pub fn scale(&self) -> f32 {
        if self.height == 0 {
            0.0
        } else {
            1.0 / self.height as f32
        }
    }

    /// Canonical form of a position: x reduced modulo width in 360 mode.
    pub fn normalize(&self, p: Xy) -> Xy {
        if self.is_360 && self.width > 0 {
            Xy {
                x: p.x.rem_euclid(self.width as i32),
                y: p.y,
            }
        } else {
            p
        }
    }

    /// Cell index of a position, or `None` when it falls outside the grid.
    pub fn index_of(&self, p: Xy) -> Option<usize> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        if p.y < 0 || p.y as usize >= self.height {
            return None;
        }

        let w = self.width as i32;
        let x = if self.is_360 {
            p.x.rem_euclid(w)
        } else {
            if p.x < 0 || p.x >= w {
                return None;
            }
            p.x
        };
        Some(p.y as usize * self.width + x as usize)
    }

    pub fn contains(&self, p: Xy) -> bool {
        self.index_of(p).is_some()
    }

    pub fn get(&self, p: Xy) -> u8 {
        self.index_of(p).map_or(0, |i| self.cells[i])
    }

    pub fn is_edge(&self, p: Xy) -> bool {
        self.get(p) & Self::EDGE != 0
    }

    pub fn is_node(&self, p: Xy) -> bool {
        self.get(p) & Self::NODE != 0
    }

    /// Sets or clears the EDGE bit. Clearing an edge also clears its NODE
    /// bit, since only edge cells can be nodes.
    pub fn set_edge(&mut self, p: Xy, on: bool) {
        if let Some(i) = self.index_of(p) {
            if on {
                self.cells[i] |= Self::EDGE;
            } else {
                self.cells[i] = 0;
            }
        }
    }

    pub fn set_node(&mut self, p: Xy, on: bool) {
        if let Some(i) = self.index_of(p) {
            if on {
                self.cells[i] |= Self::NODE;
            } else {
                self.cells[i] &= !Self::NODE;
            }
        }
    }

    /// In-bounds neighbour in direction `dir`, in canonical form.
    pub fn neighbour(&self, p: Xy, dir: u8) -> Option<Xy> {
        let q = p.offset(dir);
        self.index_of(q)?;
        Some(self.normalize(q))
    }

    /// Edge-flagged neighbours in the canonical direction order.
    pub fn edge_neighbours(&self, p: Xy) -> impl Iterator<Item = (u8, Xy)> + '_ {
        DIRS.into_iter().filter_map(move |dir| {
            let q = self.neighbour(p, dir)?;
            self.is_edge(q).then_some((dir, q))
        })
    }

    pub fn count_edge_neighbours(&self, p: Xy) -> u8 {
        self.edge_neighbours(p).count() as u8
    }

    /// Every position of the grid in row-major order.
    pub fn positions(&self) -> impl Iterator<Item = Xy> + '_ {
        let w = self.width.max(1);
        (0..self.cells.len()).map(move |i| Xy {
            x: (i % w) as i32,
            y: (i / w) as i32,
        })
    }
}

fn checked_len(width: usize, height: usize) -> Result<usize, Error> {
    if i32::try_from(width).is_err() || i32::try_from(height).is_err() {
        return Err(Error::OutOfBounds);
    }
    width.checked_mul(height).ok_or(Error::OutOfBounds)
}
