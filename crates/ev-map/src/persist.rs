//! Serialized map layout.
//!
//! A map persists as JSON: dimensions, the flag grid as a run-length-packed
//! base64 string, and the chain collection with pixels, vertex pixel
//! indices and segment kinds. Vertex positions are never written; they are
//! recomputed from the pixels on load, so a reloaded map can hold no stale
//! geometry. A payload that fails any decoding step or the consistency
//! checks is rejected whole.

use core::fmt;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

use ev_core::{EdgeGrid, Point2f, Xy};
use ev_fit::chain_points;
use ev_graph::{ChainId, Curve, PixelChain, Segment, Straight, Thickness, Vertex};

use crate::pixelmap::{MapConfig, PixelMap};
use crate::validate::{ConsistencyError, validate};

#[derive(Debug)]
pub enum PersistError {
    Json(serde_json::Error),
    Decode(base64::DecodeError),
    Grid(ev_core::Error),
    Layout { expected: usize, actual: usize },
    Malformed(&'static str),
    Inconsistent(ConsistencyError),
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(e) => write!(f, "malformed map json: {e}"),
            Self::Decode(e) => write!(f, "malformed cell payload: {e}"),
            Self::Grid(e) => write!(f, "stored grid rejected: {e}"),
            Self::Layout { expected, actual } => {
                write!(f, "cell payload expands to {actual} bytes, grid needs {expected}")
            }
            Self::Malformed(what) => write!(f, "{what}"),
            Self::Inconsistent(e) => write!(f, "restored map failed validation: {e}"),
        }
    }
}

impl std::error::Error for PersistError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Json(e) => Some(e),
            Self::Decode(e) => Some(e),
            Self::Grid(e) => Some(e),
            Self::Inconsistent(e) => Some(e),
            Self::Layout { .. } | Self::Malformed(_) => None,
        }
    }
}

impl From<serde_json::Error> for PersistError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl From<base64::DecodeError> for PersistError {
    fn from(e: base64::DecodeError) -> Self {
        Self::Decode(e)
    }
}

impl From<ev_core::Error> for PersistError {
    fn from(e: ev_core::Error) -> Self {
        Self::Grid(e)
    }
}

#[derive(Serialize, Deserialize)]
struct MapDto {
    width: usize,
    height: usize,
    #[serde(default)]
    is_360: bool,
    cells: String,
    chains: Vec<ChainDto>,
}

#[derive(Serialize, Deserialize)]
struct ChainDto {
    id: u32,
    pixels: Vec<[i32; 2]>,
    vertices: Vec<usize>,
    segments: Vec<SegmentDto>,
    #[serde(default)]
    thickness: ThicknessDto,
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum SegmentDto {
    Straight,
    Curve { control: [f32; 2] },
}

#[derive(Serialize, Deserialize, Clone, Copy, Default)]
#[serde(rename_all = "snake_case")]
enum ThicknessDto {
    #[default]
    None,
    Normal,
    Thick,
}

impl From<Thickness> for ThicknessDto {
    fn from(t: Thickness) -> Self {
        match t {
            Thickness::None => Self::None,
            Thickness::Normal => Self::Normal,
            Thickness::Thick => Self::Thick,
        }
    }
}

impl From<ThicknessDto> for Thickness {
    fn from(t: ThicknessDto) -> Self {
        match t {
            ThicknessDto::None => Self::None,
            ThicknessDto::Normal => Self::Normal,
            ThicknessDto::Thick => Self::Thick,
        }
    }
}

pub fn to_json(map: &PixelMap) -> Result<String, PersistError> {
    let cells = STANDARD.encode(rle_encode(map.grid().cells()));
    let chains = map
        .chains()
        .map(|(id, chain)| ChainDto {
            id: id.0,
            pixels: chain.pixels().iter().map(|p| [p.x, p.y]).collect(),
            vertices: chain.vertices().iter().map(|v| v.pixel_index).collect(),
            segments: chain.segments().iter().map(segment_dto).collect(),
            thickness: chain.thickness().into(),
        })
        .collect();
    let dto = MapDto {
        width: map.width(),
        height: map.height(),
        is_360: map.is_360(),
        cells,
        chains,
    };
    Ok(serde_json::to_string(&dto)?)
}

/// Restores a map from its serialized form. The payload's own dimensions
/// and flags are authoritative; `config` supplies the fitting knobs, which
/// are not persisted.
pub fn from_json(json: &str, config: MapConfig) -> Result<PixelMap, PersistError> {
    let dto: MapDto = serde_json::from_str(json)?;

    let packed = STANDARD.decode(&dto.cells)?;
    let expected = dto
        .width
        .checked_mul(dto.height)
        .ok_or(PersistError::Malformed("grid dimensions overflow"))?;
    let cells = rle_decode(&packed, expected)?;
    let grid = EdgeGrid::from_cells(dto.width, dto.height, dto.is_360, cells)?;

    let mut map = PixelMap::with_grid(grid, config);
    map.register_classified_nodes();
    for chain in &dto.chains {
        let id = ChainId(chain.id);
        if map.chain(id).is_some() {
            return Err(PersistError::Malformed("duplicate chain id"));
        }
        let restored = restore_chain(map.grid(), chain)?;
        map.install_chain_with_id(id, restored);
    }

    validate(&map).map_err(PersistError::Inconsistent)?;
    Ok(map)
}

/// [`from_json`], falling back to an empty map of the given dimensions when
/// the payload is unusable. A vector map is always re-derivable from its
/// bitmap, so a corrupt save is dropped rather than surfaced.
pub fn load_or_empty(
    json: &str,
    config: MapConfig,
    width: usize,
    height: usize,
    is_360: bool,
) -> PixelMap {
    match from_json(json, config.clone()) {
        Ok(map) => map,
        Err(e) => {
            tracing::warn!(error = %e, "discarding corrupt vector map payload");
            PixelMap::empty(width, height, is_360, config)
        }
    }
}

fn segment_dto(seg: &Segment) -> SegmentDto {
    match seg {
        Segment::Straight(_) => SegmentDto::Straight,
        Segment::Curve(c) => SegmentDto::Curve {
            control: [c.control.x, c.control.y],
        },
    }
}

fn restore_chain(grid: &EdgeGrid, dto: &ChainDto) -> Result<PixelChain, PersistError> {
    if dto.pixels.is_empty() {
        return Err(PersistError::Malformed("chain with no pixels"));
    }
    let pixels: Vec<Xy> = dto.pixels.iter().map(|&[x, y]| Xy::new(x, y)).collect();
    if pixels.iter().any(|&p| !grid.contains(p)) {
        return Err(PersistError::Malformed("chain pixel out of bounds"));
    }

    let idx = &dto.vertices;
    let ok = idx.len() >= 2
        && idx.len() == dto.segments.len() + 1
        && idx.first() == Some(&0)
        && idx.last() == Some(&(pixels.len() - 1))
        && idx.windows(2).all(|w| w[0] < w[1]);
    if !ok {
        return Err(PersistError::Malformed("chain vertex run is inconsistent"));
    }

    let points = chain_points(grid, &pixels);
    let vertices: Vec<Vertex> = idx.iter().map(|&i| Vertex::new(i, points[i])).collect();
    let segments: Vec<Segment> = dto
        .segments
        .iter()
        .zip(vertices.windows(2))
        .map(|(seg, w)| match seg {
            SegmentDto::Straight => Segment::Straight(Straight::new(w[0].point, w[1].point, 0.0)),
            SegmentDto::Curve { control } => Segment::Curve(Curve::new(
                w[0].point,
                Point2f {
                    x: control[0],
                    y: control[1],
                },
                w[1].point,
                0.0,
            )),
        })
        .collect();

    Ok(PixelChain::new(pixels, vertices, segments).with_thickness(dto.thickness.into()))
}

/// Packs bytes as (count, value) pairs; runs longer than 255 split.
fn rle_encode(cells: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut iter = cells.iter().copied();
    let Some(mut value) = iter.next() else {
        return out;
    };
    let mut run = 1u8;
    for byte in iter {
        if byte == value && run < u8::MAX {
            run += 1;
        } else {
            out.push(run);
            out.push(value);
            value = byte;
            run = 1;
        }
    }
    out.push(run);
    out.push(value);
    out
}

fn rle_decode(packed: &[u8], expected: usize) -> Result<Vec<u8>, PersistError> {
    if packed.len() % 2 != 0 {
        return Err(PersistError::Malformed("odd run-length payload"));
    }
    let mut cells = Vec::with_capacity(expected);
    for pair in packed.chunks_exact(2) {
        let (run, value) = (pair[0], pair[1]);
        if run == 0 {
            return Err(PersistError::Malformed("zero-length run"));
        }
        let next = cells.len() + run as usize;
        if next > expected {
            return Err(PersistError::Layout {
                expected,
                actual: next,
            });
        }
        cells.resize(next, value);
    }
    if cells.len() != expected {
        return Err(PersistError::Layout {
            expected,
            actual: cells.len(),
        });
    }
    Ok(cells)
}
