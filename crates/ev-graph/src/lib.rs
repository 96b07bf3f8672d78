//! Planar graph model for vectorized edge bitmaps.
//!
//! A bitmap decomposes into [`Node`]s (topologically significant pixels) and
//! [`PixelChain`]s (pixel runs between two nodes). Each chain carries its
//! pixels, the [`Vertex`] list selected by approximation, and the
//! [`Segment`]s spanning consecutive vertices. Segment parameter windows
//! tile `[0, length]` exactly, and adjoining segments share the identical
//! vertex position.
//!
//! Chains are immutable: edits and refits produce replacement chains.

mod chain;
mod node;
mod segment;
mod thickness;
mod vertex;

pub use chain::{ChainId, PixelChain};
pub use node::Node;
pub use segment::{Curve, Segment, Straight};
pub use thickness::{Thickness, ThicknessPx};
pub use vertex::Vertex;
