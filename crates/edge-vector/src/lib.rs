//! Umbrella crate for the `edge-vector` workspace.
//!
//! Re-exports the full pipeline: grid primitives, the traced planar graph,
//! segment fitting, the spatial index and the [`PixelMap`] aggregate with
//! its edit, validation and persistence operations.

pub use ev_core::*;
pub use ev_fit::*;
pub use ev_graph::*;
pub use ev_index::*;
pub use ev_map::*;
pub use ev_trace::*;
