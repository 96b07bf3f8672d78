//! Node classification and chain tracing over an [`ev_core::EdgeGrid`].
//!
//! Classification marks the NODE bit on every edge pixel whose 8-connected
//! edge-neighbour count differs from 2, erases bristle spurs, and leaves
//! zero-neighbour singletons flagged but unregistered. Tracing then walks
//! degree-2 corridors between registered nodes, producing pixel runs, and a
//! second pass anchors pure-loop components that contain no node at all.
//!
//! Both stages exist in full-grid and cell-scoped form so edits can rebuild
//! just the neighbourhood they touched.

mod classify;
mod tracer;

pub use classify::{classify, classify_cells};
pub use tracer::{MIN_CHAIN_PIXELS, MIN_LOOP_PIXELS, Tracer, trace_all};
