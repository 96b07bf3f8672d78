//! Segment fitting for traced pixel chains.
//!
//! Two phases, run per chain:
//!
//! 1. [`approximate`] recursively splits the pixel run at the point of
//!    maximum perpendicular deviation until every span fits a straight
//!    segment within the tolerance.
//! 2. [`fit_chain`] then tries to replace each adjacent segment pair with a
//!    single quadratic curve through a fitted control point, accepting the
//!    merge only while the curve stays within `tolerance * curve_preference`
//!    of the source pixels. Merges cascade, so smooth runs end up as very
//!    few segments.
//!
//! All geometry is produced in unit space (pixel coordinates divided by the
//! image height); [`chain_points`] performs that mapping, including the
//! horizontal unwrap for 360 bitmaps.

mod approx;
mod params;
mod refine;

pub use approx::approximate;
pub use params::FitParams;
pub use refine::{chain_points, fit_chain, refit_chain};
