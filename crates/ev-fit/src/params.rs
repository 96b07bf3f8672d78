/// Fit tolerances in unit space.
///
/// Callers configure tolerances in pixels; dividing by the image height
/// makes the fit independent of bitmap resolution, so the same settings
/// produce the same vector shape at any scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitParams {
    /// Maximum perpendicular deviation of a pixel from its straight segment.
    pub tolerance: f32,
    /// Multiplier applied to `tolerance` when judging a curve replacement.
    /// Values above 1 trade fidelity for fewer, curvier segments.
    pub curve_preference: f32,
}

impl FitParams {
    pub fn from_pixels(tolerance_px: f32, curve_preference: f32, height: usize) -> Self {
        let h = height.max(1) as f32;
        Self {
            tolerance: tolerance_px / h,
            curve_preference,
        }
    }

    /// Deviation bound for accepting a curve in place of two straights.
    pub fn curve_tolerance(&self) -> f32 {
        self.tolerance * self.curve_preference
    }
}
