/// Stroke category assigned by length equalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Thickness {
    #[default]
    None,
    Normal,
    Thick,
}

/// Rendered stroke widths in pixels, one per category.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThicknessPx {
    pub none: f32,
    pub normal: f32,
    pub thick: f32,
}

impl Default for ThicknessPx {
    fn default() -> Self {
        Self {
            none: 1.0,
            normal: 2.0,
            thick: 4.0,
        }
    }
}

impl Thickness {
    pub fn draw_px(self, px: &ThicknessPx) -> f32 {
        match self {
            Self::None => px.none,
            Self::Normal => px.normal,
            Self::Thick => px.thick,
        }
    }
}
