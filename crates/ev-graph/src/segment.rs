use ev_core::{Point2f, Vec2f};

const CURVE_LENGTH_STEPS: usize = 32;
const CLOSEST_COARSE_STEPS: usize = 16;
const CLOSEST_REFINE_ITERS: usize = 24;

/// One geometric piece of a chain.
///
/// A segment covers the chain-parameter window `[start, start + length]`;
/// consecutive segments of a chain tile `[0, chain length]` without gaps.
/// Queries taking a chain parameter clamp it to the window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Segment {
    Straight(Straight),
    Curve(Curve),
}

/// Line between two vertices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Straight {
    pub a: Point2f,
    pub b: Point2f,
    start: f32,
    len: f32,
}

/// Quadratic spline through a fitted control point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Curve {
    pub a: Point2f,
    pub control: Point2f,
    pub b: Point2f,
    start: f32,
    len: f32,
}

impl Straight {
    pub fn new(a: Point2f, b: Point2f, start: f32) -> Self {
        Self {
            a,
            b,
            start,
            len: a.dist(b),
        }
    }

    fn closest_u(&self, p: Point2f) -> f32 {
        let ab = self.b - self.a;
        let d2 = ab.dot(ab);
        if d2 == 0.0 {
            return 0.0;
        }
        ((p - self.a).dot(ab) / d2).clamp(0.0, 1.0)
    }
}

impl Curve {
    pub fn new(a: Point2f, control: Point2f, b: Point2f, start: f32) -> Self {
        let mut c = Self {
            a,
            control,
            b,
            start,
            len: 0.0,
        };
        c.len = c.sampled_length();
        c
    }

    /// Point at the spline parameter `u` in `[0, 1]`.
    pub fn point_at_u(&self, u: f32) -> Point2f {
        let w = 1.0 - u;
        Point2f {
            x: w * w * self.a.x + 2.0 * u * w * self.control.x + u * u * self.b.x,
            y: w * w * self.a.y + 2.0 * u * w * self.control.y + u * u * self.b.y,
        }
    }

    fn sampled_length(&self) -> f32 {
        let mut len = 0.0;
        let mut prev = self.a;
        for i in 1..=CURVE_LENGTH_STEPS {
            let u = i as f32 / CURVE_LENGTH_STEPS as f32;
            let p = self.point_at_u(u);
            len += prev.dist(p);
            prev = p;
        }
        len
    }

    fn closest_u(&self, p: Point2f) -> f32 {
        let mut best_u = 0.0;
        let mut best_d = f32::INFINITY;
        for i in 0..=CLOSEST_COARSE_STEPS {
            let u = i as f32 / CLOSEST_COARSE_STEPS as f32;
            let d = self.point_at_u(u).dist(p);
            if d < best_d {
                best_d = d;
                best_u = u;
            }
        }

        let step = 1.0 / CLOSEST_COARSE_STEPS as f32;
        let mut lo = (best_u - step).max(0.0);
        let mut hi = (best_u + step).min(1.0);
        for _ in 0..CLOSEST_REFINE_ITERS {
            let m1 = lo + (hi - lo) / 3.0;
            let m2 = hi - (hi - lo) / 3.0;
            if self.point_at_u(m1).dist(p) <= self.point_at_u(m2).dist(p) {
                hi = m2;
            } else {
                lo = m1;
            }
        }
        0.5 * (lo + hi)
    }

    fn axis_extrema(a: f32, c: f32, b: f32) -> Option<f32> {
        let den = a - 2.0 * c + b;
        if den.abs() < 1e-12 {
            return None;
        }
        let u = (a - c) / den;
        (u > 0.0 && u < 1.0).then_some(u)
    }
}

impl Segment {
    pub fn start_param(&self) -> f32 {
        match self {
            Self::Straight(s) => s.start,
            Self::Curve(c) => c.start,
        }
    }

    pub fn length(&self) -> f32 {
        match self {
            Self::Straight(s) => s.len,
            Self::Curve(c) => c.len,
        }
    }

    pub fn end_param(&self) -> f32 {
        self.start_param() + self.length()
    }

    pub fn start_point(&self) -> Point2f {
        match self {
            Self::Straight(s) => s.a,
            Self::Curve(c) => c.a,
        }
    }

    pub fn end_point(&self) -> Point2f {
        match self {
            Self::Straight(s) => s.b,
            Self::Curve(c) => c.b,
        }
    }

    pub fn is_curve(&self) -> bool {
        matches!(self, Self::Curve(_))
    }

    /// Unit direction leaving the start point.
    pub fn tangent_at_start(&self) -> Vec2f {
        match self {
            Self::Straight(s) => (s.b - s.a).normalize(),
            Self::Curve(c) => {
                let d = (c.control - c.a).normalize();
                if d == Vec2f::default() {
                    (c.b - c.a).normalize()
                } else {
                    d
                }
            }
        }
    }

    /// Unit direction arriving at the end point.
    pub fn tangent_at_end(&self) -> Vec2f {
        match self {
            Self::Straight(s) => (s.b - s.a).normalize(),
            Self::Curve(c) => {
                let d = (c.b - c.control).normalize();
                if d == Vec2f::default() {
                    (c.b - c.a).normalize()
                } else {
                    d
                }
            }
        }
    }

    /// Point at chain parameter `t`, clamped to this segment's window.
    pub fn point_at(&self, t: f32) -> Point2f {
        let len = self.length();
        let u = if len <= 0.0 {
            0.0
        } else {
            ((t - self.start_param()) / len).clamp(0.0, 1.0)
        };
        match self {
            Self::Straight(s) => s.a.lerp(s.b, u),
            Self::Curve(c) => c.point_at_u(u),
        }
    }

    /// Chain parameter of the point on this segment closest to `p`.
    pub fn closest_param(&self, p: Point2f) -> f32 {
        let u = match self {
            Self::Straight(s) => s.closest_u(p),
            Self::Curve(c) => c.closest_u(p),
        };
        self.start_param() + u * self.length()
    }

    pub fn distance_to(&self, p: Point2f) -> f32 {
        self.point_at(self.closest_param(p)).dist(p)
    }

    /// Axis-aligned bounds, including curve extrema.
    pub fn bounds(&self) -> (Point2f, Point2f) {
        let (mut min, mut max) = point_minmax(self.start_point(), self.end_point());
        if let Self::Curve(c) = self {
            for u in [
                Curve::axis_extrema(c.a.x, c.control.x, c.b.x),
                Curve::axis_extrema(c.a.y, c.control.y, c.b.y),
            ]
            .into_iter()
            .flatten()
            {
                let p = c.point_at_u(u);
                min.x = min.x.min(p.x);
                min.y = min.y.min(p.y);
                max.x = max.x.max(p.x);
                max.y = max.y.max(p.y);
            }
        }
        (min, max)
    }

    /// Copy with the same geometry placed at a new starting offset.
    pub fn with_start(&self, start: f32) -> Self {
        let mut out = *self;
        out.set_start(start);
        out
    }

    pub(crate) fn set_start(&mut self, start: f32) {
        match self {
            Self::Straight(s) => s.start = start,
            Self::Curve(c) => c.start = start,
        }
    }
}

fn point_minmax(a: Point2f, b: Point2f) -> (Point2f, Point2f) {
    (
        Point2f {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
        },
        Point2f {
            x: a.x.max(b.x),
            y: a.y.max(b.y),
        },
    )
}
