use ev_core::{EdgeGrid, Line2f, Point2f, Xy};
use ev_graph::{Curve, PixelChain, Segment, Straight, Thickness, Vertex};

use crate::approx::approximate;
use crate::params::FitParams;

/// Unit-space positions of a pixel run.
///
/// In 360 mode a run may cross the horizontal seam; successive pixels are
/// unwrapped onto a continuous x axis so fitted geometry does not jump
/// across the image.
pub fn chain_points(grid: &EdgeGrid, pixels: &[Xy]) -> Vec<Point2f> {
    let scale = grid.scale();
    if !grid.is_360() {
        return pixels.iter().map(|p| p.to_point(scale)).collect();
    }

    let width = grid.width() as i32;
    let half = width / 2;
    let mut prev = 0;
    let mut points = Vec::with_capacity(pixels.len());
    for (i, p) in pixels.iter().enumerate() {
        let mut x = p.x;
        if i > 0 {
            while x - prev > half {
                x -= width;
            }
            while prev - x > half {
                x += width;
            }
        }
        prev = x;
        points.push(Point2f {
            x: x as f32 * scale,
            y: p.y as f32 * scale,
        });
    }
    points
}

/// Fit a traced pixel run into a chain of straight and curve segments.
pub fn fit_chain(grid: &EdgeGrid, pixels: &[Xy], params: &FitParams) -> PixelChain {
    build(grid, pixels.to_vec(), Thickness::default(), params)
}

/// Re-fit an existing chain, keeping its thickness category.
pub fn refit_chain(grid: &EdgeGrid, chain: &PixelChain, params: &FitParams) -> PixelChain {
    build(grid, chain.pixels().to_vec(), chain.thickness(), params)
}

fn build(grid: &EdgeGrid, pixels: Vec<Xy>, thickness: Thickness, params: &FitParams) -> PixelChain {
    let points = chain_points(grid, &pixels);
    let closed = pixels.len() > 2 && pixels.first() == pixels.last();
    let cuts = approximate(&points, closed, params.tolerance);

    let mut vertices: Vec<Vertex> = cuts.iter().map(|&i| Vertex::new(i, points[i])).collect();
    let mut segments: Vec<Segment> = vertices
        .windows(2)
        .map(|w| Segment::Straight(Straight::new(w[0].point, w[1].point, 0.0)))
        .collect();

    refine(&points, &mut vertices, &mut segments, params.curve_tolerance());

    PixelChain::new(pixels, vertices, segments).with_thickness(thickness)
}

/// Merge adjacent segment pairs into single curves while the curve stays
/// within `tolerance` of the source points. After an accepted merge the
/// previous pair is re-tried, so near-collinear curved runs keep collapsing.
fn refine(points: &[Point2f], vertices: &mut Vec<Vertex>, segments: &mut Vec<Segment>, tolerance: f32) {
    let mut i = 1;
    while i + 1 < vertices.len() {
        let lo = vertices[i - 1].pixel_index;
        let hi = vertices[i + 1].pixel_index;
        let curve = merge_pair(&segments[i - 1], &segments[i])
            .filter(|c| fits(c, &points[lo..=hi], tolerance));
        if let Some(curve) = curve {
            segments[i - 1] = curve;
            segments.remove(i);
            vertices.remove(i);
            i = (i - 1).max(1);
        } else {
            i += 1;
        }
    }
}

/// Replacement curve for two adjacent segments. The control point sits where
/// the outer tangents meet; it must lie ahead of the start and short of the
/// end, otherwise the curve would bend away from the joint.
fn merge_pair(left: &Segment, right: &Segment) -> Option<Segment> {
    let a = left.start_point();
    let b = right.end_point();
    let la = Line2f {
        p: a,
        dir: left.tangent_at_start(),
    };
    let lb = Line2f {
        p: b,
        dir: right.tangent_at_end(),
    };
    let (s, r) = la.intersect_params(&lb)?;
    if s <= 0.0 || r >= 0.0 {
        return None;
    }
    Some(Segment::Curve(Curve::new(
        a,
        la.point_at(s),
        b,
        left.start_param(),
    )))
}

fn fits(curve: &Segment, span: &[Point2f], tolerance: f32) -> bool {
    span.iter().all(|&p| curve.distance_to(p) <= tolerance)
}

#[cfg(test)]
mod tests {
    use super::{chain_points, fit_chain, refit_chain};
    use crate::approx::approximate;
    use crate::params::FitParams;
    use ev_core::{EdgeGrid, Xy};
    use ev_graph::Thickness;

    fn xy(x: i32, y: i32) -> Xy {
        Xy { x, y }
    }

    #[test]
    fn straight_run_is_one_straight_segment() {
        let grid = EdgeGrid::new(10, 10, false);
        let pixels: Vec<_> = (1..=8).map(|x| xy(x, 5)).collect();
        let params = FitParams::from_pixels(1.0, 1.0, 10);

        let chain = fit_chain(&grid, &pixels, &params);
        assert_eq!(chain.segments().len(), 1);
        assert!(!chain.segments()[0].is_curve());
        assert!((chain.length() - 0.7).abs() < 1e-6);

        let a = chain.point_at(0.0);
        let b = chain.point_at(chain.length());
        assert!(a.dist(chain_points(&grid, &pixels)[0]) < 1e-6);
        assert!(b.dist(chain_points(&grid, &pixels)[7]) < 1e-6);
    }

    #[test]
    fn corner_merges_only_with_generous_preference() {
        let grid = EdgeGrid::new(16, 16, false);
        let mut pixels: Vec<_> = (1..=6).map(|x| xy(x, 1)).collect();
        pixels.extend((2..=6).map(|y| xy(6, y)));

        let strict = FitParams::from_pixels(1.0, 1.0, 16);
        let chain = fit_chain(&grid, &pixels, &strict);
        assert_eq!(chain.segments().len(), 2);
        assert!(chain.segments().iter().all(|s| !s.is_curve()));

        let loose = FitParams::from_pixels(1.0, 2.0, 16);
        let chain = fit_chain(&grid, &pixels, &loose);
        assert_eq!(chain.segments().len(), 1);
        assert!(chain.segments()[0].is_curve());
    }

    #[test]
    fn smooth_bend_collapses_below_straight_count() {
        let grid = EdgeGrid::new(32, 32, false);
        let pixels: Vec<_> = (0..=16)
            .map(|x| xy(x, (0.03 * (x * x) as f32).round() as i32))
            .collect();
        let params = FitParams::from_pixels(0.5, 4.0, 32);

        let points = chain_points(&grid, &pixels);
        let straight_spans = approximate(&points, false, params.tolerance).len() - 1;
        assert!(straight_spans >= 2);

        let chain = fit_chain(&grid, &pixels, &params);
        assert!(chain.segments().len() < straight_spans);
        assert!(chain.segments().iter().any(|s| s.is_curve()));
    }

    #[test]
    fn loop_fit_keeps_the_anchor_vertex() {
        let grid = EdgeGrid::new(8, 8, false);
        let pixels = vec![
            xy(3, 1),
            xy(4, 2),
            xy(5, 3),
            xy(4, 4),
            xy(3, 5),
            xy(2, 4),
            xy(1, 3),
            xy(2, 2),
            xy(3, 1),
        ];
        let params = FitParams::from_pixels(0.5, 1.0, 8);

        let chain = fit_chain(&grid, &pixels, &params);
        assert!(chain.is_loop());
        let first = chain.vertices().first().map(|v| v.pixel_index);
        let last = chain.vertices().last().map(|v| v.pixel_index);
        assert_eq!(first, Some(0));
        assert_eq!(last, Some(8));

        let a = chain.point_at(0.0);
        let b = chain.point_at(chain.length());
        assert!(a.dist(b) < 1e-6);
    }

    #[test]
    fn refit_keeps_thickness() {
        let grid = EdgeGrid::new(10, 10, false);
        let pixels: Vec<_> = (1..=8).map(|x| xy(x, 5)).collect();
        let params = FitParams::from_pixels(1.0, 1.0, 10);

        let chain = fit_chain(&grid, &pixels, &params).with_thickness(Thickness::Thick);
        let refit = refit_chain(&grid, &chain, &params);
        assert_eq!(refit.thickness(), Thickness::Thick);
        assert_eq!(refit.segments().len(), chain.segments().len());
    }

    #[test]
    fn wrapped_run_unwraps_across_the_seam() {
        let grid = EdgeGrid::new(8, 4, true);
        let scale = grid.scale();

        let forward = chain_points(&grid, &[xy(6, 2), xy(7, 2), xy(0, 2), xy(1, 2)]);
        assert!((forward[2].x - 8.0 * scale).abs() < 1e-6);
        assert!((forward[3].x - 9.0 * scale).abs() < 1e-6);

        let backward = chain_points(&grid, &[xy(1, 2), xy(0, 2), xy(7, 2)]);
        assert!((backward[2].x + 1.0 * scale).abs() < 1e-6);
    }
}
