use ev_core::Point2f;

/// Split a point run into the fewest straight spans whose pixels all stay
/// within `tolerance` of the chord, returning the sorted span endpoints.
///
/// The result always contains the first and last index. A closed run (first
/// point repeated at the end) gets the point farthest from the start forced
/// as an extra endpoint so no chord degenerates to zero length.
pub fn approximate(points: &[Point2f], closed: bool, tolerance: f32) -> Vec<usize> {
    let last = match points.len() {
        0 => return Vec::new(),
        1 => return vec![0],
        n => n - 1,
    };

    let mut cuts = vec![0, last];
    let mut spans = Vec::new();
    let far = if closed {
        farthest_from(points, points[0])
    } else {
        0
    };
    if far > 0 && far < last {
        cuts.push(far);
        spans.push((0, far));
        spans.push((far, last));
    } else {
        spans.push((0, last));
    }

    while let Some((lo, hi)) = spans.pop() {
        if hi - lo < 2 {
            continue;
        }
        let (peak, dev) = deviation_peak(points, lo, hi);
        if dev <= tolerance {
            continue;
        }
        cuts.push(peak);
        spans.push((lo, peak));
        spans.push((peak, hi));
    }

    cuts.sort_unstable();
    cuts.dedup();
    cuts
}

/// Index and size of the largest deviation of an interior point from the
/// chord `points[lo] .. points[hi]`. A degenerate chord falls back to plain
/// distance from the chord start.
fn deviation_peak(points: &[Point2f], lo: usize, hi: usize) -> (usize, f32) {
    let a = points[lo];
    let chord = points[hi] - a;
    let chord_len = chord.norm();

    let mut peak = lo + 1;
    let mut max_dev = -1.0;
    for (i, p) in points.iter().enumerate().take(hi).skip(lo + 1) {
        let d = *p - a;
        let dev = if chord_len <= f32::EPSILON {
            d.norm()
        } else {
            (chord.cross(d) / chord_len).abs()
        };
        if dev > max_dev {
            max_dev = dev;
            peak = i;
        }
    }
    (peak, max_dev)
}

fn farthest_from(points: &[Point2f], origin: Point2f) -> usize {
    let mut best = 0;
    let mut best_d = -1.0;
    for (i, p) in points.iter().enumerate() {
        let d = origin.dist(*p);
        if d > best_d {
            best_d = d;
            best = i;
        }
    }
    best
}
