use serde::{Deserialize, Serialize};

/// Point in a local planar projection (metres east, metres north).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct PlanarPoint {
    pub x: f64,
    pub y: f64,
}

impl PlanarPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn offset(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    pub fn distance(&self, other: &PlanarPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Compass bearing towards `target`: 0 = north, clockwise, in `[0, 360)`.
    pub fn bearing_to(&self, target: &PlanarPoint) -> f64 {
        let dx = target.x - self.x;
        let dy = target.y - self.y;
        normalize_deg(dx.atan2(dy).to_degrees())
    }

    pub fn centroid(points: &[PlanarPoint]) -> Option<PlanarPoint> {
        if points.is_empty() {
            return None;
        }
        let n = points.len() as f64;
        let (sx, sy) = points
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Some(PlanarPoint::new(sx / n, sy / n))
    }
}

/// Wraps an angle into `[0, 360)`.
pub fn normalize_deg(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Linear interpolation of `values` sampled at increasing `angles`, treating
/// the axis as periodic with period 360.
pub fn periodic_interp(angles: &[f32], values: &[f64], angle: f64) -> f64 {
    debug_assert_eq!(angles.len(), values.len());
    match angles.len() {
        0 => return 0.0,
        1 => return values[0],
        _ => {}
    }

    let angle = normalize_deg(angle);
    let last = angles.len() - 1;
    let upper = angles.partition_point(|&a| (a as f64) <= angle);

    let (lo, hi, lo_angle, span) = if upper == 0 || upper > last {
        // Between the last row and the first row, across 360.
        let first = angles[0] as f64;
        let final_angle = angles[last] as f64;
        let lo_angle = if angle >= final_angle {
            final_angle
        } else {
            final_angle - 360.0
        };
        (last, 0, lo_angle, first + 360.0 - final_angle)
    } else {
        let lo_angle = angles[upper - 1] as f64;
        (upper - 1, upper, lo_angle, angles[upper] as f64 - lo_angle)
    };

    if span <= 0.0 {
        return values[lo];
    }
    let t = ((angle - lo_angle) / span).clamp(0.0, 1.0);
    values[lo] + t * (values[hi] - values[lo])
}

/// Least-squares intersection of lines of bearing.
///
/// Each entry is a site location and the compass bearing observed there.
/// Returns `None` when fewer than two lines are given or the lines are
/// (nearly) parallel.
pub fn intersect_bearings(lines: &[(PlanarPoint, f64)]) -> Option<PlanarPoint> {
    if lines.len() < 2 {
        return None;
    }

    // Normal of the line with direction (sin b, cos b) is (cos b, -sin b).
    let (mut a11, mut a12, mut a22, mut b1, mut b2) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for (site, bearing) in lines {
        let (sin, cos) = bearing.to_radians().sin_cos();
        let (nx, ny) = (cos, -sin);
        let rhs = nx * site.x + ny * site.y;
        a11 += nx * nx;
        a12 += nx * ny;
        a22 += ny * ny;
        b1 += nx * rhs;
        b2 += ny * rhs;
    }

    let det = a11 * a22 - a12 * a12;
    if det.abs() < 1e-9 * lines.len() as f64 {
        return None;
    }
    Some(PlanarPoint::new(
        (a22 * b1 - a12 * b2) / det,
        (a11 * b2 - a12 * b1) / det,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn bearing_follows_compass_convention() {
        let origin = PlanarPoint::default();
        assert_abs_diff_eq!(origin.bearing_to(&PlanarPoint::new(0.0, 10.0)), 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(origin.bearing_to(&PlanarPoint::new(10.0, 0.0)), 90.0, epsilon = 1e-9);
        assert_abs_diff_eq!(origin.bearing_to(&PlanarPoint::new(0.0, -10.0)), 180.0, epsilon = 1e-9);
        assert_abs_diff_eq!(origin.bearing_to(&PlanarPoint::new(-10.0, 0.0)), 270.0, epsilon = 1e-9);
    }

    #[test]
    fn interp_wraps_across_north() {
        let angles = [0.0, 90.0, 180.0, 270.0];
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_abs_diff_eq!(periodic_interp(&angles, &values, 45.0), 1.5);
        assert_abs_diff_eq!(periodic_interp(&angles, &values, 315.0), 2.5);
        assert_abs_diff_eq!(periodic_interp(&angles, &values, -45.0), 2.5);
        assert_abs_diff_eq!(periodic_interp(&angles, &values, 270.0), 4.0);
    }

    #[test]
    fn interp_handles_offset_first_angle() {
        let angles = [10.0, 190.0];
        let values = [0.0, 1.0];
        assert_abs_diff_eq!(periodic_interp(&angles, &values, 0.0), 10.0 / 180.0, epsilon = 1e-12);
    }

    #[test]
    fn bearings_intersect_at_emitter() {
        let fix = intersect_bearings(&[
            (PlanarPoint::new(0.0, 0.0), 45.0),
            (PlanarPoint::new(1000.0, 0.0), 315.0),
        ])
        .unwrap();
        assert_abs_diff_eq!(fix.x, 500.0, epsilon = 1e-6);
        assert_abs_diff_eq!(fix.y, 500.0, epsilon = 1e-6);
    }

    #[test]
    fn parallel_bearings_do_not_intersect() {
        let fix = intersect_bearings(&[
            (PlanarPoint::new(0.0, 0.0), 0.0),
            (PlanarPoint::new(100.0, 0.0), 0.0),
        ]);
        assert!(fix.is_none());
    }
}
