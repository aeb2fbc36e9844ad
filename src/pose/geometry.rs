//! Planar geometry helpers.
//!
//! All functions are total: degenerate input (coincident points, non-finite
//! coordinates) yields [`DEGENERATE_ANGLE`] instead of NaN.

use serde::{Deserialize, Serialize};

/// Vectors shorter than this are treated as zero-length.
pub const DEGENERATE_EPSILON: f64 = 1e-8;

/// Angle reported when either ray is degenerate.
pub const DEGENERATE_ANGLE: f64 = 0.0;

/// A point in image space (pixels, y grows downward).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn midpoint(self, other: Point2) -> Point2 {
        Point2::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    pub fn offset(self, dx: f64, dy: f64) -> Point2 {
        Point2::new(self.x + dx, self.y + dy)
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Angle at vertex `b` between rays `b→a` and `b→c`, in degrees.
///
/// Returns a value in `[0, 180]`, or [`DEGENERATE_ANGLE`] when either ray is
/// shorter than [`DEGENERATE_EPSILON`].
pub fn angle(a: Point2, b: Point2, c: Point2) -> f64 {
    let (v1x, v1y) = (a.x - b.x, a.y - b.y);
    let (v2x, v2y) = (c.x - b.x, c.y - b.y);
    let n1 = v1x.hypot(v1y);
    let n2 = v2x.hypot(v2y);

    if !(n1 >= DEGENERATE_EPSILON && n2 >= DEGENERATE_EPSILON) || !n1.is_finite() || !n2.is_finite()
    {
        return DEGENERATE_ANGLE;
    }

    let dot = (v1x / n1) * (v2x / n2) + (v1y / n1) * (v2y / n2);
    if !dot.is_finite() {
        return DEGENERATE_ANGLE;
    }

    dot.clamp(-1.0, 1.0).acos().to_degrees()
}

/// Lean of the segment `bottom→top` away from straight up, in degrees.
///
/// 0 means `top` sits directly above `bottom`; 90 means the segment is level.
pub fn angle_from_vertical(top: Point2, bottom: Point2) -> f64 {
    angle(top, bottom, bottom.offset(0.0, -1.0))
}

/// Absolute horizontal distance between two points.
pub fn horizontal_spread(a: Point2, b: Point2) -> f64 {
    (a.x - b.x).abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_right_angle() {
        let a = Point2::new(1.0, 0.0);
        let b = Point2::new(0.0, 0.0);
        let c = Point2::new(0.0, 1.0);
        assert!(approx(angle(a, b, c), 90.0));
    }

    #[test]
    fn test_straight_and_folded() {
        let b = Point2::new(5.0, 5.0);
        assert!(approx(
            angle(Point2::new(0.0, 5.0), b, Point2::new(10.0, 5.0)),
            180.0
        ));
        assert!(approx(
            angle(Point2::new(0.0, 5.0), b, Point2::new(1.0, 5.0)),
            0.0
        ));
    }

    #[test]
    fn test_degenerate_vector_returns_fallback() {
        let a = Point2::new(3.0, 4.0);
        let b = Point2::new(3.0, 4.0);
        let c = Point2::new(10.0, 2.0);
        assert_eq!(angle(a, b, c), DEGENERATE_ANGLE);
        assert_eq!(angle(c, b, a), DEGENERATE_ANGLE);

        let tiny = Point2::new(3.0 + 1e-10, 4.0);
        assert_eq!(angle(tiny, b, c), DEGENERATE_ANGLE);
    }

    #[test]
    fn test_angle_with_repeated_endpoint() {
        // angle(a, b, a): both rays identical, never NaN
        let a = Point2::new(2.0, 7.0);
        let b = Point2::new(-1.0, 3.0);
        let value = angle(a, b, a);
        assert!(value.is_finite());
        assert!(approx(value, 0.0));
    }

    #[test]
    fn test_non_finite_input_returns_fallback() {
        let value = angle(
            Point2::new(f64::NAN, 0.0),
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 1.0),
        );
        assert_eq!(value, DEGENERATE_ANGLE);
    }

    #[test]
    fn test_angle_stays_in_range() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(17);
        let mut next = || rng.gen_range(-100.0..100.0);
        for _ in 0..500 {
            let a = Point2::new(next(), next());
            let b = Point2::new(next(), next());
            let c = Point2::new(next(), next());
            let value = angle(a, b, c);
            assert!((0.0..=180.0).contains(&value), "angle {value} out of range");
        }
    }

    #[test]
    fn test_angle_from_vertical() {
        let hip = Point2::new(100.0, 200.0);
        assert!(approx(angle_from_vertical(Point2::new(100.0, 50.0), hip), 0.0));
        assert!(approx(angle_from_vertical(Point2::new(250.0, 200.0), hip), 90.0));
        assert!(approx(angle_from_vertical(Point2::new(200.0, 100.0), hip), 45.0));
    }

    #[test]
    fn test_midpoint_and_spread() {
        let a = Point2::new(0.0, 0.0);
        let b = Point2::new(4.0, 2.0);
        assert_eq!(a.midpoint(b), Point2::new(2.0, 1.0));
        assert_eq!(horizontal_spread(b, a), 4.0);
    }
}
