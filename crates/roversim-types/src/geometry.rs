//! Planar geometry: points, poses, and angle normalization.
//!
//! All values are immutable. Every transform returns a new value, so a
//! [`Pose`] held by the world can never be changed behind its back.
//!
//! Angles are radians. Headings are kept in `[0, 2π)` at all times.

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

/// Normalize an angle into `[0, 2π)`.
///
/// Handles values of any magnitude, including negative angles and angles
/// several turns past `2π`. `NaN` stays `NaN`.
pub fn normalize_angle(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(TAU);
    // rem_euclid rounds tiny negative inputs up to exactly TAU.
    if wrapped >= TAU { 0.0 } else { wrapped }
}

/// A point in the plane, in meters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// X coordinate (meters).
    pub x: f64,
    /// Y coordinate (meters).
    pub y: f64,
}

impl Point {
    /// The origin `(0, 0)`.
    pub const ORIGIN: Self = Self { x: 0.0, y: 0.0 };

    /// Create a point from coordinates.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Move `amount` meters along the absolute `direction` (radians).
    pub fn translate(self, direction: f64, amount: f64) -> Self {
        Self {
            x: amount.mul_add(direction.cos(), self.x),
            y: amount.mul_add(direction.sin(), self.y),
        }
    }

    /// Rotate this point by `angle` radians counter-clockwise around `center`.
    pub fn rotate_about(self, angle: f64, center: Self) -> Self {
        let (sin, cos) = angle.sin_cos();
        let dx = self.x - center.x;
        let dy = self.y - center.y;
        Self {
            x: center.x + dx * cos - dy * sin,
            y: center.y + dx * sin + dy * cos,
        }
    }
}

/// Position plus heading of a simulated entity.
///
/// Serializes flat as `{x, y, heading}`, which is also the persisted
/// entity-state format.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    /// Position in the world frame.
    #[serde(flatten)]
    pub point: Point,
    /// Heading in radians, always within `[0, 2π)`.
    pub heading: f64,
}

impl Pose {
    /// Pose at the origin facing heading 0.
    pub const ORIGIN: Self = Self {
        point: Point::ORIGIN,
        heading: 0.0,
    };

    /// Create a pose, normalizing the heading.
    pub fn new(point: Point, heading: f64) -> Self {
        Self {
            point,
            heading: normalize_angle(heading),
        }
    }

    /// Move `amount` meters along `direction`, measured relative to the
    /// current heading. The heading itself is unchanged.
    pub fn translate(self, direction: f64, amount: f64) -> Self {
        let absolute = normalize_angle(self.heading + direction);
        Self {
            point: self.point.translate(absolute, amount),
            heading: self.heading,
        }
    }

    /// Turn by `angle` radians. The position is unchanged.
    pub fn rotate(self, angle: f64) -> Self {
        Self {
            point: self.point,
            heading: normalize_angle(self.heading + angle),
        }
    }

    /// Heading in degrees, within `[0, 360)`.
    pub fn heading_degrees(self) -> f64 {
        self.heading.to_degrees()
    }

    /// Whether two poses agree within `tolerance` on every component.
    ///
    /// Headings are compared by angular distance, so `0` and `2π - ε`
    /// are considered close.
    pub fn approx_eq(self, other: Self, tolerance: f64) -> bool {
        (self.point.x - other.point.x).abs() <= tolerance
            && (self.point.y - other.point.y).abs() <= tolerance
            && angular_distance(self.heading, other.heading) <= tolerance
    }
}

/// Smallest absolute difference between two angles, within `[0, π]`.
pub fn angular_distance(a: f64, b: f64) -> f64 {
    let diff = normalize_angle(a - b);
    diff.min(TAU - diff)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::f64::consts::{FRAC_PI_2, PI};

    use proptest::prelude::*;

    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn normalize_handles_overflow_and_underflow() {
        assert!((normalize_angle(TAU + 1.0) - 1.0).abs() < EPS);
        assert!((normalize_angle(-1.0) - (TAU - 1.0)).abs() < EPS);
        assert!((normalize_angle(5.0 * TAU + 0.5) - 0.5).abs() < 1e-9);
        assert!(normalize_angle(TAU).abs() < EPS);
        assert!(normalize_angle(-1e-300) < TAU);
    }

    #[test]
    fn translate_follows_heading() {
        let pose = Pose::new(Point::ORIGIN, FRAC_PI_2);
        let moved = pose.translate(0.0, 2.0);
        assert!(moved.point.x.abs() < EPS);
        assert!((moved.point.y - 2.0).abs() < EPS);
        assert!((moved.heading - FRAC_PI_2).abs() < EPS);
    }

    #[test]
    fn translate_adds_relative_direction() {
        let pose = Pose::new(Point::new(1.0, 1.0), PI);
        let moved = pose.translate(PI, 1.0);
        assert!((moved.point.x - 2.0).abs() < EPS);
        assert!((moved.point.y - 1.0).abs() < EPS);
    }

    #[test]
    fn rotate_wraps_negative_results() {
        let pose = Pose::ORIGIN.rotate(-FRAC_PI_2);
        assert!((pose.heading - 3.0 * FRAC_PI_2).abs() < EPS);
        assert_eq!(pose.point, Point::ORIGIN);
    }

    #[test]
    fn rotate_about_center() {
        let p = Point::new(2.0, 1.0).rotate_about(FRAC_PI_2, Point::new(1.0, 1.0));
        assert!((p.x - 1.0).abs() < EPS);
        assert!((p.y - 2.0).abs() < EPS);
    }

    #[test]
    fn heading_degrees_conversion() {
        let pose = Pose::new(Point::ORIGIN, PI);
        assert!((pose.heading_degrees() - 180.0).abs() < 1e-9);
    }

    #[test]
    fn pose_serializes_flat() {
        let pose = Pose::new(Point::new(0.5, -0.25), 1.0);
        let json = serde_json::to_value(pose).unwrap();
        assert_eq!(json, serde_json::json!({"x": 0.5, "y": -0.25, "heading": 1.0}));
        let back: Pose = serde_json::from_value(json).unwrap();
        assert_eq!(back, pose);
    }

    proptest! {
        #[test]
        fn normalized_angle_is_in_range(theta in -1.0e6f64..1.0e6) {
            let n = normalize_angle(theta);
            prop_assert!((0.0..TAU).contains(&n));
        }

        #[test]
        fn normalize_is_stable_under_full_turns(theta in -1.0e6f64..1.0e6) {
            let n = normalize_angle(theta);
            let again = normalize_angle(n + TAU);
            prop_assert!(angular_distance(n, again) < 1e-9);
        }

        #[test]
        fn rotate_keeps_heading_in_range(start in 0.0f64..TAU, turn in -100.0f64..100.0) {
            let pose = Pose::new(Point::ORIGIN, start).rotate(turn);
            prop_assert!((0.0..TAU).contains(&pose.heading));
        }
    }
}
