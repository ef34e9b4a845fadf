//! Differential-drive kinematics (arc approximation).
//!
//! Converts the power of the two motors and the elapsed time since the last
//! tick into a [`Movement`]: how far to translate, in which direction
//! relative to the current heading, and how much to rotate afterwards.
//!
//! The model is deliberately simple. It ignores acceleration, stall, and
//! slip, and the rotation term is an unvalidated approximation, not a
//! derived differential-drive formula. Keep it unchanged unless the motion
//! model is respecified.

use std::f64::consts::PI;

/// Drive-train constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveParams {
    /// Linear speed at full motor power, in meters per second.
    pub max_motor_velocity: f64,
    /// Distance between the two wheels, in meters.
    pub wheelbase_length: f64,
}

impl DriveParams {
    /// Default speed at full power (m/s).
    pub const MAX_MOTOR_VELOCITY: f64 = 0.001;
    /// Default wheelbase (m).
    pub const WHEELBASE_LENGTH: f64 = 0.005;
}

impl Default for DriveParams {
    fn default() -> Self {
        Self {
            max_motor_velocity: Self::MAX_MOTOR_VELOCITY,
            wheelbase_length: Self::WHEELBASE_LENGTH,
        }
    }
}

/// Displacement produced over one tick.
///
/// Apply as translate(`direction`, `distance`) then rotate(`rotation`).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Movement {
    /// Heading change in radians.
    pub rotation: f64,
    /// Direction of travel relative to the current heading, in radians.
    pub direction: f64,
    /// Distance travelled in meters.
    pub distance: f64,
}

impl Movement {
    /// A movement that changes nothing.
    pub const NONE: Self = Self {
        rotation: 0.0,
        direction: 0.0,
        distance: 0.0,
    };
}

/// Compute the movement of a rover over `dt` seconds.
///
/// Powers are used exactly as given; values outside `[-1, 1]` are not
/// clamped.
///
/// With equal wheel speeds the rover drives straight at that speed. With
/// unequal speeds it moves at half the speed difference and turns towards
/// the slower wheel, positive rotation when motor A is faster.
#[allow(clippy::float_cmp)] // exact equality selects the straight-line branch
pub fn movement(power_a: f64, power_b: f64, dt: f64, params: &DriveParams) -> Movement {
    let s1 = params.max_motor_velocity * power_a;
    let s2 = params.max_motor_velocity * power_b;

    let (speed, rotation) = if s1 == s2 {
        (s1, 0.0)
    } else {
        let speed = (s1 - s2).abs() / 2.0;
        let sign = if s1 > s2 { 1.0 } else { -1.0 };

        let circ = PI * params.wheelbase_length;
        let arc_length = speed / circ;

        // Approximation: angle of the triangle formed by arc length and speed.
        // Not a validated physical model.
        (speed, sign * (arc_length / speed).atan())
    };

    Movement {
        rotation: rotation * dt,
        direction: 0.0,
        distance: speed * dt,
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn equal_power_drives_straight() {
        let m = movement(0.8, 0.8, 1.0, &DriveParams::default());
        assert!(m.rotation.abs() < EPS);
        assert!(m.direction.abs() < EPS);
        assert!((m.distance - 0.0008).abs() < EPS);
    }

    #[test]
    fn zero_elapsed_time_is_no_movement() {
        let m = movement(1.0, -1.0, 0.0, &DriveParams::default());
        assert!(m.rotation.abs() < EPS);
        assert!(m.distance.abs() < EPS);
    }

    #[test]
    fn unequal_power_turns_toward_slower_wheel() {
        let params = DriveParams::default();
        let right = movement(0.8, -0.8, 1.0, &params);
        assert!(right.rotation > 0.0);
        let left = movement(-0.8, 0.8, 1.0, &params);
        assert!(left.rotation < 0.0);
    }

    #[test]
    fn rotation_matches_arc_approximation() {
        let params = DriveParams::default();
        let m = movement(0.8, -0.8, 2.0, &params);
        let speed = 0.0008;
        let expected = ((speed / (PI * 0.005)) / speed).atan() * 2.0;
        assert!((m.rotation - expected).abs() < EPS);
        assert!((m.distance - speed * 2.0).abs() < EPS);
    }

    #[test]
    fn power_is_not_clamped() {
        let m = movement(2.0, 2.0, 1.0, &DriveParams::default());
        assert!((m.distance - 0.002).abs() < EPS);
    }

    proptest! {
        #[test]
        fn straight_line_has_no_rotation(p in -5.0f64..5.0, dt in 0.0f64..100.0) {
            let params = DriveParams::default();
            let m = movement(p, p, dt, &params);
            prop_assert!(m.rotation.abs() < EPS);
            prop_assert!((m.distance - params.max_motor_velocity * p * dt).abs() < 1e-9);
        }

        #[test]
        fn opposite_powers_rotate_symmetrically(p in 0.01f64..5.0, dt in 0.01f64..100.0) {
            let params = DriveParams::default();
            let a = movement(p, -p, dt, &params);
            let b = movement(-p, p, dt, &params);
            prop_assert!(a.rotation > 0.0);
            prop_assert!(b.rotation < 0.0);
            prop_assert!((a.rotation + b.rotation).abs() < 1e-9);
            prop_assert!((a.distance - b.distance).abs() < 1e-12);
        }
    }
}
