//! Wrap-safe encoder integration and differential-drive forward kinematics.
//!
//! Encoder counters and the device timestamp are 16-bit and wrap freely;
//! every delta is reduced modulo 2^16 and reinterpreted as signed, so
//! motion in either direction across the wrap boundary integrates with the
//! correct sign. Accumulated wheel angles are kept in double precision.

use crate::config::Geometry;
use crate::protocol::bytes::wrap_diff_16;
use crate::protocol::records::CoreSensorData;

/// Planar pose increment in the base frame: longitudinal metres and heading
/// radians (a differential base cannot translate laterally, so `y` stays 0).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PoseDelta {
    pub x: f64,
    pub y: f64,
    pub heading: f64,
}

/// Result of one odometry update.
#[derive(Debug, Clone, Copy, Default)]
pub struct OdometryUpdate {
    /// Accumulated wheel angles in radians
    pub left_position: f64,
    pub right_position: f64,
    /// Wheel angular velocities in rad/s; zero when the device timestamp
    /// did not advance
    pub left_velocity: f64,
    pub right_velocity: f64,
    /// Pose increment for this sample
    pub pose_delta: PoseDelta,
    /// Pose increment divided by the sample interval; zero when the device
    /// timestamp did not advance
    pub pose_rates: PoseDelta,
}

/// Integrates core sensor records into wheel state and pose increments.
pub struct Odometry {
    geometry: Geometry,
    tick_to_rad: f64,
    tick_to_mm: f64,

    last_tick_left: u16,
    last_tick_right: u16,
    init_left: bool,
    init_right: bool,

    last_rad_left: f64,
    last_rad_right: f64,
    last_mm_left: f64,
    last_mm_right: f64,

    last_timestamp: u16,
    last_diff_time: f64,
    last_velocity_left: f64,
    last_velocity_right: f64,
}

impl Odometry {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            tick_to_rad: geometry.tick_to_rad(),
            tick_to_mm: geometry.tick_to_mm(),
            last_tick_left: 0,
            last_tick_right: 0,
            init_left: false,
            init_right: false,
            last_rad_left: 0.0,
            last_rad_right: 0.0,
            last_mm_left: 0.0,
            last_mm_right: 0.0,
            last_timestamp: 0,
            last_diff_time: 0.0,
            last_velocity_left: 0.0,
            last_velocity_right: 0.0,
        }
    }

    /// Ingest one core sensor record.
    ///
    /// The first sample per wheel only seeds the tick baseline (delta 0).
    /// Velocities are estimated from the 16-bit millisecond device
    /// timestamp; when two records carry the same timestamp, velocities and
    /// pose rates report zero for that call while accumulated positions
    /// still advance.
    pub fn update(&mut self, core: &CoreSensorData) -> OdometryUpdate {
        let curr_timestamp = core.time_stamp;

        let left_diff_ticks = if self.init_left {
            wrap_diff_16(core.left_encoder, self.last_tick_left) as f64
        } else {
            self.init_left = true;
            0.0
        };
        self.last_tick_left = core.left_encoder;
        self.last_rad_left += self.tick_to_rad * left_diff_ticks;
        self.last_mm_left += self.tick_to_mm / 1000.0 * left_diff_ticks;

        let right_diff_ticks = if self.init_right {
            wrap_diff_16(core.right_encoder, self.last_tick_right) as f64
        } else {
            self.init_right = true;
            0.0
        };
        self.last_tick_right = core.right_encoder;
        self.last_rad_right += self.tick_to_rad * right_diff_ticks;
        self.last_mm_right += self.tick_to_mm / 1000.0 * right_diff_ticks;

        let left_rad_delta = self.tick_to_rad * left_diff_ticks;
        let right_rad_delta = self.tick_to_rad * right_diff_ticks;
        let pose_delta = self.forward_kinematics(left_rad_delta, right_rad_delta);

        let (left_velocity, right_velocity, pose_rates) = if curr_timestamp != self.last_timestamp
        {
            let dt = f64::from(wrap_diff_16(curr_timestamp, self.last_timestamp)) / 1000.0;
            self.last_timestamp = curr_timestamp;
            self.last_diff_time = dt;
            self.last_velocity_left = left_rad_delta / dt;
            self.last_velocity_right = right_rad_delta / dt;
            let rates = PoseDelta {
                x: pose_delta.x / dt,
                y: 0.0,
                heading: pose_delta.heading / dt,
            };
            (self.last_velocity_left, self.last_velocity_right, rates)
        } else {
            (0.0, 0.0, PoseDelta::default())
        };

        OdometryUpdate {
            left_position: self.last_rad_left,
            right_position: self.last_rad_right,
            left_velocity,
            right_velocity,
            pose_delta,
            pose_rates,
        }
    }

    /// Differential-drive forward kinematics: per-wheel angular increments
    /// to a base-frame pose increment.
    pub fn forward_kinematics(&self, left_rad: f64, right_rad: f64) -> PoseDelta {
        let r = self.geometry.wheel_radius;
        PoseDelta {
            x: r * (left_rad + right_rad) / 2.0,
            y: 0.0,
            heading: r * (right_rad - left_rad) / self.geometry.wheel_base,
        }
    }

    /// Accumulated wheel angle in radians.
    pub fn wheel_position(&self, left: bool) -> f64 {
        if left {
            self.last_rad_left
        } else {
            self.last_rad_right
        }
    }

    /// Most recent wheel angular velocity estimate in rad/s.
    pub fn wheel_velocity(&self, left: bool) -> f64 {
        if left {
            self.last_velocity_left
        } else {
            self.last_velocity_right
        }
    }

    /// Seconds between the two most recent distinct device timestamps.
    pub fn last_diff_time(&self) -> f64 {
        self.last_diff_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn core(time_stamp: u16, left: u16, right: u16) -> CoreSensorData {
        CoreSensorData {
            time_stamp,
            left_encoder: left,
            right_encoder: right,
            ..Default::default()
        }
    }

    fn odometry() -> Odometry {
        Odometry::new(Geometry::default())
    }

    #[test]
    fn test_first_sample_seeds_baseline() {
        let mut odo = odometry();
        let up = odo.update(&core(100, 4000, 9000));
        assert_eq!(up.left_position, 0.0);
        assert_eq!(up.right_position, 0.0);
        assert_eq!(up.pose_delta, PoseDelta::default());
    }

    #[test]
    fn test_encoder_wrap_forward() {
        let mut odo = odometry();
        odo.update(&core(0, 65530, 0));
        let up = odo.update(&core(10, 5, 0));

        let tick_to_rad = Geometry::default().tick_to_rad();
        assert!((up.left_position - 11.0 * tick_to_rad).abs() < 1e-12);
    }

    #[test]
    fn test_encoder_wrap_backward() {
        let mut odo = odometry();
        odo.update(&core(0, 5, 5));
        let up = odo.update(&core(10, 65530, 65530));

        let tick_to_rad = Geometry::default().tick_to_rad();
        assert!((up.left_position + 11.0 * tick_to_rad).abs() < 1e-12);
        assert!(up.left_velocity < 0.0);
    }

    #[test]
    fn test_monotonic_accumulation_no_drift() {
        let mut odo = odometry();
        let mut tick: u16 = 0;
        odo.update(&core(0, tick, tick));
        for step in 1..=2000u32 {
            tick = tick.wrapping_add(100);
            odo.update(&core((step * 10) as u16, tick, tick));
        }
        let expected = 2000.0 * 100.0 * Geometry::default().tick_to_rad();
        assert!((odo.wheel_position(true) - expected).abs() < 1e-6);
        assert!((odo.wheel_position(false) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_velocity_from_device_timestamp() {
        let mut odo = odometry();
        odo.update(&core(1000, 0, 0));
        let up = odo.update(&core(1050, 50, 50)); // 50 ticks in 50 ms

        let tick_to_rad = Geometry::default().tick_to_rad();
        let expected = 50.0 * tick_to_rad / 0.050;
        assert!((up.left_velocity - expected).abs() < 1e-9);
        assert!((odo.last_diff_time() - 0.050).abs() < 1e-12);
    }

    #[test]
    fn test_timestamp_wrap() {
        let mut odo = odometry();
        odo.update(&core(65500, 0, 0));
        let up = odo.update(&core(64, 60, 60)); // 100 ms across the wrap
        let tick_to_rad = Geometry::default().tick_to_rad();
        assert!((up.left_velocity - 60.0 * tick_to_rad / 0.100).abs() < 1e-9);
    }

    #[test]
    fn test_stale_timestamp_zeroes_rates_keeps_position() {
        let mut odo = odometry();
        odo.update(&core(500, 0, 0));
        odo.update(&core(520, 20, 20));
        let up = odo.update(&core(520, 40, 40)); // same timestamp, wheels moved

        assert_eq!(up.left_velocity, 0.0);
        assert_eq!(up.right_velocity, 0.0);
        assert_eq!(up.pose_rates, PoseDelta::default());
        let tick_to_rad = Geometry::default().tick_to_rad();
        assert!((up.left_position - 40.0 * tick_to_rad).abs() < 1e-12);
        // pose still advances even though rates are zeroed
        assert!(up.pose_delta.x > 0.0);
    }

    #[test]
    fn test_forward_kinematics_straight() {
        let odo = odometry();
        let delta = odo.forward_kinematics(1.0, 1.0);
        assert!((delta.x - 0.042).abs() < 1e-12);
        assert_eq!(delta.heading, 0.0);
        assert_eq!(delta.y, 0.0);
    }

    #[test]
    fn test_forward_kinematics_spin() {
        let odo = odometry();
        let delta = odo.forward_kinematics(-1.0, 1.0);
        assert_eq!(delta.x, 0.0);
        assert!((delta.heading - 2.0 * 0.042 / 0.298).abs() < 1e-12);
    }
}
