//! Raw sensor messages and their telemetry form.
//!
//! Each middleware message is reduced to the fields the bridge cares about.
//! [`SensorEvent::fold_into`] applies a message to the robot-side state and
//! yields the record that is offered upstream:
//!
//! | Event | Local effect | Offered record |
//! |---|---|---|
//! | [`Odometry`] | position, orientation, velocity | `pose` |
//! | [`LaserScan`] | `sensors.lidar` = scan summary | `sensor_data/lidar` |
//! | [`Imu`] | `sensors.imu` = reading | `sensor_data/imu` |
//! | [`CameraImage`] | `sensors.camera.<side>` = image metadata | `sensor_data/camera` |

use rolink_types::{Quaternion, RobotState, TelemetryMessage, Vector3, Velocity};
use serde_json::{Map, Value, json};

pub const LIDAR: &str = "lidar";
pub const IMU: &str = "imu";
pub const CAMERA: &str = "camera";

/// Wheel odometry: pose plus body-frame twist.
#[derive(Debug, Clone, PartialEq)]
pub struct Odometry {
    pub position: Vector3,
    pub orientation: Quaternion,
    pub linear: Vector3,
    pub angular: Vector3,
}

impl Odometry {
    pub fn pose(&self) -> TelemetryMessage {
        TelemetryMessage::Pose {
            position: Some(self.position),
            orientation: Some(self.orientation),
        }
    }

    /// Planar velocity: forward speed and yaw rate.
    pub fn velocity(&self) -> Velocity {
        Velocity {
            linear: self.linear.x,
            angular: self.angular.z,
        }
    }
}

/// One planar laser sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct LaserScan {
    pub angle_min: f64,
    pub angle_max: f64,
    pub range_min: f64,
    pub range_max: f64,
    pub ranges: Vec<f64>,
}

impl LaserScan {
    /// `{min_range, max_range, angle_min, angle_max, range_count}`.
    ///
    /// Only readings strictly inside `(range_min, range_max)` count towards
    /// the min / max; when none do, both are `null`.
    pub fn summary(&self) -> Value {
        let valid = || {
            self.ranges
                .iter()
                .copied()
                .filter(|r| *r > self.range_min && *r < self.range_max)
        };
        let min_range = valid().reduce(f64::min);
        let max_range = valid().reduce(f64::max);
        json!({
            "min_range": min_range,
            "max_range": max_range,
            "angle_min": self.angle_min,
            "angle_max": self.angle_max,
            "range_count": self.ranges.len(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Imu {
    pub orientation: Quaternion,
    pub angular_velocity: Vector3,
    pub linear_acceleration: Vector3,
}

impl Imu {
    pub fn reading(&self) -> Value {
        json!({
            "orientation": self.orientation,
            "angular_velocity": self.angular_velocity,
            "linear_acceleration": self.linear_acceleration,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraSide {
    Left,
    Right,
}

impl CameraSide {
    pub fn as_str(self) -> &'static str {
        match self {
            CameraSide::Left => "left",
            CameraSide::Right => "right",
        }
    }
}

/// Image header of one stereo camera frame. Pixel data is not carried.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraImage {
    pub side: CameraSide,
    pub width: u32,
    pub height: u32,
    pub encoding: String,
    pub stamp_sec: i64,
    pub stamp_nanosec: u32,
}

impl CameraImage {
    /// `{width, height, encoding, stamp}` with `stamp` in fractional seconds.
    pub fn metadata(&self) -> Value {
        json!({
            "width": self.width,
            "height": self.height,
            "encoding": self.encoding,
            "stamp": self.stamp_sec as f64 + f64::from(self.stamp_nanosec) * 1e-9,
        })
    }
}

/// A raw message from one of the robot's sensor subscriptions.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorEvent {
    Odometry(Odometry),
    LaserScan(LaserScan),
    Imu(Imu),
    Camera(CameraImage),
}

impl SensorEvent {
    /// Apply to `state` and return the record to offer upstream.
    pub fn fold_into(&self, state: &mut RobotState) -> TelemetryMessage {
        match self {
            SensorEvent::Odometry(odom) => {
                let pose = odom.pose();
                state.apply(&pose);
                state.velocity = odom.velocity();
                pose
            }
            SensorEvent::LaserScan(scan) => sensor_reading(state, LIDAR, scan.summary()),
            SensorEvent::Imu(imu) => sensor_reading(state, IMU, imu.reading()),
            SensorEvent::Camera(image) => {
                let entry = state
                    .sensors
                    .entry(CAMERA.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                if !entry.is_object() {
                    *entry = Value::Object(Map::new());
                }
                if let Value::Object(sides) = entry {
                    sides.insert(image.side.as_str().to_string(), image.metadata());
                }
                TelemetryMessage::SensorData {
                    sensor_type: CAMERA.to_string(),
                    data: entry.clone(),
                }
            }
        }
    }
}

fn sensor_reading(state: &mut RobotState, kind: &str, data: Value) -> TelemetryMessage {
    let record = TelemetryMessage::SensorData {
        sensor_type: kind.to_string(),
        data,
    };
    state.apply(&record);
    record
}
