//! Robot state snapshot.
//!
//! Each side of the bridge owns exactly one [`RobotState`]; the two copies are
//! eventually-consistent mirrors fed by telemetry, never a shared object.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::TelemetryMessage;

/// Cartesian triple used for positions and twist components.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Vector3 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Orientation quaternion. The default is the identity rotation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(default = "unit_w")]
    pub w: f64,
}

fn unit_w() -> f64 {
    1.0
}

impl Quaternion {
    pub const IDENTITY: Self = Self { x: 0.0, y: 0.0, z: 0.0, w: 1.0 };

    pub fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Planar velocity summary: forward speed and yaw rate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Velocity {
    #[serde(default)]
    pub linear: f64,
    #[serde(default)]
    pub angular: f64,
}

impl Velocity {
    pub const ZERO: Self = Self { linear: 0.0, angular: 0.0 };
}

/// A full `geometry_msgs/Twist`-shaped velocity command.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Twist {
    pub linear: Vector3,
    pub angular: Vector3,
}

impl Twist {
    pub const ZERO: Self = Self {
        linear: Vector3::ZERO,
        angular: Vector3::ZERO,
    };
}

/// Target pose of a navigation goal.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PoseTarget {
    pub position: Vector3,
    pub orientation: Quaternion,
}

/// Coarse activity of the robot. Last write wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RobotStatus {
    #[default]
    Idle,
    Moving,
    Rotating,
    Stopped,
    Navigating,
    Active,
}

impl fmt::Display for RobotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RobotStatus::Idle => "idle",
            RobotStatus::Moving => "moving",
            RobotStatus::Rotating => "rotating",
            RobotStatus::Stopped => "stopped",
            RobotStatus::Navigating => "navigating",
            RobotStatus::Active => "active",
        };
        f.write_str(s)
    }
}

/// Canonical snapshot of pose, velocity, per-sensor readings and status.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RobotState {
    #[serde(default)]
    pub position: Vector3,
    #[serde(default)]
    pub orientation: Quaternion,
    #[serde(default)]
    pub velocity: Velocity,
    /// Last reading per sensor kind (`"lidar"`, `"imu"`, …). The payload shape
    /// is owned by the robotics middleware.
    #[serde(default)]
    pub sensors: BTreeMap<String, Value>,
    #[serde(default)]
    pub status: RobotStatus,
}

impl RobotState {
    /// Fold one telemetry record into the snapshot.
    ///
    /// * `pose` – overwrites whichever of position / orientation is present.
    /// * `velocity` – overwrites the velocity wholesale.
    /// * `sensor_data` – overwrites the reading for that sensor kind.
    /// * `status` – overwrites the status.
    pub fn apply(&mut self, message: &TelemetryMessage) {
        match message {
            TelemetryMessage::Pose {
                position,
                orientation,
            } => {
                if let Some(position) = position {
                    self.position = *position;
                }
                if let Some(orientation) = orientation {
                    self.orientation = *orientation;
                }
            }
            TelemetryMessage::Velocity { velocity } => self.velocity = *velocity,
            TelemetryMessage::SensorData { sensor_type, data } => {
                self.sensors.insert(sensor_type.clone(), data.clone());
            }
            // `robot_data` is passed through to the sink, not folded in.
            TelemetryMessage::Status { status, .. } => self.status = *status,
        }
    }
}
