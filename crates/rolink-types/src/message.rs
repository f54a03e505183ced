//! Self-describing transport records.
//!
//! Every record is serialised as a single JSON object whose `type` field names
//! the variant, so the receiver can dispatch without any schema negotiation:
//!
//! | Channel | `type` values |
//! |---|---|
//! | command (bridge → robot) | `cmd_vel`, `nav_goal`, `status_request` |
//! | telemetry (robot → bridge) | `pose`, `velocity`, `sensor_data`, `status` |

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::BridgeError;
use crate::state::{PoseTarget, Quaternion, RobotState, RobotStatus, Twist, Vector3, Velocity};

/// A record that can travel over a transport channel.
pub trait WireRecord: Serialize + DeserializeOwned + Send + 'static {
    /// The `type` discriminator of this record, for logging.
    fn kind(&self) -> &'static str;
}

/// Actuation record sent from the bridge side to the robot side.
///
/// Immutable once built; replaying the same record is idempotent on the
/// robot side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandMessage {
    /// Continuous velocity command.
    CmdVel { linear: Vector3, angular: Vector3 },
    /// Navigation goal for the navigation action server.
    NavGoal { target_pose: PoseTarget },
    /// Ask the robot side to report its current state.
    StatusRequest,
}

impl CommandMessage {
    pub fn cmd_vel(twist: Twist) -> Self {
        CommandMessage::CmdVel {
            linear: twist.linear,
            angular: twist.angular,
        }
    }

    /// Navigation goal at `(x, y)` on the ground plane, facing the map's
    /// default heading.
    pub fn nav_goal(x: f64, y: f64) -> Self {
        CommandMessage::NavGoal {
            target_pose: PoseTarget {
                position: Vector3::new(x, y, 0.0),
                orientation: Quaternion::IDENTITY,
            },
        }
    }
}

impl WireRecord for CommandMessage {
    fn kind(&self) -> &'static str {
        match self {
            CommandMessage::CmdVel { .. } => "cmd_vel",
            CommandMessage::NavGoal { .. } => "nav_goal",
            CommandMessage::StatusRequest => "status_request",
        }
    }
}

/// Sensor / pose / status record sent from the robot side to the bridge side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TelemetryMessage {
    /// Pose update. Either part may be absent; only present parts are applied.
    Pose {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<Vector3>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        orientation: Option<Quaternion>,
    },
    Velocity { velocity: Velocity },
    /// Latest reading of one sensor kind (`"lidar"`, `"imu"`, …).
    SensorData { sensor_type: String, data: Value },
    /// Status report, optionally carrying the reporter's whole snapshot.
    Status {
        status: RobotStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        robot_data: Option<Box<RobotState>>,
    },
}

impl TelemetryMessage {
    /// Key under which forwarding of this record is throttled: the sensor
    /// kind for sensor readings, the record type otherwise.
    pub fn throttle_key(&self) -> &str {
        match self {
            TelemetryMessage::SensorData { sensor_type, .. } => sensor_type,
            other => other.kind(),
        }
    }
}

impl WireRecord for TelemetryMessage {
    fn kind(&self) -> &'static str {
        match self {
            TelemetryMessage::Pose { .. } => "pose",
            TelemetryMessage::Velocity { .. } => "velocity",
            TelemetryMessage::SensorData { .. } => "sensor_data",
            TelemetryMessage::Status { .. } => "status",
        }
    }
}

/// Encode a record as one line of JSON text.
pub fn encode_record<T: WireRecord>(record: &T) -> Result<String, BridgeError> {
    Ok(serde_json::to_string(record)?)
}

/// Decode one line of JSON text into a record.
pub fn decode_record<T: WireRecord>(line: &str) -> Result<T, BridgeError> {
    Ok(serde_json::from_str(line.trim())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cmd_vel_wire_shape() {
        let msg = CommandMessage::CmdVel {
            linear: Vector3::new(1.0, 0.0, 0.0),
            angular: Vector3::new(0.0, 0.0, 0.5),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "cmd_vel",
                "linear": {"x": 1.0, "y": 0.0, "z": 0.0},
                "angular": {"x": 0.0, "y": 0.0, "z": 0.5}
            })
        );
    }

    #[test]
    fn nav_goal_wire_shape() {
        let value = serde_json::to_value(CommandMessage::nav_goal(3.0, -1.5)).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "nav_goal",
                "target_pose": {
                    "position": {"x": 3.0, "y": -1.5, "z": 0.0},
                    "orientation": {"x": 0.0, "y": 0.0, "z": 0.0, "w": 1.0}
                }
            })
        );
    }

    #[test]
    fn status_request_is_type_only() {
        let line = encode_record(&CommandMessage::StatusRequest).unwrap();
        assert_eq!(line, r#"{"type":"status_request"}"#);
    }

    #[test]
    fn decodes_sensor_record_from_robot_side() {
        let line = r#"{"type":"sensor_data","sensor_type":"lidar","data":{"min_range":0.2,"range_count":360}}"#;
        let msg: TelemetryMessage = decode_record(line).unwrap();
        assert_eq!(msg.throttle_key(), "lidar");
        assert_eq!(msg.kind(), "sensor_data");
        match msg {
            TelemetryMessage::SensorData { data, .. } => {
                assert_eq!(data["range_count"], json!(360));
            }
            other => panic!("unexpected record: {other:?}"),
        }
    }

    #[test]
    fn decodes_pose_without_orientation() {
        let msg: TelemetryMessage =
            decode_record(r#"{"type":"pose","position":{"x":1.0,"y":2.0,"z":0.0}}"#).unwrap();
        assert_eq!(
            msg,
            TelemetryMessage::Pose {
                position: Some(Vector3::new(1.0, 2.0, 0.0)),
                orientation: None,
            }
        );
        assert_eq!(msg.throttle_key(), "pose");
    }

    #[test]
    fn unknown_type_is_rejected() {
        let result: Result<CommandMessage, _> = decode_record(r#"{"type":"self_destruct"}"#);
        assert!(matches!(result, Err(BridgeError::Serialization(_))));
    }

    #[test]
    fn status_record_carries_snapshot() {
        let mut snapshot = RobotState::default();
        snapshot.position = Vector3::new(4.0, 5.0, 0.0);
        let msg = TelemetryMessage::Status {
            status: RobotStatus::Active,
            robot_data: Some(Box::new(snapshot.clone())),
        };
        let back: TelemetryMessage = decode_record(&encode_record(&msg).unwrap()).unwrap();
        match back {
            TelemetryMessage::Status { status, robot_data } => {
                assert_eq!(status, RobotStatus::Active);
                assert_eq!(robot_data.as_deref(), Some(&snapshot));
            }
            other => panic!("unexpected record: {other:?}"),
        }
    }
}
