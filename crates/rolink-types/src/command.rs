//! External command ingress envelope.
//!
//! Requests arrive as loosely-typed JSON objects (`{"type": "move", ...}`).
//! They are parsed into the closed [`CommandRequest`] sum type; any `type`
//! that is not recognised becomes [`CommandRequest::Unknown`] instead of an
//! error, so the caller always gets a well-formed response back.

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A discrete command issued by the external command surface.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandRequest {
    Move {
        linear_velocity: f64,
        angular_velocity: f64,
    },
    Rotate {
        angular_velocity: f64,
    },
    Stop,
    Navigate {
        target_x: f64,
        target_y: f64,
    },
    /// Any `type` the bridge does not know. Carries the raw type name.
    Unknown(String),
}

impl CommandRequest {
    /// Parse a request object. Missing or non-numeric parameters default to
    /// `0.0`; a missing `type` is reported as `"unknown"`.
    pub fn from_value(value: &Value) -> Self {
        let number = |key: &str| value.get(key).and_then(Value::as_f64).unwrap_or(0.0);
        let kind = value.get("type").and_then(Value::as_str).unwrap_or("unknown");

        match kind {
            "move" => CommandRequest::Move {
                linear_velocity: number("linear_velocity"),
                angular_velocity: number("angular_velocity"),
            },
            "rotate" => CommandRequest::Rotate {
                angular_velocity: number("angular_velocity"),
            },
            "stop" => CommandRequest::Stop,
            "navigate" | "navigation" => CommandRequest::Navigate {
                target_x: number("target_x"),
                target_y: number("target_y"),
            },
            other => CommandRequest::Unknown(other.to_string()),
        }
    }

    /// The request's `type` name.
    pub fn type_name(&self) -> &str {
        match self {
            CommandRequest::Move { .. } => "move",
            CommandRequest::Rotate { .. } => "rotate",
            CommandRequest::Stop => "stop",
            CommandRequest::Navigate { .. } => "navigate",
            CommandRequest::Unknown(kind) => kind,
        }
    }
}

impl<'de> Deserialize<'de> for CommandRequest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(CommandRequest::from_value(&value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// What happened to an accepted command.
///
/// `delivered == false` means the command was applied locally but the
/// transport dropped it; acceptance and delivery are separate guarantees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub message: String,
    pub delivered: bool,
}

/// Response envelope: `{status, result | message, timestamp}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<CommandOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: f64,
}

impl CommandResponse {
    pub fn success(outcome: CommandOutcome) -> Self {
        Self {
            status: ResponseStatus::Success,
            result: Some(outcome),
            message: None,
            timestamp: unix_timestamp(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            result: None,
            message: Some(message.into()),
            timestamp: unix_timestamp(),
        }
    }
}

/// Seconds since the Unix epoch, with millisecond resolution.
pub fn unix_timestamp() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_move_request() {
        let req: CommandRequest = serde_json::from_value(json!({
            "type": "move",
            "linear_velocity": 1.0,
            "angular_velocity": 0.25
        }))
        .unwrap();
        assert_eq!(
            req,
            CommandRequest::Move {
                linear_velocity: 1.0,
                angular_velocity: 0.25
            }
        );
    }

    #[test]
    fn missing_parameters_default_to_zero() {
        let req = CommandRequest::from_value(&json!({"type": "rotate"}));
        assert_eq!(req, CommandRequest::Rotate { angular_velocity: 0.0 });

        let req = CommandRequest::from_value(&json!({"type": "move", "linear_velocity": "fast"}));
        assert_eq!(
            req,
            CommandRequest::Move {
                linear_velocity: 0.0,
                angular_velocity: 0.0
            }
        );
    }

    #[test]
    fn navigation_is_an_alias_of_navigate() {
        let req = CommandRequest::from_value(&json!({
            "type": "navigation",
            "target_x": 3.0,
            "target_y": -1.5
        }));
        assert_eq!(
            req,
            CommandRequest::Navigate {
                target_x: 3.0,
                target_y: -1.5
            }
        );
        assert_eq!(req.type_name(), "navigate");
    }

    #[test]
    fn unknown_and_missing_types_are_kept() {
        assert_eq!(
            CommandRequest::from_value(&json!({"type": "dance"})),
            CommandRequest::Unknown("dance".into())
        );
        assert_eq!(
            CommandRequest::from_value(&json!({"speed": 1})).type_name(),
            "unknown"
        );
    }

    #[test]
    fn success_response_omits_message() {
        let resp = CommandResponse::success(CommandOutcome {
            message: "Stop command sent successfully".into(),
            delivered: true,
        });
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["result"]["message"], "Stop command sent successfully");
        assert!(value.get("message").is_none());
        assert!(value["timestamp"].as_f64().unwrap() > 0.0);
    }

    #[test]
    fn error_response_omits_result() {
        let value = serde_json::to_value(CommandResponse::error("bad body")).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["message"], "bad body");
        assert!(value.get("result").is_none());
    }
}
