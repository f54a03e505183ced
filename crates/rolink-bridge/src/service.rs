//! [`BridgeService`] – the operations an external front end exposes.
//!
//! One method per route: submit a command, read the cached state, read the
//! cached sensors, health check. Every method returns a serializable
//! response envelope carrying a Unix timestamp; none of them fail.

use std::collections::BTreeMap;

use rolink_types::{
    CommandRequest, CommandResponse, ResponseStatus, RobotState, unix_timestamp,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::router::CommandRouter;

/// `{status: success, state, timestamp}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateResponse {
    pub status: ResponseStatus,
    pub state: RobotState,
    pub timestamp: f64,
}

/// `{status: success, sensors, timestamp}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorsResponse {
    pub status: ResponseStatus,
    pub sensors: BTreeMap<String, Value>,
    pub timestamp: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub bridge_version: String,
    pub transport_connected: bool,
    pub timestamp: f64,
}

pub struct BridgeService {
    router: CommandRouter,
}

impl BridgeService {
    pub fn new(router: CommandRouter) -> Self {
        Self { router }
    }

    /// Handle one raw command body. A body that is not a JSON object yields
    /// an error response; anything else goes through the router.
    pub fn handle_command(&self, body: &str) -> CommandResponse {
        match serde_json::from_str::<Value>(body) {
            Ok(value) => self.handle_value(&value),
            Err(e) => {
                warn!(error = %e, "rejecting malformed command body");
                CommandResponse::error(format!("invalid command body: {e}"))
            }
        }
    }

    pub fn handle_value(&self, value: &Value) -> CommandResponse {
        if !value.is_object() {
            warn!("rejecting non-object command body");
            return CommandResponse::error("command body must be a JSON object");
        }
        self.router.dispatch(&CommandRequest::from_value(value))
    }

    pub fn state(&self) -> StateResponse {
        StateResponse {
            status: ResponseStatus::Success,
            state: self.router.state().snapshot(),
            timestamp: unix_timestamp(),
        }
    }

    pub fn sensors(&self) -> SensorsResponse {
        SensorsResponse {
            status: ResponseStatus::Success,
            sensors: self.router.state().sensors(),
            timestamp: unix_timestamp(),
        }
    }

    pub fn health(&self) -> HealthResponse {
        HealthResponse {
            status: "healthy".to_string(),
            bridge_version: env!("CARGO_PKG_VERSION").to_string(),
            transport_connected: self.router.is_connected(),
            timestamp: unix_timestamp(),
        }
    }

    /// Queue a `status_request` for the robot side.
    pub fn request_status(&self) -> bool {
        self.router.request_status()
    }

    pub fn router(&self) -> &CommandRouter {
        &self.router
    }
}
