//! Error taxonomy.
//!
//! Only setup failures ([`BridgeError::Bind`], [`BridgeError::Connect`],
//! [`BridgeError::Config`]) are meant to stop a process. Everything else is
//! contained at the boundary of the single message that caused it.
//!
//! A full transport queue or a receive timeout is not an error at all; see
//! `rolink_middleware::channel` for those outcomes.

use thiserror::Error;

/// Errors surfaced by the bridge components.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("failed to bind transport endpoint {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to connect to transport endpoint {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Capability(#[from] CapabilityError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

impl BridgeError {
    /// `true` for the setup failures that must terminate the process.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BridgeError::Bind { .. } | BridgeError::Connect { .. } | BridgeError::Config(_)
        )
    }
}

/// Failure reported by an actuator / navigation capability.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CapabilityError {
    #[error("{capability} unavailable")]
    Unavailable { capability: String },

    #[error("{capability} rejected the request: {reason}")]
    Rejected { capability: String, reason: String },

    #[error("{capability} failed: {reason}")]
    Failed { capability: String, reason: String },
}

/// Failure delivering a record to the external telemetry sink.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SinkError {
    #[error("telemetry sink unreachable: {0}")]
    Http(String),

    #[error("telemetry sink answered HTTP {0}")]
    Status(u16),

    #[error("telemetry sink did not answer within {0} ms")]
    Timeout(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_setup_failures_are_fatal() {
        let bind = BridgeError::Bind {
            addr: "0.0.0.0:5555".into(),
            source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
        };
        assert!(bind.is_fatal());
        assert!(bind.to_string().contains("0.0.0.0:5555"));

        assert!(BridgeError::Config("bad port".into()).is_fatal());
        assert!(!BridgeError::Transport("peer gone".into()).is_fatal());
        assert!(!BridgeError::from(SinkError::Status(503)).is_fatal());
    }

    #[test]
    fn capability_error_display_names_the_capability() {
        let err = BridgeError::from(CapabilityError::Unavailable {
            capability: "navigate_to_pose".into(),
        });
        assert_eq!(err.to_string(), "navigate_to_pose unavailable");
    }
}
