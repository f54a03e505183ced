//! `rolink-types` – shared vocabulary of the bridge.
//!
//! Everything that crosses a component boundary lives here: the robot state
//! snapshot, the records carried by the two transport channels, the external
//! command envelope, and the error taxonomy.
//!
//! # Modules
//!
//! - [`state`] – [`RobotState`] and its geometric building blocks.
//! - [`message`] – [`CommandMessage`] (bridge → robot) and
//!   [`TelemetryMessage`] (robot → bridge), the self-describing wire records.
//! - [`command`] – [`CommandRequest`] / [`CommandResponse`], the external
//!   command ingress envelope.
//! - [`error`] – [`BridgeError`], [`CapabilityError`], [`SinkError`].

pub mod command;
pub mod error;
pub mod message;
pub mod state;

pub use command::{CommandOutcome, CommandRequest, CommandResponse, ResponseStatus, unix_timestamp};
pub use error::{BridgeError, CapabilityError, SinkError};
pub use message::{CommandMessage, TelemetryMessage, WireRecord, decode_record, encode_record};
pub use state::{PoseTarget, Quaternion, RobotState, RobotStatus, Twist, Vector3, Velocity};
