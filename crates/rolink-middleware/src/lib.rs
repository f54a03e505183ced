//! `rolink-middleware` – the plumbing between the two sides of the bridge.
//!
//! Moves records between the bridge side and the robot side without caring
//! about their meaning, and holds the per-side state cache.
//!
//! # Modules
//!
//! - [`channel`] – bounded, never-blocking, unidirectional transport queues
//!   and the [`BridgeEndpoint`] / [`RobotEndpoint`] pairs built from them.
//! - [`tcp`] – newline-delimited JSON link that backs a channel pair with a
//!   single TCP connection between two processes.
//! - [`state_store`] – [`StateStore`], the lock-guarded [`RobotState`] cache.
//! - [`throttle`] – per-kind forwarding strides.
//! - [`shutdown`] – [`ShutdownSignal`], the process-wide "running" flag.
//!
//! [`RobotState`]: rolink_types::RobotState

pub mod channel;
pub mod shutdown;
pub mod state_store;
pub mod tcp;
pub mod throttle;

pub use channel::{
    BridgeEndpoint, Received, RobotEndpoint, TransportConfig, TransportReceiver, TransportSender,
    TrySendError,
};
pub use shutdown::ShutdownSignal;
pub use state_store::StateStore;
pub use throttle::{ForwardPolicy, Throttle, ThrottlePolicy};
