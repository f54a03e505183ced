//! `rolink-bridge` – the command-issuer side of the bridge.
//!
//! # Modules
//!
//! - [`router`] – [`CommandRouter`]: turns external command requests into
//!   command-channel records, applying them to the local state first.
//! - [`relay`] – [`TelemetryRelay`]: the bridge-side receive loop that folds
//!   telemetry into the local state and reports it to the external sink.
//! - [`sink`] – the [`TelemetrySink`] trait and its HTTP implementation.
//! - [`service`] – [`BridgeService`]: the operations an HTTP front end calls
//!   (command, state, sensors, health).

pub mod relay;
pub mod router;
pub mod service;
pub mod sink;

pub use relay::{RelayConfig, TelemetryRelay};
pub use router::{CommandRouter, translate};
pub use service::BridgeService;
pub use sink::{HttpSink, NullSink, TelemetrySink};
