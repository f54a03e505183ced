//! `rolink-robot` – the robot side of the bridge.
//!
//! Sits between the command/telemetry link and the robotics middleware. The
//! middleware itself is never named here: it is reached through the
//! capability traits in [`capability`], so the same executor and aggregator
//! drive a real robot or the simulated one in [`sim`].
//!
//! # Modules
//!
//! - [`capability`] – [`VelocityPublisher`], [`NavigationClient`] and
//!   [`SensorSource`]: the boundary to the robotics middleware.
//! - [`executor`] – [`CommandExecutor`]: command-channel receive loop.
//! - [`aggregator`] – [`TelemetryAggregator`]: folds sensor events into the
//!   robot-side state and forwards them at per-kind rates.
//! - [`sensors`] – raw sensor messages and their conversion into telemetry.
//! - [`sim`] – in-process capabilities for running without a robot.

pub mod aggregator;
pub mod capability;
pub mod executor;
pub mod sensors;
pub mod sim;

pub use aggregator::{Disposition, TelemetryAggregator};
pub use capability::{NavigationClient, SensorSource, VelocityPublisher};
pub use executor::{CommandExecutor, ExecutorConfig};
pub use sensors::{CameraImage, CameraSide, Imu, LaserScan, Odometry, SensorEvent};
pub use sim::{RecordingPublisher, SimNavigation, SimSensorFeed};
