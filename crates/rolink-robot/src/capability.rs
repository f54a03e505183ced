//! The boundary to the robotics middleware.
//!
//! The robot side never speaks a middleware protocol directly. It calls these
//! traits, and an implementation translates to whatever the robot runs
//! (`/cmd_vel` publishers, a `navigate_to_pose` action client, topic
//! subscriptions, ...).
//!
//! # Contract
//!
//! * [`VelocityPublisher::publish`] – fire-and-forget; returns once the
//!   command is handed to the middleware.
//! * [`NavigationClient::wait_for_server`] – must resolve within `timeout`.
//! * [`SensorSource::events`] – a live stream of raw sensor messages; the
//!   stream ending means the source is gone.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use rolink_types::{CapabilityError, PoseTarget, Twist};

use crate::sensors::SensorEvent;

/// Publishes continuous velocity commands.
pub trait VelocityPublisher: Send + Sync {
    fn publish(&self, twist: &Twist) -> Result<(), CapabilityError>;
}

/// Sends navigation goals to a goal-seeking server.
#[async_trait]
pub trait NavigationClient: Send + Sync {
    /// `true` once the server is ready to accept goals, `false` if it did
    /// not become ready within `timeout`.
    async fn wait_for_server(&self, timeout: Duration) -> bool;

    /// Submit a goal. Resolves when the server has taken it, not when the
    /// robot arrives.
    async fn send_goal(&self, target: PoseTarget) -> Result<(), CapabilityError>;
}

/// Produces raw sensor messages.
pub trait SensorSource: Send {
    fn events(&mut self) -> BoxStream<'static, SensorEvent>;
}
