//! [`CommandExecutor`] – robot-side command loop.
//!
//! Polls the command channel with a bounded timeout and dispatches each
//! record to a capability:
//!
//! * `cmd_vel` → [`VelocityPublisher::publish`]
//! * `nav_goal` → [`NavigationClient::wait_for_server`] then
//!   [`NavigationClient::send_goal`]; a server that is not ready within
//!   [`ExecutorConfig::nav_server_wait`] drops the goal, and so does a
//!   shutdown while either step is pending
//! * `status_request` → a `status` record carrying the robot-side snapshot,
//!   offered to the telemetry channel
//!
//! A failing record is logged and the loop moves on to the next one.

use std::sync::Arc;
use std::time::Duration;

use rolink_middleware::channel::DEFAULT_POLL_TIMEOUT;
use rolink_middleware::{
    Received, ShutdownSignal, StateStore, TransportReceiver, TransportSender, TrySendError,
};
use rolink_types::{
    BridgeError, CapabilityError, CommandMessage, PoseTarget, RobotStatus, TelemetryMessage, Twist,
    WireRecord,
};
use tracing::{debug, error, info, trace, warn};

use crate::capability::{NavigationClient, VelocityPublisher};

/// How long a navigation goal waits for the server to come up.
pub const DEFAULT_NAV_SERVER_WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorConfig {
    pub poll_timeout: Duration,
    pub nav_server_wait: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            nav_server_wait: DEFAULT_NAV_SERVER_WAIT,
        }
    }
}

pub struct CommandExecutor {
    state: StateStore,
    velocity: Arc<dyn VelocityPublisher>,
    navigation: Arc<dyn NavigationClient>,
    telemetry: TransportSender<TelemetryMessage>,
    config: ExecutorConfig,
}

impl CommandExecutor {
    pub fn new(
        state: StateStore,
        velocity: Arc<dyn VelocityPublisher>,
        navigation: Arc<dyn NavigationClient>,
        telemetry: TransportSender<TelemetryMessage>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            state,
            velocity,
            navigation,
            telemetry,
            config,
        }
    }

    /// Execute one command record.
    ///
    /// # Errors
    ///
    /// Returns the capability failure for this record; the caller logs it.
    pub async fn execute(&self, command: CommandMessage, shutdown: &ShutdownSignal) -> Result<(), BridgeError> {
        match command {
            CommandMessage::CmdVel { linear, angular } => self.publish_velocity(Twist { linear, angular }),
            CommandMessage::NavGoal { target_pose } => self.navigate(target_pose, shutdown).await,
            CommandMessage::StatusRequest => self.report_status(),
        }
    }

    /// Receive and execute until `shutdown` fires or the channel closes.
    ///
    /// Marks the robot-side status `active` on entry.
    pub async fn run(&self, mut commands: TransportReceiver<CommandMessage>, shutdown: ShutdownSignal) {
        self.state.update(|state| state.status = RobotStatus::Active);
        info!("command executor started");
        while !shutdown.is_triggered() {
            match commands.receive(self.config.poll_timeout).await {
                Received::Message(command) => {
                    let kind = command.kind();
                    debug!(kind, "received command");
                    if let Err(e) = self.execute(command, &shutdown).await {
                        error!(kind, error = %e, "command failed");
                    }
                }
                Received::Timeout => trace!("no command within poll timeout"),
                Received::Closed => {
                    info!("command channel closed");
                    break;
                }
            }
        }
        commands.close();
        info!("command executor stopped");
    }

    fn publish_velocity(&self, twist: Twist) -> Result<(), BridgeError> {
        self.velocity.publish(&twist)?;
        debug!(linear = twist.linear.x, angular = twist.angular.z, "published cmd_vel");
        Ok(())
    }

    async fn navigate(&self, target: PoseTarget, shutdown: &ShutdownSignal) -> Result<(), BridgeError> {
        let wait = self.config.nav_server_wait;
        let ready = tokio::select! {
            biased;
            _ = shutdown.triggered() => {
                info!("shutdown while waiting for navigation server; goal dropped");
                return Ok(());
            }
            ready = tokio::time::timeout(wait, self.navigation.wait_for_server(wait)) => ready.unwrap_or(false),
        };
        if !ready {
            warn!(wait_ms = wait.as_millis() as u64, "navigation server not available; goal dropped");
            return Err(CapabilityError::Unavailable {
                capability: "navigation server".to_string(),
            }
            .into());
        }

        let sent = tokio::select! {
            biased;
            _ = shutdown.triggered() => {
                info!("shutdown while sending navigation goal; goal dropped");
                return Ok(());
            }
            sent = tokio::time::timeout(wait, self.navigation.send_goal(target)) => sent,
        };
        match sent {
            Ok(result) => result?,
            Err(_) => {
                return Err(CapabilityError::Failed {
                    capability: "navigation server".to_string(),
                    reason: format!("goal not accepted within {} ms", wait.as_millis()),
                }
                .into());
            }
        }
        info!(
            x = target.position.x,
            y = target.position.y,
            "navigation goal sent"
        );
        Ok(())
    }

    fn report_status(&self) -> Result<(), BridgeError> {
        let snapshot = self.state.snapshot();
        let record = TelemetryMessage::Status {
            status: snapshot.status,
            robot_data: Some(Box::new(snapshot)),
        };
        match self.telemetry.try_send(record) {
            Ok(()) => debug!("status reported"),
            Err(TrySendError::Full(_)) => warn!("failed to send status to bridge (queue full)"),
            Err(TrySendError::Closed(_)) => warn!("failed to send status to bridge (channel closed)"),
        }
        Ok(())
    }
}
