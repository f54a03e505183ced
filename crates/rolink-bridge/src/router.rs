//! [`CommandRouter`] – external command → command-channel record.
//!
//! For every recognised request the router
//!
//! 1. translates it into a [`CommandMessage`] (pure, see [`translate`]),
//! 2. applies the intended status / velocity to the local [`StateStore`],
//! 3. offers the record to the command channel without waiting.
//!
//! The state update happens before the send so the local state reflects the
//! operator's intent even when the transport is saturated. A dropped record is
//! logged and reported as `delivered: false`; it is never turned into an
//! error response.

use rolink_middleware::{StateStore, TransportSender, TrySendError};
use rolink_types::{
    CommandMessage, CommandOutcome, CommandRequest, CommandResponse, RobotStatus, Twist, Vector3,
    Velocity, WireRecord,
};
use tracing::{debug, info, warn};

/// How a command changes the locally cached velocity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VelocityUpdate {
    Keep,
    Replace(Velocity),
    /// Only the angular component changes.
    Angular(f64),
}

impl VelocityUpdate {
    fn apply(self, velocity: &mut Velocity) {
        match self {
            VelocityUpdate::Keep => {}
            VelocityUpdate::Replace(v) => *velocity = v,
            VelocityUpdate::Angular(angular) => velocity.angular = angular,
        }
    }
}

/// The deterministic effect of one recognised request.
#[derive(Debug, Clone, PartialEq)]
pub struct Translation {
    pub message: CommandMessage,
    pub status: RobotStatus,
    pub velocity: VelocityUpdate,
    pub summary: String,
}

/// Translate a request. Returns `None` for [`CommandRequest::Unknown`].
///
/// The same request always yields the same translation.
pub fn translate(request: &CommandRequest) -> Option<Translation> {
    let translation = match *request {
        CommandRequest::Move {
            linear_velocity,
            angular_velocity,
        } => Translation {
            message: CommandMessage::cmd_vel(Twist {
                linear: Vector3::new(linear_velocity, 0.0, 0.0),
                angular: Vector3::new(0.0, 0.0, angular_velocity),
            }),
            status: RobotStatus::Moving,
            velocity: VelocityUpdate::Replace(Velocity {
                linear: linear_velocity,
                angular: angular_velocity,
            }),
            summary: "Move command sent successfully".to_string(),
        },
        CommandRequest::Rotate { angular_velocity } => Translation {
            message: CommandMessage::cmd_vel(Twist {
                linear: Vector3::ZERO,
                angular: Vector3::new(0.0, 0.0, angular_velocity),
            }),
            status: RobotStatus::Rotating,
            velocity: VelocityUpdate::Angular(angular_velocity),
            summary: "Rotate command sent successfully".to_string(),
        },
        CommandRequest::Stop => Translation {
            message: CommandMessage::cmd_vel(Twist::ZERO),
            status: RobotStatus::Stopped,
            velocity: VelocityUpdate::Replace(Velocity::ZERO),
            summary: "Stop command sent successfully".to_string(),
        },
        CommandRequest::Navigate { target_x, target_y } => Translation {
            message: CommandMessage::nav_goal(target_x, target_y),
            status: RobotStatus::Navigating,
            velocity: VelocityUpdate::Keep,
            summary: format!("Navigation goal set to ({target_x:?}, {target_y:?})"),
        },
        CommandRequest::Unknown(_) => return None,
    };
    Some(translation)
}

/// Dispatches external commands onto the command channel.
///
/// Safe to share between request handlers (`&self` everywhere).
pub struct CommandRouter {
    state: StateStore,
    commands: TransportSender<CommandMessage>,
}

impl CommandRouter {
    pub fn new(state: StateStore, commands: TransportSender<CommandMessage>) -> Self {
        Self { state, commands }
    }

    /// Handle one request. Always returns a response; unknown types produce a
    /// successful "unknown command type" outcome.
    pub fn dispatch(&self, request: &CommandRequest) -> CommandResponse {
        let Some(translation) = translate(request) else {
            warn!(command_type = request.type_name(), "unknown command type");
            return CommandResponse::success(CommandOutcome {
                message: format!("Unknown command type: {}", request.type_name()),
                delivered: false,
            });
        };

        info!(command_type = request.type_name(), status = %translation.status, "command accepted");
        self.state.update(|state| {
            state.status = translation.status;
            translation.velocity.apply(&mut state.velocity);
        });

        let delivered = self.send(translation.message);
        CommandResponse::success(CommandOutcome {
            message: translation.summary,
            delivered,
        })
    }

    /// Ask the robot side for a status report. Returns whether the request
    /// was queued.
    pub fn request_status(&self) -> bool {
        self.send(CommandMessage::StatusRequest)
    }

    /// `true` while the command channel is open.
    pub fn is_connected(&self) -> bool {
        !self.commands.is_closed()
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    /// Close the command channel. Idempotent.
    pub fn close(&self) {
        self.commands.close();
    }

    fn send(&self, message: CommandMessage) -> bool {
        let kind = message.kind();
        match self.commands.try_send(message) {
            Ok(()) => {
                debug!(kind, "command queued");
                true
            }
            Err(TrySendError::Full(_)) => {
                warn!(kind, "failed to send command to robot (queue full)");
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!(kind, "failed to send command to robot (channel closed)");
                false
            }
        }
    }
}
