//! Both sides in one process, joined by the in-process link.

use std::sync::Arc;
use std::time::Duration;

use rolink_bridge::TelemetrySink;
use rolink_middleware::channel::in_process;
use rolink_middleware::{ShutdownSignal, StateStore};
use rolink_types::BridgeError;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::Config;
use crate::console;
use crate::roles::{BridgeSide, RobotCapabilities, serve_robot_session, spawn_bridge_side, telemetry_sink};

pub struct Loopback {
    pub bridge: BridgeSide,
    pub robot_state: StateStore,
    robot: JoinHandle<()>,
}

impl Loopback {
    /// Wire both sides and start their loops.
    pub fn start(
        config: &Config,
        sink: Arc<dyn TelemetrySink>,
        capabilities: RobotCapabilities,
        shutdown: &ShutdownSignal,
    ) -> Self {
        let (bridge_end, robot_end) = in_process(&config.transport());
        let bridge = spawn_bridge_side(bridge_end, sink, config, shutdown);

        let robot_state = StateStore::new();
        let robot = tokio::spawn({
            let config = config.clone();
            let state = robot_state.clone();
            let shutdown = shutdown.clone();
            async move {
                let mut capabilities = capabilities;
                serve_robot_session(robot_end, &mut capabilities, &state, &config, &shutdown).await;
            }
        });

        Self {
            bridge,
            robot_state,
            robot,
        }
    }

    /// Close the link and wait for both sides to stop.
    pub async fn join(self) {
        self.bridge.service.router().close();
        if let Err(e) = self.robot.await {
            warn!(error = %e, "robot side ended abnormally");
        }
        self.bridge.join().await;
    }
}

/// `rolink loopback`: simulated robot plus bridge console in one process.
pub async fn run(config: &Config, shutdown: ShutdownSignal, duration: Option<Duration>) -> Result<(), BridgeError> {
    let sink = telemetry_sink(config)?;
    let loopback = Loopback::start(config, sink, RobotCapabilities::simulated(config), &shutdown);
    info!("loopback link running");

    if let Some(duration) = duration {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            shutdown.trigger();
        });
    }

    console::run(Arc::clone(&loopback.bridge.service), shutdown.clone()).await;
    shutdown.triggered().await;
    loopback.join().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rolink_robot::{RecordingPublisher, SimNavigation, SimSensorFeed};
    use rolink_types::{RobotStatus, SinkError, TelemetryMessage, Twist, Vector3};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        records: Mutex<Vec<TelemetryMessage>>,
    }

    impl RecordingSink {
        fn count(&self, key: &str) -> usize {
            self.records
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.throttle_key() == key)
                .count()
        }
    }

    #[async_trait]
    impl TelemetrySink for RecordingSink {
        async fn report(&self, record: &TelemetryMessage) -> Result<(), SinkError> {
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    async fn eventually(what: &str, check: impl Fn() -> bool) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
        while !check() {
            assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.transport.poll_timeout_ms = 20;
        config.robot.nav_server_wait_ms = 100;
        config.bridge.max_in_flight_reports = 64;
        config
    }

    #[tokio::test]
    async fn commands_and_telemetry_flow_end_to_end() {
        let config = test_config();
        let sink = Arc::new(RecordingSink::default());
        let publisher = Arc::new(RecordingPublisher::new());
        let navigation = Arc::new(SimNavigation::available());
        let capabilities = RobotCapabilities {
            velocity: publisher.clone(),
            navigation: navigation.clone(),
            sensors: Box::new(SimSensorFeed::new(Duration::from_millis(2)).with_limit(20)),
        };
        let shutdown = ShutdownSignal::new();
        let loopback = Loopback::start(&config, sink.clone(), capabilities, &shutdown);
        let service = Arc::clone(&loopback.bridge.service);

        // Commands reach the capabilities.
        service.handle_command(r#"{"type":"move","linear_velocity":1.0,"angular_velocity":0.0}"#);
        service.handle_command(r#"{"type":"navigate","target_x":3.0,"target_y":-1.5}"#);
        eventually("cmd_vel", || !publisher.published().is_empty()).await;
        assert_eq!(
            publisher.published()[0],
            Twist {
                linear: Vector3::new(1.0, 0.0, 0.0),
                angular: Vector3::ZERO,
            }
        );
        eventually("nav goal", || navigation.goals().len() == 1).await;

        // All 20 poses arrive; lidar at readings 10 and 20; imu and camera never.
        eventually("poses", || sink.count("pose") == 20).await;
        eventually("lidar", || sink.count("lidar") == 2).await;
        assert_eq!(sink.count("imu"), 0);
        assert_eq!(sink.count("camera"), 0);

        // Status round trip makes the mirrors agree.
        assert!(service.request_status());
        eventually("status", || service.state().state.status == RobotStatus::Active).await;

        let bridge = service.state().state;
        let robot = loopback.robot_state.snapshot();
        assert_eq!(bridge.position, robot.position);
        assert_eq!(bridge.orientation, robot.orientation);
        assert_eq!(bridge.status, robot.status);

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(2), loopback.join())
            .await
            .expect("loopback must shut down promptly");
    }

    #[tokio::test]
    async fn unavailable_navigation_does_not_stall_commands() {
        let mut config = test_config();
        config.robot.sim_navigation = false;
        let publisher = Arc::new(RecordingPublisher::new());
        let capabilities = RobotCapabilities {
            velocity: publisher.clone(),
            navigation: Arc::new(SimNavigation::unavailable()),
            sensors: Box::new(SimSensorFeed::new(Duration::from_millis(5)).with_limit(1)),
        };
        let shutdown = ShutdownSignal::new();
        let loopback = Loopback::start(&config, Arc::new(RecordingSink::default()), capabilities, &shutdown);
        let service = Arc::clone(&loopback.bridge.service);

        service.handle_command(r#"{"type":"navigate","target_x":1.0,"target_y":1.0}"#);
        service.handle_command(r#"{"type":"stop"}"#);
        eventually("stop after failed goal", || publisher.published() == vec![Twist::ZERO]).await;

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(2), loopback.join())
            .await
            .expect("loopback must shut down promptly");
    }
}
