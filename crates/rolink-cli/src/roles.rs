//! Process roles: wiring each side's components onto an endpoint.
//!
//! The same wiring is used whether the endpoint is a TCP link or the
//! in-process one built by [`crate::loopback`].

use std::sync::Arc;
use std::time::Duration;

use rolink_bridge::{BridgeService, CommandRouter, HttpSink, NullSink, TelemetryRelay, TelemetrySink};
use rolink_middleware::tcp::{RobotListener, connect_bridge};
use rolink_middleware::{BridgeEndpoint, RobotEndpoint, ShutdownSignal, StateStore, Throttle};
use rolink_robot::{
    CommandExecutor, NavigationClient, RecordingPublisher, SensorSource, SimNavigation,
    SimSensorFeed, TelemetryAggregator, VelocityPublisher,
};
use rolink_types::BridgeError;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::Config;
use crate::console;

/// Running bridge side.
pub struct BridgeSide {
    pub service: Arc<BridgeService>,
    tasks: Vec<JoinHandle<()>>,
}

impl BridgeSide {
    /// Wait for every background loop to stop.
    pub async fn join(self) {
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "bridge task ended abnormally");
            }
        }
    }
}

/// Build the telemetry sink the configuration asks for.
pub fn telemetry_sink(config: &Config) -> Result<Arc<dyn TelemetrySink>, BridgeError> {
    match config.gateway_url() {
        Some(url) => {
            let sink = HttpSink::new(url, config.sink_timeout())?;
            info!(endpoint = sink.endpoint(), "telemetry egress enabled");
            Ok(Arc::new(sink))
        }
        None => {
            info!("telemetry egress disabled");
            Ok(Arc::new(NullSink))
        }
    }
}

/// Start the router, the telemetry relay and, if configured, status polling.
///
/// When the telemetry link closes the relay triggers `shutdown`.
pub fn spawn_bridge_side(
    endpoint: BridgeEndpoint,
    sink: Arc<dyn TelemetrySink>,
    config: &Config,
    shutdown: &ShutdownSignal,
) -> BridgeSide {
    let BridgeEndpoint { commands, telemetry } = endpoint;
    let state = StateStore::new();
    let service = Arc::new(BridgeService::new(CommandRouter::new(state.clone(), commands)));
    let relay = TelemetryRelay::new(state, sink, config.relay());

    let mut tasks = Vec::new();
    tasks.push({
        let shutdown = shutdown.clone();
        let service = Arc::clone(&service);
        tokio::spawn(async move {
            relay.run(telemetry, shutdown.clone()).await;
            service.router().close();
            if !shutdown.is_triggered() {
                info!("robot link closed; stopping bridge");
                shutdown.trigger();
            }
        })
    });
    if let Some(period) = config.status_poll_interval() {
        tasks.push(tokio::spawn(poll_status(Arc::clone(&service), period, shutdown.clone())));
    }

    BridgeSide { service, tasks }
}

async fn poll_status(service: Arc<BridgeService>, period: Duration, shutdown: ShutdownSignal) {
    let mut ticker = tokio::time::interval(period);
    loop {
        tokio::select! {
            biased;
            _ = shutdown.triggered() => break,
            _ = ticker.tick() => {
                if !service.router().is_connected() {
                    break;
                }
                service.request_status();
            }
        }
    }
}

/// Capabilities the robot side drives.
pub struct RobotCapabilities {
    pub velocity: Arc<dyn VelocityPublisher>,
    pub navigation: Arc<dyn NavigationClient>,
    pub sensors: Box<dyn SensorSource>,
}

impl RobotCapabilities {
    pub fn simulated(config: &Config) -> Self {
        let navigation = if config.robot.sim_navigation {
            SimNavigation::available()
        } else {
            SimNavigation::unavailable()
        };
        Self {
            velocity: Arc::new(RecordingPublisher::new()),
            navigation: Arc::new(navigation),
            sensors: Box::new(SimSensorFeed::new(config.sim_period())),
        }
    }
}

/// Serve one bridge session: the command executor plus the telemetry
/// aggregator. Returns when the bridge goes away or `shutdown` fires.
pub async fn serve_robot_session(
    endpoint: RobotEndpoint,
    capabilities: &mut RobotCapabilities,
    state: &StateStore,
    config: &Config,
    shutdown: &ShutdownSignal,
) {
    let RobotEndpoint { commands, telemetry } = endpoint;
    let session = shutdown.child();

    let executor = CommandExecutor::new(
        state.clone(),
        Arc::clone(&capabilities.velocity),
        Arc::clone(&capabilities.navigation),
        telemetry.clone(),
        config.executor(),
    );
    let aggregator = TelemetryAggregator::new(
        state.clone(),
        Throttle::new(config.throttle_policy()),
        telemetry,
    );
    let aggregator_task = tokio::spawn(aggregator.run(capabilities.sensors.events(), session.clone()));

    executor.run(commands, session.clone()).await;
    session.trigger();
    if let Err(e) = aggregator_task.await {
        warn!(error = %e, "telemetry aggregator ended abnormally");
    }
}

/// `rolink bridge`: connect to the robot and read commands from stdin.
pub async fn run_bridge(config: &Config, shutdown: ShutdownSignal) -> Result<(), BridgeError> {
    let sink = telemetry_sink(config)?;
    let endpoint = connect_bridge(&config.bridge.robot_endpoint, &config.transport()).await?;
    let bridge = spawn_bridge_side(endpoint, sink, config, &shutdown);

    console::run(Arc::clone(&bridge.service), shutdown.clone()).await;
    shutdown.triggered().await;
    bridge.service.router().close();
    bridge.join().await;
    Ok(())
}

/// `rolink robot`: listen for the bridge and drive simulated capabilities.
pub async fn run_robot(config: &Config, shutdown: ShutdownSignal) -> Result<(), BridgeError> {
    let listener = RobotListener::bind(&config.robot.listen, config.transport()).await?;
    let mut capabilities = RobotCapabilities::simulated(config);
    let state = StateStore::new();

    while let Some(endpoint) = listener.accept(&shutdown).await? {
        serve_robot_session(endpoint, &mut capabilities, &state, config, &shutdown).await;
        info!("bridge session ended");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rolink_middleware::channel::in_process;

    #[tokio::test]
    async fn dropped_robot_link_stops_the_bridge() {
        let mut config = Config::default();
        config.transport.poll_timeout_ms = 20;
        let (bridge_end, robot_end) = in_process(&config.transport());
        let shutdown = ShutdownSignal::new();
        let bridge = spawn_bridge_side(bridge_end, Arc::new(NullSink), &config, &shutdown);

        drop(robot_end);

        tokio::time::timeout(Duration::from_secs(2), shutdown.triggered())
            .await
            .expect("bridge must stop once the robot link is gone");
        assert!(!bridge.service.router().is_connected());
        tokio::time::timeout(Duration::from_secs(2), bridge.join())
            .await
            .expect("bridge tasks must finish");
    }
}
