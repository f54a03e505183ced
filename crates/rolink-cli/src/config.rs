//! Configuration – reads `~/.rolink/config.toml`.
//!
//! Every field has a default, so an absent file or an absent section is
//! fine. A file that exists but cannot be read or parsed is a setup failure.
//!
//! ```toml
//! [bridge]
//! robot_endpoint = "127.0.0.1:5555"
//! gateway_url = "http://localhost:8080"   # "" disables telemetry egress
//!
//! [robot]
//! listen = "0.0.0.0:5555"
//!
//! [transport]
//! poll_timeout_ms = 1000
//!
//! [throttle]     # forward every Nth reading; 0 = never
//! lidar = 10
//! imu = 50
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rolink_bridge::RelayConfig;
use rolink_middleware::tcp::{DEFAULT_ROBOT_ENDPOINT, DEFAULT_ROBOT_LISTEN};
use rolink_middleware::{ThrottlePolicy, TransportConfig};
use rolink_robot::ExecutorConfig;
use rolink_types::BridgeError;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bridge: BridgeSection,
    #[serde(default)]
    pub robot: RobotSection,
    #[serde(default)]
    pub transport: TransportSection,
    /// Stride overrides per throttle key, merged over the built-in defaults.
    #[serde(default)]
    pub throttle: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeSection {
    /// Address of the robot endpoint to connect to.
    #[serde(default = "default_robot_endpoint")]
    pub robot_endpoint: String,

    /// Base URL of the telemetry gateway. Empty disables egress.
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,

    #[serde(default = "default_sink_timeout_ms")]
    pub sink_timeout_ms: u64,

    #[serde(default = "default_max_in_flight_reports")]
    pub max_in_flight_reports: usize,

    /// Period of automatic `status_request`s. `0` disables polling.
    #[serde(default)]
    pub status_poll_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotSection {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_nav_server_wait_ms")]
    pub nav_server_wait_ms: u64,

    /// Tick period of the simulated sensor feed.
    #[serde(default = "default_sim_period_ms")]
    pub sim_period_ms: u64,

    /// Whether the simulated navigation server accepts goals.
    #[serde(default = "default_true")]
    pub sim_navigation: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportSection {
    #[serde(default = "default_command_capacity")]
    pub command_capacity: usize,

    #[serde(default = "default_telemetry_capacity")]
    pub telemetry_capacity: usize,

    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
}

fn default_robot_endpoint() -> String {
    DEFAULT_ROBOT_ENDPOINT.to_string()
}
fn default_gateway_url() -> String {
    "http://localhost:8080".to_string()
}
fn default_sink_timeout_ms() -> u64 {
    5_000
}
fn default_max_in_flight_reports() -> usize {
    rolink_bridge::relay::DEFAULT_MAX_IN_FLIGHT_REPORTS
}
fn default_listen() -> String {
    DEFAULT_ROBOT_LISTEN.to_string()
}
fn default_nav_server_wait_ms() -> u64 {
    5_000
}
fn default_sim_period_ms() -> u64 {
    100
}
fn default_true() -> bool {
    true
}
fn default_command_capacity() -> usize {
    rolink_middleware::channel::DEFAULT_COMMAND_CAPACITY
}
fn default_telemetry_capacity() -> usize {
    rolink_middleware::channel::DEFAULT_TELEMETRY_CAPACITY
}
fn default_poll_timeout_ms() -> u64 {
    1_000
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            robot_endpoint: default_robot_endpoint(),
            gateway_url: default_gateway_url(),
            sink_timeout_ms: default_sink_timeout_ms(),
            max_in_flight_reports: default_max_in_flight_reports(),
            status_poll_ms: 0,
        }
    }
}

impl Default for RobotSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            nav_server_wait_ms: default_nav_server_wait_ms(),
            sim_period_ms: default_sim_period_ms(),
            sim_navigation: true,
        }
    }
}

impl Default for TransportSection {
    fn default() -> Self {
        Self {
            command_capacity: default_command_capacity(),
            telemetry_capacity: default_telemetry_capacity(),
            poll_timeout_ms: default_poll_timeout_ms(),
        }
    }
}

impl Config {
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            command_capacity: self.transport.command_capacity,
            telemetry_capacity: self.transport.telemetry_capacity,
            poll_timeout: self.poll_timeout(),
        }
    }

    pub fn relay(&self) -> RelayConfig {
        RelayConfig {
            poll_timeout: self.poll_timeout(),
            max_in_flight_reports: self.bridge.max_in_flight_reports,
        }
    }

    pub fn executor(&self) -> ExecutorConfig {
        ExecutorConfig {
            poll_timeout: self.poll_timeout(),
            nav_server_wait: Duration::from_millis(self.robot.nav_server_wait_ms),
        }
    }

    /// Built-in strides with the `[throttle]` table applied on top.
    pub fn throttle_policy(&self) -> ThrottlePolicy {
        let mut policy = ThrottlePolicy::default();
        for (key, stride) in &self.throttle {
            policy.set_stride(key.clone(), *stride);
        }
        policy
    }

    /// `None` when egress is disabled.
    pub fn gateway_url(&self) -> Option<&str> {
        let url = self.bridge.gateway_url.trim();
        (!url.is_empty()).then_some(url)
    }

    pub fn sink_timeout(&self) -> Duration {
        Duration::from_millis(self.bridge.sink_timeout_ms)
    }

    pub fn status_poll_interval(&self) -> Option<Duration> {
        (self.bridge.status_poll_ms > 0).then(|| Duration::from_millis(self.bridge.status_poll_ms))
    }

    pub fn sim_period(&self) -> Duration {
        Duration::from_millis(self.robot.sim_period_ms.max(1))
    }

    fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.transport.poll_timeout_ms.max(1))
    }
}

/// Return the path to `~/.rolink/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".rolink").join("config.toml")
}

/// Load the configuration from `path` (or the default location), then apply
/// `ROLINK_*` environment overrides.
///
/// # Errors
///
/// [`BridgeError::Config`] if the file exists but cannot be read or parsed.
pub fn load(path: Option<&Path>) -> Result<Config, BridgeError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);
    let mut cfg = match load_from(&path)? {
        Some(cfg) => {
            info!(path = %path.display(), "configuration loaded");
            cfg
        }
        None => {
            info!(path = %path.display(), "no configuration file; using defaults");
            Config::default()
        }
    };
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Load the config from a specific path. Returns `None` if it does not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, BridgeError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| BridgeError::Config(format!("failed to read {}: {e}", path.display())))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| BridgeError::Config(format!("failed to parse {}: {e}", path.display())))?;
    Ok(Some(cfg))
}

/// Apply `ROLINK_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `ROLINK_ROBOT_ENDPOINT` | `bridge.robot_endpoint` |
/// | `ROLINK_GATEWAY_URL` | `bridge.gateway_url` |
/// | `ROLINK_LISTEN` | `robot.listen` |
/// | `ROLINK_POLL_TIMEOUT_MS` | `transport.poll_timeout_ms` |
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides_from(cfg, |key| std::env::var(key).ok());
}

pub(crate) fn apply_overrides_from(cfg: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("ROLINK_ROBOT_ENDPOINT") {
        cfg.bridge.robot_endpoint = v;
    }
    if let Some(v) = lookup("ROLINK_GATEWAY_URL") {
        cfg.bridge.gateway_url = v;
    }
    if let Some(v) = lookup("ROLINK_LISTEN") {
        cfg.robot.listen = v;
    }
    if let Some(v) = lookup("ROLINK_POLL_TIMEOUT_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.transport.poll_timeout_ms = ms;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rolink_middleware::ForwardPolicy;
    use std::collections::HashMap;

    fn write(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        fs::write(&path, body).expect("write config");
        path
    }

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.bridge.robot_endpoint, "127.0.0.1:5555");
        assert_eq!(cfg.robot.listen, "0.0.0.0:5555");
        assert_eq!(cfg.gateway_url(), Some("http://localhost:8080"));
        assert_eq!(cfg.sink_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.transport().poll_timeout, Duration::from_secs(1));
        assert_eq!(cfg.relay().max_in_flight_reports, 8);
        assert_eq!(cfg.status_poll_interval(), None);
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = write(
            &dir,
            r#"
            [bridge]
            robot_endpoint = "10.0.0.7:6000"
            status_poll_ms = 2000

            [throttle]
            lidar = 5
            pose = 2
            "#,
        );
        let cfg = load_from(&path).expect("parse").expect("present");

        assert_eq!(cfg.bridge.robot_endpoint, "10.0.0.7:6000");
        assert_eq!(cfg.bridge.gateway_url, "http://localhost:8080");
        assert_eq!(cfg.status_poll_interval(), Some(Duration::from_secs(2)));
        assert_eq!(cfg.transport, TransportSection::default());

        let policy = cfg.throttle_policy();
        assert!(matches!(policy.policy("lidar"), ForwardPolicy::EveryNth(n) if n.get() == 5));
        assert!(matches!(policy.policy("pose"), ForwardPolicy::EveryNth(n) if n.get() == 2));
        assert!(matches!(policy.policy("imu"), ForwardPolicy::EveryNth(n) if n.get() == 50));
        assert_eq!(policy.policy("camera"), ForwardPolicy::Never);
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = write(&dir, "[bridge\nrobot_endpoint = 3");
        let err = load_from(&path).unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn empty_gateway_disables_egress() {
        let mut cfg = Config::default();
        cfg.bridge.gateway_url = "  ".into();
        assert_eq!(cfg.gateway_url(), None);
    }

    #[test]
    fn config_path_points_to_rolink_dir() {
        let p = config_path_for_home("/home/operator");
        assert_eq!(p, PathBuf::from("/home/operator/.rolink/config.toml"));
    }

    #[test]
    fn env_overrides_apply() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("ROLINK_ROBOT_ENDPOINT", "robot.local:5555"),
            ("ROLINK_GATEWAY_URL", "http://gw:9000"),
            ("ROLINK_LISTEN", "127.0.0.1:7000"),
            ("ROLINK_POLL_TIMEOUT_MS", "250"),
        ]);
        let mut cfg = Config::default();
        apply_overrides_from(&mut cfg, |k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.bridge.robot_endpoint, "robot.local:5555");
        assert_eq!(cfg.gateway_url(), Some("http://gw:9000"));
        assert_eq!(cfg.robot.listen, "127.0.0.1:7000");
        assert_eq!(cfg.executor().poll_timeout, Duration::from_millis(250));
    }

    #[test]
    fn invalid_poll_timeout_override_is_ignored() {
        let mut cfg = Config::default();
        apply_overrides_from(&mut cfg, |k| {
            (k == "ROLINK_POLL_TIMEOUT_MS").then(|| "soon".to_string())
        });
        assert_eq!(cfg.transport.poll_timeout_ms, 1_000);
    }

    #[test]
    fn config_roundtrips_through_toml() {
        let mut cfg = Config::default();
        cfg.throttle.insert("imu".into(), 25);
        let raw = toml::to_string_pretty(&cfg).expect("serialize");
        let back: Config = toml::from_str(&raw).expect("parse");
        assert_eq!(back, cfg);
    }
}
