//! In-process capabilities for running without robotics middleware.
//!
//! | Capability | Stub behaviour |
//! |---|---|
//! | [`RecordingPublisher`] | Stores every published [`Twist`]. Always succeeds. |
//! | [`SimNavigation`] | Accepts goals while marked available; otherwise never becomes ready. |
//! | [`SimSensorFeed`] | A robot driving a fixed circle: odometry, lidar and imu every tick, both cameras every tenth tick. |
//!
//! This lets the whole bridge run in tests and demos with no robot attached.

use std::f64::consts::FRAC_PI_2;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use rolink_types::{CapabilityError, PoseTarget, Quaternion, Twist, Vector3};

use crate::capability::{NavigationClient, SensorSource, VelocityPublisher};
use crate::sensors::{CameraImage, CameraSide, Imu, LaserScan, Odometry, SensorEvent};

// ────────────────────────────────────────────────────────────────────────────
// Velocity publisher
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<Twist>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every twist published so far, oldest first.
    pub fn published(&self) -> Vec<Twist> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl VelocityPublisher for RecordingPublisher {
    fn publish(&self, twist: &Twist) -> Result<(), CapabilityError> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(*twist);
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Navigation client
// ────────────────────────────────────────────────────────────────────────────

const SERVER_POLL: Duration = Duration::from_millis(10);

#[derive(Debug, Default)]
pub struct SimNavigation {
    available: AtomicBool,
    goals: Mutex<Vec<PoseTarget>>,
}

impl SimNavigation {
    pub fn available() -> Self {
        let nav = Self::default();
        nav.set_available(true);
        nav
    }

    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Goals accepted so far, oldest first.
    pub fn goals(&self) -> Vec<PoseTarget> {
        self.goals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl NavigationClient for SimNavigation {
    async fn wait_for_server(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.available.load(Ordering::SeqCst) {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(SERVER_POLL).await;
        }
    }

    async fn send_goal(&self, target: PoseTarget) -> Result<(), CapabilityError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(CapabilityError::Unavailable {
                capability: "navigation server".to_string(),
            });
        }
        self.goals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(target);
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Sensor feed
// ────────────────────────────────────────────────────────────────────────────

const LIDAR_BEAMS: usize = 360;
const CAMERA_EVERY: u64 = 10;

/// Simulated robot circling the origin.
#[derive(Debug, Clone, PartialEq)]
pub struct SimSensorFeed {
    period: Duration,
    radius: f64,
    yaw_rate: f64,
    limit: Option<u64>,
}

impl Default for SimSensorFeed {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(100),
            radius: 2.0,
            yaw_rate: 0.2,
            limit: None,
        }
    }
}

impl SimSensorFeed {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            ..Self::default()
        }
    }

    /// Stop after `ticks` ticks instead of running forever.
    pub fn with_limit(mut self, ticks: u64) -> Self {
        self.limit = Some(ticks);
        self
    }

    /// Events produced at `tick`.
    pub fn sample(&self, tick: u64) -> Vec<SensorEvent> {
        let t = tick as f64 * self.period.as_secs_f64();
        let phase = self.yaw_rate * t;
        let yaw = phase + FRAC_PI_2;
        let heading = Quaternion::new(0.0, 0.0, (yaw / 2.0).sin(), (yaw / 2.0).cos());

        let mut events = vec![
            SensorEvent::Odometry(Odometry {
                position: Vector3::new(self.radius * phase.cos(), self.radius * phase.sin(), 0.0),
                orientation: heading,
                linear: Vector3::new(self.radius * self.yaw_rate, 0.0, 0.0),
                angular: Vector3::new(0.0, 0.0, self.yaw_rate),
            }),
            SensorEvent::LaserScan(LaserScan {
                angle_min: -std::f64::consts::PI,
                angle_max: std::f64::consts::PI,
                range_min: 0.1,
                range_max: 12.0,
                ranges: (0..LIDAR_BEAMS)
                    .map(|i| 3.0 + (i as f64 * 0.05 + phase).sin())
                    .collect(),
            }),
            SensorEvent::Imu(Imu {
                orientation: heading,
                angular_velocity: Vector3::new(0.0, 0.0, self.yaw_rate),
                linear_acceleration: Vector3::new(0.0, self.radius * self.yaw_rate.powi(2), 9.81),
            }),
        ];

        if tick % CAMERA_EVERY == 0 {
            let now = Utc::now();
            for side in [CameraSide::Left, CameraSide::Right] {
                events.push(SensorEvent::Camera(CameraImage {
                    side,
                    width: 640,
                    height: 480,
                    encoding: "rgb8".to_string(),
                    stamp_sec: now.timestamp(),
                    stamp_nanosec: now.timestamp_subsec_nanos(),
                }));
            }
        }
        events
    }
}

impl SensorSource for SimSensorFeed {
    fn events(&mut self) -> BoxStream<'static, SensorEvent> {
        let feed = self.clone();
        stream::unfold(0u64, move |tick| {
            let feed = feed.clone();
            async move {
                if feed.limit.is_some_and(|limit| tick >= limit) {
                    return None;
                }
                tokio::time::sleep(feed.period).await;
                Some((stream::iter(feed.sample(tick)), tick + 1))
            }
        })
        .flatten()
        .boxed()
    }
}
