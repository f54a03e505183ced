//! Per-kind forwarding strides.
//!
//! High-rate sensors are applied to local state on every reading but only
//! forwarded every Nth time. The stride is policy, configured per key
//! (see [`TelemetryMessage::throttle_key`]):
//!
//! | Stride | Meaning |
//! |---|---|
//! | not configured | forward every reading |
//! | `0` | never forward (local state only) |
//! | `N` | forward readings `N, 2N, 3N, …` |
//!
//! [`TelemetryMessage::throttle_key`]: rolink_types::TelemetryMessage::throttle_key

use std::collections::HashMap;
use std::num::NonZeroU64;

/// Forwarding decision rule for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardPolicy {
    Always,
    EveryNth(NonZeroU64),
    Never,
}

/// Configured strides, keyed by throttle key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrottlePolicy {
    strides: HashMap<String, u64>,
}

impl ThrottlePolicy {
    /// A policy that forwards everything.
    pub fn forward_all() -> Self {
        Self {
            strides: HashMap::new(),
        }
    }

    /// Set the stride for `key` (builder-style).
    pub fn with_stride(mut self, key: impl Into<String>, stride: u64) -> Self {
        self.strides.insert(key.into(), stride);
        self
    }

    pub fn set_stride(&mut self, key: impl Into<String>, stride: u64) {
        self.strides.insert(key.into(), stride);
    }

    pub fn policy(&self, key: &str) -> ForwardPolicy {
        match self.strides.get(key) {
            None => ForwardPolicy::Always,
            Some(&stride) => match NonZeroU64::new(stride) {
                Some(n) if n.get() == 1 => ForwardPolicy::Always,
                Some(n) => ForwardPolicy::EveryNth(n),
                None => ForwardPolicy::Never,
            },
        }
    }
}

/// `lidar` every 10th reading, `imu` every 50th, `camera` never; everything
/// else (including `pose`) on every update.
impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self::forward_all()
            .with_stride("lidar", 10)
            .with_stride("imu", 50)
            .with_stride("camera", 0)
    }
}

/// Stateful throttle: a monotonic reading counter per key plus the policy.
#[derive(Debug, Clone)]
pub struct Throttle {
    policy: ThrottlePolicy,
    counters: HashMap<String, u64>,
}

impl Throttle {
    pub fn new(policy: ThrottlePolicy) -> Self {
        Self {
            policy,
            counters: HashMap::new(),
        }
    }

    /// Count one reading for `key` and decide whether it is forwarded.
    pub fn should_forward(&mut self, key: &str) -> bool {
        let count = match self.counters.get_mut(key) {
            Some(count) => {
                *count = count.wrapping_add(1);
                *count
            }
            None => {
                self.counters.insert(key.to_string(), 1);
                1
            }
        };
        match self.policy.policy(key) {
            ForwardPolicy::Always => true,
            ForwardPolicy::Never => false,
            ForwardPolicy::EveryNth(n) => count % n.get() == 0,
        }
    }

    /// Number of readings seen for `key`.
    pub fn count(&self, key: &str) -> u64 {
        self.counters.get(key).copied().unwrap_or(0)
    }

    pub fn policy(&self) -> &ThrottlePolicy {
        &self.policy
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new(ThrottlePolicy::default())
    }
}
