//! [`StateStore`] – concurrency-safe [`RobotState`] cache.
//!
//! One store exists per side. Request handlers read snapshots concurrently
//! while the command path and the telemetry path take turns writing; a
//! single `RwLock` per store is all the coordination needed because the two
//! sides never lock each other's store.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use rolink_types::{RobotState, RobotStatus, TelemetryMessage};
use serde_json::Value;

/// Shared handle to one side's [`RobotState`]. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct StateStore {
    inner: Arc<RwLock<RobotState>>,
}

impl StateStore {
    /// A store holding the default (at rest, idle) state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> RobotState {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Copy of the current per-sensor readings.
    pub fn sensors(&self) -> BTreeMap<String, Value> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .sensors
            .clone()
    }

    pub fn status(&self) -> RobotStatus {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).status
    }

    /// Mutate the state under the write lock.
    pub fn update<R>(&self, f: impl FnOnce(&mut RobotState) -> R) -> R {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    /// Fold one telemetry record into the state.
    pub fn apply(&self, message: &TelemetryMessage) {
        self.update(|state| state.apply(message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rolink_types::{Vector3, Velocity};
    use std::thread;

    #[test]
    fn clones_share_state() {
        let store = StateStore::new();
        let other = store.clone();
        store.update(|s| s.status = RobotStatus::Moving);
        assert_eq!(other.status(), RobotStatus::Moving);
    }

    #[test]
    fn apply_folds_telemetry() {
        let store = StateStore::new();
        store.apply(&TelemetryMessage::Velocity {
            velocity: Velocity {
                linear: 0.4,
                angular: -0.1,
            },
        });
        store.apply(&TelemetryMessage::Pose {
            position: Some(Vector3::new(1.0, 1.0, 0.0)),
            orientation: None,
        });

        let snap = store.snapshot();
        assert_eq!(snap.velocity.linear, 0.4);
        assert_eq!(snap.position, Vector3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn concurrent_writers_and_readers() {
        let store = StateStore::new();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        store.update(|s| s.position.x += 1.0);
                        let _ = store.snapshot();
                    }
                    i
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.snapshot().position.x, 800.0);
    }
}
