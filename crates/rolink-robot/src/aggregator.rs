//! [`TelemetryAggregator`] – robot-side telemetry fold and forward.
//!
//! Every event is applied to the robot-side [`StateStore`] first. The record
//! it yields is then counted against its throttle key and, when the stride
//! allows, offered to the telemetry channel without waiting. Neither a
//! throttled record nor a full channel rolls back the state update.

use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use rolink_middleware::{ShutdownSignal, StateStore, Throttle, TransportSender, TrySendError};
use rolink_types::{TelemetryMessage, WireRecord};
use tracing::{debug, info, trace, warn};

use crate::sensors::SensorEvent;

/// What happened to one record after it was applied locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Queued on the telemetry channel.
    Forwarded,
    /// Held back by the stride for its key.
    Throttled,
    /// Due for forwarding but the channel was full or closed.
    Dropped,
}

pub struct TelemetryAggregator {
    state: StateStore,
    throttle: Throttle,
    telemetry: TransportSender<TelemetryMessage>,
}

impl TelemetryAggregator {
    pub fn new(state: StateStore, throttle: Throttle, telemetry: TransportSender<TelemetryMessage>) -> Self {
        Self {
            state,
            throttle,
            telemetry,
        }
    }

    /// Apply a raw sensor event and forward its record if due.
    pub fn ingest_event(&mut self, event: &SensorEvent) -> Disposition {
        let record = self.state.update(|state| event.fold_into(state));
        self.forward(record)
    }

    /// Apply an already-converted telemetry record and forward it if due.
    pub fn ingest(&mut self, record: TelemetryMessage) -> Disposition {
        self.state.apply(&record);
        self.forward(record)
    }

    /// Consume `events` until the stream ends or `shutdown` fires.
    pub async fn run(mut self, mut events: BoxStream<'static, SensorEvent>, shutdown: ShutdownSignal) {
        info!("telemetry aggregator started");
        loop {
            tokio::select! {
                biased;
                _ = shutdown.triggered() => break,
                next = events.next() => match next {
                    Some(event) => {
                        self.ingest_event(&event);
                    }
                    None => {
                        info!("sensor stream ended");
                        break;
                    }
                },
            }
        }
        info!("telemetry aggregator stopped");
    }

    pub fn throttle(&self) -> &Throttle {
        &self.throttle
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    fn forward(&mut self, record: TelemetryMessage) -> Disposition {
        let key = record.throttle_key().to_string();
        if !self.throttle.should_forward(&key) {
            trace!(key = %key, count = self.throttle.count(&key), "telemetry throttled");
            return Disposition::Throttled;
        }
        match self.telemetry.try_send(record) {
            Ok(()) => {
                debug!(key = %key, "telemetry forwarded");
                Disposition::Forwarded
            }
            Err(TrySendError::Full(record)) => {
                warn!(kind = record.kind(), key = %key, "failed to send to bridge (queue full)");
                Disposition::Dropped
            }
            Err(TrySendError::Closed(record)) => {
                warn!(kind = record.kind(), key = %key, "failed to send to bridge (channel closed)");
                Disposition::Dropped
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::{LaserScan, Odometry};
    use futures_util::stream;
    use rolink_middleware::channel::{TransportReceiver, channel};
    use rolink_middleware::{StateStore, ThrottlePolicy};
    use rolink_types::{Quaternion, RobotStatus, Vector3, Velocity};
    use std::time::Duration;

    fn aggregator(
        policy: ThrottlePolicy,
        capacity: usize,
    ) -> (TelemetryAggregator, TransportReceiver<TelemetryMessage>) {
        let (tx, rx) = channel(capacity);
        (TelemetryAggregator::new(StateStore::new(), Throttle::new(policy), tx), rx)
    }

    fn scan(nearest: f64) -> SensorEvent {
        SensorEvent::LaserScan(LaserScan {
            angle_min: -1.0,
            angle_max: 1.0,
            range_min: 0.1,
            range_max: 30.0,
            ranges: vec![nearest, 5.0],
        })
    }

    fn odom(x: f64) -> SensorEvent {
        SensorEvent::Odometry(Odometry {
            position: Vector3::new(x, 0.0, 0.0),
            orientation: Quaternion::IDENTITY,
            linear: Vector3::new(0.2, 0.0, 0.0),
            angular: Vector3::ZERO,
        })
    }

    #[test]
    fn lidar_stride_forwards_readings_ten_and_twenty() {
        let (mut agg, mut rx) = aggregator(ThrottlePolicy::default(), 64);

        let forwarded: Vec<usize> = (1..=25)
            .filter(|i| agg.ingest_event(&scan(*i as f64 / 10.0)) == Disposition::Forwarded)
            .collect();

        assert_eq!(forwarded, vec![10, 20]);
        let mut records = Vec::new();
        while let Some(r) = rx.try_receive() {
            records.push(r);
        }
        assert_eq!(records.len(), 2);
        // Local state always carries the latest reading.
        assert_eq!(agg.state().sensors()["lidar"]["min_range"], 2.5);
    }

    #[test]
    fn pose_is_forwarded_on_every_update() {
        let (mut agg, mut rx) = aggregator(ThrottlePolicy::default(), 64);
        for x in 0..5 {
            assert_eq!(agg.ingest_event(&odom(x as f64)), Disposition::Forwarded);
        }
        assert_eq!(agg.state().snapshot().velocity, Velocity { linear: 0.2, angular: 0.0 });
        let mut count = 0;
        while rx.try_receive().is_some() {
            count += 1;
        }
        assert_eq!(count, 5);
    }

    #[test]
    fn full_channel_drops_but_keeps_state() {
        let (mut agg, _rx) = aggregator(ThrottlePolicy::forward_all(), 1);
        assert_eq!(agg.ingest_event(&odom(1.0)), Disposition::Forwarded);
        assert_eq!(agg.ingest_event(&odom(2.0)), Disposition::Dropped);
        assert_eq!(agg.state().snapshot().position.x, 2.0);
    }

    #[test]
    fn status_records_are_applied_and_forwarded() {
        let (mut agg, mut rx) = aggregator(ThrottlePolicy::default(), 4);
        let record = TelemetryMessage::Status {
            status: RobotStatus::Active,
            robot_data: None,
        };
        assert_eq!(agg.ingest(record.clone()), Disposition::Forwarded);
        assert_eq!(agg.state().status(), RobotStatus::Active);
        assert_eq!(rx.try_receive(), Some(record));
    }

    #[tokio::test]
    async fn run_consumes_stream_until_it_ends() {
        let (agg, mut rx) = aggregator(ThrottlePolicy::default(), 64);
        let state = agg.state().clone();
        let events = stream::iter(vec![odom(1.0), odom(2.0), odom(3.0)]).boxed();

        tokio::time::timeout(Duration::from_secs(1), agg.run(events, ShutdownSignal::new()))
            .await
            .expect("finite stream must end the loop");

        assert_eq!(state.snapshot().position.x, 3.0);
        assert!(rx.try_receive().is_some());
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let (agg, _rx) = aggregator(ThrottlePolicy::default(), 4);
        let shutdown = ShutdownSignal::new();
        let task = tokio::spawn(agg.run(stream::pending().boxed(), shutdown.clone()));

        shutdown.trigger();
        tokio::time::timeout(Duration::from_millis(500), task)
            .await
            .expect("aggregator must observe shutdown")
            .unwrap();
    }
}
