//! [`TelemetryRelay`] – bridge-side telemetry loop.
//!
//! Polls the telemetry channel with a bounded timeout, folds every record into
//! the bridge-side [`StateStore`], then hands it to the [`TelemetrySink`] on a
//! background task. The state update is never rolled back or delayed by the
//! sink: a slow or unreachable sink costs at most one in-flight slot, and
//! when every slot is taken the report is dropped instead of queued.

use std::sync::Arc;
use std::time::Duration;

use rolink_middleware::channel::DEFAULT_POLL_TIMEOUT;
use rolink_middleware::{Received, ShutdownSignal, StateStore, TransportReceiver};
use rolink_types::{TelemetryMessage, WireRecord};
use tokio::sync::Semaphore;
use tracing::{debug, info, trace, warn};

use crate::sink::TelemetrySink;

/// Default cap on concurrent sink deliveries.
pub const DEFAULT_MAX_IN_FLIGHT_REPORTS: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct RelayConfig {
    /// Receive deadline; also the worst-case shutdown latency of [`TelemetryRelay::run`].
    pub poll_timeout: Duration,
    pub max_in_flight_reports: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            max_in_flight_reports: DEFAULT_MAX_IN_FLIGHT_REPORTS,
        }
    }
}

pub struct TelemetryRelay {
    state: StateStore,
    sink: Arc<dyn TelemetrySink>,
    budget: Arc<Semaphore>,
    config: RelayConfig,
}

impl TelemetryRelay {
    pub fn new(state: StateStore, sink: Arc<dyn TelemetrySink>, config: RelayConfig) -> Self {
        let budget = Arc::new(Semaphore::new(config.max_in_flight_reports.max(1)));
        Self {
            state,
            sink,
            budget,
            config,
        }
    }

    /// Apply one record to the local state and report it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn handle(&self, record: TelemetryMessage) {
        self.state.apply(&record);
        self.report(record);
    }

    /// Receive until `shutdown` fires or the channel closes.
    pub async fn run(&self, mut telemetry: TransportReceiver<TelemetryMessage>, shutdown: ShutdownSignal) {
        info!("telemetry relay started");
        while !shutdown.is_triggered() {
            match telemetry.receive(self.config.poll_timeout).await {
                Received::Message(record) => self.handle(record),
                Received::Timeout => trace!("no telemetry within poll timeout"),
                Received::Closed => {
                    info!("telemetry channel closed");
                    break;
                }
            }
        }
        telemetry.close();
        info!("telemetry relay stopped");
    }

    fn report(&self, record: TelemetryMessage) {
        let Ok(permit) = Arc::clone(&self.budget).try_acquire_owned() else {
            warn!(kind = record.kind(), "telemetry sink busy; report dropped");
            return;
        };
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            let _permit = permit;
            match sink.report(&record).await {
                Ok(()) => debug!(kind = record.kind(), "telemetry forwarded"),
                Err(e) => warn!(kind = record.kind(), error = %e, "failed to forward telemetry"),
            }
        });
    }
}
