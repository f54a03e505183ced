//! Telemetry egress.
//!
//! The bridge reports every telemetry record it receives to an upstream
//! collector. Delivery is best effort: one bounded attempt, no retries, and
//! the caller only logs a failure.

use std::time::Duration;

use async_trait::async_trait;
use rolink_types::{BridgeError, SinkError, TelemetryMessage};

/// Path appended to the gateway base URL.
pub const TELEMETRY_PATH: &str = "/api/robot/telemetry";

/// Default bound on one delivery attempt.
pub const DEFAULT_SINK_TIMEOUT: Duration = Duration::from_secs(5);

/// Destination for forwarded telemetry.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    /// Deliver one record. Must return within a bounded time.
    async fn report(&self, record: &TelemetryMessage) -> Result<(), SinkError>;
}

/// POSTs each record as JSON to `{gateway_url}/api/robot/telemetry`.
pub struct HttpSink {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpSink {
    /// Build a sink for the gateway at `gateway_url`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Config`] if the HTTP client cannot be built.
    pub fn new(gateway_url: &str, timeout: Duration) -> Result<Self, BridgeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BridgeError::Config(format!("cannot build telemetry HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: format!("{}{}", gateway_url.trim_end_matches('/'), TELEMETRY_PATH),
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TelemetrySink for HttpSink {
    async fn report(&self, record: &TelemetryMessage) -> Result<(), SinkError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(record)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SinkError::Timeout(self.timeout.as_millis() as u64)
                } else {
                    SinkError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Status(status.as_u16()));
        }
        Ok(())
    }
}

/// Sink used when no gateway is configured. Accepts and discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

#[async_trait]
impl TelemetrySink for NullSink {
    async fn report(&self, _record: &TelemetryMessage) -> Result<(), SinkError> {
        Ok(())
    }
}
