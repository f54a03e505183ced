//! Bounded, never-blocking transport queues.
//!
//! A channel has exactly one writer role ([`TransportSender`]) and one reader
//! role ([`TransportReceiver`]). Senders never wait: when the queue is at
//! capacity [`TransportSender::try_send`] hands the record back as
//! [`TrySendError::Full`] and the caller decides how to report the drop.
//! Receivers always wait with a deadline, so a receive loop wakes up at least
//! once per timeout to look at its shutdown flag.
//!
//! Either role may close the channel. Closing is idempotent and wakes any
//! outstanding [`TransportReceiver::receive`] immediately; records still
//! queued at that point are dropped (delivery is at-most-once).
//!
//! | Channel | Writer | Reader | Record |
//! |---|---|---|---|
//! | command | bridge side | robot side | [`CommandMessage`] |
//! | telemetry | robot side | bridge side | [`TelemetryMessage`] |

use std::fmt;
use std::time::Duration;

use rolink_types::{CommandMessage, TelemetryMessage};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Default capacity of the command channel.
pub const DEFAULT_COMMAND_CAPACITY: usize = 64;

/// Default capacity of the telemetry channel.
pub const DEFAULT_TELEMETRY_CAPACITY: usize = 256;

/// Default receive deadline used by the polling loops.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// Capacities and poll deadline shared by both sides of a link.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    pub command_capacity: usize,
    pub telemetry_capacity: usize,
    pub poll_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            command_capacity: DEFAULT_COMMAND_CAPACITY,
            telemetry_capacity: DEFAULT_TELEMETRY_CAPACITY,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

/// Why a record could not be queued. The record is handed back.
pub enum TrySendError<T> {
    /// The queue is at capacity; the record was dropped.
    Full(T),
    /// The channel has been closed.
    Closed(T),
}

impl<T> TrySendError<T> {
    pub fn into_inner(self) -> T {
        match self {
            TrySendError::Full(record) | TrySendError::Closed(record) => record,
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, TrySendError::Full(_))
    }
}

impl<T> fmt::Debug for TrySendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrySendError::Full(_) => f.write_str("Full(..)"),
            TrySendError::Closed(_) => f.write_str("Closed(..)"),
        }
    }
}

impl<T> fmt::Display for TrySendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrySendError::Full(_) => f.write_str("transport queue full"),
            TrySendError::Closed(_) => f.write_str("transport channel closed"),
        }
    }
}

/// Result of one bounded wait on a channel.
#[derive(Debug, PartialEq)]
pub enum Received<T> {
    Message(T),
    /// Nothing arrived before the deadline. Expected, not an error.
    Timeout,
    /// The channel is closed; no further records will arrive.
    Closed,
}

/// Create a bounded channel holding at most `capacity` records.
///
/// A `capacity` of zero is raised to one.
pub fn channel<T>(capacity: usize) -> (TransportSender<T>, TransportReceiver<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let closed = CancellationToken::new();
    (
        TransportSender {
            tx,
            closed: closed.clone(),
        },
        TransportReceiver { rx, closed },
    )
}

/// Writer role of a transport channel.
pub struct TransportSender<T> {
    tx: mpsc::Sender<T>,
    closed: CancellationToken,
}

impl<T> TransportSender<T> {
    /// Queue `record` without waiting.
    pub fn try_send(&self, record: T) -> Result<(), TrySendError<T>> {
        if self.closed.is_cancelled() {
            return Err(TrySendError::Closed(record));
        }
        self.tx.try_send(record).map_err(|e| match e {
            mpsc::error::TrySendError::Full(record) => TrySendError::Full(record),
            mpsc::error::TrySendError::Closed(record) => TrySendError::Closed(record),
        })
    }

    /// Close the channel for both roles. Idempotent.
    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled() || self.tx.is_closed()
    }

    /// Resolves once the channel has been closed by either role.
    pub async fn closed(&self) {
        tokio::select! {
            _ = self.closed.cancelled() => {}
            _ = self.tx.closed() => {}
        }
    }

    /// Number of records currently queued.
    pub fn queued(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}

/// Clones act as the same writer: one side may hand its telemetry sender to
/// several of its own components. The channel stays open until every clone
/// is dropped or any role calls `close`.
impl<T> Clone for TransportSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            closed: self.closed.clone(),
        }
    }
}

/// Reader role of a transport channel.
pub struct TransportReceiver<T> {
    rx: mpsc::Receiver<T>,
    closed: CancellationToken,
}

impl<T> TransportReceiver<T> {
    /// Wait up to `timeout` for the next record.
    pub async fn receive(&mut self, timeout: Duration) -> Received<T> {
        if self.closed.is_cancelled() {
            return Received::Closed;
        }
        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Received::Closed,
            result = tokio::time::timeout(timeout, self.rx.recv()) => match result {
                Ok(Some(record)) => Received::Message(record),
                Ok(None) => Received::Closed,
                Err(_) => Received::Timeout,
            },
        }
    }

    /// Take the next record if one is already queued.
    pub fn try_receive(&mut self) -> Option<T> {
        if self.closed.is_cancelled() {
            return None;
        }
        self.rx.try_recv().ok()
    }

    /// Close the channel for both roles. Idempotent.
    pub fn close(&mut self) {
        self.closed.cancel();
        self.rx.close();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled() || self.rx.is_closed()
    }
}

/// The bridge side's half of a link: writes commands, reads telemetry.
pub struct BridgeEndpoint {
    pub commands: TransportSender<CommandMessage>,
    pub telemetry: TransportReceiver<TelemetryMessage>,
}

/// The robot side's half of a link: reads commands, writes telemetry.
pub struct RobotEndpoint {
    pub commands: TransportReceiver<CommandMessage>,
    pub telemetry: TransportSender<TelemetryMessage>,
}

/// Build a connected endpoint pair inside one process.
pub fn in_process(config: &TransportConfig) -> (BridgeEndpoint, RobotEndpoint) {
    let (command_tx, command_rx) = channel(config.command_capacity);
    let (telemetry_tx, telemetry_rx) = channel(config.telemetry_capacity);
    (
        BridgeEndpoint {
            commands: command_tx,
            telemetry: telemetry_rx,
        },
        RobotEndpoint {
            commands: command_rx,
            telemetry: telemetry_tx,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn send_then_receive() {
        let (tx, mut rx) = channel::<u32>(4);
        tx.try_send(7).unwrap();
        assert_eq!(rx.receive(Duration::from_millis(100)).await, Received::Message(7));
    }

    #[tokio::test]
    async fn full_channel_drops_without_blocking() {
        let (tx, _rx) = channel::<u32>(4);
        for i in 0..4 {
            tx.try_send(i).unwrap();
        }
        assert_eq!(tx.queued(), 4);

        let started = Instant::now();
        let result = tx.try_send(99);
        assert!(started.elapsed() < Duration::from_millis(50));
        match result {
            Err(TrySendError::Full(record)) => assert_eq!(record, 99),
            other => panic!("expected Full, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn receive_times_out_when_idle() {
        let (_tx, mut rx) = channel::<u32>(4);
        let started = Instant::now();
        assert_eq!(rx.receive(Duration::from_millis(30)).await, Received::Timeout);
        assert!(started.elapsed() >= Duration::from_millis(25));
    }

    #[tokio::test]
    async fn close_is_idempotent_and_reported_on_both_roles() {
        let (tx, mut rx) = channel::<u32>(4);
        tx.try_send(1).unwrap();
        tx.close();
        tx.close();

        assert!(tx.is_closed());
        assert!(matches!(tx.try_send(2), Err(TrySendError::Closed(2))));
        // Records left in flight are dropped.
        assert_eq!(rx.receive(Duration::from_millis(30)).await, Received::Closed);
        assert!(rx.try_receive().is_none());
    }

    #[tokio::test]
    async fn close_wakes_outstanding_receive() {
        let (tx, mut rx) = channel::<u32>(4);
        let waiter = tokio::spawn(async move { rx.receive(Duration::from_secs(30)).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.close();

        let result = tokio::time::timeout(Duration::from_millis(500), waiter)
            .await
            .expect("receive must return promptly after close")
            .unwrap();
        assert_eq!(result, Received::Closed);
    }

    #[tokio::test]
    async fn dropping_the_sender_drains_then_closes() {
        let (tx, mut rx) = channel::<u32>(4);
        tx.try_send(5).unwrap();
        drop(tx);
        assert_eq!(rx.receive(Duration::from_millis(30)).await, Received::Message(5));
        assert_eq!(rx.receive(Duration::from_millis(30)).await, Received::Closed);
    }

    #[tokio::test]
    async fn receiver_close_rejects_later_sends() {
        let (tx, mut rx) = channel::<u32>(4);
        rx.close();
        assert!(rx.is_closed());
        assert!(matches!(tx.try_send(1), Err(TrySendError::Closed(_))));
        tokio::time::timeout(Duration::from_millis(100), tx.closed())
            .await
            .expect("closed() resolves after close");
    }

    #[tokio::test]
    async fn in_process_pair_is_cross_wired() {
        let (bridge, mut robot) = in_process(&TransportConfig::default());
        bridge.commands.try_send(CommandMessage::StatusRequest).unwrap();
        assert_eq!(
            robot.commands.receive(Duration::from_millis(50)).await,
            Received::Message(CommandMessage::StatusRequest)
        );
        assert_eq!(bridge.commands.capacity(), DEFAULT_COMMAND_CAPACITY);
        assert_eq!(robot.telemetry.capacity(), DEFAULT_TELEMETRY_CAPACITY);
    }

    #[tokio::test]
    async fn cloned_senders_share_the_writer_role() {
        let (tx, mut rx) = channel::<u32>(4);
        let other = tx.clone();
        drop(tx);
        other.try_send(1).unwrap();
        assert_eq!(rx.receive(Duration::from_millis(50)).await, Received::Message(1));
        assert!(!other.is_closed());

        let third = other.clone();
        third.close();
        assert!(other.is_closed());
    }
}
