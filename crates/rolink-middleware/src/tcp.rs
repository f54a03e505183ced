//! TCP link between a bridge process and a robot process.
//!
//! One TCP connection carries both channels, one per direction. Each record
//! is a single line of JSON text terminated by `\n`.
//!
//! The robot side listens ([`RobotListener`]) and the bridge side connects
//! ([`connect_bridge`]). Either way the caller gets the usual
//! [`BridgeEndpoint`] / [`RobotEndpoint`] back:
//!
//! * an **outbound** [`TransportSender`] whose queue is drained onto the
//!   socket by a writer task, so producers never wait on the network;
//! * an **inbound** [`TransportReceiver`] fed by a reader task. Lines that are
//!   oversized, not UTF-8 or not a record are logged and skipped; when the
//!   inbound queue is full the record is dropped. Only a socket error or EOF
//!   ends the stream.
//!
//! Failing to bind or connect is a setup failure and is returned as
//! [`BridgeError::Bind`] / [`BridgeError::Connect`].

use std::net::SocketAddr;

use rolink_types::{BridgeError, CommandMessage, TelemetryMessage, WireRecord, decode_record, encode_record};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::channel::{
    BridgeEndpoint, Received, RobotEndpoint, TransportConfig, TransportReceiver, TransportSender,
    TrySendError, channel,
};
use crate::shutdown::ShutdownSignal;

/// Default robot-side listen address.
pub const DEFAULT_ROBOT_LISTEN: &str = "0.0.0.0:5555";

/// Default address the bridge side connects to.
pub const DEFAULT_ROBOT_ENDPOINT: &str = "127.0.0.1:5555";

/// Maximum byte length of one inbound record line.
///
/// Bytes past the limit are discarded as they arrive, up to the next `\n`.
pub const MAX_RECORD_BYTES: usize = 1024 * 1024;

/// Connect to a listening robot endpoint at `addr`.
pub async fn connect_bridge(addr: &str, config: &TransportConfig) -> Result<BridgeEndpoint, BridgeError> {
    let stream = TcpStream::connect(addr).await.map_err(|source| BridgeError::Connect {
        addr: addr.to_string(),
        source,
    })?;
    let peer = peer_of(&stream, addr)?;
    info!(%peer, "connected to robot endpoint");

    let (read, write) = stream.into_split();
    Ok(BridgeEndpoint {
        commands: spawn_writer::<CommandMessage>(write, config, config.command_capacity, peer),
        telemetry: spawn_reader::<TelemetryMessage>(read, config.telemetry_capacity, peer),
    })
}

/// Robot-side listener. Accepts exactly one bridge peer per link.
pub struct RobotListener {
    listener: TcpListener,
    config: TransportConfig,
}

impl RobotListener {
    /// Bind the robot endpoint on `addr`.
    pub async fn bind(addr: &str, config: TransportConfig) -> Result<Self, BridgeError> {
        let listener = TcpListener::bind(addr).await.map_err(|source| BridgeError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        info!(%addr, "robot endpoint listening");
        Ok(Self { listener, config })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, BridgeError> {
        self.listener
            .local_addr()
            .map_err(|e| BridgeError::Transport(format!("listener address unavailable: {e}")))
    }

    /// Wait for the bridge to connect.
    ///
    /// Returns `Ok(None)` when `shutdown` fires first.
    pub async fn accept(&self, shutdown: &ShutdownSignal) -> Result<Option<RobotEndpoint>, BridgeError> {
        let (stream, peer) = tokio::select! {
            _ = shutdown.triggered() => return Ok(None),
            accepted = self.listener.accept() => accepted
                .map_err(|e| BridgeError::Transport(format!("accept failed: {e}")))?,
        };
        info!(%peer, "bridge connected");

        let (read, write) = stream.into_split();
        Ok(Some(RobotEndpoint {
            commands: spawn_reader::<CommandMessage>(read, self.config.command_capacity, peer),
            telemetry: spawn_writer::<TelemetryMessage>(
                write,
                &self.config,
                self.config.telemetry_capacity,
                peer,
            ),
        }))
    }
}

fn peer_of(stream: &TcpStream, addr: &str) -> Result<SocketAddr, BridgeError> {
    stream.peer_addr().map_err(|source| BridgeError::Connect {
        addr: addr.to_string(),
        source,
    })
}

/// Drain an outbound queue onto the socket until the channel closes or the
/// socket fails.
fn spawn_writer<T: WireRecord>(
    write: OwnedWriteHalf,
    config: &TransportConfig,
    capacity: usize,
    peer: SocketAddr,
) -> TransportSender<T> {
    let (tx, mut rx) = channel::<T>(capacity);
    let poll = config.poll_timeout;

    tokio::spawn(async move {
        let mut writer = BufWriter::new(write);
        loop {
            match rx.receive(poll).await {
                Received::Message(record) => {
                    let line = match encode_record(&record) {
                        Ok(line) => line,
                        Err(e) => {
                            warn!(%peer, kind = record.kind(), error = %e, "record not serialisable; dropped");
                            continue;
                        }
                    };
                    if let Err(e) = write_line(&mut writer, &line).await {
                        warn!(%peer, error = %e, "transport write failed; closing outbound channel");
                        break;
                    }
                    debug!(%peer, kind = record.kind(), "record written");
                }
                Received::Timeout => continue,
                Received::Closed => break,
            }
        }
        rx.close();
        let _ = writer.shutdown().await;
        debug!(%peer, "writer stopped");
    });

    tx
}

async fn write_line(writer: &mut BufWriter<OwnedWriteHalf>, line: &str) -> std::io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

/// One newline-terminated frame read from the socket.
#[derive(Debug, PartialEq)]
enum Frame {
    /// A complete line is in the buffer, without its `\n`.
    Line,
    /// The line exceeded the limit; this many bytes were discarded.
    Oversized(usize),
    Eof,
}

/// Read the next line into `buf`, keeping at most `limit` bytes of it.
///
/// A final line without a trailing `\n` is returned as a [`Frame::Line`]
/// before [`Frame::Eof`].
async fn read_frame<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    limit: usize,
) -> std::io::Result<Frame> {
    buf.clear();
    let mut discarded = 0usize;
    let mut oversized = false;
    loop {
        let (used, done) = {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                return Ok(if oversized {
                    Frame::Oversized(discarded)
                } else if buf.is_empty() {
                    Frame::Eof
                } else {
                    Frame::Line
                });
            }
            let (len, done) = match available.iter().position(|&b| b == b'\n') {
                Some(i) => (i, true),
                None => (available.len(), false),
            };
            if !oversized && buf.len() + len > limit {
                oversized = true;
                discarded = buf.len();
                buf.clear();
            }
            if oversized {
                discarded += len;
            } else {
                buf.extend_from_slice(&available[..len]);
            }
            (len + usize::from(done), done)
        };
        reader.consume(used);
        if done {
            return Ok(if oversized { Frame::Oversized(discarded) } else { Frame::Line });
        }
    }
}

/// Parse inbound lines into a bounded queue until EOF, a socket error, or the
/// queue is closed by its reader.
fn spawn_reader<T: WireRecord>(read: OwnedReadHalf, capacity: usize, peer: SocketAddr) -> TransportReceiver<T> {
    let (tx, rx) = channel::<T>(capacity);

    tokio::spawn(async move {
        let mut reader = BufReader::new(read);
        let mut buf = Vec::new();
        loop {
            let frame = tokio::select! {
                _ = tx.closed() => break,
                frame = read_frame(&mut reader, &mut buf, MAX_RECORD_BYTES) => frame,
            };
            match frame {
                Ok(Frame::Line) => {
                    let line = match std::str::from_utf8(&buf) {
                        Ok(line) => line,
                        Err(e) => {
                            warn!(%peer, error = %e, "non UTF-8 record skipped");
                            continue;
                        }
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    let record = match decode_record::<T>(line) {
                        Ok(record) => record,
                        Err(e) => {
                            warn!(%peer, error = %e, "malformed record skipped");
                            continue;
                        }
                    };
                    match tx.try_send(record) {
                        Ok(()) => {}
                        Err(TrySendError::Full(record)) => {
                            warn!(%peer, kind = record.kind(), "inbound queue full; record dropped");
                        }
                        Err(TrySendError::Closed(_)) => break,
                    }
                }
                Ok(Frame::Oversized(bytes)) => {
                    warn!(%peer, bytes, limit = MAX_RECORD_BYTES, "oversized record skipped");
                }
                Ok(Frame::Eof) => {
                    info!(%peer, "peer closed the connection");
                    break;
                }
                Err(e) => {
                    warn!(%peer, error = %e, "transport read failed");
                    break;
                }
            }
        }
        // Dropping the sender lets the reader drain what is already queued
        // before it sees `Closed`.
        drop(tx);
        debug!(%peer, "reader stopped");
    });

    rx
}
