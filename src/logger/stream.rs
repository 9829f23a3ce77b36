//! # Stream Transports
//!
//! Byte-stream links to the collector: a USB serial port or a TCP socket.
//!
//! Records are written whole and flushed per record, so a partial write is
//! surfaced as a failed attempt rather than a torn line at the collector.
//! Every write is bounded by a timeout so a collector that stops draining
//! costs one failed attempt instead of stalling the control loop.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

use super::transport::{Transport, TransportError};
use crate::error::{Result, VaMeterError};

/// Default serial baud rate for the log link
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Serial device paths tried when none is configured (in order of preference)
pub const DEFAULT_SERIAL_PATHS: &[&str] = &[
    "/dev/ttyACM0", // USB CDC devices
    "/dev/ttyUSB0", // USB-to-serial adapters
];

/// Time allowed for one record write (or TCP dial) when none is configured
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_millis(100);

/// Write and flush `payload`, giving up after `limit`.
async fn write_record<W: AsyncWrite + Unpin>(
    writer: &mut W,
    payload: &[u8],
    limit: Duration,
) -> std::result::Result<(), TransportError> {
    let write = async {
        writer.write_all(payload).await?;
        writer.flush().await
    };
    match tokio::time::timeout(limit, write).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(TransportError::Send(format!(
            "write timed out after {}ms",
            limit.as_millis()
        ))),
    }
}

/// Transport over any async byte sink
pub struct StreamTransport<W> {
    writer: W,
    name: String,
    timeout: Duration,
}

impl<W> std::fmt::Debug for StreamTransport<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamTransport")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<W: AsyncWrite + Unpin + Send> StreamTransport<W> {
    /// Wrap a writer; `name` is only used in logs.
    pub fn new(writer: W, name: impl Into<String>) -> Self {
        Self {
            writer,
            name: name.into(),
            timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    /// Replace the per-record write timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> Transport for StreamTransport<W> {
    async fn send(&mut self, payload: &[u8]) -> std::result::Result<(), TransportError> {
        write_record(&mut self.writer, payload, self.timeout).await
    }

    async fn flush(&mut self) -> std::result::Result<(), TransportError> {
        write_record(&mut self.writer, &[], self.timeout).await
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

/// Open a serial port for logging
///
/// The port is configured 8N1 without flow control.
///
/// # Arguments
///
/// * `path` - Device path (e.g., "/dev/ttyACM0")
/// * `baud_rate` - Line speed
///
/// # Errors
///
/// Returns [`VaMeterError::Serial`] if the port cannot be opened.
///
/// # Examples
///
/// ```no_run
/// use va_meter::logger::stream::open_serial;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> anyhow::Result<()> {
///     let transport = open_serial("/dev/ttyACM0", 115_200)?;
///     Ok(())
/// }
/// ```
pub fn open_serial(
    path: &str,
    baud_rate: u32,
) -> Result<StreamTransport<tokio_serial::SerialStream>> {
    let port = tokio_serial::new(path, baud_rate)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .open_native_async()
        .map_err(|e| VaMeterError::Serial(format!("Failed to open {}: {}", path, e)))?;

    info!("Opened serial log port {} at {} baud", path, baud_rate);
    Ok(StreamTransport::new(port, format!("serial://{}", path)))
}

/// Open the first serial port from `paths` that works.
///
/// # Errors
///
/// Returns [`VaMeterError::Serial`] listing every path tried if none opened.
pub fn open_serial_auto(
    paths: &[&str],
    baud_rate: u32,
) -> Result<StreamTransport<tokio_serial::SerialStream>> {
    for path in paths {
        debug!("Trying to open serial port: {}", path);
        match open_serial(path, baud_rate) {
            Ok(transport) => return Ok(transport),
            Err(e) => warn!("{}", e),
        }
    }

    Err(VaMeterError::Serial(format!(
        "No serial port found (tried: {})",
        paths.join(", ")
    )))
}

/// Transport to a TCP collector.
///
/// Connects on first use and again after any failed write, so a collector
/// that is absent at startup or restarts mid-session only costs the records
/// sent while it is away.
#[derive(Debug)]
pub struct TcpTransport {
    addr: String,
    stream: Option<TcpStream>,
    timeout: Duration,
}

impl TcpTransport {
    /// Create a transport for `addr`; no connection is made until the first send.
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            stream: None,
            timeout,
        }
    }

    /// True while a connection is held.
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn connect(&mut self) -> std::result::Result<&mut TcpStream, TransportError> {
        if self.stream.is_none() {
            let stream = match tokio::time::timeout(self.timeout, TcpStream::connect(&self.addr)).await {
                Ok(Ok(stream)) => stream,
                Ok(Err(e)) => {
                    return Err(TransportError::Send(format!("connect to {} failed: {}", self.addr, e)))
                }
                Err(_) => {
                    return Err(TransportError::Send(format!(
                        "connect to {} timed out after {}ms",
                        self.addr,
                        self.timeout.as_millis()
                    )))
                }
            };
            stream.set_nodelay(true)?;
            info!("Connected to TCP collector at {}", self.addr);
            self.stream = Some(stream);
        }
        self.stream.as_mut().ok_or(TransportError::Closed)
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&mut self, payload: &[u8]) -> std::result::Result<(), TransportError> {
        let limit = self.timeout;
        let stream = self.connect().await?;
        let result = write_record(stream, payload, limit).await;
        if let Err(e) = &result {
            debug!("Dropping TCP connection to {}: {}", self.addr, e);
            self.stream = None;
        }
        result
    }

    async fn flush(&mut self) -> std::result::Result<(), TransportError> {
        let limit = self.timeout;
        match self.stream.as_mut() {
            Some(stream) => write_record(stream, &[], limit).await,
            None => Ok(()),
        }
    }

    fn describe(&self) -> String {
        format!("tcp://{}", self.addr)
    }
}
