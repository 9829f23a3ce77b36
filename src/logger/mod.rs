//! # Logger Module
//!
//! Streams samples to a remote collector.
//!
//! This module handles:
//! - Formatting samples as `timestamp_ms,voltage_V,current_mA,power_mW` lines
//! - Session header and summary lines (prefixed with `#`)
//! - Bounded immediate retry on send failure
//! - Tracking link health across sessions
//!
//! A dropped record never stops acquisition: [`LogWriter::write`] reports
//! [`DeliveryResult::Dropped`] and the session carries on.

pub mod stream;
pub mod transport;
pub mod udp;

use std::fmt::Write as _;

use bytes::BytesMut;
use tracing::{debug, info, warn};

use crate::machine::{SessionConfig, SessionResults};
use crate::scale::format_value;
use crate::series::{Quantity, Sample};

pub use stream::{StreamTransport, TcpTransport};
pub use transport::{Transport, TransportError};
pub use udp::PacketTransport;

/// Retries after the first failed attempt when none are configured.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Outcome of handing one record to the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryResult {
    Delivered,
    Dropped(TransportError),
}

/// Link health, kept for the lifetime of the writer
///
/// Only sample records are counted; `#` header and summary lines are sent
/// with the same retries but leave these counters alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportState {
    /// Records dropped in a row since the last successful delivery
    pub consecutive_failures: u32,
    /// Immediate retries after a failed attempt
    pub max_retries: u32,
    /// Records dropped since the writer was created
    pub dropped: u64,
    /// Records delivered since the writer was created
    pub delivered: u64,
}

/// Formats records and delivers them over a [`Transport`].
///
/// One writer lives for the whole run and is reused by every session, so
/// its [`TransportState`] reflects long-run link health.
#[derive(Debug)]
pub struct LogWriter<T> {
    transport: T,
    state: TransportState,
    scratch: BytesMut,
}

/// Append one sample record to `buf`.
pub fn format_record(buf: &mut BytesMut, sample: &Sample) {
    let timestamp_ms = sample.timestamp.as_secs_f64() * 1000.0;
    // Writing into BytesMut cannot fail.
    let _ = writeln!(
        buf,
        "{:.1},{:.3},{:.3},{:.3}",
        timestamp_ms, sample.voltage, sample.current, sample.power
    );
}

impl<T: Transport> LogWriter<T> {
    pub fn new(transport: T, max_retries: u32) -> Self {
        info!(
            "Logging to {} (max {} retries)",
            transport.describe(),
            max_retries
        );
        Self {
            transport,
            state: TransportState {
                consecutive_failures: 0,
                max_retries,
                dropped: 0,
                delivered: 0,
            },
            scratch: BytesMut::with_capacity(64),
        }
    }

    pub fn state(&self) -> &TransportState {
        &self.state
    }

    /// True while the most recent record could not be delivered.
    pub fn link_down(&self) -> bool {
        self.state.consecutive_failures > 0
    }

    /// Send one sample record.
    pub async fn write(&mut self, sample: &Sample) -> DeliveryResult {
        format_record(&mut self.scratch, sample);
        let payload = self.scratch.split().freeze();
        self.deliver(&payload).await
    }

    /// Send the settings header that opens a session.
    pub async fn begin(&mut self, config: &SessionConfig) {
        let started = chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%:z");
        let mut lines = vec![
            "#".to_string(),
            format!("#Started:      {}", started),
            format!("#Interval:     {}", config.interval_text()),
        ];
        if config.oversample > 1 {
            lines.push(format!("#Oversampling: {}X", config.oversample));
        }
        lines.push(format!("#Duration:     {}", config.duration_text()));
        match config.update {
            Some(update) => lines.push(format!("#Update:       {}ms", update.as_millis())),
            None => lines.push("#Update:       off".to_string()),
        }
        lines.push("#".to_string());

        self.send_lines(&lines).await;
    }

    /// Send the session summary and flush the transport.
    pub async fn finish(&mut self, config: &SessionConfig, results: &SessionResults) {
        let lines = summary_lines(config, results);
        self.send_lines(&lines).await;

        if let Err(e) = self.transport.flush().await {
            warn!("Failed to flush {}: {}", self.transport.describe(), e);
        }
    }

    async fn send_lines(&mut self, lines: &[String]) {
        for line in lines {
            self.scratch.extend_from_slice(line.as_bytes());
            self.scratch.extend_from_slice(b"\n");
            let payload = self.scratch.split().freeze();
            if let Err(e) = self.attempt(&payload).await {
                warn!("Dropped log line {:?}: {}", line, e);
            }
        }
    }

    /// Send one sample record, updating link health.
    async fn deliver(&mut self, payload: &[u8]) -> DeliveryResult {
        match self.attempt(payload).await {
            Ok(()) => {
                if self.state.consecutive_failures > 0 {
                    info!(
                        "Log link recovered after {} dropped records",
                        self.state.consecutive_failures
                    );
                }
                self.state.consecutive_failures = 0;
                self.state.delivered += 1;
                DeliveryResult::Delivered
            }
            Err(e) => {
                self.state.consecutive_failures = self.state.consecutive_failures.saturating_add(1);
                self.state.dropped += 1;
                warn!(
                    "Dropped record ({} in a row): {}",
                    self.state.consecutive_failures, e
                );
                DeliveryResult::Dropped(e)
            }
        }
    }

    /// Try the transport up to `1 + max_retries` times.
    async fn attempt(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        let attempts = self.state.max_retries.saturating_add(1);
        let mut last_error = TransportError::Closed;

        for attempt in 1..=attempts {
            match self.transport.send(payload).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    debug!("Send attempt {}/{} failed: {}", attempt, attempts, e);
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }
}

/// Footer lines; durations use the session's own scales.
fn summary_lines(config: &SessionConfig, results: &SessionResults) -> Vec<String> {
    let seconds = results.elapsed.as_secs_f64();
    let dur_scale = config.int_scale.duration_scale();
    let mut lines = vec![
        "#".to_string(),
        format!(
            "#Duration: {:.1}{}",
            dur_scale.count_of(results.elapsed),
            dur_scale.label()
        ),
    ];

    let rate = if seconds > 0.0 {
        results.samples as f64 / seconds
    } else {
        0.0
    };
    lines.push(format!("#Samples: {} ({:.1}/s)", results.samples, rate));
    if results.samples > 0 {
        lines.push(format!(
            "#Mean Interval: {:.1}{}",
            config.int_scale.count_of(results.elapsed) / results.samples as f64,
            config.int_scale.label()
        ));
    }
    if results.skipped > 0 || results.dropped > 0 {
        lines.push(format!(
            "#Skipped: {}, Dropped: {}",
            results.skipped, results.dropped
        ));
    }

    if let Some(summary) = results.summary {
        lines.push("#Min,Mean,Max".to_string());
        for quantity in Quantity::ALL {
            let stats = summary.of(quantity);
            let unit = quantity.unit();
            lines.push(format!(
                "#{},{},{}",
                format_value(stats.min, unit),
                format_value(stats.mean, unit),
                format_value(stats.max, unit)
            ));
        }
    }
    lines
}
