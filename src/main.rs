//! # VA Meter
//!
//! Host build of the meter: a synthetic sensor, console (or scripted) keys and
//! a display that logs each frame, streaming samples to the configured
//! collector.

use std::net::SocketAddr;
use std::path::Path;

use anyhow::{Context, Result};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;

use va_meter::config::{Config, TransportKind};
use va_meter::keys::{ConsoleKeys, KeyEvent, KeySource, ScriptedKeys};
use va_meter::logger::stream::{open_serial, open_serial_auto, TcpTransport, DEFAULT_SERIAL_PATHS};
use va_meter::logger::{LogWriter, PacketTransport, Transport};
use va_meter::machine::{Instrument, ModeKind};
use va_meter::sensor::SyntheticSensor;
use va_meter::view::TraceDisplay;

/// Control loop period
const TICK: Duration = Duration::from_millis(10);

/// Configuration file used when none is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Key input for host runs
enum HostKeys {
    Console(ConsoleKeys),
    Script(ScriptedKeys),
}

impl HostKeys {
    /// True once a key script has been fully replayed.
    fn finished(&self) -> bool {
        matches!(self, HostKeys::Script(keys) if keys.is_exhausted())
    }
}

impl KeySource for HostKeys {
    fn poll(&mut self) -> Option<KeyEvent> {
        match self {
            HostKeys::Console(keys) => keys.poll(),
            HostKeys::Script(keys) => keys.poll(),
        }
    }
}

fn load_config() -> Result<Config> {
    match std::env::args().nth(1) {
        Some(path) => Config::load(&path).with_context(|| format!("Failed to load {}", path)),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => Config::load(DEFAULT_CONFIG_PATH)
            .with_context(|| format!("Failed to load {}", DEFAULT_CONFIG_PATH)),
        None => Ok(Config::default()),
    }
}

/// Set up stderr logging, plus a daily rolling file when `log_dir` is set.
///
/// The returned guard must live until exit so buffered file output is written.
fn init_tracing(log_dir: Option<&str>) -> Option<WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());
    let stderr = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "va-meter.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(filter).with(stderr).init();
            None
        }
    }
}

async fn open_transport(config: &Config) -> Result<Box<dyn Transport>> {
    let logger = &config.logger;
    let timeout = logger.send_timeout();
    let transport: Box<dyn Transport> = match logger.transport {
        TransportKind::Udp => {
            let dest: SocketAddr = logger
                .remote_addr()
                .parse()
                .context("Invalid collector address")?;
            Box::new(PacketTransport::bind(dest).await?)
        }
        // Connects on the first record, so a missing collector is not fatal
        TransportKind::Tcp => Box::new(TcpTransport::new(logger.remote_addr(), timeout)),
        TransportKind::Serial if logger.serial_port.is_empty() => Box::new(
            open_serial_auto(DEFAULT_SERIAL_PATHS, logger.baud_rate)?.with_timeout(timeout),
        ),
        TransportKind::Serial => {
            Box::new(open_serial(&logger.serial_port, logger.baud_rate)?.with_timeout(timeout))
        }
    };
    Ok(transport)
}

/// Main entry point for VA Meter
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration (first argument, else `config/default.toml`, else defaults)
///    - Set up logging with tracing subscriber
///    - Open the log transport
///
/// 2. **Main Loop**
///    - Tick the instrument every 10 ms
///    - Handle Ctrl+C for graceful shutdown
///
/// 3. **Graceful Shutdown**
///    - Finish a running session so its summary is sent and flushed
///
/// # Errors
///
/// Returns error if the configuration is invalid or the transport cannot be
/// opened.
///
/// # Examples
///
/// ```bash
/// cargo run --release -- config/default.toml
/// ```
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config = load_config()?;
    let _guard = init_tracing(config.diagnostics.log_dir.as_deref());

    info!("VA Meter v{} starting...", env!("CARGO_PKG_VERSION"));

    let transport = open_transport(&config).await?;
    let writer = LogWriter::new(transport, config.logger.retry);

    let sensor = SyntheticSensor::new(config.sensor.step_s).with_fail_every(config.sensor.fail_every);

    let keys = match config.keys.parse_script()? {
        Some(script) => {
            info!("Replaying {} scripted key polls", script.len());
            HostKeys::Script(ScriptedKeys::new(script))
        }
        None => {
            info!("Keys: n(ext), p(rev), s(elect), b(ack) + Enter");
            HostKeys::Console(ConsoleKeys::spawn_stdin())
        }
    };

    let mut meter = Instrument::new(sensor, keys, writer, TraceDisplay, config.session);

    let mut ticker = interval(TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!("Press Ctrl+C to exit");

    loop {
        tokio::select! {
            now = ticker.tick() => {
                meter.tick(now).await;

                if meter.keys().finished() && meter.mode() == ModeKind::Ready {
                    info!("Key script finished");
                    break;
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    meter.shutdown(tokio::time::Instant::now()).await;

    let state = meter.writer().state();
    if state.dropped > 0 {
        warn!("{} records were not delivered", state.dropped);
    }
    info!("Records delivered: {}", state.delivered);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_period() {
        // Must stay below the shortest display update period
        assert_eq!(TICK, Duration::from_millis(10));
        assert!(TICK < Duration::from_millis(100));
    }

    #[test]
    fn test_scripted_keys_finish_when_exhausted() {
        let mut keys = HostKeys::Script(ScriptedKeys::from_keys([KeyEvent::Select]));
        assert!(!keys.finished());
        assert_eq!(keys.poll(), Some(KeyEvent::Select));
        assert!(keys.finished());
    }

    #[test]
    fn test_console_keys_never_finish() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let mut keys = HostKeys::Console(ConsoleKeys::new(rx));
        tx.send(KeyEvent::Back).unwrap();

        assert_eq!(keys.poll(), Some(KeyEvent::Back));
        assert!(!keys.finished());
    }
}
