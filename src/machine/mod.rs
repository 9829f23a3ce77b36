//! # Operating State Machine
//!
//! The instrument's runtime control loop.
//!
//! [`Instrument`] owns every collaborator and moves between three modes:
//!
//! - **Ready**: idle, showing the results of the last session
//! - **Config**: editing a draft of the session settings
//! - **Active**: sampling, plotting and logging
//!
//! Each [`Instrument::tick`] polls at most one key, applies the transition,
//! runs the Active sampling step when one is due and renders the view. The
//! only awaits inside a tick are log transport sends, which are bounded by
//! the writer's retry count.

pub mod active;
pub mod settings;

use tokio::time::Instant;
use tracing::{debug, info};

use crate::keys::{KeyEvent, KeySource};
use crate::logger::{LogWriter, Transport};
use crate::sensor::SensorSource;
use crate::view::{Display, Screen, View};

pub use active::{oversample, ActiveSession, SessionResults};
pub use settings::{ConfigEditor, EditOutcome, Field, SessionConfig, SessionSettings};

/// Current operating mode with its mode-specific state
#[derive(Debug, Clone)]
pub enum Mode {
    Ready,
    Config(ConfigEditor),
    Active(ActiveSession),
}

/// Operating mode without its state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeKind {
    Ready,
    Config,
    Active,
}

impl Mode {
    pub fn kind(&self) -> ModeKind {
        match self {
            Mode::Ready => ModeKind::Ready,
            Mode::Config(_) => ModeKind::Config,
            Mode::Active(_) => ModeKind::Active,
        }
    }
}

/// The meter: sensor, keys, log writer and view driven by one state machine
///
/// # Examples
///
/// ```
/// use tokio::time::Instant;
/// use va_meter::keys::{KeyEvent, ScriptedKeys};
/// use va_meter::logger::{LogWriter, StreamTransport};
/// use va_meter::machine::{Instrument, ModeKind, SessionSettings};
/// use va_meter::sensor::SyntheticSensor;
/// use va_meter::view::TraceDisplay;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let writer = LogWriter::new(StreamTransport::new(tokio::io::sink(), "sink"), 3);
///     let keys = ScriptedKeys::from_keys([KeyEvent::Select; 6]);
///     let mut meter = Instrument::new(
///         SyntheticSensor::default(),
///         keys,
///         writer,
///         TraceDisplay,
///         SessionSettings::default(),
///     );
///
///     let now = Instant::now();
///     for _ in 0..6 {
///         meter.tick(now).await;
///     }
///     assert_eq!(meter.mode(), ModeKind::Active);
/// }
/// ```
#[derive(Debug)]
pub struct Instrument<S, K, T, D> {
    sensor: S,
    keys: K,
    writer: LogWriter<T>,
    view: View<D>,
    settings: SessionSettings,
    mode: Mode,
    last_results: Option<SessionResults>,
}

impl<S, K, T, D> Instrument<S, K, T, D>
where
    S: SensorSource,
    K: KeySource,
    T: Transport,
    D: Display,
{
    /// Build an instrument in Ready with `settings` as the committed settings.
    pub fn new(sensor: S, keys: K, writer: LogWriter<T>, display: D, settings: SessionSettings) -> Self {
        Self {
            sensor,
            keys,
            writer,
            view: View::new(display),
            settings,
            mode: Mode::Ready,
            last_results: None,
        }
    }

    pub fn mode(&self) -> ModeKind {
        self.mode.kind()
    }

    /// Committed session settings
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn last_results(&self) -> Option<&SessionResults> {
        self.last_results.as_ref()
    }

    pub fn writer(&self) -> &LogWriter<T> {
        &self.writer
    }

    pub fn keys(&self) -> &K {
        &self.keys
    }

    pub fn display(&self) -> &D {
        self.view.display()
    }

    /// Run one iteration of the control loop as of `now`.
    pub async fn tick(&mut self, now: Instant) {
        if let Some(key) = self.keys.poll() {
            self.handle_key(key, now).await;
        }
        self.run_active(now).await;
        self.render(now);
    }

    /// Apply the transition for `key` in the current mode.
    pub async fn handle_key(&mut self, key: KeyEvent, now: Instant) {
        debug!("Key {} in {:?}", key, self.mode.kind());

        match &mut self.mode {
            Mode::Ready => {
                if key == KeyEvent::Select {
                    self.mode = Mode::Config(ConfigEditor::open(&self.settings));
                }
            }
            Mode::Config(editor) => match editor.handle(key) {
                EditOutcome::Editing => {}
                EditOutcome::Commit(settings) => {
                    self.settings = settings;
                    self.start_session(now).await;
                }
                EditOutcome::Discard => {
                    debug!("Config discarded");
                    self.mode = Mode::Ready;
                }
            },
            Mode::Active(_) => {
                if key == KeyEvent::Back {
                    self.finish_session(now).await;
                }
            }
        }
    }

    /// Freeze the committed settings and enter Active.
    pub async fn start_session(&mut self, now: Instant) {
        let config = self.settings.freeze();
        info!(
            "Session started: interval {}, duration {}, oversample {}",
            config.interval_text(),
            config.duration_text(),
            config.oversample
        );
        self.writer.begin(&config).await;
        self.mode = Mode::Active(ActiveSession::start(config, now));
    }

    /// Stop on expiry, otherwise take a sample when one is due.
    pub async fn run_active(&mut self, now: Instant) {
        let expired = match &self.mode {
            Mode::Active(session) => session.is_expired(now),
            _ => return,
        };
        if expired {
            self.finish_session(now).await;
            return;
        }

        if let Mode::Active(session) = &mut self.mode {
            if session.sample_due(now) {
                session.step(&mut self.sensor, &mut self.writer, now).await;
            }
        }
    }

    /// End the Active session, send its summary and return to Ready.
    ///
    /// Does nothing outside Active.
    pub async fn finish_session(&mut self, now: Instant) {
        let session = match std::mem::replace(&mut self.mode, Mode::Ready) {
            Mode::Active(session) => session,
            other => {
                self.mode = other;
                return;
            }
        };

        let results = session.results(now);
        self.writer.finish(session.config(), &results).await;
        info!(
            "Session finished: {} samples in {:.1}s ({} skipped, {} dropped)",
            results.samples,
            results.elapsed.as_secs_f64(),
            results.skipped,
            results.dropped
        );
        self.last_results = Some(results);
    }

    /// Finish any running session before exit.
    pub async fn shutdown(&mut self, now: Instant) {
        if self.mode.kind() == ModeKind::Active {
            info!("Shutting down, finishing active session");
            self.finish_session(now).await;
            self.render(now);
        }
    }

    fn render(&mut self, now: Instant) {
        let screen = match &self.mode {
            Mode::Ready => Screen::Ready {
                results: self.last_results.as_ref(),
            },
            Mode::Config(editor) => Screen::Config {
                field: editor.field(),
                draft: editor.draft(),
            },
            Mode::Active(session) => Screen::Active {
                session,
                link_down: self.writer.link_down(),
            },
        };
        self.view.render(screen, now);
    }
}
