//! # View
//!
//! Turns instrument state into drawing primitives for a 128x64 screen.
//!
//! The view never touches pixels. It builds a frame of [`Primitive`]s and
//! hands it to a [`Display`], skipping the call when the frame is identical
//! to the previous one. While a session is running, redraws are further
//! limited to the session's update period.

use tokio::time::Instant;
use tracing::info;

use crate::machine::{ActiveSession, Field, SessionResults, SessionSettings};
use crate::scale::{axis_scale, format_span, format_value};
use crate::series::Quantity;

/// Screen width in pixels
pub const WIDTH: i16 = 128;

/// Screen height in pixels
pub const HEIGHT: i16 = 64;

/// Top and bottom rows of the plot area
const PLOT_TOP: i16 = 22;
const PLOT_BOTTOM: i16 = 52;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: i16,
    pub y: i16,
}

impl Point {
    pub const fn new(x: i16, y: i16) -> Self {
        Self { x, y }
    }
}

/// Corner or edge of a text box that sits on its position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    NorthWest,
    NorthEast,
    West,
    East,
    SouthWest,
    SouthEast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Small,
    Large,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Glyph {
    /// The log transport is failing
    LinkDown,
}

/// One drawing instruction
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Text {
        at: Point,
        anchor: Anchor,
        text: String,
        font: Font,
    },
    Polyline(Vec<Point>),
    Glyph {
        at: Point,
        glyph: Glyph,
    },
}

impl Primitive {
    fn text(x: i16, y: i16, anchor: Anchor, text: impl Into<String>, font: Font) -> Self {
        Primitive::Text {
            at: Point::new(x, y),
            anchor,
            text: text.into(),
            font,
        }
    }
}

/// Pixel output device.
pub trait Display {
    /// Replace the screen contents with `frame`.
    fn draw(&mut self, frame: &[Primitive]);
}

impl<D: Display + ?Sized> Display for Box<D> {
    fn draw(&mut self, frame: &[Primitive]) {
        (**self).draw(frame)
    }
}

/// Display for host runs: logs the text of each frame.
#[derive(Debug, Default)]
pub struct TraceDisplay;

impl Display for TraceDisplay {
    fn draw(&mut self, frame: &[Primitive]) {
        let mut texts = Vec::new();
        let mut extras = Vec::new();
        for primitive in frame {
            match primitive {
                Primitive::Text { text, .. } => texts.push(text.as_str()),
                Primitive::Polyline(points) => extras.push(format!("plot[{}]", points.len())),
                Primitive::Glyph {
                    glyph: Glyph::LinkDown,
                    ..
                } => extras.push("LINK DOWN".to_string()),
            }
        }
        if extras.is_empty() {
            info!(target: "display", "{}", texts.join(" | "));
        } else {
            info!(target: "display", "{} | {}", texts.join(" | "), extras.join(" "));
        }
    }
}

/// What the instrument wants shown this tick
#[derive(Debug, Clone, Copy)]
pub enum Screen<'a> {
    Ready {
        results: Option<&'a SessionResults>,
    },
    Config {
        field: Field,
        draft: &'a SessionSettings,
    },
    Active {
        session: &'a ActiveSession,
        link_down: bool,
    },
}

/// Frame builder and redraw gate in front of a [`Display`]
#[derive(Debug)]
pub struct View<D> {
    display: D,
    last_frame: Option<Vec<Primitive>>,
    /// Last Active redraw, cleared whenever another screen is shown
    last_refresh: Option<Instant>,
    link_shown: bool,
}

impl<D: Display> View<D> {
    pub fn new(display: D) -> Self {
        Self {
            display,
            last_frame: None,
            last_refresh: None,
            link_shown: false,
        }
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    /// Show `screen`, returning true if the display was redrawn.
    pub fn render(&mut self, screen: Screen<'_>, now: Instant) -> bool {
        let frame = match screen {
            Screen::Ready { results } => {
                self.last_refresh = None;
                ready_frame(results)
            }
            Screen::Config { field, draft } => {
                self.last_refresh = None;
                config_frame(field, draft)
            }
            Screen::Active { session, link_down } => {
                if !self.refresh_due(session, link_down, now) {
                    return false;
                }
                self.last_refresh = Some(now);
                self.link_shown = link_down;
                active_frame(session, link_down, now)
            }
        };

        if self.last_frame.as_ref() == Some(&frame) {
            return false;
        }
        self.display.draw(&frame);
        self.last_frame = Some(frame);
        true
    }

    fn refresh_due(&self, session: &ActiveSession, link_down: bool, now: Instant) -> bool {
        if link_down != self.link_shown {
            return true;
        }
        match (self.last_refresh, session.config().update) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(last), Some(update)) => now.saturating_duration_since(last) >= update,
        }
    }
}

fn ready_frame(results: Option<&SessionResults>) -> Vec<Primitive> {
    let mut frame = vec![Primitive::text(0, 0, Anchor::NorthWest, "READY", Font::Large)];

    match results {
        Some(results) => {
            frame.push(Primitive::text(
                WIDTH - 1,
                0,
                Anchor::NorthEast,
                format!("N {}", results.samples),
                Font::Small,
            ));
            frame.push(Primitive::text(
                WIDTH - 1,
                10,
                Anchor::NorthEast,
                format_span(results.elapsed),
                Font::Small,
            ));
            if let Some(summary) = results.summary {
                // One row per quantity: min, mean, max
                for (col, label) in (0i16..).zip(["Min", "Avg", "Max"]) {
                    frame.push(Primitive::text(col * 43, 24, Anchor::West, label, Font::Small));
                }
                for (row, quantity) in (1i16..).zip(Quantity::ALL) {
                    let stats = summary.of(quantity);
                    let unit = quantity.unit();
                    let y = 24 + row * 11;
                    for (col, value) in (0i16..).zip([stats.min, stats.mean, stats.max]) {
                        frame.push(Primitive::text(
                            col * 43,
                            y,
                            Anchor::West,
                            format_value(value, unit),
                            Font::Small,
                        ));
                    }
                }
            }
        }
        None => frame.push(Primitive::text(
            0,
            HEIGHT - 1,
            Anchor::SouthWest,
            "Select to configure",
            Font::Small,
        )),
    }
    frame
}

fn config_frame(field: Field, draft: &SessionSettings) -> Vec<Primitive> {
    vec![
        Primitive::text(0, 0, Anchor::NorthWest, field.heading(), Font::Small),
        Primitive::text(0, 32, Anchor::West, draft.value_text(field), Font::Large),
        Primitive::text(WIDTH - 1, 32, Anchor::East, draft.unit(field), Font::Small),
    ]
}

fn active_frame(session: &ActiveSession, link_down: bool, now: Instant) -> Vec<Primitive> {
    let readout = |quantity: Quantity| match session.buffer().latest() {
        Some(sample) => format_value(quantity.of(&sample.reading()), quantity.unit()),
        None => format!("--{}", quantity.unit()),
    };

    let mut frame = vec![
        Primitive::text(0, 0, Anchor::NorthWest, readout(Quantity::Voltage), Font::Large),
        Primitive::text(WIDTH - 1, 0, Anchor::NorthEast, readout(Quantity::Current), Font::Small),
        Primitive::text(WIDTH - 1, 10, Anchor::NorthEast, readout(Quantity::Power), Font::Small),
        Primitive::text(
            0,
            HEIGHT - 1,
            Anchor::SouthWest,
            format_span(session.elapsed(now)),
            Font::Small,
        ),
    ];

    if let Some(points) = power_plot(session) {
        let (_, span) = axis_scale(session.buffer().capacity(), session.config().interval);
        frame.push(Primitive::Polyline(points));
        frame.push(Primitive::text(WIDTH - 1, HEIGHT - 1, Anchor::SouthEast, span, Font::Small));
    }

    if link_down {
        frame.push(Primitive::Glyph {
            at: Point::new(WIDTH - 9, PLOT_TOP),
            glyph: Glyph::LinkDown,
        });
    }
    frame
}

/// Power trace scaled to the plot area, `None` until two samples exist.
///
/// The x-axis spans the full buffer capacity so the trace grows from the
/// left until the buffer wraps.
fn power_plot(session: &ActiveSession) -> Option<Vec<Point>> {
    let buffer = session.buffer();
    if buffer.len() < 2 {
        return None;
    }
    let power = buffer.summary()?.of(Quantity::Power);
    let range = power.max - power.min;
    let height = f64::from(PLOT_BOTTOM - PLOT_TOP);
    let slots = (buffer.capacity() - 1).max(1) as f64;
    let width = f64::from(WIDTH - 1);

    let points = buffer
        .iter()
        .enumerate()
        .map(|(i, sample)| {
            let x = (i as f64 * width / slots).round() as i16;
            let level = if range > 0.0 {
                (sample.power - power.min) / range
            } else {
                0.5
            };
            let y = PLOT_BOTTOM - (level * height).round() as i16;
            Point::new(x, y)
        })
        .collect();
    Some(points)
}


#[cfg(test)]
mod tests {
    use super::mocks::RecordingDisplay;
    use super::*;
    use crate::logger::transport::mocks::ScriptedTransport;
    use crate::logger::LogWriter;
    use crate::sensor::{Reading, SyntheticSensor};
    use crate::series::Aggregate;
    use std::time::Duration;

    async fn session_with_samples(update_ms: u32, count: u64, t0: Instant) -> ActiveSession {
        let settings = SessionSettings {
            update_ms,
            ..SessionSettings::default()
        };
        let mut session = ActiveSession::start(settings.freeze(), t0);
        let mut sensor = SyntheticSensor::default();
        let mut writer = LogWriter::new(ScriptedTransport::new(), 0);
        for i in 0..count {
            session
                .step(&mut sensor, &mut writer, t0 + Duration::from_millis(i * 100))
                .await;
        }
        session
    }

    #[test]
    fn test_ready_prompt_without_results() {
        let display = RecordingDisplay::new();
        let mut view = View::new(display.clone());

        assert!(view.render(Screen::Ready { results: None }, Instant::now()));
        assert_eq!(display.last_texts(), vec!["READY", "Select to configure"]);
    }

    #[test]
    fn test_ready_shows_last_results() {
        let display = RecordingDisplay::new();
        let mut view = View::new(display.clone());

        let mut aggregate = Aggregate::default();
        aggregate.add(&Reading::new(5.0, 20.0, 100.0));
        aggregate.add(&Reading::new(5.0, 40.0, 200.0));
        let results = SessionResults {
            elapsed: Duration::from_millis(2500),
            samples: 2,
            skipped: 0,
            dropped: 0,
            summary: aggregate.summary(),
        };

        view.render(Screen::Ready { results: Some(&results) }, Instant::now());
        let texts = display.last_texts();
        assert!(texts.contains(&"N 2".to_string()));
        assert!(texts.contains(&"2.5 s".to_string()));
        assert_eq!(
            &texts[texts.len() - 9..],
            &[
                "5.00V", "5.00V", "5.00V", "20.0mA", "30.0mA", "40.0mA", "100mW", "150mW", "200mW"
            ]
        );

        // Rows stay on screen
        let frame = display.frames().pop().unwrap();
        assert!(frame.iter().all(|p| match p {
            Primitive::Text { at, .. } => (0..HEIGHT).contains(&at.y) && (0..WIDTH).contains(&at.x),
            _ => true,
        }));
    }

    #[test]
    fn test_unchanged_frame_is_not_redrawn() {
        let display = RecordingDisplay::new();
        let mut view = View::new(display.clone());
        let draft = SessionSettings::default();
        let now = Instant::now();

        assert!(view.render(Screen::Config { field: Field::Interval, draft: &draft }, now));
        assert!(!view.render(Screen::Config { field: Field::Interval, draft: &draft }, now));
        assert_eq!(display.draws(), 1);
        assert_eq!(display.last_texts(), vec!["Interval", "100", "ms"]);

        assert!(view.render(Screen::Config { field: Field::Duration, draft: &draft }, now));
        assert_eq!(display.draws(), 2);
    }

    #[tokio::test]
    async fn test_active_readout_and_plot() {
        let t0 = Instant::now();
        let session = session_with_samples(500, 5, t0).await;
        let display = RecordingDisplay::new();
        let mut view = View::new(display.clone());

        assert!(view.render(
            Screen::Active { session: &session, link_down: false },
            t0 + Duration::from_millis(400)
        ));

        let latest = SyntheticSensor::reading_at(0.4);
        let texts = display.last_texts();
        assert_eq!(texts[0], format_value(latest.voltage, "V"));
        assert_eq!(texts[1], format_value(latest.current, "mA"));
        assert_eq!(texts[2], format_value(latest.power, "mW"));
        assert!(texts.contains(&"400 ms".to_string()));
        // 100 slots at 100 ms
        assert!(texts.contains(&"10 s".to_string()));

        let frame = display.last().unwrap();
        let plot = frame
            .iter()
            .find_map(|p| match p {
                Primitive::Polyline(points) => Some(points.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(plot.len(), 5);
        assert_eq!(plot[0].x, 0);
        assert!(plot.iter().all(|p| (PLOT_TOP..=PLOT_BOTTOM).contains(&p.y)));
        assert!(!display.last_has_glyph(Glyph::LinkDown));
    }

    #[tokio::test]
    async fn test_active_redraw_is_throttled() {
        let t0 = Instant::now();
        let session = session_with_samples(500, 1, t0).await;
        let display = RecordingDisplay::new();
        let mut view = View::new(display.clone());
        let screen = Screen::Active { session: &session, link_down: false };

        assert!(view.render(screen, t0));
        assert!(!view.render(screen, t0 + Duration::from_millis(499)));
        assert!(view.render(screen, t0 + Duration::from_millis(500)));
        assert_eq!(display.draws(), 2);
    }

    #[tokio::test]
    async fn test_no_live_refresh_when_update_is_off() {
        let t0 = Instant::now();
        let session = session_with_samples(0, 1, t0).await;
        let display = RecordingDisplay::new();
        let mut view = View::new(display.clone());
        let screen = Screen::Active { session: &session, link_down: false };

        assert!(view.render(screen, t0));
        assert!(!view.render(screen, t0 + Duration::from_secs(60)));

        // Link failures still show up
        let failing = Screen::Active { session: &session, link_down: true };
        assert!(view.render(failing, t0 + Duration::from_secs(61)));
        assert!(display.last_has_glyph(Glyph::LinkDown));
    }

    #[tokio::test]
    async fn test_empty_session_shows_placeholders() {
        let t0 = Instant::now();
        let session = session_with_samples(500, 0, t0).await;
        let display = RecordingDisplay::new();
        let mut view = View::new(display.clone());

        view.render(Screen::Active { session: &session, link_down: false }, t0);
        let texts = display.last_texts();
        assert_eq!(&texts[..3], &["--V", "--mA", "--mW"]);
        assert!(!display
            .last()
            .unwrap()
            .iter()
            .any(|p| matches!(p, Primitive::Polyline(_))));
    }
}
