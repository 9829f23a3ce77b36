//! Session settings: the editable form, its frozen form and the Config editor.

use std::time::Duration;

use serde::Deserialize;

use crate::keys::KeyEvent;
use crate::scale::TimeScale;

/// Sample interval choices, in interval-scale units
pub const INTERVAL_CHOICES: &[u32] = &[1, 2, 5, 10, 20, 50, 100, 200, 500];

/// Session duration choices, in duration-scale units (0 = unlimited)
pub const DURATION_CHOICES: &[u32] = &[0, 1, 2, 5, 10, 15, 20, 30, 45, 60];

/// Display update choices in milliseconds (0 = no live refresh)
pub const UPDATE_CHOICES: &[u32] = &[0, 100, 200, 500, 1000, 2000];

/// Reads averaged per sample (1 = off)
pub const OVERSAMPLE_CHOICES: &[u32] = &[1, 2, 4, 8, 16, 32, 64];

/// Plot points kept when the session has no fixed duration.
pub const DEFAULT_PLOT_POINTS: usize = 64;

/// Upper bound on the samples kept for plotting.
pub const MAX_SERIES_CAPACITY: usize = 1024;

/// Editable session settings
///
/// `interval` counts `int_scale` units and `duration` counts units of
/// `int_scale.duration_scale()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SessionSettings {
    #[serde(default = "default_int_scale")]
    pub int_scale: TimeScale,

    #[serde(default = "default_interval")]
    pub interval: u32,

    #[serde(default = "default_duration")]
    pub duration: u32,

    #[serde(default = "default_update_ms")]
    pub update_ms: u32,

    #[serde(default = "default_oversample")]
    pub oversample: u32,
}

fn default_int_scale() -> TimeScale {
    TimeScale::Millis
}

fn default_interval() -> u32 {
    100
}

fn default_duration() -> u32 {
    10
}

fn default_update_ms() -> u32 {
    500
}

fn default_oversample() -> u32 {
    1
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            int_scale: default_int_scale(),
            interval: default_interval(),
            duration: default_duration(),
            update_ms: default_update_ms(),
            oversample: default_oversample(),
        }
    }
}

/// Step through `choices` from `current`, wrapping at either end.
///
/// A value not in the list first snaps to its nearest choice.
fn cycle_choice(choices: &[u32], current: u32, forward: bool) -> u32 {
    let len = choices.len();
    let index = choices
        .iter()
        .position(|&c| c == current)
        .unwrap_or_else(|| nearest_index(choices, current));
    let next = if forward {
        (index + 1) % len
    } else {
        (index + len - 1) % len
    };
    choices[next]
}

fn nearest_index(choices: &[u32], value: u32) -> usize {
    choices
        .iter()
        .enumerate()
        .min_by_key(|(_, c)| c.abs_diff(value))
        .map_or(0, |(i, _)| i)
}

fn nearest_choice(choices: &[u32], value: u32) -> u32 {
    choices[nearest_index(choices, value)]
}

impl SessionSettings {
    /// Copy with every field moved onto its nearest legal choice.
    #[must_use]
    pub fn clamped(&self) -> Self {
        let int_scale = if TimeScale::INTERVAL_SCALES.contains(&self.int_scale) {
            self.int_scale
        } else {
            TimeScale::Hours
        };
        Self {
            int_scale,
            interval: nearest_choice(INTERVAL_CHOICES, self.interval),
            duration: nearest_choice(DURATION_CHOICES, self.duration),
            update_ms: nearest_choice(UPDATE_CHOICES, self.update_ms),
            oversample: nearest_choice(OVERSAMPLE_CHOICES, self.oversample),
        }
    }

    /// Move `field` to its next (or previous) legal value.
    pub fn cycle(&mut self, field: Field, forward: bool) {
        match field {
            Field::IntScale => {
                let scales = &TimeScale::INTERVAL_SCALES;
                let len = scales.len();
                let index = scales.iter().position(|&s| s == self.int_scale).unwrap_or(0);
                let next = if forward {
                    (index + 1) % len
                } else {
                    (index + len - 1) % len
                };
                self.int_scale = scales[next];
            }
            Field::Interval => self.interval = cycle_choice(INTERVAL_CHOICES, self.interval, forward),
            Field::Duration => self.duration = cycle_choice(DURATION_CHOICES, self.duration, forward),
            Field::Update => self.update_ms = cycle_choice(UPDATE_CHOICES, self.update_ms, forward),
            Field::Oversample => {
                self.oversample = cycle_choice(OVERSAMPLE_CHOICES, self.oversample, forward)
            }
        }
    }

    /// Value of `field` as shown on the Config screen.
    pub fn value_text(&self, field: Field) -> String {
        match field {
            Field::IntScale => self.int_scale.label().to_string(),
            Field::Interval => self.interval.to_string(),
            Field::Duration if self.duration == 0 => "none".to_string(),
            Field::Duration => self.duration.to_string(),
            Field::Update if self.update_ms == 0 => "off".to_string(),
            Field::Update => self.update_ms.to_string(),
            Field::Oversample if self.oversample <= 1 => "off".to_string(),
            Field::Oversample => format!("{}X", self.oversample),
        }
    }

    /// Unit shown after the value of `field`, empty when it has none.
    pub fn unit(&self, field: Field) -> &'static str {
        match field {
            Field::Interval => self.int_scale.label(),
            Field::Duration if self.duration > 0 => self.int_scale.duration_scale().label(),
            Field::Update if self.update_ms > 0 => "ms",
            _ => "",
        }
    }

    /// Freeze into the read-only form used by an Active session.
    #[must_use]
    pub fn freeze(&self) -> SessionConfig {
        SessionConfig {
            int_scale: self.int_scale,
            interval: self.int_scale.to_duration(self.interval),
            oversample: self.oversample.max(1),
            duration: (self.duration > 0)
                .then(|| self.int_scale.duration_scale().to_duration(self.duration)),
            update: (self.update_ms > 0).then(|| Duration::from_millis(u64::from(self.update_ms))),
        }
    }
}

/// Session parameters, fixed for the lifetime of one Active session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub int_scale: TimeScale,
    pub interval: Duration,
    pub oversample: u32,
    /// `None` runs until Back
    pub duration: Option<Duration>,
    /// `None` disables live display refresh
    pub update: Option<Duration>,
}

impl SessionConfig {
    /// Samples to keep for plotting.
    ///
    /// A timed session keeps every sample it will take, otherwise the plot
    /// holds [`DEFAULT_PLOT_POINTS`]. Either way the result lies within
    /// `2..=MAX_SERIES_CAPACITY`.
    pub fn series_capacity(&self) -> usize {
        let points = match self.duration {
            Some(duration) => {
                let interval_ms = self.interval.as_millis().max(1);
                let points = (duration.as_millis() + interval_ms - 1) / interval_ms;
                usize::try_from(points).unwrap_or(MAX_SERIES_CAPACITY)
            }
            None => DEFAULT_PLOT_POINTS,
        };
        points.clamp(2, MAX_SERIES_CAPACITY)
    }

    /// Interval in its own scale, e.g. `100ms`.
    pub fn interval_text(&self) -> String {
        let count = self.int_scale.count_of(self.interval);
        format!("{}{}", count.round() as u64, self.int_scale.label())
    }

    /// Duration in the duration scale, e.g. `10s`, or `unlimited`.
    pub fn duration_text(&self) -> String {
        match self.duration {
            Some(duration) => {
                let scale = self.int_scale.duration_scale();
                format!("{}{}", scale.count_of(duration).round() as u64, scale.label())
            }
            None => "unlimited".to_string(),
        }
    }
}

/// Editable field, in focus order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    IntScale,
    Interval,
    Duration,
    Update,
    Oversample,
}

impl Field {
    pub const ALL: [Field; 5] = [
        Field::IntScale,
        Field::Interval,
        Field::Duration,
        Field::Update,
        Field::Oversample,
    ];

    pub const fn heading(self) -> &'static str {
        match self {
            Field::IntScale => "Int-Scale",
            Field::Interval => "Interval",
            Field::Duration => "Duration",
            Field::Update => "Update",
            Field::Oversample => "Oversample",
        }
    }

    /// Field after this one, `None` for the last.
    pub const fn next(self) -> Option<Field> {
        match self {
            Field::IntScale => Some(Field::Interval),
            Field::Interval => Some(Field::Duration),
            Field::Duration => Some(Field::Update),
            Field::Update => Some(Field::Oversample),
            Field::Oversample => None,
        }
    }
}

/// Result of feeding one key to the editor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Editing,
    Commit(SessionSettings),
    Discard,
}

/// Draft settings with a focused field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEditor {
    draft: SessionSettings,
    field: Field,
}

impl ConfigEditor {
    /// Start editing a copy of `committed`, focused on the first field.
    pub fn open(committed: &SessionSettings) -> Self {
        Self {
            draft: committed.clamped(),
            field: Field::IntScale,
        }
    }

    pub fn field(&self) -> Field {
        self.field
    }

    pub fn draft(&self) -> &SessionSettings {
        &self.draft
    }

    pub fn handle(&mut self, key: KeyEvent) -> EditOutcome {
        match key {
            KeyEvent::Next => {
                self.draft.cycle(self.field, true);
                EditOutcome::Editing
            }
            KeyEvent::Prev => {
                self.draft.cycle(self.field, false);
                EditOutcome::Editing
            }
            KeyEvent::Select => match self.field.next() {
                Some(field) => {
                    self.field = field;
                    EditOutcome::Editing
                }
                None => EditOutcome::Commit(self.draft),
            },
            KeyEvent::Back => EditOutcome::Discard,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = SessionSettings::default();
        assert_eq!(settings.int_scale, TimeScale::Millis);
        assert_eq!(settings.interval, 100);
        assert_eq!(settings.duration, 10);
        assert_eq!(settings.update_ms, 500);
        assert_eq!(settings.oversample, 1);
        assert_eq!(settings.clamped(), settings);
    }

    #[test]
    fn test_cycle_wraps_both_ways() {
        let mut settings = SessionSettings {
            interval: 500,
            ..SessionSettings::default()
        };
        settings.cycle(Field::Interval, true);
        assert_eq!(settings.interval, 1);
        settings.cycle(Field::Interval, false);
        assert_eq!(settings.interval, 500);

        settings.cycle(Field::IntScale, false);
        assert_eq!(settings.int_scale, TimeScale::Hours);
        settings.cycle(Field::IntScale, true);
        assert_eq!(settings.int_scale, TimeScale::Millis);
    }

    #[test]
    fn test_every_choice_is_reachable() {
        let mut settings = SessionSettings::default();
        let mut seen = Vec::new();
        for _ in 0..OVERSAMPLE_CHOICES.len() {
            settings.cycle(Field::Oversample, true);
            seen.push(settings.oversample);
        }
        seen.sort_unstable();
        assert_eq!(seen, OVERSAMPLE_CHOICES);
    }

    #[test]
    fn test_out_of_range_values_clamp_to_nearest() {
        let settings = SessionSettings {
            int_scale: TimeScale::Days,
            interval: 0,
            duration: 1000,
            update_ms: 120,
            oversample: 5,
        };
        let clamped = settings.clamped();

        assert_eq!(clamped.int_scale, TimeScale::Hours);
        assert_eq!(clamped.interval, 1);
        assert_eq!(clamped.duration, 60);
        assert_eq!(clamped.update_ms, 100);
        assert_eq!(clamped.oversample, 4);
    }

    #[test]
    fn test_freeze() {
        let config = SessionSettings::default().freeze();
        assert_eq!(config.interval, Duration::from_millis(100));
        assert_eq!(config.duration, Some(Duration::from_secs(10)));
        assert_eq!(config.update, Some(Duration::from_millis(500)));
        assert_eq!(config.interval_text(), "100ms");
        assert_eq!(config.duration_text(), "10s");

        let open_ended = SessionSettings {
            int_scale: TimeScale::Seconds,
            interval: 2,
            duration: 0,
            update_ms: 0,
            oversample: 8,
        }
        .freeze();
        assert_eq!(open_ended.interval, Duration::from_secs(2));
        assert_eq!(open_ended.duration, None);
        assert_eq!(open_ended.update, None);
        assert_eq!(open_ended.oversample, 8);
        assert_eq!(open_ended.duration_text(), "unlimited");
    }

    #[test]
    fn test_series_capacity() {
        // 10 s at 100 ms
        assert_eq!(SessionSettings::default().freeze().series_capacity(), 100);

        // 60 s at 1 ms is bounded
        let capped = SessionSettings {
            int_scale: TimeScale::Millis,
            interval: 1,
            duration: 60,
            ..SessionSettings::default()
        };
        assert_eq!(capped.freeze().series_capacity(), MAX_SERIES_CAPACITY);

        // 1 min at 500 s yields a single point, raised to two
        let short = SessionSettings {
            int_scale: TimeScale::Seconds,
            interval: 500,
            duration: 1,
            ..SessionSettings::default()
        };
        assert_eq!(short.freeze().series_capacity(), 2);

        let open_ended = SessionSettings {
            duration: 0,
            ..SessionSettings::default()
        };
        assert_eq!(open_ended.freeze().series_capacity(), DEFAULT_PLOT_POINTS);
    }

    #[test]
    fn test_editor_select_advances_then_commits() {
        let committed = SessionSettings::default();
        let mut editor = ConfigEditor::open(&committed);

        for field in &Field::ALL[1..] {
            assert_eq!(editor.handle(KeyEvent::Select), EditOutcome::Editing);
            assert_eq!(editor.field(), *field);
        }
        editor.handle(KeyEvent::Next);
        assert_eq!(editor.draft().oversample, 2);

        match editor.handle(KeyEvent::Select) {
            EditOutcome::Commit(settings) => assert_eq!(settings.oversample, 2),
            other => panic!("Expected commit, got {:?}", other),
        }
    }

    #[test]
    fn test_editor_back_discards() {
        let committed = SessionSettings::default();
        let mut editor = ConfigEditor::open(&committed);

        editor.handle(KeyEvent::Next);
        assert_eq!(editor.handle(KeyEvent::Back), EditOutcome::Discard);
        assert_eq!(committed, SessionSettings::default());
    }

    #[test]
    fn test_value_text_and_units() {
        let settings = SessionSettings::default();
        assert_eq!(settings.value_text(Field::IntScale), "ms");
        assert_eq!(settings.value_text(Field::Interval), "100");
        assert_eq!(settings.unit(Field::Interval), "ms");
        assert_eq!(settings.unit(Field::Duration), "s");
        assert_eq!(settings.value_text(Field::Oversample), "off");

        let off = SessionSettings {
            duration: 0,
            update_ms: 0,
            oversample: 16,
            ..settings
        };
        assert_eq!(off.value_text(Field::Duration), "none");
        assert_eq!(off.unit(Field::Duration), "");
        assert_eq!(off.value_text(Field::Update), "off");
        assert_eq!(off.value_text(Field::Oversample), "16X");
    }
}
