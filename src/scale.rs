//! # Time Scales
//!
//! Helpers for converting between the time units used on the meter.
//!
//! The sample interval is edited in an *interval scale* (ms, s, min, h) and the
//! session duration in the next larger *duration scale*, so an interval of
//! `100 ms` pairs with a duration in seconds and an interval in seconds pairs
//! with a duration in minutes.
//!
//! The plot x-axis picks its own unit from the span covered by the buffer so the
//! label stays short:
//!
//! ```
//! use std::time::Duration;
//! use va_meter::scale::{axis_scale, TimeScale};
//!
//! let (unit, label) = axis_scale(25, Duration::from_millis(100));
//! assert_eq!(unit, TimeScale::Seconds);
//! assert_eq!(label, "2.5 s");
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

/// Unit of time used for intervals, durations and plot axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum TimeScale {
    Millis,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeScale {
    /// Scales offered for the sample interval, in ascending order.
    pub const INTERVAL_SCALES: [TimeScale; 4] = [
        TimeScale::Millis,
        TimeScale::Seconds,
        TimeScale::Minutes,
        TimeScale::Hours,
    ];

    const ALL: [TimeScale; 5] = [
        TimeScale::Millis,
        TimeScale::Seconds,
        TimeScale::Minutes,
        TimeScale::Hours,
        TimeScale::Days,
    ];

    /// Milliseconds in one unit of this scale.
    #[must_use]
    pub const fn millis(self) -> u64 {
        match self {
            TimeScale::Millis => 1,
            TimeScale::Seconds => 1_000,
            TimeScale::Minutes => 60_000,
            TimeScale::Hours => 3_600_000,
            TimeScale::Days => 86_400_000,
        }
    }

    /// Seconds in one unit of this scale.
    #[must_use]
    pub fn seconds(self) -> f64 {
        self.millis() as f64 / 1000.0
    }

    /// Short unit label shown next to values.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            TimeScale::Millis => "ms",
            TimeScale::Seconds => "s",
            TimeScale::Minutes => "min",
            TimeScale::Hours => "h",
            TimeScale::Days => "d",
        }
    }

    /// Scale used for the session duration when the interval uses `self`.
    ///
    /// Days have no larger unit and map onto themselves.
    #[must_use]
    pub const fn duration_scale(self) -> TimeScale {
        match self {
            TimeScale::Millis => TimeScale::Seconds,
            TimeScale::Seconds => TimeScale::Minutes,
            TimeScale::Minutes => TimeScale::Hours,
            TimeScale::Hours | TimeScale::Days => TimeScale::Days,
        }
    }

    /// Convert a whole count of this unit into a [`Duration`].
    #[must_use]
    pub fn to_duration(self, count: u32) -> Duration {
        Duration::from_millis(u64::from(count) * self.millis())
    }

    /// Express `span` as a (fractional) count of this unit.
    #[must_use]
    pub fn count_of(self, span: Duration) -> f64 {
        span.as_secs_f64() / self.seconds()
    }
}

impl fmt::Display for TimeScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TimeScale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ms" => Ok(TimeScale::Millis),
            "s" => Ok(TimeScale::Seconds),
            "m" | "min" => Ok(TimeScale::Minutes),
            "h" => Ok(TimeScale::Hours),
            "d" => Ok(TimeScale::Days),
            other => Err(format!("unknown time scale '{}' (expected ms, s, min, h or d)", other)),
        }
    }
}

impl TryFrom<String> for TimeScale {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Largest unit in which `span` is at least one whole unit.
///
/// Spans below one millisecond stay in milliseconds.
#[must_use]
pub fn axis_unit(span: Duration) -> TimeScale {
    let span_ms = span.as_millis();
    TimeScale::ALL
        .iter()
        .rev()
        .copied()
        .find(|scale| span_ms >= u128::from(scale.millis()))
        .unwrap_or(TimeScale::Millis)
}

/// Format a time span for the plot axis, e.g. `2.5 s` or `750 ms`.
#[must_use]
pub fn format_span(span: Duration) -> String {
    let unit = axis_unit(span);
    format!("{} {}", format_number(unit.count_of(span)), unit.label())
}

/// Pick the x-axis unit and label for `samples` points taken every `interval`.
#[must_use]
pub fn axis_scale(samples: usize, interval: Duration) -> (TimeScale, String) {
    let span = interval.saturating_mul(u32::try_from(samples).unwrap_or(u32::MAX));
    (axis_unit(span), format_span(span))
}

/// Decimal places for a readout value: finer resolution for small magnitudes.
fn precision(value: f64) -> usize {
    let magnitude = value.abs();
    if magnitude < 10.0 {
        2
    } else if magnitude < 100.0 {
        1
    } else {
        0
    }
}

/// Format a readout value with a unit suffix, using 2, 1 or 0 decimals
/// depending on magnitude (`4.98V`, `25.3mA`, `127mW`).
#[must_use]
pub fn format_value(value: f64, unit: &str) -> String {
    format!("{:.*}{}", precision(value), value, unit)
}

/// Like the readout precision, but with trailing zeros removed.
fn format_number(value: f64) -> String {
    let text = format!("{:.*}", precision(value), value);
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text
    }
}
