//! A running acquisition session.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use super::settings::SessionConfig;
use crate::logger::{DeliveryResult, LogWriter, Transport};
use crate::sensor::{Reading, SensorError, SensorSource};
use crate::series::{Aggregate, Sample, SeriesBuffer, Summary};

/// Outcome of a finished session, kept for the Ready screen
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionResults {
    pub elapsed: Duration,
    /// Samples recorded (and handed to the log writer)
    pub samples: u64,
    /// Sampling steps lost to sensor errors
    pub skipped: u64,
    /// Recorded samples the transport never delivered
    pub dropped: u64,
    /// Whole-session statistics, `None` when nothing was recorded
    pub summary: Option<Summary>,
}

/// Take `count` reads and average them.
///
/// # Errors
///
/// Returns the first [`SensorError`]; the partial sum is discarded.
pub fn oversample<S>(sensor: &mut S, count: u32) -> Result<Reading, SensorError>
where
    S: SensorSource + ?Sized,
{
    let count = count.max(1);
    let mut total = Reading::default();
    for _ in 0..count {
        total = total + sensor.sample()?;
    }
    Ok(total / f64::from(count))
}

/// State of the Active mode
#[derive(Debug, Clone)]
pub struct ActiveSession {
    config: SessionConfig,
    started: Instant,
    next_due: Instant,
    buffer: SeriesBuffer,
    aggregate: Aggregate,
    skipped: u64,
    dropped: u64,
}

impl ActiveSession {
    pub fn start(config: SessionConfig, now: Instant) -> Self {
        Self {
            config,
            started: now,
            next_due: now,
            buffer: SeriesBuffer::with_capacity(config.series_capacity()),
            aggregate: Aggregate::default(),
            skipped: 0,
            dropped: 0,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn buffer(&self) -> &SeriesBuffer {
        &self.buffer
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started)
    }

    /// True once a timed session has run its full duration.
    pub fn is_expired(&self, now: Instant) -> bool {
        self.config
            .duration
            .map_or(false, |duration| self.elapsed(now) >= duration)
    }

    pub fn sample_due(&self, now: Instant) -> bool {
        now >= self.next_due
    }

    /// Take one sample and hand it to `writer`.
    ///
    /// Returns the recorded sample, or `None` if the sensor failed. Either way
    /// the next sample is scheduled one interval later; slots missed by a late
    /// tick are skipped rather than taken back to back.
    pub async fn step<S, T>(
        &mut self,
        sensor: &mut S,
        writer: &mut LogWriter<T>,
        now: Instant,
    ) -> Option<Sample>
    where
        S: SensorSource + ?Sized,
        T: Transport,
    {
        self.next_due += self.config.interval;
        if self.next_due <= now {
            self.next_due = now + self.config.interval;
        }

        let reading = match oversample(sensor, self.config.oversample) {
            Ok(reading) => reading,
            Err(e) => {
                self.skipped += 1;
                debug!("Skipped sample: {}", e);
                return None;
            }
        };

        let sample = Sample::from_reading(self.elapsed(now), reading);
        self.buffer.insert(sample);
        self.aggregate.add(&reading);

        if let DeliveryResult::Dropped(_) = writer.write(&sample).await {
            self.dropped += 1;
        }
        Some(sample)
    }

    pub fn results(&self, now: Instant) -> SessionResults {
        SessionResults {
            elapsed: self.elapsed(now),
            samples: self.aggregate.count(),
            skipped: self.skipped,
            dropped: self.dropped,
            summary: self.aggregate.summary(),
        }
    }
}
