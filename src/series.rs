//! # Series Buffer
//!
//! Bounded in-memory time series of samples for the live plot.
//!
//! The buffer is a fixed arena with a write cursor: once full, each insert
//! overwrites the oldest sample in place, so inserting never reallocates.
//! Readers get ordered copies through [`SeriesBuffer::snapshot`] or a
//! borrowed iterator, never a handle that outlives the next insert.
//!
//! ```
//! use std::time::Duration;
//! use va_meter::series::{Sample, SeriesBuffer};
//!
//! let mut buffer = SeriesBuffer::with_capacity(2);
//! for ms in [0, 100, 200] {
//!     buffer.insert(Sample::new(Duration::from_millis(ms), 5.0, 10.0, 50.0));
//! }
//!
//! let times: Vec<_> = buffer.snapshot().iter().map(|s| s.timestamp.as_millis()).collect();
//! assert_eq!(times, vec![100, 200]);
//! ```

use std::time::Duration;

use crate::sensor::Reading;

/// One averaged, time-stamped measurement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Time since the start of the session
    pub timestamp: Duration,
    /// Bus voltage in V
    pub voltage: f64,
    /// Load current in mA
    pub current: f64,
    /// Power in mW
    pub power: f64,
}

impl Sample {
    #[must_use]
    pub const fn new(timestamp: Duration, voltage: f64, current: f64, power: f64) -> Self {
        Self {
            timestamp,
            voltage,
            current,
            power,
        }
    }

    #[must_use]
    pub const fn from_reading(timestamp: Duration, reading: Reading) -> Self {
        Self::new(timestamp, reading.voltage, reading.current, reading.power)
    }

    #[must_use]
    pub const fn reading(&self) -> Reading {
        Reading::new(self.voltage, self.current, self.power)
    }
}

/// Measured quantity of a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Voltage,
    Current,
    Power,
}

impl Quantity {
    pub const ALL: [Quantity; 3] = [Quantity::Voltage, Quantity::Current, Quantity::Power];

    #[must_use]
    pub const fn unit(self) -> &'static str {
        match self {
            Quantity::Voltage => "V",
            Quantity::Current => "mA",
            Quantity::Power => "mW",
        }
    }

    #[must_use]
    pub const fn of(self, reading: &Reading) -> f64 {
        match self {
            Quantity::Voltage => reading.voltage,
            Quantity::Current => reading.current,
            Quantity::Power => reading.power,
        }
    }
}

/// Minimum, mean and maximum of one quantity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMeanMax {
    pub min: f64,
    pub mean: f64,
    pub max: f64,
}

/// Per-quantity minimum, maximum and mean
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub min: Reading,
    pub max: Reading,
    pub mean: Reading,
}

impl Summary {
    /// Statistics of a single quantity.
    #[must_use]
    pub const fn of(&self, quantity: Quantity) -> MinMeanMax {
        MinMeanMax {
            min: quantity.of(&self.min),
            mean: quantity.of(&self.mean),
            max: quantity.of(&self.max),
        }
    }
}

/// Running min/mean/max over every reading added.
///
/// Unlike [`SeriesBuffer::summary`] this covers the whole session, not only
/// the samples still held for plotting.
#[derive(Debug, Clone, Copy, Default)]
pub struct Aggregate {
    count: u64,
    min: Reading,
    max: Reading,
    sum: Reading,
}

impl Aggregate {
    pub fn add(&mut self, reading: &Reading) {
        if self.count == 0 {
            self.min = *reading;
            self.max = *reading;
        } else {
            self.min = Reading::new(
                self.min.voltage.min(reading.voltage),
                self.min.current.min(reading.current),
                self.min.power.min(reading.power),
            );
            self.max = Reading::new(
                self.max.voltage.max(reading.voltage),
                self.max.current.max(reading.current),
                self.max.power.max(reading.power),
            );
        }
        self.sum = self.sum + *reading;
        self.count += 1;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Summary of everything added, or `None` before the first reading.
    pub fn summary(&self) -> Option<Summary> {
        if self.count == 0 {
            return None;
        }
        Some(Summary {
            min: self.min,
            max: self.max,
            mean: self.sum / self.count as f64,
        })
    }
}

/// Fixed-capacity ring of samples
#[derive(Debug, Clone)]
pub struct SeriesBuffer {
    slots: Vec<Sample>,
    capacity: usize,
    /// Slot the next insert writes to; equals `slots.len()` until full.
    cursor: usize,
}

impl SeriesBuffer {
    /// Create an empty buffer holding at most `capacity` samples (at least one).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            cursor: 0,
        }
    }

    /// Append a sample, overwriting the oldest one when full.
    pub fn insert(&mut self, sample: Sample) {
        if self.slots.len() < self.capacity {
            self.slots.push(sample);
        } else {
            self.slots[self.cursor] = sample;
        }
        self.cursor = (self.cursor + 1) % self.capacity;
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.slots.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Sample> + '_ {
        self.slots[self.cursor..]
            .iter()
            .chain(self.slots[..self.cursor].iter())
    }

    /// Ordered copy of the current contents.
    pub fn snapshot(&self) -> Vec<Sample> {
        self.iter().copied().collect()
    }

    /// Most recently inserted sample.
    pub fn latest(&self) -> Option<&Sample> {
        if self.slots.is_empty() {
            return None;
        }
        let len = self.slots.len();
        self.slots.get((self.cursor + len - 1) % len)
    }

    /// Min/max/mean over the current contents.
    pub fn summary(&self) -> Option<Summary> {
        let mut aggregate = Aggregate::default();
        for sample in self.iter() {
            aggregate.add(&sample.reading());
        }
        aggregate.summary()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(ms: u64, power: f64) -> Sample {
        Sample::new(Duration::from_millis(ms), 5.0, power / 5.0, power)
    }

    fn timestamps(buffer: &SeriesBuffer) -> Vec<u64> {
        buffer
            .snapshot()
            .iter()
            .map(|s| s.timestamp.as_millis() as u64)
            .collect()
    }

    #[test]
    fn test_fills_in_order() {
        let mut buffer = SeriesBuffer::with_capacity(4);
        for i in 0..3 {
            buffer.insert(sample(i * 100, 1.0));
        }

        assert_eq!(buffer.len(), 3);
        assert!(!buffer.is_full());
        assert_eq!(timestamps(&buffer), vec![0, 100, 200]);
    }

    #[test]
    fn test_evicts_exactly_the_oldest() {
        let mut buffer = SeriesBuffer::with_capacity(3);
        for i in 0..3 {
            buffer.insert(sample(i, 1.0));
        }
        assert!(buffer.is_full());

        buffer.insert(sample(3, 1.0));
        assert_eq!(buffer.len(), 3);
        assert_eq!(timestamps(&buffer), vec![1, 2, 3]);
    }

    #[test]
    fn test_length_never_exceeds_capacity() {
        for capacity in 1..8 {
            let mut buffer = SeriesBuffer::with_capacity(capacity);
            for i in 0..50u64 {
                buffer.insert(sample(i, i as f64));
                assert!(buffer.len() <= capacity);

                let expected: Vec<u64> = (i.saturating_sub(capacity as u64 - 1)..=i).collect();
                assert_eq!(timestamps(&buffer), expected);
                assert_eq!(buffer.latest().unwrap().timestamp.as_millis() as u64, i);
            }
        }
    }

    #[test]
    fn test_insert_does_not_reallocate() {
        let mut buffer = SeriesBuffer::with_capacity(16);
        let arena = buffer.slots.capacity();
        for i in 0..100 {
            buffer.insert(sample(i, 1.0));
        }
        assert_eq!(buffer.slots.capacity(), arena);
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let mut buffer = SeriesBuffer::with_capacity(0);
        buffer.insert(sample(1, 1.0));
        buffer.insert(sample(2, 1.0));

        assert_eq!(buffer.capacity(), 1);
        assert_eq!(timestamps(&buffer), vec![2]);
    }

    #[test]
    fn test_summary_over_current_contents() {
        let mut buffer = SeriesBuffer::with_capacity(3);
        assert!(buffer.summary().is_none());

        for (i, p) in [100.0, 10.0, 20.0, 30.0].iter().enumerate() {
            buffer.insert(sample(i as u64, *p));
        }

        // 100.0 has been evicted
        let power = buffer.summary().unwrap().of(Quantity::Power);
        assert_eq!(power.min, 10.0);
        assert_eq!(power.max, 30.0);
        assert!((power.mean - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_aggregate_keeps_whole_history() {
        let mut aggregate = Aggregate::default();
        assert!(aggregate.summary().is_none());

        aggregate.add(&Reading::new(5.0, 100.0, 500.0));
        aggregate.add(&Reading::new(4.0, 300.0, 1200.0));

        let summary = aggregate.summary().unwrap();
        assert_eq!(aggregate.count(), 2);
        assert_eq!(summary.of(Quantity::Voltage).min, 4.0);
        assert_eq!(summary.of(Quantity::Current).max, 300.0);
        assert!((summary.of(Quantity::Power).mean - 850.0).abs() < 1e-9);
    }
}
