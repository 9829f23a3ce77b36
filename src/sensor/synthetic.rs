//! Synthetic sensor for bench runs without hardware.
//!
//! Produces a slowly rising supply with a superimposed wobble:
//!
//! - voltage: `5 + t/10 + sin(t)` V
//! - current: `25 + t/10 + cos(t)` mA
//! - power:   `voltage * current` mW
//!
//! `t` advances by a fixed step per read rather than following the wall clock,
//! so a given sequence of reads always yields the same values.

use super::{Reading, SensorError, SensorSource};

/// Phase advance per read when none is configured.
pub const DEFAULT_STEP: f64 = 0.1;

/// Deterministic voltage/current/power generator
#[derive(Debug, Clone)]
pub struct SyntheticSensor {
    phase: f64,
    step: f64,
    reads: u64,
    fail_every: Option<u64>,
}

impl Default for SyntheticSensor {
    fn default() -> Self {
        Self::new(DEFAULT_STEP)
    }
}

impl SyntheticSensor {
    /// Create a generator advancing `step` phase units per read.
    #[must_use]
    pub fn new(step: f64) -> Self {
        Self {
            phase: 0.0,
            step,
            reads: 0,
            fail_every: None,
        }
    }

    /// Make every `n`-th read fail, to exercise skipped samples.
    #[must_use]
    pub fn with_fail_every(mut self, n: u64) -> Self {
        self.fail_every = (n > 0).then_some(n);
        self
    }

    /// Number of reads attempted so far, failed ones included.
    pub fn reads(&self) -> u64 {
        self.reads
    }

    /// Values produced at phase `t`.
    #[must_use]
    pub fn reading_at(t: f64) -> Reading {
        let voltage = 5.0 + t / 10.0 + t.sin();
        let current = 25.0 + t / 10.0 + t.cos();
        Reading::new(voltage, current, voltage * current)
    }
}

impl SensorSource for SyntheticSensor {
    fn sample(&mut self) -> Result<Reading, SensorError> {
        self.reads += 1;
        if let Some(n) = self.fail_every {
            if self.reads % n == 0 {
                return Err(SensorError::Bus(format!("synthetic fault on read {}", self.reads)));
            }
        }

        let reading = Self::reading_at(self.phase);
        self.phase += self.step;
        Ok(reading)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_read_is_phase_zero() {
        let mut sensor = SyntheticSensor::default();
        let reading = sensor.sample().unwrap();

        assert!((reading.voltage - 5.0).abs() < 1e-9);
        assert!((reading.current - 26.0).abs() < 1e-9);
        assert!((reading.power - 130.0).abs() < 1e-9);
    }

    #[test]
    fn test_sequence_is_deterministic() {
        let mut a = SyntheticSensor::new(0.25);
        let mut b = SyntheticSensor::new(0.25);

        for _ in 0..20 {
            assert_eq!(a.sample().unwrap(), b.sample().unwrap());
        }
    }

    #[test]
    fn test_values_are_plausible() {
        let mut sensor = SyntheticSensor::default();
        for _ in 0..100 {
            let r = sensor.sample().unwrap();
            assert!(r.voltage > 3.0 && r.voltage < 20.0);
            assert!(r.current > 20.0);
            assert!((r.power - r.voltage * r.current).abs() < 1e-9);
        }
    }

    #[test]
    fn test_fail_every_nth_read() {
        let mut sensor = SyntheticSensor::default().with_fail_every(3);

        assert!(sensor.sample().is_ok());
        assert!(sensor.sample().is_ok());
        assert!(matches!(sensor.sample(), Err(SensorError::Bus(_))));
        assert!(sensor.sample().is_ok());
        assert_eq!(sensor.reads(), 4);
    }

    #[test]
    fn test_failed_read_does_not_advance_phase() {
        let mut sensor = SyntheticSensor::default().with_fail_every(2);

        let first = sensor.sample().unwrap();
        assert!(sensor.sample().is_err());
        let third = sensor.sample().unwrap();

        assert_eq!(third, SyntheticSensor::reading_at(DEFAULT_STEP));
        assert_ne!(first, third);
    }
}
