//! # Sensor Module
//!
//! Sources of voltage/current/power readings.
//!
//! This module handles:
//! - The [`SensorSource`] capability used by the sampling pipeline
//! - INA260 register decoding over an external register bus
//! - A deterministic synthetic source for bench runs without hardware
//!
//! Which source is used is decided once when the instrument is built; the
//! state machine only ever sees `impl SensorSource`.

pub mod ina260;
pub mod synthetic;

use std::ops::{Add, Div};

use thiserror::Error;

pub use ina260::{Ina260, RegisterBus};
pub use synthetic::SyntheticSensor;

/// Errors raised while reading a sensor
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SensorError {
    /// The bus transaction failed
    #[error("bus read failed: {0}")]
    Bus(String),

    /// The sensor answered with data that cannot be a measurement
    #[error("sensor returned invalid data")]
    InvalidData,

    /// The device at the configured address is not the expected part
    #[error("unexpected device id 0x{found:04X} (expected 0x{expected:04X})")]
    DeviceMismatch { expected: u16, found: u16 },
}

/// One raw reading: voltage in V, current in mA, power in mW.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Reading {
    pub voltage: f64,
    pub current: f64,
    pub power: f64,
}

impl Reading {
    #[must_use]
    pub const fn new(voltage: f64, current: f64, power: f64) -> Self {
        Self {
            voltage,
            current,
            power,
        }
    }
}

impl Add for Reading {
    type Output = Reading;

    fn add(self, rhs: Reading) -> Reading {
        Reading {
            voltage: self.voltage + rhs.voltage,
            current: self.current + rhs.current,
            power: self.power + rhs.power,
        }
    }
}

impl Div<f64> for Reading {
    type Output = Reading;

    fn div(self, rhs: f64) -> Reading {
        Reading {
            voltage: self.voltage / rhs,
            current: self.current / rhs,
            power: self.power / rhs,
        }
    }
}

/// Capability to take one reading from the power sensor.
#[cfg_attr(test, mockall::automock)]
pub trait SensorSource {
    /// Read voltage, current and power once.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError`] if no value could be produced; callers skip the
    /// sample instead of treating this as fatal.
    fn sample(&mut self) -> Result<Reading, SensorError>;
}

impl<S: SensorSource + ?Sized> SensorSource for Box<S> {
    fn sample(&mut self) -> Result<Reading, SensorError> {
        (**self).sample()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum_and_divide() {
        let total = Reading::new(5.0, 10.0, 50.0)
            + Reading::new(5.2, 20.0, 104.0)
            + Reading::new(5.4, 30.0, 162.0);
        let mean = total / 3.0;

        assert!((mean.voltage - 5.2).abs() < 1e-9);
        assert!((mean.current - 20.0).abs() < 1e-9);
        assert!((mean.power - 105.333_333_333).abs() < 1e-6);
    }

    #[test]
    fn test_boxed_source_forwards() {
        let mut mock = MockSensorSource::new();
        mock.expect_sample()
            .times(1)
            .returning(|| Ok(Reading::new(1.0, 2.0, 3.0)));

        let mut boxed: Box<dyn SensorSource> = Box::new(mock);
        assert_eq!(boxed.sample().unwrap(), Reading::new(1.0, 2.0, 3.0));
    }
}
