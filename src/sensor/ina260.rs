//! # INA260 Power Monitor
//!
//! Decodes the INA260 measurement registers read over an external register bus.
//!
//! ## Registers
//!
//! | Register | Address | LSB |
//! |----------|---------|-----|
//! | Current | 0x01 | 1.25 mA (signed) |
//! | Bus voltage | 0x02 | 1.25 mV |
//! | Power | 0x03 | 10 mW |
//! | Manufacturer ID | 0xFE | reads 0x5449 ("TI") |
//!
//! The board support code implements [`RegisterBus`]; this module owns no
//! knowledge of pins or bus speeds.

use tracing::{debug, info};

use super::{Reading, SensorError, SensorSource};

/// Default I2C address with A0/A1 tied to ground.
pub const INA260_DEFAULT_ADDRESS: u8 = 0x40;

const REG_CURRENT: u8 = 0x01;
const REG_BUS_VOLTAGE: u8 = 0x02;
const REG_POWER: u8 = 0x03;
const REG_MANUFACTURER_ID: u8 = 0xFE;

const TEXAS_INSTRUMENTS_ID: u16 = 0x5449;

const CURRENT_LSB_MA: f64 = 1.25;
const VOLTAGE_LSB_V: f64 = 0.001_25;
const POWER_LSB_MW: f64 = 10.0;

/// Access to 16-bit registers of a device on a shared bus.
#[cfg_attr(test, mockall::automock)]
pub trait RegisterBus {
    /// Read one big-endian 16-bit register.
    fn read_register(&mut self, address: u8, register: u8) -> Result<u16, SensorError>;
}

/// INA260 sensor on a register bus
#[derive(Debug)]
pub struct Ina260<B> {
    bus: B,
    address: u8,
}

impl<B: RegisterBus> Ina260<B> {
    /// Probe the device at `address` and return a ready sensor.
    ///
    /// # Errors
    ///
    /// - `DeviceMismatch` if the manufacturer ID is not Texas Instruments
    /// - `Bus` if the probe read fails
    pub fn new(mut bus: B, address: u8) -> Result<Self, SensorError> {
        let found = bus.read_register(address, REG_MANUFACTURER_ID)?;
        if found != TEXAS_INSTRUMENTS_ID {
            return Err(SensorError::DeviceMismatch {
                expected: TEXAS_INSTRUMENTS_ID,
                found,
            });
        }

        info!("INA260 found at address 0x{:02X}", address);
        Ok(Self { bus, address })
    }

    /// Bus address this sensor was probed at.
    pub fn address(&self) -> u8 {
        self.address
    }

    fn read(&mut self, register: u8) -> Result<u16, SensorError> {
        self.bus.read_register(self.address, register)
    }
}

impl<B: RegisterBus> SensorSource for Ina260<B> {
    fn sample(&mut self) -> Result<Reading, SensorError> {
        let voltage_raw = self.read(REG_BUS_VOLTAGE)?;
        let current_raw = self.read(REG_CURRENT)?;
        let power_raw = self.read(REG_POWER)?;

        // Reverse current shows up as a negative two's complement value;
        // the meter only reports load current.
        let current = (f64::from(current_raw as i16) * CURRENT_LSB_MA).max(0.0);

        let reading = Reading {
            voltage: f64::from(voltage_raw) * VOLTAGE_LSB_V,
            current,
            power: f64::from(power_raw) * POWER_LSB_MW,
        };
        debug!(
            "INA260 raw V=0x{:04X} I=0x{:04X} P=0x{:04X}",
            voltage_raw, current_raw, power_raw
        );
        Ok(reading)
    }
}
