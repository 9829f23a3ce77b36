//! # VA Meter Library
//!
//! Portable voltage/current/power meter with a live plot and network logging.
//!
//! This library provides the instrument's runtime core: the Ready/Config/Active
//! state machine, the sampling pipeline feeding a bounded series, and the log
//! writer that streams samples to a remote collector over UDP, TCP or serial.
//! Sensor registers, pixels and touch pads stay behind traits so the same core
//! runs on a board or on a host.

pub mod config;
pub mod error;
pub mod keys;
pub mod logger;
pub mod machine;
pub mod scale;
pub mod sensor;
pub mod series;
pub mod view;
