//! Hardware Abstraction Layer for the ESP-IDF target.
//!
//! Thin wrappers around ESP-IDF peripherals.
//! Link logic stays in core modules, HAL is just I/O.

pub mod i2s;
pub mod timer;
pub mod uart;

pub use i2s::{I2sConfig, I2sSink};
pub use timer::SampleTimer;
pub use uart::{init_serial, SerialConfig, SerialPort};
