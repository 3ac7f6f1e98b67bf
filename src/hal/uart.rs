//! UART serial port for the console and log output.
//!
//! One UART carries both directions: console input is polled without
//! blocking and log lines are written through [`core::fmt::Write`].

use core::fmt;

use esp_idf_svc::hal::gpio::{self, InputPin, OutputPin};
use esp_idf_svc::hal::peripheral::Peripheral;
use esp_idf_svc::hal::uart::{self, Uart, UartDriver};
use esp_idf_svc::hal::units::Hertz;
use esp_idf_svc::sys::EspError;

/// UART configuration.
pub struct SerialConfig {
    pub baud_rate: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self { baud_rate: 115200 }
    }
}

/// Initialize a UART for console and log traffic.
pub fn init_serial<'d>(
    uart: impl Peripheral<P = impl Uart> + 'd,
    tx_pin: impl Peripheral<P = impl OutputPin> + 'd,
    rx_pin: impl Peripheral<P = impl InputPin> + 'd,
    config: &SerialConfig,
) -> Result<SerialPort<'d>, EspError> {
    let uart_config = uart::config::Config::default().baudrate(Hertz(config.baud_rate));

    let driver = UartDriver::new(
        uart,
        tx_pin,
        rx_pin,
        Option::<gpio::AnyIOPin>::None, // CTS
        Option::<gpio::AnyIOPin>::None, // RTS
        &uart_config,
    )?;
    Ok(SerialPort { driver })
}

pub struct SerialPort<'d> {
    driver: UartDriver<'d>,
}

impl SerialPort<'_> {
    /// Next received byte, if any.
    pub fn read_byte(&mut self) -> Option<u8> {
        let mut byte = [0u8; 1];
        match self.driver.read(&mut byte, 0) {
            Ok(1) => Some(byte[0]),
            _ => None,
        }
    }
}

impl fmt::Write for SerialPort<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let mut bytes = s.as_bytes();
        while !bytes.is_empty() {
            match self.driver.write(bytes) {
                Ok(0) | Err(_) => return Err(fmt::Error),
                Ok(n) => bytes = &bytes[n..],
            }
        }
        Ok(())
    }
}
