//! Sample timer: fires the capture interrupt at the sample rate.

use esp_idf_svc::hal::peripheral::Peripheral;
use esp_idf_svc::hal::timer::{config::Config, Timer, TimerDriver};
use esp_idf_svc::sys::EspError;

/// Periodic hardware timer driving [`CaptureDriver::tick`].
///
/// [`CaptureDriver::tick`]: crate::audio::CaptureDriver::tick
pub struct SampleTimer<'d> {
    driver: TimerDriver<'d>,
    running: bool,
}

impl<'d> SampleTimer<'d> {
    pub fn new(timer: impl Peripheral<P = impl Timer> + 'd) -> Result<Self, EspError> {
        let driver = TimerDriver::new(timer, &Config::new().auto_reload(true))?;
        Ok(Self {
            driver,
            running: false,
        })
    }

    /// Register `isr` and start firing it `sample_rate` times per second.
    ///
    /// `isr` runs in interrupt context: no blocking, no allocation, logging
    /// through `rt_*!` only.
    pub fn start<F>(&mut self, sample_rate: u32, isr: F) -> Result<(), EspError>
    where
        F: FnMut() + Send + 'static,
    {
        if self.running {
            self.stop()?;
        }

        self.driver.set_counter(0)?;
        self.driver
            .set_alarm(self.driver.tick_hz() / u64::from(sample_rate.max(1)))?;

        // SAFETY: the closure owns everything it touches and only reaches
        // shared state through atomics and the capture ring's slot protocol.
        unsafe {
            self.driver.subscribe(isr)?;
        }
        self.driver.enable_interrupt()?;
        self.driver.enable_alarm(true)?;
        self.driver.enable(true)?;
        self.running = true;
        Ok(())
    }

    /// Stop the timer and drop the registered closure.
    pub fn stop(&mut self) -> Result<(), EspError> {
        self.driver.enable(false)?;
        self.driver.disable_interrupt()?;
        self.driver.unsubscribe()?;
        self.running = false;
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}
