//! I2S playback sink.
//!
//! Standard (Philips) 16-bit mono TX. Writes never block: the DMA queue is
//! offered one chunk at a time with a zero timeout and whatever does not
//! fit is left to the caller. Free room is tracked by [`DmaRoom`] against
//! the microsecond timer.

use esp_idf_svc::hal::gpio::{AnyIOPin, InputPin, OutputPin};
use esp_idf_svc::hal::i2s::config::{
    Config, DataBitWidth, SlotMode, StdClkConfig, StdConfig, StdGpioConfig, StdSlotConfig,
};
use esp_idf_svc::hal::i2s::{I2s, I2sDriver, I2sTx};
use esp_idf_svc::hal::peripheral::Peripheral;
use esp_idf_svc::sys::{self, EspError};

use crate::audio::playback::{PlaybackError, PlaybackSink};
use crate::audio::sink::{offer_in_frames, DmaRoom, DMA_FRAME};

/// I2S configuration.
pub struct I2sConfig {
    pub sample_rate: u32,
    /// DMA descriptors; each holds `DMA_FRAME` samples.
    pub dma_buffers: u32,
}

impl Default for I2sConfig {
    fn default() -> Self {
        Self {
            sample_rate: crate::codec::SAMPLE_RATE,
            dma_buffers: 6,
        }
    }
}

/// Hardware [`PlaybackSink`].
pub struct I2sSink<'d> {
    driver: I2sDriver<'d, I2sTx>,
    sample_rate: u32,
    running: bool,
    room: DmaRoom,
}

fn now_us() -> i64 {
    unsafe { sys::esp_timer_get_time() }
}

impl<'d> I2sSink<'d> {
    pub fn new(
        i2s: impl Peripheral<P = impl I2s> + 'd,
        bclk: impl Peripheral<P = impl InputPin + OutputPin> + 'd,
        dout: impl Peripheral<P = impl OutputPin> + 'd,
        ws: impl Peripheral<P = impl InputPin + OutputPin> + 'd,
        config: &I2sConfig,
    ) -> Result<Self, EspError> {
        let std_config = StdConfig::new(
            Config::default()
                .dma_desc(config.dma_buffers)
                .frames_per_buffer(DMA_FRAME as u32),
            StdClkConfig::from_sample_rate_hz(config.sample_rate),
            StdSlotConfig::philips_slot_default(DataBitWidth::Bits16, SlotMode::Mono),
            StdGpioConfig::default(),
        );
        let driver = I2sDriver::new_std_tx(i2s, &std_config, bclk, dout, Option::<AnyIOPin>::None, ws)?;

        Ok(Self {
            driver,
            sample_rate: config.sample_rate,
            running: false,
            room: DmaRoom::new(config.dma_buffers as usize * DMA_FRAME, config.sample_rate),
        })
    }
}

impl PlaybackSink for I2sSink<'_> {
    fn available(&self) -> usize {
        if self.running {
            self.room.available(now_us())
        } else {
            0
        }
    }

    fn write(&mut self, samples: &[i16]) -> usize {
        if !self.running {
            return 0;
        }

        let driver = &mut self.driver;
        let (written, full) = offer_in_frames(samples, |bytes| driver.write(bytes, 0).unwrap_or(0));

        let now = now_us();
        if full {
            self.room.mark_full(now);
        } else {
            self.room.commit(now, written);
        }
        written
    }

    fn start(&mut self, sample_rate: u32) -> Result<(), PlaybackError> {
        if sample_rate != self.sample_rate {
            return Err(PlaybackError::StartFailed(sample_rate));
        }
        self.driver
            .tx_enable()
            .map_err(|e| PlaybackError::Driver(e.code()))?;
        self.room.reset(now_us());
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) {
        let _ = self.driver.tx_disable();
        self.room.reset(now_us());
        self.running = false;
    }
}
