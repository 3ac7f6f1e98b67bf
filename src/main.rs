//! esp-audio-link entry point
//!
//! On the ESP-IDF target this is the firmware: the sample timer feeds the
//! capture ring, the main loop runs the link in loopback (capture → wire →
//! I2S) and serves the serial console.
//!
//! On the host it runs the same pipeline against a synthetic tone and an
//! in-memory sink, printing logs and a summary to stdout:
//!
//! ```text
//! audio-link [raw|lpc] [seconds]
//! ```

use std::collections::VecDeque;

use esp_audio_link::logging::LogStream;
use esp_audio_link::transport::{FrameSink, FrameSource, LinkError};
use esp_audio_link::{CaptureHealth, LinkModeSelector};

/// Entries taken from each log stream per main-loop pass.
const LOG_DRAIN_BUDGET: usize = 8;

// Shared with the sample interrupt
static ISR_LOG: LogStream = LogStream::new();
static MAIN_LOG: LogStream = LogStream::new();
static HEALTH: CaptureHealth = CaptureHealth::new();
static MODE: LinkModeSelector = LinkModeSelector::new(esp_audio_link::LinkMode::Raw);

static STREAMS: [&LogStream; 2] = [&ISR_LOG, &MAIN_LOG];
static STREAM_NAMES: [&str; 2] = ["isr", "main"];

/// Frame FIFO standing in for the network transport.
struct Loopback {
    bytes: VecDeque<u8>,
    limit: usize,
}

impl Loopback {
    fn new(limit: usize) -> Self {
        Self {
            bytes: VecDeque::with_capacity(limit),
            limit,
        }
    }
}

impl FrameSink for Loopback {
    fn send(&mut self, frame: &[u8]) -> Result<(), LinkError> {
        let capacity = self.limit - self.bytes.len();
        if frame.len() > capacity {
            return Err(LinkError::FrameTooLarge {
                len: frame.len(),
                capacity,
            });
        }
        self.bytes.extend(frame);
        Ok(())
    }
}

impl FrameSource for Loopback {
    fn read_frame(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.bytes.len());
        for (dst, src) in buf.iter_mut().zip(self.bytes.drain(..n)) {
            *dst = src;
        }
        n
    }
}

#[cfg(target_os = "espidf")]
fn main() {
    if let Err(e) = firmware::run() {
        eprintln!("audio-link: {}", e);
    }
}

#[cfg(not(target_os = "espidf"))]
fn main() -> Result<(), LinkError> {
    host::run()
}

#[cfg(target_os = "espidf")]
mod firmware {
    use esp_idf_svc::hal::delay::FreeRtos;
    use esp_idf_svc::hal::peripherals::Peripherals;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use esp_idf_svc::sys::{self, EspError};

    use esp_audio_link::audio::{CaptureDriver, CaptureRing, PlaybackQueue, ToneGenerator};
    use esp_audio_link::codec::{CodecError, SAMPLE_RATE};
    use esp_audio_link::config::nvs::{load_link_config, save_link_config, LoadResult};
    use esp_audio_link::config::LinkConfig;
    use esp_audio_link::console::{Console, ControlPanel};
    use esp_audio_link::hal::{init_serial, I2sConfig, I2sSink, SampleTimer, SerialConfig};
    use esp_audio_link::link::{play_tone, Downlink, Uplink, MAX_WIRE_FRAME};
    use esp_audio_link::log_drain::drain_streams;
    use esp_audio_link::transport::{FrameSource, LinkError};
    use esp_audio_link::{rt_debug, rt_error, rt_info, rt_warn};

    use super::{Loopback, HEALTH, ISR_LOG, LOG_DRAIN_BUDGET, MAIN_LOG, MODE, STREAMS, STREAM_NAMES};

    #[derive(Debug, thiserror::Error)]
    pub enum FirmwareError {
        #[error(transparent)]
        Esp(#[from] EspError),
        #[error(transparent)]
        Link(#[from] LinkError),
        #[error(transparent)]
        Codec(#[from] CodecError),
    }

    fn now_us() -> i64 {
        unsafe { sys::esp_timer_get_time() }
    }

    pub fn run() -> Result<(), FirmwareError> {
        sys::link_patches();

        let peripherals = Peripherals::take()?;
        let nvs = EspDefaultNvsPartition::take()?;

        let mut serial = init_serial(
            peripherals.uart0,
            peripherals.pins.gpio43,
            peripherals.pins.gpio44,
            &SerialConfig::default(),
        )?;

        let mut config = LinkConfig::default();
        match load_link_config(nvs.clone()) {
            Ok(LoadResult::Loaded(stored)) => config = stored,
            Ok(LoadResult::FreshInstall) => {}
            Err(e) => rt_warn!(MAIN_LOG, now_us(), "config load failed: {}", e),
        }
        MODE.set(config.mode);

        // The ISR closure needs 'static access to the ring
        let ring: &'static CaptureRing = Box::leak(Box::new(CaptureRing::new(config.frame_len)?));

        // Capture input is the test tone; the external ADC has no driver here
        let mut source = ToneGenerator::default();
        let mut capture = CaptureDriver::new(
            ring,
            &HEALTH,
            &ISR_LOG,
            move || source.next_sample(),
            SAMPLE_RATE,
        );
        let mut timer = SampleTimer::new(peripherals.timer00)?;
        timer.start(SAMPLE_RATE, move || capture.tick())?;

        let sink = I2sSink::new(
            peripherals.i2s0,
            peripherals.pins.gpio5,
            peripherals.pins.gpio7,
            peripherals.pins.gpio6,
            &I2sConfig::default(),
        )?;
        let mut queue = PlaybackQueue::new(sink);
        queue.begin(SAMPLE_RATE).map_err(LinkError::from)?;

        let panel = ControlPanel::new(&MODE, &HEALTH, &STREAMS, &STREAM_NAMES);
        let mut console = Console::new();
        console.print_banner(&mut serial);

        let mut uplink = Uplink::new(ring, &MODE)?;
        let mut downlink = Downlink::new(config.frame_len, uplink.mode())?;
        let mut link = Loopback::new(4 * MAX_WIRE_FRAME);
        let mut wire = [0u8; MAX_WIRE_FRAME];

        rt_info!(
            MAIN_LOG,
            now_us(),
            "link up: {} samples/frame, mode {}",
            config.frame_len,
            uplink.mode()
        );

        loop {
            while let Some(byte) = serial.read_byte() {
                if let Some(Err(e)) = console.process_byte(byte, &panel, &mut serial) {
                    rt_debug!(MAIN_LOG, now_us(), "console: {}", e);
                }
            }

            if let Some(ms) = panel.take_tone_request() {
                let mut tone = ToneGenerator::default();
                let samples = (ms * SAMPLE_RATE / 1000) as usize;
                play_tone(&mut queue, &mut tone, samples, |_| FreeRtos::delay_ms(1))?;
            }

            // Mode switches start a new session at the next frame
            if MODE.get() != uplink.mode() {
                uplink = Uplink::new(ring, &MODE)?;
                downlink = Downlink::new(config.frame_len, uplink.mode())?;
                rt_info!(MAIN_LOG, now_us(), "link mode {}", uplink.mode());
            }

            if panel.take_save_request() {
                config.mode = MODE.get();
                match save_link_config(nvs.clone(), &config) {
                    Ok(()) => rt_info!(MAIN_LOG, now_us(), "config saved"),
                    Err(e) => rt_error!(MAIN_LOG, now_us(), "config save failed: {}", e),
                }
            }

            match uplink.poll(&mut link) {
                Ok(true) => {
                    let need = downlink.frame_bytes();
                    if link.read_frame(&mut wire[..need]) == need {
                        downlink.play_frame(&wire[..need], &mut queue, |_| FreeRtos::delay_ms(1))?;
                    }
                }
                Ok(false) => FreeRtos::delay_ms(1),
                Err(e) => rt_warn!(MAIN_LOG, now_us(), "uplink: {}", e),
            }
            panel.record_uplink(&uplink.stats());
            panel.record_downlink(&downlink.stats());

            drain_streams(&STREAMS, &mut serial, now_us(), LOG_DRAIN_BUDGET);
        }
    }
}

#[cfg(not(target_os = "espidf"))]
mod host {
    use core::fmt::{self, Write as _};
    use core::ops::Range;
    use std::io::Write as _;

    use esp_audio_link::audio::{CaptureDriver, CaptureRing, MemorySink, PlaybackQueue, ToneGenerator};
    use esp_audio_link::codec::SAMPLE_RATE;
    use esp_audio_link::config::{LinkConfig, DEFAULT_FRAME_LEN};
    use esp_audio_link::console::{execute, parse_line, ControlPanel};
    use esp_audio_link::link::{Downlink, Uplink, MAX_WIRE_FRAME};
    use esp_audio_link::log_drain::drain_streams;
    use esp_audio_link::logging::LogLevel;
    use esp_audio_link::transport::{FrameSource, LinkError};
    use esp_audio_link::{rt_debug, rt_info, LinkMode};

    use super::{Loopback, HEALTH, ISR_LOG, LOG_DRAIN_BUDGET, MAIN_LOG, MODE, STREAMS, STREAM_NAMES};

    /// Room in the simulated DAC.
    const PLAYBACK_SAMPLES: usize = 512;

    /// Frames during which the main loop is "busy" and does not poll, to
    /// show the capture drop path.
    const BUSY_FRAMES: Range<u64> = 20..27;

    struct Stdout;

    impl fmt::Write for Stdout {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            std::io::stdout()
                .write_all(s.as_bytes())
                .map_err(|_| fmt::Error)
        }
    }

    #[derive(Default)]
    struct Meter {
        sum_sq: u64,
        count: u64,
    }

    impl Meter {
        fn add(&mut self, samples: &[i16]) {
            for &s in samples {
                self.sum_sq += (i64::from(s) * i64::from(s)) as u64;
            }
            self.count += samples.len() as u64;
        }

        fn rms(&self) -> f64 {
            if self.count == 0 {
                0.0
            } else {
                (self.sum_sq as f64 / self.count as f64).sqrt()
            }
        }
    }

    /// Play out everything queued in the simulated DAC.
    fn drain_dac(queue: &mut PlaybackQueue<MemorySink<PLAYBACK_SAMPLES>>, meter: &mut Meter) {
        let mut buf = [0i16; 64];
        loop {
            let n = queue.sink_mut().consume(&mut buf);
            if n == 0 {
                break;
            }
            meter.add(&buf[..n]);
        }
    }

    pub fn run() -> Result<(), LinkError> {
        let mut args = std::env::args().skip(1);
        let mode: LinkMode = match args.next() {
            Some(arg) => arg.parse()?,
            None => LinkMode::Lpc,
        };
        let seconds: u64 = args.next().and_then(|s| s.parse().ok()).unwrap_or(1);

        MODE.set(mode);
        MAIN_LOG.set_max_level(LogLevel::Debug);

        let config = LinkConfig::new(DEFAULT_FRAME_LEN, mode);
        config.validate()?;
        let frame_len = config.frame_len as u64;

        let ring: CaptureRing = CaptureRing::new(config.frame_len)?;
        let mut tone = ToneGenerator::new(440, SAMPLE_RATE, 8000);
        let mut input = Meter::default();
        let mut capture = CaptureDriver::new(
            &ring,
            &HEALTH,
            &ISR_LOG,
            || {
                let s = tone.next_sample();
                input.add(&[s]);
                s
            },
            SAMPLE_RATE,
        );

        let mut uplink = Uplink::new(&ring, &MODE)?;
        let mut downlink = Downlink::new(config.frame_len, uplink.mode())?;
        let mut link = Loopback::new(4 * MAX_WIRE_FRAME);
        let mut queue = PlaybackQueue::new(MemorySink::<PLAYBACK_SAMPLES>::new());
        let mut output = Meter::default();
        let mut wire = [0u8; MAX_WIRE_FRAME];
        let mut out = Stdout;

        rt_info!(MAIN_LOG, 0, "loopback: {} s, mode {}, {} samples/frame", seconds, mode, frame_len);
        queue.begin(SAMPLE_RATE)?;

        let total = seconds * u64::from(SAMPLE_RATE);
        for tick in 0..total {
            capture.tick();

            if tick % frame_len != frame_len - 1 {
                continue;
            }

            let frame = tick / frame_len;
            let now_us = capture.now_us();
            if !BUSY_FRAMES.contains(&frame) {
                while uplink.poll(&mut link)? {
                    let need = downlink.frame_bytes();
                    if link.read_frame(&mut wire[..need]) == need {
                        downlink.play_frame(&wire[..need], &mut queue, |q| drain_dac(q, &mut output))?;
                    }
                }
                drain_dac(&mut queue, &mut output);
            } else {
                rt_debug!(MAIN_LOG, now_us, "main loop busy at frame {}", frame);
            }
            drain_streams(&STREAMS, &mut out, now_us, LOG_DRAIN_BUDGET);
        }

        // Anything mid-fill is abandoned
        drop(capture.stop());
        queue.end();

        let up = uplink.stats();
        let down = downlink.stats();
        let health = HEALTH.snapshot();
        rt_info!(
            MAIN_LOG,
            (total * 1_000_000 / u64::from(SAMPLE_RATE)) as i64,
            "done: {} frames sent ({} bytes), {} played, {} dropped at capture",
            up.frames_sent,
            up.bytes_sent,
            down.frames,
            health.dropped
        );
        drain_streams(&STREAMS, &mut out, 0, usize::MAX);

        let raw_bytes = u64::from(up.frames_sent) * frame_len * 2;
        let panel = ControlPanel::new(&MODE, &HEALTH, &STREAMS, &STREAM_NAMES);
        panel.record_uplink(&up);
        panel.record_downlink(&down);
        let _ = execute(&parse_line("stats"), &panel, &mut out);

        let _ = writeln!(
            out,
            "input rms {:.0}, output rms {:.0}, wire {} of {} bytes ({:.1}%)",
            input.rms(),
            output.rms(),
            up.bytes_sent,
            raw_bytes,
            if raw_bytes == 0 {
                0.0
            } else {
                100.0 * f64::from(up.bytes_sent) / raw_bytes as f64
            }
        );
        Ok(())
    }
}
