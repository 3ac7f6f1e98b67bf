//! Test tone generator.
//!
//! Phase accumulator over a 256-entry sine table. The top 8 bits of the
//! 32-bit phase index the table.

/// Number of entries in the sine table.
pub const TABLE_SIZE: usize = 256;

/// Default test tone, 1 kHz at half scale.
pub const DEFAULT_TONE_HZ: u32 = 1000;
pub const DEFAULT_LEVEL: i16 = 16000;

/// One full sine cycle at full i16 scale (index 64 = 90°).
pub static SINE_TABLE: [i16; TABLE_SIZE] = {
    let mut table = [0i16; TABLE_SIZE];
    let mut i = 0;
    while i < TABLE_SIZE {
        let angle = (i as f64) * core::f64::consts::TAU / (TABLE_SIZE as f64);
        table[i] = (taylor_sin(angle) * 32767.0) as i16;
        i += 1;
    }
    table
};

/// sin(x) by odd Taylor terms after folding x into [-π/2, π/2].
const fn taylor_sin(x: f64) -> f64 {
    use core::f64::consts::PI;

    let mut x = x;
    while x > PI {
        x -= 2.0 * PI;
    }
    while x < -PI {
        x += 2.0 * PI;
    }
    if x > PI / 2.0 {
        x = PI - x;
    } else if x < -PI / 2.0 {
        x = -PI - x;
    }

    let x2 = x * x;
    let mut term = x;
    let mut sum = x;
    let mut n = 1;
    while n < 8 {
        term = -term * x2 / ((2 * n) as f64 * (2 * n + 1) as f64);
        sum += term;
        n += 1;
    }
    sum
}

/// Sine tone source.
#[derive(Clone, Debug)]
pub struct ToneGenerator {
    phase: u32,
    phase_inc: u32,
    level: i16,
}

impl ToneGenerator {
    /// Tone of `freq_hz` at `sample_rate`, peak amplitude `level`.
    pub fn new(freq_hz: u32, sample_rate: u32, level: i16) -> Self {
        Self {
            phase: 0,
            phase_inc: Self::phase_inc(freq_hz, sample_rate),
            level,
        }
    }

    /// phase_inc = freq * 2^32 / sample_rate
    #[inline]
    fn phase_inc(freq_hz: u32, sample_rate: u32) -> u32 {
        ((u64::from(freq_hz) << 32) / u64::from(sample_rate.max(1))) as u32
    }

    pub fn set_frequency(&mut self, freq_hz: u32, sample_rate: u32) {
        self.phase_inc = Self::phase_inc(freq_hz, sample_rate);
    }

    #[inline]
    pub fn next_sample(&mut self) -> i16 {
        let idx = (self.phase >> 24) as usize;
        self.phase = self.phase.wrapping_add(self.phase_inc);
        ((i32::from(SINE_TABLE[idx]) * i32::from(self.level)) / 32767) as i16
    }

    /// Fill `out` with consecutive samples.
    pub fn fill(&mut self, out: &mut [i16]) {
        for s in out {
            *s = self.next_sample();
        }
    }
}

impl Default for ToneGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_TONE_HZ, crate::codec::SAMPLE_RATE, DEFAULT_LEVEL)
    }
}
