//! Excitation sources and the lattice synthesis filter.

use super::LPC_ORDER;
use crate::fixed::Fixed;

/// Shift placing a 16-bit noise word at ±0.5.
pub const NOISE_SHIFT: u32 = crate::fixed::FRAC_BITS - 15 - 1;

/// Additive lagged-Fibonacci noise source with five 16-bit taps.
#[derive(Clone, Debug)]
pub struct NoiseGen {
    taps: [i16; 5],
    mid: usize,
    top: usize,
}

impl NoiseGen {
    const SEED: [i16; 5] = [-21161, -8478, 30892, -10216, 16950];

    pub const fn new() -> Self {
        Self {
            taps: Self::SEED,
            mid: 1,
            top: 4,
        }
    }

    /// Next 16-bit noise word.
    #[inline]
    pub fn next_word(&mut self) -> i16 {
        self.taps[self.top] = self.taps[self.top].wrapping_add(self.taps[self.mid]);
        let word = self.taps[self.top];
        self.top = self.top.checked_sub(1).unwrap_or(self.taps.len() - 1);
        self.mid = self.mid.checked_sub(1).unwrap_or(self.taps.len() - 1);
        word
    }

    /// Next noise sample in Q20, within ±0.5.
    #[inline]
    pub fn next_sample(&mut self) -> Fixed {
        Fixed::from_raw((self.next_word() as i32) << NOISE_SHIFT)
    }
}

impl Default for NoiseGen {
    fn default() -> Self {
        Self::new()
    }
}

/// Sawtooth pulse train for voiced speech.
///
/// Every `period` samples the level jumps to `gain * adj / 4`, then ramps
/// down by `gain / period * adj / 2` per sample.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sawtooth {
    level: Fixed,
    countdown: i32,
}

impl Sawtooth {
    /// Restart the pulse on the next voiced sample.
    #[inline]
    pub fn restart(&mut self) {
        self.countdown = 0;
    }

    #[inline]
    pub fn next_sample(&mut self, gain: Fixed, period: Fixed, adj: Fixed) -> Fixed {
        if self.countdown == 0 {
            self.level = gain.mul(adj.shr(2));
            self.countdown = period.to_int();
        } else {
            self.level -= gain.div(period).mul(adj.shr(1));
            self.countdown -= 1;
        }
        self.level
    }
}

/// Ten-stage all-pole lattice filter.
#[derive(Clone, Copy, Debug, Default)]
pub struct Lattice {
    /// Backward prediction taps `bp[0..=10]`.
    bp: [Fixed; LPC_ORDER + 1],
}

impl Lattice {
    /// Filter one excitation sample with reflection coefficients `k`.
    #[inline]
    pub fn process(&mut self, excitation: Fixed, k: &[Fixed; LPC_ORDER]) -> Fixed {
        let mut u = excitation;
        for stage in (1..=LPC_ORDER).rev() {
            let kj = k[stage - 1];
            u -= kj.mul(self.bp[stage - 1]);
            self.bp[stage] = self.bp[stage - 1] + kj.mul(u);
        }
        self.bp[0] = u;
        u
    }

    pub fn taps(&self) -> &[Fixed; LPC_ORDER + 1] {
        &self.bp
    }
}
