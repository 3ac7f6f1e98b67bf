//! Analysis prefilters.
//!
//! Four fixed second-order sections at 8000 Hz, with coefficients written as
//! sums of shift-and-add terms:
//!
//! ```text
//! pcm ──▶ HumFilter ──┬──▶ PreEmphasis ──▶ PreEmphasis ──▶ history s[]
//!         100 Hz HP   │     zero 640 Hz, pole 3200 Hz (x2)
//!                     └──▶ PitchBandFilter ──▶ pitch history y[]
//!                           300 Hz LP
//! ```

use crate::fixed::Fixed;

/// Anti-hum 2nd-order Butterworth high-pass, 100 Hz corner.
#[derive(Clone, Copy, Debug, Default)]
pub struct HumFilter {
    x: [Fixed; 3],
    y: [Fixed; 3],
}

impl HumFilter {
    #[inline]
    pub fn process(&mut self, u: Fixed) -> Fixed {
        let [_, x1, x2] = self.x;
        let [_, y1, y2] = self.y;
        let x = u.scale(15, 4) + u.scale(1, 7) + u.scale(11, 14);
        self.x = [x1, x2, x];

        let y = (x1 + x) - (x2 + x2) - y1.scale(7, 3) - y1.scale(5, 8)
            + y2.scale(15, 3)
            + y2.scale(1, 6);
        self.y = [y1, y2, y];
        y
    }
}

/// 2nd-order Butterworth low-pass, 300 Hz corner. Feeds the pitch detector.
#[derive(Clone, Copy, Debug, Default)]
pub struct PitchBandFilter {
    y: [Fixed; 3],
}

impl PitchBandFilter {
    #[inline]
    pub fn process(&mut self, u: Fixed) -> Fixed {
        let [_, y1, y2] = self.y;
        let x = u.scale(3, 6) + u.scale(1, 13);
        let y = x - y1.scale(23, 5) + y1.scale(1, 9) + y2.scale(107, 6) - y2.scale(1, 9);
        self.y = [y1, y2, y];
        y
    }
}

/// Pre-emphasis section: one zero at 640 Hz, one pole at 3200 Hz, +4 dB.
///
/// Flattens the spectrum the sawtooth excitation will impose on synthesis.
#[derive(Clone, Copy, Debug, Default)]
pub struct PreEmphasis {
    x: [Fixed; 2],
    y: [Fixed; 2],
}

impl PreEmphasis {
    #[inline]
    pub fn process(&mut self, u: Fixed) -> Fixed {
        let x0 = self.x[1];
        let x1 = u.scale(3, 1) + u.scale(43, 9);
        let y0 = self.y[1];
        let y1 = y0.scale(11, 4) + y0.scale(7, 10) + x1.scale(23, 5) + x1.scale(7, 11)
            - x0.scale(11, 4)
            - x0.scale(7, 10);
        self.x = [x0, x1];
        self.y = [y0, y1];
        y1
    }
}

/// One input sample after the filter bank.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Filtered {
    /// High-passed and pre-emphasized, for LPC analysis.
    pub analysis: Fixed,
    /// High-passed and low-passed, for pitch detection.
    pub pitch: Fixed,
}

/// The four sections with their delay lines.
#[derive(Clone, Copy, Debug, Default)]
pub struct AnalysisFilterBank {
    hum: HumFilter,
    pitch_band: PitchBandFilter,
    emphasis: [PreEmphasis; 2],
}

impl AnalysisFilterBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one new sample through all sections.
    #[inline]
    pub fn process(&mut self, u: Fixed) -> Filtered {
        let clean = self.hum.process(u);
        let pitch = self.pitch_band.process(clean);
        let stage1 = self.emphasis[0].process(clean);
        let analysis = self.emphasis[1].process(stage1);
        Filtered { analysis, pitch }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settle<F: FnMut(Fixed) -> Fixed>(mut f: F, input: impl Fn(usize) -> Fixed, n: usize) -> Fixed {
        let mut peak = Fixed::ZERO;
        for i in 0..n {
            let y = f(input(i));
            if i >= n - 100 {
                let mag = if y.is_negative() { -y } else { y };
                peak = peak.max(mag);
            }
        }
        peak
    }

    #[test]
    fn test_hum_filter_blocks_dc() {
        let mut hp = HumFilter::default();
        let dc = Fixed::from_pcm(8000);
        let residual = settle(|u| hp.process(u), |_| dc, 4000);
        assert!(residual.to_f64() < 0.002, "residual {}", residual);
    }

    #[test]
    fn test_pitch_band_passes_dc() {
        let mut lp = PitchBandFilter::default();
        let dc = Fixed::from_pcm(8000);
        let out = settle(|u| lp.process(u), |_| dc, 2000);
        let ratio = out.to_f64() / dc.to_f64();
        assert!((ratio - 1.0).abs() < 0.02, "dc gain {}", ratio);
    }

    #[test]
    fn test_pitch_band_rejects_nyquist() {
        let mut lp = PitchBandFilter::default();
        let a = Fixed::from_pcm(8000);
        let out = settle(|u| lp.process(u), |i| if i % 2 == 0 { a } else { -a }, 2000);
        assert!(out.to_f64() < 0.05 * a.to_f64());
    }

    #[test]
    fn test_emphasis_tilts_spectrum_up() {
        let a = Fixed::from_pcm(4000);

        let mut low = PreEmphasis::default();
        let dc_out = settle(|u| low.process(u), |_| a, 500);

        let mut high = PreEmphasis::default();
        let nyq_out = settle(|u| high.process(u), |i| if i % 2 == 0 { a } else { -a }, 500);

        assert!(nyq_out.to_f64() > 5.0 * dc_out.to_f64());
    }

    #[test]
    fn test_bank_silence_stays_silent() {
        let mut bank = AnalysisFilterBank::new();
        for _ in 0..100 {
            let out = bank.process(Fixed::ZERO);
            assert_eq!(out.analysis, Fixed::ZERO);
            assert_eq!(out.pitch, Fixed::ZERO);
        }
    }
}
