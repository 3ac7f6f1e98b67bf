//! Parameter quantization and frame packing.
//!
//! # Frame Format
//!
//! ```text
//! byte 0      period, log scale, 0 = unvoiced
//! byte 1      gain (high 6 bits) | voicing flags (bit 0 first half, bit 1 second)
//! byte 2..    reflection codes, k1 most significant, byte 2 least significant
//! ```
//!
//! Codes are concatenated with a left shift per coefficient, so k1 ends up
//! in the top bits and k10 in the low bits of byte 2. Widths come from a
//! table fixed at compile time.

use super::{LPC_ORDER, MAX_LAG, MIN_LAG, MIN_PERIOD};
use crate::fixed::Fixed;

/// Bit widths of k1..k10 (38 bits).
pub const LPC_BITS: [u8; LPC_ORDER] = [6, 5, 5, 4, 4, 3, 3, 3, 3, 2];

/// Lower-rate table (32 bits).
pub const LPC_BITS_32: [u8; LPC_ORDER] = [5, 5, 5, 4, 3, 3, 2, 2, 2, 1];

/// Higher-rate table (80 bits).
pub const LPC_BITS_80: [u8; LPC_ORDER] = [8; LPC_ORDER];

/// Total coefficient bits of a width table.
pub const fn packed_bits(widths: &[u8]) -> usize {
    let mut total = 0;
    let mut i = 0;
    while i < widths.len() {
        total += widths[i] as usize;
        i += 1;
    }
    total
}

/// Frame size in bytes for a width table: two header bytes plus the codes.
pub const fn frame_size(widths: &[u8]) -> usize {
    packed_bits(widths).div_ceil(8) + 2
}

/// Size of one parameter frame.
pub const PARAM_FRAME_SIZE: usize = frame_size(&LPC_BITS);

/// One packed parameter frame.
pub type ParameterFrame = [u8; PARAM_FRAME_SIZE];

/// Voicing flag of the first half-frame.
pub const VOICED_FIRST: u8 = 0x01;
/// Voicing flag of the second half-frame.
pub const VOICED_SECOND: u8 = 0x02;

/// Number of leading coefficients quantized through the arcsine warp.
const WARPED: usize = 2;

/// `ln(MAX_LAG / MIN_LAG)`, the span of the period scale.
pub const LOG_PERIOD_SPAN: Fixed = Fixed::from_int(MAX_LAG as i32)
    .div(Fixed::from_int(MIN_LAG as i32))
    .ln();

/// Slope of the gain warp, `(e - 1) / 10`. Gain 10 maps to byte 255.
const GAIN_WARP: Fixed = Fixed::from_f64((2.718 - 1.0) / 10.0);

const TWO_OVER_PI: Fixed = Fixed::from_f64(core::f64::consts::FRAC_2_PI);
const NEG_BIAS: Fixed = Fixed::from_f64(0.6);
const POS_BIAS: Fixed = Fixed::from_f64(0.4);

/// Gain quantization law. Encoder and decoder always use [`GAIN_LAW`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GainLaw {
    /// `256 * ln(1 + g * (e - 1) / 10)`, rounded to a multiple of 4.
    Logarithmic,
    /// `g * 128`, clamped to 255.
    Linear,
}

/// Gain law of this build.
#[cfg(not(feature = "linear-gain"))]
pub const GAIN_LAW: GainLaw = GainLaw::Logarithmic;

/// Gain law of this build.
#[cfg(feature = "linear-gain")]
pub const GAIN_LAW: GainLaw = GainLaw::Linear;

/// Unquantized parameters of one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameParams {
    /// Pitch period in samples, zero when unvoiced.
    pub period: Fixed,
    /// Residual gain.
    pub gain: Fixed,
    /// Voicing of the first and second half-frame.
    pub voiced: [bool; 2],
    /// k1..k10.
    pub reflection: [Fixed; LPC_ORDER],
}

/// Quantized parameters, one value per field of the packed frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct QuantizedParams {
    pub period: u8,
    /// Gain code with the voicing flags in the two low bits.
    pub gain: u8,
    /// Signed codes, each within its width in [`LPC_BITS`].
    pub codes: [i8; LPC_ORDER],
}

impl QuantizedParams {
    /// Voicing flags carried in the gain byte.
    pub fn voiced(&self) -> [bool; 2] {
        [self.gain & VOICED_FIRST != 0, self.gain & VOICED_SECOND != 0]
    }

    /// Lay out the frame bytes.
    pub fn pack(&self) -> ParameterFrame {
        let mut frame = [0u8; PARAM_FRAME_SIZE];
        frame[0] = self.period;
        frame[1] = self.gain;
        pack_codes(&self.codes, &LPC_BITS, &mut frame[2..]);
        frame
    }

    /// Read the frame bytes back.
    pub fn unpack(frame: &ParameterFrame) -> Self {
        let mut codes = [0i8; LPC_ORDER];
        unpack_codes(&frame[2..], &LPC_BITS, &mut codes);
        Self {
            period: frame[0],
            gain: frame[1],
            codes,
        }
    }
}

/// Concatenate signed codes at the given widths into `out`.
///
/// Only the low `width` bits of each code are kept. Bits beyond the length
/// of `out` are dropped.
pub fn pack_codes(codes: &[i8], widths: &[u8], out: &mut [u8]) {
    let mut acc: u128 = 0;
    for (&code, &bits) in codes.iter().zip(widths) {
        let mask = (1u128 << bits) - 1;
        acc = (acc << bits) | (code as u8 as u128 & mask);
    }
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = acc.checked_shr(8 * i as u32).unwrap_or(0) as u8;
    }
}

/// Inverse of [`pack_codes`], sign-extending each code from its width.
pub fn unpack_codes(bytes: &[u8], widths: &[u8], codes: &mut [i8]) {
    let mut acc: u128 = 0;
    for (i, &b) in bytes.iter().enumerate().take(16) {
        acc |= (b as u128) << (8 * i);
    }
    for (code, &bits) in codes.iter_mut().zip(widths).rev() {
        let raw = (acc & ((1u128 << bits) - 1)) as u8;
        let spare = 8 - bits as u32;
        *code = ((raw << spare) as i8) >> spare;
        acc >>= bits;
    }
}

/// Round a log-gain code to the 6-bit grid (multiples of 4).
///
/// Codes that would round past 255 stay at 252 instead of wrapping to 0.
#[inline]
fn round_log_gain(code: i32) -> u8 {
    ((code.clamp(0, 255) + 2).min(255) & 0xfc) as u8
}

/// Quantize one frame of parameters.
pub fn quantize(p: &FrameParams) -> QuantizedParams {
    let period = if p.period.is_zero() {
        0
    } else {
        p.period
            .div(Fixed::from_int(MIN_PERIOD))
            .ln()
            .div(LOG_PERIOD_SPAN)
            .mul_int(256)
            .to_int() as u8
    };

    let mut gain = match GAIN_LAW {
        GainLaw::Logarithmic => {
            round_log_gain((Fixed::ONE + GAIN_WARP.mul(p.gain)).ln().mul_int(256).to_int())
        }
        GainLaw::Linear => p.gain.mul_int(128).to_int().clamp(0, 255) as u8,
    };
    if p.voiced[0] {
        gain |= VOICED_FIRST;
    }
    if p.voiced[1] {
        gain |= VOICED_SECOND;
    }

    let mut codes = [0i8; LPC_ORDER];
    for (i, (code, &bits)) in codes.iter_mut().zip(LPC_BITS.iter()).enumerate() {
        let spare = 8 - bits as u32;
        let quantum = 1i32 << spare;
        let mut u = p.reflection[i];
        if i < WARPED {
            u = u.asin().mul(TWO_OVER_PI);
        }
        u = u.mul_int(127);
        u = if u.is_negative() {
            u + NEG_BIAS.mul_int(quantum)
        } else {
            u + POS_BIAS.mul_int(quantum)
        };
        let byte = (u.to_int() & 0xff) as u8;
        *code = (byte as i8) >> spare;
    }

    QuantizedParams { period, gain, codes }
}

/// Reconstruct parameters from their quantized form.
///
/// The gain is decoded from the whole byte, flags included.
pub fn dequantize(q: &QuantizedParams) -> FrameParams {
    let period = if q.period == 0 {
        Fixed::ZERO
    } else {
        Fixed::from_int(q.period as i32)
            .div_int(256)
            .mul(LOG_PERIOD_SPAN)
            .exp()
            .mul_int(MIN_PERIOD)
    };

    let gain = match GAIN_LAW {
        GainLaw::Logarithmic => {
            (Fixed::from_int(q.gain as i32).div_int(256).exp() - Fixed::ONE).div(GAIN_WARP)
        }
        GainLaw::Linear => Fixed::from_int(q.gain as i32).div_int(128),
    };

    let mut reflection = [Fixed::ZERO; LPC_ORDER];
    for (i, (k, &bits)) in reflection.iter_mut().zip(LPC_BITS.iter()).enumerate() {
        let spare = 8 - bits as u32;
        *k = Fixed::from_int((q.codes[i] as i32) << spare).div_int(128);
        if i < WARPED {
            *k = Fixed::FRAC_PI_2.mul(*k).sin();
        }
    }

    FrameParams {
        period,
        gain,
        voiced: q.voiced(),
        reflection,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_sizes() {
        assert_eq!(packed_bits(&LPC_BITS), 38);
        assert_eq!(PARAM_FRAME_SIZE, 7);
        assert_eq!(frame_size(&LPC_BITS_32), 6);
        assert_eq!(frame_size(&LPC_BITS_80), 12);
    }

    #[test]
    fn test_code_layout() {
        let mut codes = [0i8; LPC_ORDER];
        codes[0] = -1; // 6 bits, top of the 38-bit field
        codes[9] = 1; // 2 bits, bottom
        let frame = QuantizedParams { period: 0, gain: 0, codes }.pack();
        assert_eq!(frame[2], 0x01);
        assert_eq!(frame[3..6], [0, 0, 0]);
        assert_eq!(frame[6], 0x3f);
    }

    #[test]
    fn test_zero_params_quantize_to_zero() {
        let q = quantize(&FrameParams::default());
        assert_eq!(q.period, 0);
        assert_eq!(q.gain, 0);
        assert_eq!(q.voiced(), [false, false]);
    }

    #[test]
    fn test_period_scale_endpoints() {
        let mut p = FrameParams::default();
        p.period = Fixed::from_int(25);
        assert_eq!(quantize(&p).period, 0);

        p.period = Fixed::from_int(40);
        let code = quantize(&p).period;
        assert!((56..=58).contains(&code), "code {}", code);

        let back = dequantize(&QuantizedParams { period: code, ..Default::default() });
        assert!((back.period.to_f64() - 40.0).abs() < 1.0, "period {}", back.period);
    }

    #[test]
    fn test_voicing_flags() {
        let p = FrameParams {
            voiced: [true, false],
            ..Default::default()
        };
        assert_eq!(quantize(&p).gain & 0x03, VOICED_FIRST);
        let p = FrameParams {
            voiced: [false, true],
            ..Default::default()
        };
        assert_eq!(quantize(&p).gain & 0x03, VOICED_SECOND);
    }

    #[cfg(not(feature = "linear-gain"))]
    #[test]
    fn test_log_gain_grid_and_ceiling() {
        let p = FrameParams {
            gain: Fixed::from_f64(1.0),
            ..Default::default()
        };
        let q = quantize(&p);
        assert_eq!(q.gain & 0x03, 0);
        let back = dequantize(&q).gain.to_f64();
        assert!((back - 1.0).abs() < 0.1, "gain {}", back);

        let loud = FrameParams {
            gain: Fixed::from_int(50),
            ..Default::default()
        };
        assert_eq!(quantize(&loud).gain, 252);
    }

    #[test]
    fn test_log_gain_rounding_caps_at_252() {
        assert_eq!(round_log_gain(-3), 0);
        assert_eq!(round_log_gain(1), 0);
        assert_eq!(round_log_gain(2), 4);
        assert_eq!(round_log_gain(249), 248);
        assert_eq!(round_log_gain(250), 252);
        // These wrap to 0 under plain (code + 2) & 0xfc
        assert_eq!(round_log_gain(253), 252);
        assert_eq!(round_log_gain(254), 252);
        assert_eq!(round_log_gain(255), 252);
        assert_eq!(round_log_gain(400), 252);
    }

    #[cfg(feature = "linear-gain")]
    #[test]
    fn test_linear_gain() {
        let p = FrameParams {
            gain: Fixed::from_f64(1.0),
            ..Default::default()
        };
        let q = quantize(&p);
        assert_eq!(q.gain, 128);
        assert_eq!(dequantize(&q).gain, Fixed::ONE);
    }

    #[test]
    fn test_reflection_round_trip_within_quantum() {
        let mut p = FrameParams::default();
        let values = [0.9, -0.6, 0.3, -0.2, 0.1, -0.1, 0.05, 0.0, -0.05, 0.2];
        for (k, v) in p.reflection.iter_mut().zip(values) {
            *k = Fixed::from_f64(v);
        }
        let back = dequantize(&quantize(&p));
        for (i, (k, v)) in back.reflection.iter().zip(values).enumerate() {
            let quantum = (1 << (8 - LPC_BITS[i])) as f64 / 128.0;
            assert!((k.to_f64() - v).abs() <= quantum, "k{} = {} vs {}", i + 1, k, v);
        }
    }

    #[test]
    fn test_alternate_tables_pack() {
        let codes = [-16, 15, 0, -8, 3, -4, 1, -2, 1, -1];
        let mut bytes = [0u8; 4];
        pack_codes(&codes, &LPC_BITS_32, &mut bytes);
        let mut back = [0i8; LPC_ORDER];
        unpack_codes(&bytes, &LPC_BITS_32, &mut back);
        assert_eq!(back, codes);

        let wide = [-128, 127, 0, 1, -1, 64, -64, 5, -5, 100];
        let mut bytes = [0u8; 10];
        pack_codes(&wide, &LPC_BITS_80, &mut bytes);
        assert_eq!(bytes[0], 100);
        assert_eq!(bytes[9], 0x80);
        let mut back = [0i8; LPC_ORDER];
        unpack_codes(&bytes, &LPC_BITS_80, &mut back);
        assert_eq!(back, wide);
    }
}
