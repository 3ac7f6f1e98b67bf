//! LPC synthesis (decoding).

use super::params::{self, FrameParams, ParameterFrame, QuantizedParams};
use super::synthesis::{Lattice, NoiseGen, Sawtooth};
use super::{check_frame_len, history_len, CodecError, LPC_ORDER};
use crate::fixed::Fixed;

/// Output clip level, just inside full scale.
const CLIP: Fixed = Fixed::from_f64(0.9999);

/// Decoder state of one stream.
///
/// `old_period`, `old_gain`, `old_k` and the lattice taps always hold the
/// state at the end of the previous frame: they are the left endpoint of
/// the next frame's interpolation.
#[derive(Clone, Debug)]
pub struct DecoderState {
    frame_len: usize,
    history_len: usize,
    /// Gain normalization for noise excitation, `sqrt(3 / history_len)`.
    unvoiced_adj: Fixed,
    old_period: Fixed,
    old_gain: Fixed,
    old_k: [Fixed; LPC_ORDER],
    lattice: Lattice,
    sawtooth: Sawtooth,
    noise: NoiseGen,
}

impl DecoderState {
    /// Create a decoder for frames of `frame_len` samples.
    pub fn new(frame_len: usize) -> Result<Self, CodecError> {
        check_frame_len(frame_len)?;
        let history_len = history_len(frame_len);
        Ok(Self {
            frame_len,
            history_len,
            unvoiced_adj: Fixed::from_int(3).div_int(history_len as i32).sqrt(),
            old_period: Fixed::ZERO,
            old_gain: Fixed::ZERO,
            old_k: [Fixed::ZERO; LPC_ORDER],
            lattice: Lattice::default(),
            sawtooth: Sawtooth::default(),
            noise: NoiseGen::new(),
        })
    }

    #[inline]
    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Period at the end of the last decoded frame (zero if unvoiced).
    #[inline]
    pub fn last_period(&self) -> Fixed {
        self.old_period
    }

    /// Decode one parameter frame into `out[..frame_len]`.
    ///
    /// Returns the number of samples written.
    pub fn decode(&mut self, frame: &ParameterFrame, out: &mut [i16]) -> Result<usize, CodecError> {
        let p = params::dequantize(&QuantizedParams::unpack(frame));
        self.synthesize(&p, out)
    }

    /// Synthesize one frame from unquantized parameters.
    pub fn synthesize(&mut self, p: &FrameParams, out: &mut [i16]) -> Result<usize, CodecError> {
        if out.len() < self.frame_len {
            return Err(CodecError::BufferSize {
                need: self.frame_len,
                got: out.len(),
            });
        }
        let frame_len = self.frame_len as i32;
        let half = frame_len / 2;

        // coefficients ramp over the whole frame toward one target
        let mut k = self.old_k;
        let mut k_step = [Fixed::ZERO; LPC_ORDER];
        for ((step, &new), &old) in k_step.iter_mut().zip(&p.reflection).zip(&self.old_k) {
            *step = (new - old).div_int(frame_len);
        }

        let mut samples = out.iter_mut();
        for voiced in p.voiced {
            let target = if voiced { p.period } else { Fixed::ZERO };

            let mut gain = self.old_gain;
            let gain_step = (p.gain - self.old_gain).div_int(half);

            let adj = if target.is_zero() {
                self.unvoiced_adj
            } else {
                target.div_int(self.history_len as i32).sqrt()
            };

            // period only glides between two voiced half-frames
            let mut period = self.old_period;
            let mut period_step = Fixed::ZERO;
            if !self.old_period.is_zero() && !target.is_zero() {
                period_step = (target - self.old_period).div_int(half);
            } else {
                period = target;
            }
            if period.is_zero() {
                self.sawtooth.restart();
            }

            for sample in samples.by_ref().take(half as usize) {
                let excitation = if period.is_zero() {
                    self.noise.next_sample().mul(gain.mul(adj))
                } else {
                    self.sawtooth.next_sample(gain, period, adj)
                };
                let u = self.lattice.process(excitation, &k);
                *sample = u.clamp_to(-CLIP, CLIP).to_pcm();

                period += period_step;
                gain += gain_step;
                for (kj, &step) in k.iter_mut().zip(&k_step) {
                    *kj += step;
                }
            }

            self.old_period = target;
            self.old_gain = p.gain;
        }
        self.old_k = p.reflection;

        Ok(self.frame_len)
    }

    /// Return to the freshly created state.
    pub fn reset(&mut self) {
        *self = Self {
            frame_len: self.frame_len,
            history_len: self.history_len,
            unvoiced_adj: self.unvoiced_adj,
            old_period: Fixed::ZERO,
            old_gain: Fixed::ZERO,
            old_k: [Fixed::ZERO; LPC_ORDER],
            lattice: Lattice::default(),
            sawtooth: Sawtooth::default(),
            noise: NoiseGen::new(),
        };
    }
}
