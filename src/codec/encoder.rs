//! LPC analysis (encoding).

use super::analysis::{autocorrelate, durbin, raised_cosine};
use super::filters::AnalysisFilterBank;
use super::params::{self, FrameParams, ParameterFrame};
use super::pitch;
use super::{check_frame_len, history_len, CodecError, LPC_ORDER, MAX_HISTORY_LEN};
use crate::fixed::Fixed;

/// Encoder state of one stream.
///
/// The history buffers hold `history_len = frame_len * 3 / 2` samples: the
/// newest frame is appended after the last half of the previous one, and
/// after each call that last half is moved to the front.
#[derive(Clone, Debug)]
pub struct EncoderState {
    frame_len: usize,
    history_len: usize,
    /// Prefiltered history for LPC analysis.
    s: [Fixed; MAX_HISTORY_LEN],
    /// Pitch-band history.
    y: [Fixed; MAX_HISTORY_LEN],
    /// Analysis window.
    h: [Fixed; MAX_HISTORY_LEN],
    filters: AnalysisFilterBank,
    r: [Fixed; LPC_ORDER + 1],
}

impl EncoderState {
    /// Create an encoder for frames of `frame_len` samples.
    pub fn new(frame_len: usize) -> Result<Self, CodecError> {
        check_frame_len(frame_len)?;
        let history_len = history_len(frame_len);
        let mut h = [Fixed::ZERO; MAX_HISTORY_LEN];
        raised_cosine(&mut h[..history_len]);
        Ok(Self {
            frame_len,
            history_len,
            s: [Fixed::ZERO; MAX_HISTORY_LEN],
            y: [Fixed::ZERO; MAX_HISTORY_LEN],
            h,
            filters: AnalysisFilterBank::new(),
            r: [Fixed::ZERO; LPC_ORDER + 1],
        })
    }

    #[inline]
    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Prefiltered analysis history.
    pub fn history(&self) -> &[Fixed] {
        &self.s[..self.history_len]
    }

    /// Pitch-band history.
    pub fn pitch_history(&self) -> &[Fixed] {
        &self.y[..self.history_len]
    }

    /// Autocorrelation of the last analyzed window.
    pub fn autocorrelation(&self) -> &[Fixed; LPC_ORDER + 1] {
        &self.r
    }

    /// Encode one frame of PCM into a packed parameter frame.
    pub fn encode(&mut self, pcm: &[i16]) -> Result<ParameterFrame, CodecError> {
        let p = self.analyze(pcm)?;
        Ok(params::quantize(&p).pack())
    }

    /// Analyze one frame of PCM without quantizing.
    pub fn analyze(&mut self, pcm: &[i16]) -> Result<FrameParams, CodecError> {
        if pcm.len() != self.frame_len {
            return Err(CodecError::BufferSize {
                need: self.frame_len,
                got: pcm.len(),
            });
        }
        let (fl, hl) = (self.frame_len, self.history_len);
        let fresh = hl - fl;

        for (j, &sample) in (fresh..hl).zip(pcm) {
            let out = self.filters.process(Fixed::from_pcm(sample));
            self.s[j] = out.analysis;
            self.y[j] = out.pitch;
        }

        let mut w = [Fixed::ZERO; MAX_HISTORY_LEN];
        for ((w, &s), &h) in w.iter_mut().zip(&self.s[..hl]).zip(&self.h[..hl]) {
            *w = s * h;
        }
        autocorrelate(&w[..hl], &mut self.r);
        let lpc = durbin(&self.r);

        let first = pitch::estimate(&self.y[..fl]);
        let second = pitch::estimate(&self.y[fresh..hl]);
        let period = pitch::combine(first.period, second.period);

        self.s.copy_within(fl..hl, 0);
        self.y.copy_within(fl..hl, 0);

        Ok(FrameParams {
            period,
            gain: lpc.gain,
            voiced: [first.is_voiced(), second.is_voiced()],
            reflection: lpc.reflection,
        })
    }

    /// Clear history and filter state, keeping the window.
    pub fn reset(&mut self) {
        self.s = [Fixed::ZERO; MAX_HISTORY_LEN];
        self.y = [Fixed::ZERO; MAX_HISTORY_LEN];
        self.filters.reset();
        self.r = [Fixed::ZERO; LPC_ORDER + 1];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(freq: f64, amplitude: f64, start: usize, out: &mut [i16]) {
        for (i, s) in out.iter_mut().enumerate() {
            let t = (start + i) as f64 / 8000.0;
            *s = (amplitude * (2.0 * core::f64::consts::PI * freq * t).sin()) as i16;
        }
    }

    #[test]
    fn test_rejects_wrong_length() {
        let mut enc = EncoderState::new(160).unwrap();
        assert_eq!(
            enc.encode(&[0; 100]),
            Err(CodecError::BufferSize { need: 160, got: 100 })
        );
    }

    #[test]
    fn test_silence_encodes_unvoiced_zero_gain() {
        let mut enc = EncoderState::new(160).unwrap();
        let frame = enc.encode(&[0; 160]).unwrap();
        assert_eq!(frame[0], 0);
        assert_eq!(frame[1] & 0x03, 0);
        assert_eq!(frame[1], 0);
    }

    #[test]
    fn test_history_carries_newest_half_frame() {
        let mut enc = EncoderState::new(160).unwrap();
        let mut pcm = [0i16; 160];
        tone(300.0, 6000.0, 0, &mut pcm);
        enc.encode(&pcm).unwrap();

        // the carried half is still present at its old position
        let s = enc.history();
        assert_eq!(&s[..80], &s[160..240]);
        let y = enc.pitch_history();
        assert_eq!(&y[..80], &y[160..240]);
        assert!(s[..80].iter().any(|v| !v.is_zero()));
    }

    #[test]
    fn test_tone_is_voiced_with_expected_period() {
        let mut enc = EncoderState::new(160).unwrap();
        let mut pcm = [0i16; 160];
        let mut last = FrameParams::default();
        for n in 0..6 {
            tone(200.0, 8000.0, n * 160, &mut pcm);
            last = enc.analyze(&pcm).unwrap();
        }
        assert_eq!(last.voiced, [true, true]);
        assert!((last.period.to_f64() - 40.0).abs() < 2.0, "period {}", last.period);
    }
}
