//! LPC analysis: window, autocorrelation and Durbin-Levinson recursion.

use super::LPC_ORDER;
use crate::fixed::{Fixed, FRAC_BITS};

/// Energy lost to the raised-cosine taper, folded into the window.
pub const WINDOW_SCALE: f64 = 1.5863;

/// Fill `h` with the gain-compensated raised-cosine window.
///
/// Runs once per encoder, so the cosine is evaluated in floating point.
pub fn raised_cosine(h: &mut [Fixed]) {
    let span = h.len().saturating_sub(1).max(1) as f64;
    for (i, coeff) in h.iter_mut().enumerate() {
        let phase = 2.0 * core::f64::consts::PI * i as f64 / span;
        *coeff = Fixed::from_f64(WINDOW_SCALE * (0.54 - 0.46 * libm::cos(phase)));
    }
}

/// Autocorrelation of `x` for lags `0..r.len()`.
///
/// Products accumulate in 64 bits; lag `k` sums `x.len() - k` terms.
pub fn autocorrelate(x: &[Fixed], r: &mut [Fixed]) {
    for (lag, out) in r.iter_mut().enumerate() {
        let terms = x.len().saturating_sub(lag);
        let acc: i64 = x[..terms]
            .iter()
            .zip(&x[lag.min(x.len())..])
            .map(|(a, b)| a.raw() as i64 * b.raw() as i64)
            .sum();
        *out = Fixed::from_wide(acc >> FRAC_BITS);
    }
}

/// Reflection coefficients and residual gain of one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LpcAnalysis {
    /// `k[1..=10]`, stored from index 0.
    pub reflection: [Fixed; LPC_ORDER],
    /// Square root of the final prediction error.
    pub gain: Fixed,
}

/// Durbin-Levinson recursion.
///
/// If the residual energy reaches zero the recursion stops: the gain is
/// zero and coefficients not yet computed stay zero.
pub fn durbin(r: &[Fixed; LPC_ORDER + 1]) -> LpcAnalysis {
    let mut k = [Fixed::ZERO; LPC_ORDER + 1];
    let mut a = [Fixed::ZERO; LPC_ORDER + 1];
    let mut prev = [Fixed::ZERO; LPC_ORDER + 1];
    let mut e = r[0];

    for i in 1..=LPC_ORDER {
        let mut ki = -r[i];
        for j in 1..i {
            prev[j] = a[j];
            ki -= a[j] * r[i - j];
        }
        if e.is_zero() {
            return LpcAnalysis {
                reflection: reflection_of(&k),
                gain: Fixed::ZERO,
            };
        }
        ki = ki / e;
        k[i] = ki;
        a[i] = ki;
        for j in 1..i {
            a[j] = prev[j] + ki * prev[i - j];
        }
        e = e * (Fixed::ONE - ki * ki);
    }

    if e.is_negative() {
        e = Fixed::ZERO;
    }
    LpcAnalysis {
        reflection: reflection_of(&k),
        gain: e.sqrt(),
    }
}

fn reflection_of(k: &[Fixed; LPC_ORDER + 1]) -> [Fixed; LPC_ORDER] {
    let mut out = [Fixed::ZERO; LPC_ORDER];
    out.copy_from_slice(&k[1..]);
    out
}
