//! Pitch detection on the decimated pitch-band signal.

use super::analysis::autocorrelate;
use super::{DECIMATION, MAX_FRAME_LEN, MAX_LAG, MIN_LAG};
use crate::fixed::Fixed;

/// Energy above which the permissive voicing threshold applies.
const LOUD_ENERGY: Fixed = Fixed::from_f64(0.002);
/// Voicing threshold for loud regions.
const LOUD_THRESHOLD: Fixed = Fixed::from_f64(0.25);
/// Voicing threshold for quiet regions, suppressing buzz on near-silence.
const QUIET_THRESHOLD: Fixed = Fixed::from_f64(0.6);

/// Result of one pitch analysis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PitchEstimate {
    /// Period in samples, zero when unvoiced.
    pub period: Fixed,
    /// Normalized correlation at the chosen lag.
    pub confidence: Fixed,
}

impl PitchEstimate {
    #[inline]
    pub fn is_voiced(&self) -> bool {
        self.period > Fixed::ZERO
    }
}

/// Estimate the pitch period of one region of the pitch history.
///
/// The region is decimated by [`DECIMATION`] and autocorrelated over lags
/// `0..=MAX_LAG`. The chosen lag is the strict local maximum above
/// [`MIN_LAG`] with the largest three-lag sum, refined by the weighted
/// centroid of those three lags.
pub fn estimate(region: &[Fixed]) -> PitchEstimate {
    let mut decimated = [Fixed::ZERO; MAX_FRAME_LEN / DECIMATION];
    let points = (region.len() / DECIMATION).min(decimated.len());
    for (d, &v) in decimated[..points]
        .iter_mut()
        .zip(region.iter().step_by(DECIMATION))
    {
        *d = v;
    }

    let mut r = [Fixed::ZERO; MAX_LAG + 1];
    autocorrelate(&decimated[..points], &mut r);
    let lag = |i: usize| r.get(i).copied().unwrap_or(Fixed::ZERO);

    let mut best = 0usize;
    let mut best_sum = Fixed::ZERO;
    for i in 1..=MAX_LAG {
        let (rm, rc, rp) = (r[i - 1], r[i], lag(i + 1));
        let sum = rm + rc + rp;
        if sum > best_sum && rc > rm && rc > rp && i > MIN_LAG {
            best_sum = sum;
            best = i;
        }
    }

    let mut centroid = Fixed::ONE;
    if best > 0 {
        let (rm, rc, rp) = (r[best - 1], r[best], lag(best + 1));
        let moment = rm.mul_int(best as i32 - 1) + rc.mul_int(best as i32) + rp.mul_int(best as i32 + 1);
        centroid = moment.div(rm + rc + rp);
    }

    let confidence = if r[0].is_zero() {
        Fixed::ZERO
    } else {
        r[best].div(r[0])
    };

    let mut period = Fixed::ZERO;
    if centroid > Fixed::from_int(MIN_LAG as i32) && centroid < Fixed::from_int(MAX_LAG as i32 + 1) {
        let threshold = if r[0] > LOUD_ENERGY {
            LOUD_THRESHOLD
        } else {
            QUIET_THRESHOLD
        };
        if confidence > threshold {
            period = centroid.mul_int(DECIMATION as i32);
        }
    }

    PitchEstimate { period, confidence }
}

/// Merge the periods of the two overlapping regions.
///
/// Both voiced gives their mean, one voiced gives that one, neither gives
/// zero.
pub fn combine(first: Fixed, second: Fixed) -> Fixed {
    match (first > Fixed::ZERO, second > Fixed::ZERO) {
        (true, true) => (first + second).div_int(2),
        (true, false) => first,
        (false, true) => second,
        (false, false) => Fixed::ZERO,
    }
}
