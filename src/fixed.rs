//! Q20 fixed-point arithmetic for the speech codec.
//!
//! Every signal value inside the codec is a [`Fixed`]: a signed 32-bit
//! integer with 20 fractional bits. Products and quotients are formed in
//! 64 bits and narrowed back according to [`OVERFLOW_POLICY`].
//!
//! # Overflow Policy
//!
//! The policy is chosen at build time and applies to `mul`, `div`,
//! `mul_int`, `+` and `-` alike:
//!
//! - default: [`OverflowPolicy::Wrapping`], results are truncated to 32 bits
//! - feature `saturating-math`: [`OverflowPolicy::Saturating`], results are
//!   clamped to ±(2^31 − 1)
//!
//! The transcendental functions (`exp`, `ln`, `sin`, `asin`) are polynomial
//! approximations evaluated in 64-bit Horner form. Their accuracy is about
//! 1e-5 over the ranges the codec uses.

use core::fmt;
use core::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

/// Number of fractional bits.
pub const FRAC_BITS: u32 = 20;

/// Shift converting a 16-bit PCM sample into the codec's internal level.
pub const PCM_SHIFT: u32 = FRAC_BITS - 15;

/// How results that do not fit in 32 bits are narrowed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Keep the low 32 bits.
    Wrapping,
    /// Clamp to ±(2^31 − 1).
    Saturating,
}

/// Overflow policy of this build.
#[cfg(feature = "saturating-math")]
pub const OVERFLOW_POLICY: OverflowPolicy = OverflowPolicy::Saturating;

/// Overflow policy of this build.
#[cfg(not(feature = "saturating-math"))]
pub const OVERFLOW_POLICY: OverflowPolicy = OverflowPolicy::Wrapping;

/// Q20 fixed-point number.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Fixed(i32);

/// Narrow a 64-bit intermediate according to the build policy.
#[inline]
const fn narrow(v: i64) -> i32 {
    match OVERFLOW_POLICY {
        OverflowPolicy::Wrapping => v as i32,
        OverflowPolicy::Saturating => {
            if v > i32::MAX as i64 {
                i32::MAX
            } else if v < -(i32::MAX as i64) {
                -i32::MAX
            } else {
                v as i32
            }
        }
    }
}

/// One Horner step: `(acc + coef) * x >> 20`, all in 64 bits.
#[inline]
const fn horner(acc: i64, coef: Fixed, x: i64) -> i64 {
    ((acc + coef.0 as i64) * x) >> FRAC_BITS
}

const EXP_SERIES: [Fixed; 5] = [
    Fixed::from_f64(0.00833333),
    Fixed::from_f64(0.04166666),
    Fixed::from_f64(0.16666666),
    Fixed::from_f64(0.5),
    Fixed::from_f64(1.0),
];

const LN_SERIES: [Fixed; 7] = [
    Fixed::from_f64(0.0360884937),
    Fixed::from_f64(-0.0953293897),
    Fixed::from_f64(0.1676540711),
    Fixed::from_f64(-0.2407338084),
    Fixed::from_f64(0.3317990258),
    Fixed::from_f64(-0.4998741238),
    Fixed::from_f64(0.9999964239),
];

const SIN_SERIES: [Fixed; 4] = [
    Fixed::from_f64(0.0000027526),
    Fixed::from_f64(-0.0001984090),
    Fixed::from_f64(0.0083333315),
    Fixed::from_f64(-0.1666666664),
];

const ASIN_SERIES: [Fixed; 6] = [
    Fixed::from_f64(0.0066700901),
    Fixed::from_f64(-0.0170881256),
    Fixed::from_f64(0.0308918810),
    Fixed::from_f64(-0.0501743046),
    Fixed::from_f64(0.0889789874),
    Fixed::from_f64(-0.2145988016),
];

impl Fixed {
    pub const ZERO: Fixed = Fixed(0);
    pub const ONE: Fixed = Fixed(1 << FRAC_BITS);
    pub const HALF: Fixed = Fixed(1 << (FRAC_BITS - 1));
    /// Largest representable magnitude, returned by saturating paths.
    pub const MAX: Fixed = Fixed(i32::MAX);
    pub const NEG_MAX: Fixed = Fixed(-i32::MAX);
    pub const PI: Fixed = Fixed::from_f64(core::f64::consts::PI);
    pub const FRAC_PI_2: Fixed = Fixed::from_f64(core::f64::consts::FRAC_PI_2);
    pub const LN_2: Fixed = Fixed::from_f64(0.693147);
    pub const E: Fixed = Fixed::from_f64(2.718282);
    pub const SQRT_E: Fixed = Fixed::from_f64(1.648721);

    /// Wrap a raw Q20 integer.
    #[inline]
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    /// Raw Q20 integer.
    #[inline]
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Narrow a 64-bit Q20 accumulator under the build policy.
    #[inline]
    pub const fn from_wide(acc: i64) -> Self {
        Self(narrow(acc))
    }

    /// Integer to Q20 (low bits shifted out are lost).
    #[inline]
    pub const fn from_int(v: i32) -> Self {
        Self(v << FRAC_BITS)
    }

    /// Convert a constant, rounding half away from zero.
    #[inline]
    pub const fn from_f64(v: f64) -> Self {
        let scaled = v * (1u32 << FRAC_BITS) as f64;
        let bias = if v < 0.0 { -0.5 } else { 0.5 };
        Self((scaled + bias) as i32)
    }

    /// Integer part (arithmetic shift, rounds toward −∞).
    #[inline]
    pub const fn to_int(self) -> i32 {
        self.0 >> FRAC_BITS
    }

    /// Approximate value as `f64` (diagnostics and tests).
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / (1u32 << FRAC_BITS) as f64
    }

    /// 16-bit PCM sample to internal level (full scale = 1.0).
    #[inline]
    pub const fn from_pcm(sample: i16) -> Self {
        Self((sample as i32) << PCM_SHIFT)
    }

    /// Internal level to 16-bit PCM. Callers clamp to ±1.0 first.
    #[inline]
    pub const fn to_pcm(self) -> i16 {
        (self.0 >> PCM_SHIFT) as i16
    }

    #[inline]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Arithmetic shift right of the raw value.
    #[inline]
    pub const fn shr(self, bits: u32) -> Self {
        Self(self.0 >> bits)
    }

    /// Clamp into `[lo, hi]`.
    #[inline]
    pub const fn clamp_to(self, lo: Fixed, hi: Fixed) -> Self {
        if self.0 < lo.0 {
            lo
        } else if self.0 > hi.0 {
            hi
        } else {
            self
        }
    }

    /// Q20 multiply: `(a * b) >> 20`.
    #[inline]
    pub const fn mul(self, rhs: Fixed) -> Fixed {
        Fixed(narrow((self.0 as i64 * rhs.0 as i64) >> FRAC_BITS))
    }

    /// Q20 divide.
    ///
    /// A zero dividend yields zero. A zero divisor yields the maximum
    /// magnitude with the sign of the dividend.
    #[inline]
    pub const fn div(self, rhs: Fixed) -> Fixed {
        if self.0 == 0 {
            return Fixed::ZERO;
        }
        if rhs.0 == 0 {
            return if self.0 > 0 { Fixed::MAX } else { Fixed::NEG_MAX };
        }
        Fixed(narrow(((self.0 as i64) << FRAC_BITS) / rhs.0 as i64))
    }

    /// Multiply by a plain integer.
    #[inline]
    pub const fn mul_int(self, n: i32) -> Fixed {
        Fixed(narrow(self.0 as i64 * n as i64))
    }

    /// Divide by a plain integer, truncating toward zero.
    #[inline]
    pub const fn div_int(self, n: i32) -> Fixed {
        if n == 0 {
            return self.div(Fixed::ZERO);
        }
        Fixed(narrow(self.0 as i64 / n as i64))
    }

    /// `(x * num) >> shift` on the raw value.
    ///
    /// The analysis filters express their coefficients as sums of these
    /// shift-and-add terms.
    #[inline]
    pub const fn scale(self, num: i32, shift: u32) -> Fixed {
        Fixed(narrow((self.0 as i64 * num as i64) >> shift))
    }

    /// Square root by binary digit-by-digit extraction.
    ///
    /// The raw value is read as unsigned, so negative inputs produce the
    /// root of their two's-complement bit pattern.
    pub const fn sqrt(self) -> Fixed {
        let mut v = self.0 as u32;
        let mut r: u32 = 0;
        let mut k: u32 = 16;
        while k > 0 {
            k -= 1;
            let bit = 1u32 << (2 * k);
            let s = r + bit;
            r >>= 1;
            if s <= v {
                v -= s;
                r |= bit;
            }
        }
        Fixed((r << (FRAC_BITS / 2)) as i32)
    }

    /// Natural exponential, clamped to [`Fixed::MAX`].
    ///
    /// Inputs so negative that the reciprocal underflows return zero.
    pub const fn exp(self) -> Fixed {
        let negative = self.0 < 0;
        let mut x = self.0.unsigned_abs() as i64;
        let mut result = Fixed::ONE.0 as i64;
        let overflow = if negative { Fixed::ZERO } else { Fixed::MAX };

        // whole units
        while x > Fixed::ONE.0 as i64 {
            x -= Fixed::ONE.0 as i64;
            result = (result * Fixed::E.0 as i64) >> FRAC_BITS;
            if result > i32::MAX as i64 {
                return overflow;
            }
        }
        // half unit
        if x > Fixed::HALF.0 as i64 {
            x -= Fixed::HALF.0 as i64;
            result = (result * Fixed::SQRT_E.0 as i64) >> FRAC_BITS;
        }
        if result > i32::MAX as i64 {
            return overflow;
        }

        let mut temp = (Fixed::from_f64(0.00138888).0 as i64 * x) >> FRAC_BITS;
        let mut i = 0;
        while i < EXP_SERIES.len() {
            temp = horner(temp, EXP_SERIES[i], x);
            i += 1;
        }
        result = (result * (temp + Fixed::ONE.0 as i64)) >> FRAC_BITS;

        if negative {
            result = (1i64 << (2 * FRAC_BITS)) / result;
        }
        if result > i32::MAX as i64 {
            return Fixed::MAX;
        }
        Fixed(result as i32)
    }

    /// Natural logarithm.
    ///
    /// `ln(0)` is [`Fixed::NEG_MAX`]; negative inputs return zero.
    pub const fn ln(self) -> Fixed {
        if self.0 == 0 {
            return Fixed::NEG_MAX;
        }
        if self.0 < 0 {
            return Fixed::ZERO;
        }
        let mut x = self.0 as i64;
        let mut result: i64 = 0;
        while x > 2 * Fixed::ONE.0 as i64 {
            result += Fixed::LN_2.0 as i64;
            x /= 2;
        }
        while x < Fixed::ONE.0 as i64 {
            result -= Fixed::LN_2.0 as i64;
            x *= 2;
        }
        x -= Fixed::ONE.0 as i64;

        let mut temp = (Fixed::from_f64(-0.0064535442).0 as i64 * x) >> FRAC_BITS;
        let mut i = 0;
        while i < LN_SERIES.len() {
            temp = horner(temp, LN_SERIES[i], x);
            i += 1;
        }
        Fixed((result + temp) as i32)
    }

    /// Sine of an angle in radians.
    pub const fn sin(self) -> Fixed {
        let mut negative = self.0 < 0;
        let mut x = self.0.unsigned_abs() as i64;
        let pi = Fixed::PI.0 as i64;
        while x > pi {
            x -= pi;
            negative = !negative;
        }
        if x > Fixed::FRAC_PI_2.0 as i64 {
            x = pi - x;
        }
        let x2 = (x * x) >> FRAC_BITS;
        if negative {
            x = -x;
        }

        // the x^9 term rounds to zero at this precision
        let mut temp = 0i64;
        let mut i = 0;
        while i < SIN_SERIES.len() {
            temp = horner(temp, SIN_SERIES[i], x2);
            i += 1;
        }
        temp += Fixed::ONE.0 as i64;
        Fixed(((temp * x) >> FRAC_BITS) as i32)
    }

    /// Arcsine in radians.
    ///
    /// Defined on `[-1, 1]`; anything outside returns zero rather than an
    /// error.
    pub const fn asin(self) -> Fixed {
        if self.0 > Fixed::ONE.0 || self.0 < -Fixed::ONE.0 {
            return Fixed::ZERO;
        }
        let negative = self.0 < 0;
        let x = self.0.unsigned_abs() as i64;

        let mut temp = (Fixed::from_f64(-0.0012624911).0 as i64 * x) >> FRAC_BITS;
        let mut i = 0;
        while i < ASIN_SERIES.len() {
            temp = horner(temp, ASIN_SERIES[i], x);
            i += 1;
        }
        let root = Fixed((Fixed::ONE.0 as i64 - x) as i32).sqrt();
        temp = horner(temp, Fixed::from_f64(1.570796305), root.0 as i64);

        let angle = Fixed::FRAC_PI_2.0 - temp as i32;
        if negative {
            Fixed(-angle)
        } else {
            Fixed(angle)
        }
    }
}

impl Add for Fixed {
    type Output = Fixed;

    #[inline]
    fn add(self, rhs: Fixed) -> Fixed {
        Fixed(narrow(self.0 as i64 + rhs.0 as i64))
    }
}

impl Sub for Fixed {
    type Output = Fixed;

    #[inline]
    fn sub(self, rhs: Fixed) -> Fixed {
        Fixed(narrow(self.0 as i64 - rhs.0 as i64))
    }
}

impl AddAssign for Fixed {
    #[inline]
    fn add_assign(&mut self, rhs: Fixed) {
        *self = *self + rhs;
    }
}

impl SubAssign for Fixed {
    #[inline]
    fn sub_assign(&mut self, rhs: Fixed) {
        *self = *self - rhs;
    }
}

impl Neg for Fixed {
    type Output = Fixed;

    #[inline]
    fn neg(self) -> Fixed {
        Fixed(narrow(-(self.0 as i64)))
    }
}

impl Mul for Fixed {
    type Output = Fixed;

    #[inline]
    fn mul(self, rhs: Fixed) -> Fixed {
        Fixed::mul(self, rhs)
    }
}

impl Div for Fixed {
    type Output = Fixed;

    #[inline]
    fn div(self, rhs: Fixed) -> Fixed {
        Fixed::div(self, rhs)
    }
}

impl fmt::Debug for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fixed({:.6})", self.to_f64())
    }
}

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.to_f64())
    }
}
