//! Q20 arithmetic properties

use esp_audio_link::fixed::Fixed;
use proptest::prelude::*;

fn fixed_in(lo: f64, hi: f64) -> impl Strategy<Value = Fixed> {
    (lo..hi).prop_map(Fixed::from_f64)
}

proptest! {
    #[test]
    fn one_is_the_multiplicative_identity(raw in any::<i32>()) {
        let x = Fixed::from_raw(raw);
        prop_assert_eq!(x * Fixed::ONE, x);
    }

    #[test]
    fn division_undoes_multiplication(a in fixed_in(-40.0, 40.0), b in fixed_in(0.5, 40.0)) {
        let back = (a * b) / b;
        prop_assert!((back.to_f64() - a.to_f64()).abs() < 1e-3, "{} -> {}", a, back);
    }

    #[test]
    fn sqrt_of_square(x in fixed_in(0.0, 40.0)) {
        let back = (x * x).sqrt();
        prop_assert!((back.to_f64() - x.to_f64()).abs() < 2e-3, "{} -> {}", x, back);
    }

    #[test]
    fn exp_inverts_ln(x in fixed_in(0.05, 50.0)) {
        let back = x.ln().exp().to_f64();
        let v = x.to_f64();
        prop_assert!((back - v).abs() <= v * 0.02 + 1e-3, "{} -> {}", v, back);
    }

    #[test]
    fn pcm_survives_conversion(sample in any::<i16>()) {
        prop_assert_eq!(Fixed::from_pcm(sample).to_pcm(), sample);
    }
}

#[test]
fn test_division_by_zero_keeps_sign() {
    assert_eq!(Fixed::from_int(5).div(Fixed::ZERO), Fixed::MAX);
    assert_eq!(Fixed::from_int(-5).div(Fixed::ZERO), Fixed::NEG_MAX);
    assert_eq!(Fixed::from_int(5).div_int(0), Fixed::MAX);
}

#[test]
fn test_log_domain_edges() {
    assert_eq!(Fixed::ZERO.ln(), Fixed::NEG_MAX);
    assert_eq!(Fixed::from_int(-30).exp(), Fixed::ZERO);
    assert_eq!(Fixed::from_int(30).exp(), Fixed::MAX);
}
