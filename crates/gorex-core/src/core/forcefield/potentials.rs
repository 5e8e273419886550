use serde::{Deserialize, Serialize};

/// Distance-dependent pair forms, all written in terms of `s = σ²/r²` so that no square
/// roots are taken in the inner loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PairForm {
    /// `ε(13 s⁶ − 18 s⁵ + 4 s³)`: well of depth `ε` at `r = σ`.
    TwelveTenSix,
    /// `ε(s⁶ − 2 s³)`: well of depth `ε` at `r = σ`.
    TwelveSix,
    /// `ε s⁶`: purely repulsive wall.
    Repulsive,
}

impl PairForm {
    /// Energy of one pair at squared distance `r2`.
    #[inline]
    pub fn energy(self, r2: f64, sigma: f64, depth: f64) -> f64 {
        if r2 <= 0.0 {
            return f64::INFINITY;
        }
        let s = sigma * sigma / r2;
        let energy = match self {
            PairForm::TwelveTenSix => go_12_10_6(s, depth),
            PairForm::TwelveSix => lennard_jones_12_6(s, depth),
            PairForm::Repulsive => repulsive_12(s, depth),
        };
        if energy.is_nan() { f64::INFINITY } else { energy }
    }

    /// Energy and its derivative with respect to `r²`.
    #[inline]
    pub fn energy_and_slope(self, r2: f64, sigma: f64, depth: f64) -> (f64, f64) {
        if r2 <= 0.0 {
            return (f64::INFINITY, 0.0);
        }
        let s = sigma * sigma / r2;
        let (energy, de_ds) = match self {
            PairForm::TwelveTenSix => {
                let s2 = s * s;
                let s3 = s2 * s;
                let s5 = s3 * s2;
                (
                    depth * (13.0 * s5 * s - 18.0 * s5 + 4.0 * s3),
                    depth * (78.0 * s5 - 90.0 * s2 * s2 + 12.0 * s2),
                )
            }
            PairForm::TwelveSix => {
                let s2 = s * s;
                let s3 = s2 * s;
                (
                    depth * (s3 * s3 - 2.0 * s3),
                    depth * (6.0 * s3 * s2 - 6.0 * s2),
                )
            }
            PairForm::Repulsive => {
                let s3 = s * s * s;
                (depth * s3 * s3, 6.0 * depth * s3 * s * s)
            }
        };
        if energy.is_nan() {
            return (f64::INFINITY, 0.0);
        }
        (energy, -de_ds * s / r2)
    }
}

#[inline]
pub fn go_12_10_6(s: f64, depth: f64) -> f64 {
    let s3 = s * s * s;
    depth * (13.0 * s3 * s3 - 18.0 * s3 * s * s + 4.0 * s3)
}

#[inline]
pub fn lennard_jones_12_6(s: f64, depth: f64) -> f64 {
    let s3 = s * s * s;
    depth * (s3 * s3 - 2.0 * s3)
}

#[inline]
pub fn repulsive_12(s: f64, depth: f64) -> f64 {
    let s3 = s * s * s;
    depth * s3 * s3
}

/// `k/2 (θ − θ₀)²` and its derivative with respect to `θ`.
#[inline]
pub fn harmonic(value: f64, target: f64, force_constant: f64) -> (f64, f64) {
    let delta = value - target;
    (0.5 * force_constant * delta * delta, force_constant * delta)
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FourierTerm {
    pub amplitude: f64,
    pub periodicity: f64,
    pub phase: f64,
}

/// `Σ A(1 + cos(nφ − δ))` and its derivative with respect to `φ`.
#[inline]
pub fn fourier_series(phi: f64, terms: &[FourierTerm]) -> (f64, f64) {
    terms.iter().fold((0.0, 0.0), |(energy, slope), term| {
        let arg = term.periodicity * phi - term.phase;
        (
            energy + term.amplitude * (1.0 + arg.cos()),
            slope - term.amplitude * term.periodicity * arg.sin(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    const TOLERANCE: f64 = 1e-9;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < TOLERANCE
    }

    #[test]
    fn twelve_ten_six_at_sigma_returns_negative_depth() {
        let energy = PairForm::TwelveTenSix.energy(4.0, 2.0, 1.5);
        assert!(f64_approx_equal(energy, -1.5));
    }

    #[test]
    fn twelve_six_at_sigma_returns_negative_depth() {
        let energy = PairForm::TwelveSix.energy(9.0, 3.0, 0.7);
        assert!(f64_approx_equal(energy, -0.7));
    }

    #[test]
    fn repulsive_form_is_positive_and_decreasing() {
        let near = PairForm::Repulsive.energy(9.0, 4.0, 0.1);
        let far = PairForm::Repulsive.energy(25.0, 4.0, 0.1);
        assert!(near > far && far > 0.0);
    }

    #[test]
    fn zero_distance_returns_positive_infinity() {
        for form in [PairForm::TwelveTenSix, PairForm::TwelveSix, PairForm::Repulsive] {
            assert_eq!(form.energy(0.0, 3.0, 1.0), f64::INFINITY);
        }
    }

    #[test]
    fn well_minimum_has_zero_slope() {
        for form in [PairForm::TwelveTenSix, PairForm::TwelveSix] {
            let (_, slope) = form.energy_and_slope(16.0, 4.0, 2.0);
            assert!(slope.abs() < TOLERANCE);
        }
    }

    #[test]
    fn slope_matches_finite_difference_in_r_squared() {
        let h = 1e-6;
        for form in [PairForm::TwelveTenSix, PairForm::TwelveSix, PairForm::Repulsive] {
            let r2 = 21.0;
            let (_, slope) = form.energy_and_slope(r2, 4.5, 1.2);
            let numeric = (form.energy(r2 + h, 4.5, 1.2) - form.energy(r2 - h, 4.5, 1.2)) / (2.0 * h);
            assert!((slope - numeric).abs() < 1e-6, "{form:?}: {slope} vs {numeric}");
        }
    }

    #[test]
    fn harmonic_is_zero_at_target() {
        let (energy, slope) = harmonic(1.9, 1.9, 20.0);
        assert!(f64_approx_equal(energy, 0.0));
        assert!(f64_approx_equal(slope, 0.0));
        let (energy, _) = harmonic(2.0, 1.9, 20.0);
        assert!(f64_approx_equal(energy, 0.5 * 20.0 * 0.01));
    }

    #[test]
    fn fourier_series_sums_every_term() {
        let terms = [
            FourierTerm { amplitude: 1.0, periodicity: 1.0, phase: 0.0 },
            FourierTerm { amplitude: 0.5, periodicity: 3.0, phase: PI },
        ];
        let (energy, _) = fourier_series(0.0, &terms);
        assert!(f64_approx_equal(energy, 2.0 + 0.0));
    }
}
