use serde::{Deserialize, Serialize};

/// Harmonic umbrella on a collective coordinate of the chain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Restraint {
    /// Pins the centre-of-mass height above the surface plane.
    ZPin { spring: f64, target: f64 },
    /// Pins the native-contact count.
    QPin { spring: f64, target: f64 },
}

impl Restraint {
    #[inline]
    pub fn spring(&self) -> f64 {
        match *self {
            Restraint::ZPin { spring, .. } | Restraint::QPin { spring, .. } => spring,
        }
    }

    #[inline]
    pub fn target(&self) -> f64 {
        match *self {
            Restraint::ZPin { target, .. } | Restraint::QPin { target, .. } => target,
        }
    }

    /// `k/2 (x − x₀)²` for the restrained coordinate value `x`.
    #[inline]
    pub fn energy(&self, value: f64) -> f64 {
        let delta = value - self.target();
        0.5 * self.spring() * delta * delta
    }

    /// `dE/dx` for the restrained coordinate value `x`.
    #[inline]
    pub fn slope(&self, value: f64) -> f64 {
        self.spring() * (value - self.target())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn energy_is_zero_at_target() {
        let pin = Restraint::ZPin {
            spring: 2.0,
            target: 15.0,
        };
        assert_eq!(pin.energy(15.0), 0.0);
        assert_eq!(pin.slope(15.0), 0.0);
    }

    #[test]
    fn energy_grows_quadratically_away_from_target() {
        let pin = Restraint::QPin {
            spring: 0.5,
            target: 10.0,
        };
        assert_eq!(pin.energy(14.0), 0.5 * 0.5 * 16.0);
        assert_eq!(pin.slope(6.0), -2.0);
    }
}
