use serde::{Deserialize, Serialize};

/// Cached per-term energies of one conformation, in kcal/mol.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EnergyComponents {
    pub angle: Vec<f64>,
    pub torsion: Vec<f64>,
    pub nonbonded: f64,
    pub surface: Option<f64>,
    pub restraint: Option<f64>,
}

impl EnergyComponents {
    pub fn new(angle: Vec<f64>, torsion: Vec<f64>, nonbonded: f64) -> Self {
        Self {
            angle,
            torsion,
            nonbonded,
            surface: None,
            restraint: None,
        }
    }

    #[inline]
    pub fn angle_total(&self) -> f64 {
        self.angle.iter().sum()
    }

    #[inline]
    pub fn torsion_total(&self) -> f64 {
        self.torsion.iter().sum()
    }

    /// Energy of the chain itself, without surface or restraint terms.
    #[inline]
    pub fn internal(&self) -> f64 {
        self.angle_total() + self.torsion_total() + self.nonbonded
    }

    #[inline]
    pub fn total(&self) -> f64 {
        self.internal() + self.surface.unwrap_or(0.0) + self.restraint.unwrap_or(0.0)
    }

    /// Largest absolute difference over every term.
    pub fn max_deviation(&self, other: &EnergyComponents) -> f64 {
        if self.angle.len() != other.angle.len() || self.torsion.len() != other.torsion.len() {
            return f64::INFINITY;
        }
        let optional = |a: Option<f64>, b: Option<f64>| match (a, b) {
            (Some(a), Some(b)) => deviation(a, b),
            (None, None) => 0.0,
            _ => f64::INFINITY,
        };
        self.angle
            .iter()
            .zip(&other.angle)
            .chain(self.torsion.iter().zip(&other.torsion))
            .map(|(a, b)| deviation(*a, *b))
            .chain([
                deviation(self.nonbonded, other.nonbonded),
                optional(self.surface, other.surface),
                optional(self.restraint, other.restraint),
            ])
            .fold(0.0, f64::max)
    }
}

fn deviation(a: f64, b: f64) -> f64 {
    if a == b { 0.0 } else { (a - b).abs() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_returns_sum_of_all_terms() {
        let mut energy = EnergyComponents::new(vec![1.0, 0.5], vec![0.25], -3.0);
        assert_eq!(energy.total(), -1.25);
        energy.surface = Some(-2.0);
        energy.restraint = Some(0.5);
        assert_eq!(energy.total(), -2.75);
        assert_eq!(energy.internal(), -1.25);
    }

    #[test]
    fn max_deviation_reports_largest_term_difference() {
        let a = EnergyComponents::new(vec![1.0, 2.0], vec![0.0], 5.0);
        let mut b = a.clone();
        b.angle[1] = 2.5;
        b.nonbonded = 5.1;
        assert!((a.max_deviation(&b) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn max_deviation_is_infinite_when_shapes_differ() {
        let a = EnergyComponents::new(vec![1.0], vec![0.0], 5.0);
        let mut b = a.clone();
        b.surface = Some(0.0);
        assert_eq!(a.max_deviation(&b), f64::INFINITY);
        assert_eq!(a.max_deviation(&EnergyComponents::default()), f64::INFINITY);
    }

    #[test]
    fn default_has_no_optional_terms() {
        let energy = EnergyComponents::default();
        assert!(energy.surface.is_none() && energy.restraint.is_none());
        assert_eq!(energy.total(), 0.0);
    }
}
