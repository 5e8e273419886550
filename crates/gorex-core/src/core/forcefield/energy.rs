use super::params::{PairParam, ParameterError, ParameterTable};
use super::potentials::{self, PairForm};
use super::restraint::Restraint;
use super::term::EnergyComponents;
use crate::core::models::conformation::Conformation;
use crate::core::models::surface::SurfaceLattice;
use crate::core::utils::geometry;
use nalgebra::{Point3, Vector3};
use std::sync::Arc;

/// Native contact cutoff as a multiple of the contact radius, squared.
pub const NATIVE_CONTACT_FACTOR_SQ: f64 = 1.44;

#[derive(Debug, Clone)]
struct SurfaceField {
    lattice: Arc<SurfaceLattice>,
    scale: f64,
}

/// Evaluates the Go-model energy of a conformation against one parameter table.
///
/// The model is cheap to clone; parameters and the surface lattice are shared.
#[derive(Debug, Clone)]
pub struct EnergyModel {
    params: Arc<ParameterTable>,
    native_form: PairForm,
    nonnative_form: PairForm,
    surface: Option<SurfaceField>,
    restraint: Option<Restraint>,
}

impl EnergyModel {
    pub fn new(params: Arc<ParameterTable>, native_form: PairForm, nonnative_form: PairForm) -> Self {
        Self {
            params,
            native_form,
            nonnative_form,
            surface: None,
            restraint: None,
        }
    }

    pub fn with_surface(
        mut self,
        lattice: Arc<SurfaceLattice>,
        scale: f64,
    ) -> Result<Self, ParameterError> {
        if self.params.surface_terms().is_none() {
            return Err(ParameterError::MissingSection("surface"));
        }
        self.surface = Some(SurfaceField { lattice, scale });
        Ok(self)
    }

    pub fn with_restraint(mut self, restraint: Option<Restraint>) -> Self {
        self.restraint = restraint;
        self
    }

    #[inline]
    pub fn params(&self) -> &ParameterTable {
        &self.params
    }

    #[inline]
    pub fn shared_params(&self) -> &Arc<ParameterTable> {
        &self.params
    }

    #[inline]
    pub fn surface(&self) -> Option<&SurfaceLattice> {
        self.surface.as_ref().map(|s| s.lattice.as_ref())
    }

    #[inline]
    pub fn restraint(&self) -> Option<&Restraint> {
        self.restraint.as_ref()
    }

    pub fn full_energy(&self, conformation: &Conformation) -> EnergyComponents {
        let angle = (0..self.params.angle_count())
            .map(|i| self.angle_energy(conformation, i))
            .collect();
        let torsion = (0..self.params.torsion_count())
            .map(|i| self.torsion_energy(conformation, i))
            .collect();
        EnergyComponents {
            angle,
            torsion,
            nonbonded: self.nonbonded_energy(conformation),
            surface: self.surface_energy(conformation),
            restraint: self.restraint_energy(conformation),
        }
    }

    /// Updates `old` for a move from `old_conf` to `new_conf`.
    ///
    /// Only the listed angle and torsion terms are recomputed. Pair and surface sums are
    /// corrected by the contributions of beads whose positions changed.
    pub fn incremental_energy(
        &self,
        old: &EnergyComponents,
        old_conf: &Conformation,
        new_conf: &Conformation,
        changed_angles: &[usize],
        changed_torsions: &[usize],
    ) -> EnergyComponents {
        let mut energy = old.clone();
        for &i in changed_angles {
            energy.angle[i] = self.angle_energy(new_conf, i);
        }
        for &i in changed_torsions {
            energy.torsion[i] = self.torsion_energy(new_conf, i);
        }

        let moved = new_conf.moved_beads(old_conf);
        if moved.is_empty() {
            return energy;
        }
        let whole_chain = moved.len() == new_conf.len();

        energy.nonbonded = if whole_chain || !old.nonbonded.is_finite() {
            self.nonbonded_energy(new_conf)
        } else {
            old.nonbonded + self.nonbonded_delta(old_conf, new_conf, &moved)
        };

        energy.surface = match (&self.surface, old.surface) {
            (Some(_), Some(previous)) if !whole_chain && previous.is_finite() => {
                let delta: f64 = moved
                    .iter()
                    .map(|&i| self.surface_bead_energy(new_conf, i) - self.surface_bead_energy(old_conf, i))
                    .sum();
                Some(previous + delta)
            }
            _ => self.surface_energy(new_conf),
        };
        energy.restraint = self.restraint_energy(new_conf);
        energy
    }

    pub fn angle_energy(&self, conformation: &Conformation, index: usize) -> f64 {
        let term = self.params.angle(index);
        potentials::harmonic(conformation.angle(index), term.theta0, term.force_constant).0
    }

    pub fn torsion_energy(&self, conformation: &Conformation, index: usize) -> f64 {
        potentials::fourier_series(conformation.torsion(index), self.params.torsion(index)).0
    }

    #[inline]
    fn pair_energy(&self, pair: &PairParam, r2: f64) -> f64 {
        match *pair {
            PairParam::Native { depth, sigma } => self.native_form.energy(r2, sigma, depth),
            PairParam::NonNative { sigma } => {
                self.nonnative_form
                    .energy(r2, sigma, self.params.nonnative_depth())
            }
        }
    }

    #[inline]
    fn pair_energy_and_slope(&self, pair: &PairParam, r2: f64) -> (f64, f64) {
        match *pair {
            PairParam::Native { depth, sigma } => self.native_form.energy_and_slope(r2, sigma, depth),
            PairParam::NonNative { sigma } => {
                self.nonnative_form
                    .energy_and_slope(r2, sigma, self.params.nonnative_depth())
            }
        }
    }

    pub fn nonbonded_energy(&self, conformation: &Conformation) -> f64 {
        let p = conformation.positions();
        let n = p.len();
        let mut k = 0;
        let mut total = 0.0;
        for i in 0..n {
            for j in (i + 3)..n {
                total += self.pair_energy(self.params.pair(k), (p[i] - p[j]).norm_squared());
                k += 1;
            }
        }
        total
    }

    fn nonbonded_delta(&self, old_conf: &Conformation, new_conf: &Conformation, moved: &[usize]) -> f64 {
        let n = new_conf.len();
        let mut is_moved = vec![false; n];
        for &i in moved {
            is_moved[i] = true;
        }
        let (old_p, new_p) = (old_conf.positions(), new_conf.positions());
        let mut delta = 0.0;
        for &i in moved {
            for j in 0..n {
                if is_moved[j] && j < i {
                    continue;
                }
                let Some(k) = self.params.pair_index(i, j) else {
                    continue;
                };
                let pair = self.params.pair(k);
                delta += self.pair_energy(pair, (new_p[i] - new_p[j]).norm_squared())
                    - self.pair_energy(pair, (old_p[i] - old_p[j]).norm_squared());
            }
        }
        delta
    }

    pub fn surface_energy(&self, conformation: &Conformation) -> Option<f64> {
        self.surface.as_ref()?;
        Some(
            (0..conformation.len())
                .map(|i| self.surface_bead_energy(conformation, i))
                .sum(),
        )
    }

    fn surface_bead_energy(&self, conformation: &Conformation, bead: usize) -> f64 {
        let (Some(field), Some(terms)) = (&self.surface, self.params.surface_terms()) else {
            return 0.0;
        };
        let term = terms[bead];
        let depth = term.depth * field.scale;
        let p = conformation.position(bead);
        field
            .lattice
            .sites()
            .iter()
            .map(|site| PairForm::TwelveTenSix.energy((p - site).norm_squared(), term.radius, depth))
            .sum()
    }

    /// Value of the restrained coordinate, or `None` without a restraint.
    pub fn restraint_coordinate(&self, conformation: &Conformation) -> Option<f64> {
        match self.restraint? {
            Restraint::ZPin { .. } => Some(conformation.center_of_mass(self.params.masses()).z),
            Restraint::QPin { .. } => Some(self.native_contacts(conformation) as f64),
        }
    }

    pub fn restraint_energy(&self, conformation: &Conformation) -> Option<f64> {
        let restraint = self.restraint?;
        self.restraint_coordinate(conformation)
            .map(|value| restraint.energy(value))
    }

    /// Number of native pairs closer than 1.2 times their contact radius.
    pub fn native_contacts(&self, conformation: &Conformation) -> usize {
        let p = conformation.positions();
        self.params
            .native_pairs()
            .iter()
            .filter(|&&(i, j, k)| match *self.params.pair(k) {
                PairParam::Native { sigma, .. } => {
                    (p[i] - p[j]).norm_squared() < NATIVE_CONTACT_FACTOR_SQ * sigma * sigma
                }
                PairParam::NonNative { .. } => false,
            })
            .count()
    }

    /// Negative gradient of the total potential energy with respect to every bead.
    pub fn forces(&self, conformation: &Conformation) -> Vec<Vector3<f64>> {
        let p = conformation.positions();
        let n = p.len();
        let mut grad = vec![Vector3::zeros(); n];

        for i in 0..self.params.angle_count() {
            let term = self.params.angle(i);
            let theta = geometry::bond_angle(&p[i], &p[i + 1], &p[i + 2]);
            let (_, slope) = potentials::harmonic(theta, term.theta0, term.force_constant);
            let g = geometry::bond_angle_gradient(&p[i], &p[i + 1], &p[i + 2]);
            for (offset, gk) in g.iter().enumerate() {
                grad[i + offset] += gk * slope;
            }
        }

        for i in 0..self.params.torsion_count() {
            let phi = geometry::dihedral(&p[i], &p[i + 1], &p[i + 2], &p[i + 3]);
            let (_, slope) = potentials::fourier_series(phi, self.params.torsion(i));
            let g = geometry::dihedral_gradient(&p[i], &p[i + 1], &p[i + 2], &p[i + 3]);
            for (offset, gk) in g.iter().enumerate() {
                grad[i + offset] += gk * slope;
            }
        }

        let mut k = 0;
        for i in 0..n {
            for j in (i + 3)..n {
                let d = p[i] - p[j];
                let (_, slope) = self.pair_energy_and_slope(self.params.pair(k), d.norm_squared());
                let g = d * (2.0 * slope);
                grad[i] += g;
                grad[j] -= g;
                k += 1;
            }
        }

        if let (Some(field), Some(terms)) = (&self.surface, self.params.surface_terms()) {
            for (i, point) in p.iter().enumerate() {
                let depth = terms[i].depth * field.scale;
                grad[i] += surface_gradient(point, field.lattice.sites(), terms[i].radius, depth);
            }
        }

        if let Some(pin @ Restraint::ZPin { .. }) = self.restraint {
            let masses = self.params.masses();
            let total_mass: f64 = masses.iter().sum();
            let slope = pin.slope(conformation.center_of_mass(masses).z);
            for (g, m) in grad.iter_mut().zip(masses) {
                g.z += slope * m / total_mass;
            }
        }

        grad.into_iter().map(|g| -g).collect()
    }
}

fn surface_gradient(point: &Point3<f64>, sites: &[Point3<f64>], radius: f64, depth: f64) -> Vector3<f64> {
    sites.iter().fold(Vector3::zeros(), |acc, site| {
        let d = point - site;
        let (_, slope) = PairForm::TwelveTenSix.energy_and_slope(d.norm_squared(), radius, depth);
        acc + d * (2.0 * slope)
    })
}
