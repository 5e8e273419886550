use super::{gaussian, MoveKind, MoveProposal};
use crate::core::forcefield::energy::EnergyModel;
use crate::core::models::conformation::Conformation;
use crate::engine::config::DynamicsSettings;
use crate::engine::metropolis::BOLTZMANN;
use nalgebra::{Point3, Vector3};
use rand::Rng;
use std::borrow::Cow;

/// kcal/mol expressed in amu·Å²/(100 fs)².
pub const KCAL_PER_MOL: f64 = 4.184;
const FS_PER_TIME_UNIT: f64 = 100.0;

/// SHAKE/RATTLE solver for fixed bond lengths.
struct BondConstraints<'a> {
    masses: &'a [f64],
    lengths: &'a [f64],
    tolerance: f64,
    max_iterations: usize,
}

impl BondConstraints<'_> {
    #[inline]
    fn reduced(&self, bond: usize) -> f64 {
        1.0 / self.masses[bond] + 1.0 / self.masses[bond + 1]
    }

    /// Pulls `q` back onto the bond lengths along the bond vectors of `reference`.
    fn shake(
        &self,
        reference: &[Point3<f64>],
        q: &mut [Point3<f64>],
        v: &mut [Vector3<f64>],
        dt: f64,
    ) -> bool {
        for _ in 0..self.max_iterations {
            let mut converged = true;
            for k in 0..self.lengths.len() {
                let s = q[k + 1] - q[k];
                let target = self.lengths[k] * self.lengths[k];
                let diff = target - s.norm_squared();
                if diff.abs() <= self.tolerance * target {
                    continue;
                }
                converged = false;
                let r = reference[k + 1] - reference[k];
                let denom = 2.0 * s.dot(&r) * self.reduced(k);
                if denom.abs() < 1e-12 {
                    return false;
                }
                let g = diff / denom;
                let (inv_a, inv_b) = (1.0 / self.masses[k], 1.0 / self.masses[k + 1]);
                q[k] -= r * (g * inv_a);
                q[k + 1] += r * (g * inv_b);
                v[k] -= r * (g * inv_a / dt);
                v[k + 1] += r * (g * inv_b / dt);
            }
            if converged {
                return true;
            }
        }
        false
    }

    /// Removes every velocity component that would stretch a bond.
    fn rattle(&self, q: &[Point3<f64>], v: &mut [Vector3<f64>]) -> bool {
        for _ in 0..self.max_iterations {
            let mut converged = true;
            for k in 0..self.lengths.len() {
                let r = q[k + 1] - q[k];
                let r2 = r.norm_squared();
                let stretch = (v[k + 1] - v[k]).dot(&r);
                if stretch.abs() <= self.tolerance * r2 {
                    continue;
                }
                converged = false;
                let g = stretch / (r2 * self.reduced(k));
                v[k] += r * (g / self.masses[k]);
                v[k + 1] -= r * (g / self.masses[k + 1]);
            }
            if converged {
                return true;
            }
        }
        false
    }

    /// `ln det G` of the tridiagonal constraint metric `G = ∇σ M⁻¹ ∇σᵀ`.
    fn log_det_metric(&self, q: &[Point3<f64>]) -> f64 {
        let units: Vec<Vector3<f64>> = q.windows(2).map(|w| (w[1] - w[0]).normalize()).collect();
        let mut log_det = 0.0;
        let mut pivot = 0.0;
        for k in 0..units.len() {
            let diagonal = self.reduced(k);
            pivot = if k == 0 {
                diagonal
            } else {
                let coupling = units[k - 1].dot(&units[k]) / self.masses[k];
                diagonal - coupling * coupling / pivot
            };
            log_det += pivot.ln();
        }
        log_det
    }
}

fn kinetic_energy(masses: &[f64], v: &[Vector3<f64>]) -> f64 {
    0.5 / KCAL_PER_MOL
        * masses
            .iter()
            .zip(v)
            .map(|(m, vi)| m * vi.norm_squared())
            .sum::<f64>()
}

fn accelerations(model: &EnergyModel, conformation: &Conformation, masses: &[f64]) -> Vec<Vector3<f64>> {
    model
        .forces(conformation)
        .into_iter()
        .zip(masses)
        .map(|(f, m)| f * (KCAL_PER_MOL / m))
        .collect()
}

/// Velocity-Verlet steps under bond constraints. `None` when the constraints cannot be met.
fn integrate(
    model: &EnergyModel,
    constraints: &BondConstraints<'_>,
    start: &Conformation,
    velocities: &mut [Vector3<f64>],
    settings: &DynamicsSettings,
) -> Option<Conformation> {
    let masses = constraints.masses;
    let dt = settings.time_step_fs / FS_PER_TIME_UNIT;
    let mut conf = start.clone();
    let mut acc = accelerations(model, &conf, masses);
    for _ in 0..settings.steps {
        let reference = conf.positions().to_vec();
        {
            let q = conf.positions_mut();
            for ((qi, vi), ai) in q.iter_mut().zip(velocities.iter_mut()).zip(&acc) {
                *vi += ai * (0.5 * dt);
                *qi += *vi * dt;
            }
            if !constraints.shake(&reference, q, velocities, dt) {
                return None;
            }
        }
        acc = accelerations(model, &conf, masses);
        for (vi, ai) in velocities.iter_mut().zip(&acc) {
            *vi += ai * (0.5 * dt);
        }
        if !constraints.rattle(conf.positions(), velocities) {
            return None;
        }
        if !conf.is_finite() || velocities.iter().any(|v| !v.iter().all(|c| c.is_finite())) {
            return None;
        }
    }
    Some(conf)
}

/// Short constant-energy trajectory from Maxwell-Boltzmann velocities.
///
/// The proposal carries the kinetic energy change plus the Fixman term
/// `kT/2 · Δ ln det G`, which makes the constrained dynamics target the same rigid-bond
/// measure as the internal-coordinate moves.
pub fn trajectory<R: Rng + ?Sized>(
    model: &EnergyModel,
    current: &Conformation,
    settings: &DynamicsSettings,
    temperature: f64,
    rng: &mut R,
) -> MoveProposal {
    let params = model.params();
    let masses = params.masses();
    let lengths: Cow<'_, [f64]> = match params.bond_lengths() {
        Some(lengths) => Cow::Borrowed(lengths),
        None => Cow::Owned(current.bond_lengths()),
    };
    let constraints = BondConstraints {
        masses,
        lengths: &lengths,
        tolerance: settings.constraint_tolerance,
        max_iterations: settings.max_constraint_iterations,
    };

    let kt = BOLTZMANN * temperature;
    let mut velocities: Vec<Vector3<f64>> = masses
        .iter()
        .map(|m| {
            let sigma = (kt * KCAL_PER_MOL / m).sqrt();
            Vector3::new(gaussian(rng, sigma), gaussian(rng, sigma), gaussian(rng, sigma))
        })
        .collect();
    if !constraints.rattle(current.positions(), &mut velocities) {
        return MoveProposal::unclosable(MoveKind::Dynamics);
    }
    let kinetic_before = kinetic_energy(masses, &velocities);
    let metric_before = constraints.log_det_metric(current.positions());

    let Some(next) = integrate(model, &constraints, current, &mut velocities, settings) else {
        return MoveProposal::unclosable(MoveKind::Dynamics);
    };
    let kinetic_after = kinetic_energy(masses, &velocities);
    let metric_after = constraints.log_det_metric(next.positions());

    let n = current.len();
    let mut proposal = MoveProposal::new(
        MoveKind::Dynamics,
        next,
        (0..n - 2).collect(),
        (0..n - 3).collect(),
        1.0,
    );
    proposal.hamiltonian_shift =
        (kinetic_after - kinetic_before) + 0.5 * kt * (metric_after - metric_before);
    proposal.velocities = Some(velocities.iter().map(|v| [v.x, v.y, v.z]).collect());
    proposal
}
