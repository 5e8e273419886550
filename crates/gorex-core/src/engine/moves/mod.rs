//! Monte Carlo move proposals.
//!
//! Every move returns a [`MoveProposal`] that lists which angle and torsion terms it may
//! have changed and the Jacobian that restores detailed balance for moves parameterised in
//! internal coordinates. Concerted moves that cannot close the chain return an unclosable
//! proposal instead of an error.

mod dynamics;
mod internal;
mod parrot;
mod rigid;

use super::config::{ConfigError, DynamicsSettings, MoveFrequencies, ScaledSteps};
use crate::core::forcefield::energy::EnergyModel;
use crate::core::models::conformation::Conformation;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MoveKind {
    Translation,
    Rotation,
    Bend,
    Torsion,
    Crankshaft,
    Parrot,
    Dynamics,
}

impl MoveKind {
    pub const COUNT: usize = 7;
    pub const ALL: [MoveKind; Self::COUNT] = [
        MoveKind::Translation,
        MoveKind::Rotation,
        MoveKind::Bend,
        MoveKind::Torsion,
        MoveKind::Crankshaft,
        MoveKind::Parrot,
        MoveKind::Dynamics,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            MoveKind::Translation => "translation",
            MoveKind::Rotation => "rotation",
            MoveKind::Bend => "bend",
            MoveKind::Torsion => "torsion",
            MoveKind::Crankshaft => "crankshaft",
            MoveKind::Parrot => "parrot",
            MoveKind::Dynamics => "dynamics",
        }
    }
}

impl fmt::Display for MoveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MoveProposal {
    pub kind: MoveKind,
    /// `None` exactly when the move could not be closed.
    pub conformation: Option<Conformation>,
    pub changed_angles: Vec<usize>,
    pub changed_torsions: Vec<usize>,
    pub jacobian: f64,
    /// Energy change outside the potential, added to ΔE in the acceptance test.
    pub hamiltonian_shift: f64,
    /// Velocities at the end of a dynamics trajectory.
    pub velocities: Option<Vec<[f64; 3]>>,
}

impl MoveProposal {
    pub fn new(
        kind: MoveKind,
        conformation: Conformation,
        changed_angles: Vec<usize>,
        changed_torsions: Vec<usize>,
        jacobian: f64,
    ) -> Self {
        Self {
            kind,
            conformation: Some(conformation),
            changed_angles,
            changed_torsions,
            jacobian,
            hamiltonian_shift: 0.0,
            velocities: None,
        }
    }

    pub fn unclosable(kind: MoveKind) -> Self {
        Self {
            kind,
            conformation: None,
            changed_angles: Vec::new(),
            changed_torsions: Vec::new(),
            jacobian: 0.0,
            hamiltonian_shift: 0.0,
            velocities: None,
        }
    }

    #[inline]
    pub fn closable(&self) -> bool {
        self.conformation.is_some()
    }
}

/// Precomputed weighted dispatch over move kinds.
#[derive(Debug, Clone)]
pub struct MoveTable {
    distribution: WeightedIndex<f64>,
}

impl MoveTable {
    pub fn new(frequencies: &MoveFrequencies) -> Result<Self, ConfigError> {
        let distribution =
            WeightedIndex::new(frequencies.weights()).map_err(|e| ConfigError::Invalid {
                parameter: "move_frequencies",
                reason: e.to_string(),
            })?;
        Ok(Self { distribution })
    }

    #[inline]
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> MoveKind {
        MoveKind::ALL[self.distribution.sample(rng)]
    }
}

/// Proposes moves for one replica at its temperature.
pub struct MoveGenerator<'a> {
    model: &'a EnergyModel,
    steps: ScaledSteps,
    dynamics: &'a DynamicsSettings,
    temperature: f64,
}

impl<'a> MoveGenerator<'a> {
    pub fn new(
        model: &'a EnergyModel,
        steps: ScaledSteps,
        dynamics: &'a DynamicsSettings,
        temperature: f64,
    ) -> Self {
        Self {
            model,
            steps,
            dynamics,
            temperature,
        }
    }

    pub fn propose<R: Rng + ?Sized>(
        &self,
        kind: MoveKind,
        current: &Conformation,
        rng: &mut R,
    ) -> MoveProposal {
        let mut proposal = match kind {
            MoveKind::Translation => rigid::translation(current, self.steps.translation, rng),
            MoveKind::Rotation => {
                rigid::rotation(current, self.model.params().masses(), self.steps.rotation, rng)
            }
            MoveKind::Bend => internal::bend(current, self.steps.bend, rng),
            MoveKind::Torsion => internal::axis_torsion(current, self.steps.torsion, rng),
            MoveKind::Crankshaft => internal::crankshaft(current, self.steps.crankshaft, rng),
            MoveKind::Parrot => parrot::parrot(current, self.steps.parrot, rng),
            MoveKind::Dynamics => {
                dynamics::trajectory(self.model, current, self.dynamics, self.temperature, rng)
            }
        };
        if let (Some(surface), Some(conf)) = (self.model.surface(), proposal.conformation.as_mut()) {
            surface.fold(conf);
        }
        proposal
    }
}

#[inline]
pub(crate) fn gaussian<R: Rng + ?Sized>(rng: &mut R, sigma: f64) -> f64 {
    let z: f64 = rng.sample(StandardNormal);
    z * sigma
}

/// Angle and torsion indices whose beads include any of `beads`.
pub(crate) fn terms_touching(beads: &[usize], bead_count: usize) -> (Vec<usize>, Vec<usize>) {
    let angle_count = bead_count.saturating_sub(2);
    let torsion_count = bead_count.saturating_sub(3);
    let mut angles = Vec::new();
    let mut torsions = Vec::new();
    for &b in beads {
        angles.extend(b.saturating_sub(2)..=b.min(angle_count.saturating_sub(1)));
        torsions.extend(b.saturating_sub(3)..=b.min(torsion_count.saturating_sub(1)));
    }
    angles.retain(|&i| i < angle_count);
    torsions.retain(|&i| i < torsion_count);
    angles.sort_unstable();
    angles.dedup();
    torsions.sort_unstable();
    torsions.dedup();
    (angles, torsions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::energy::tests::{helix, helix_model};
    use crate::engine::config::StepSizes;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn move_table_never_samples_zero_weight_kinds() {
        let table = MoveTable::new(&MoveFrequencies::default()).unwrap();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(11);
        let mut counts = [0usize; MoveKind::COUNT];
        for _ in 0..5000 {
            counts[table.sample(&mut rng).index()] += 1;
        }
        assert_eq!(counts[MoveKind::Translation.index()], 0);
        assert_eq!(counts[MoveKind::Rotation.index()], 0);
        assert!(counts[MoveKind::Dynamics.index()] > counts[MoveKind::Bend.index()]);
    }

    #[test]
    fn move_table_rejects_all_zero_weights() {
        let zero = MoveFrequencies {
            translation: 0.0,
            rotation: 0.0,
            bend: 0.0,
            torsion: 0.0,
            crankshaft: 0.0,
            parrot: 0.0,
            dynamics: 0.0,
        };
        assert!(MoveTable::new(&zero).is_err());
    }

    #[test]
    fn terms_touching_clips_to_chain_ends() {
        let (angles, torsions) = terms_touching(&[0], 6);
        assert_eq!(angles, vec![0]);
        assert_eq!(torsions, vec![0]);
        let (angles, torsions) = terms_touching(&[5], 6);
        assert_eq!(angles, vec![3]);
        assert_eq!(torsions, vec![2]);
        let (angles, torsions) = terms_touching(&[3, 4], 8);
        assert_eq!(angles, vec![1, 2, 3, 4]);
        assert_eq!(torsions, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn every_closable_proposal_preserves_bond_lengths() {
        let model = helix_model(12);
        let dynamics = DynamicsSettings::default();
        let steps = StepSizes::default().scaled(300.0, 12);
        let generator = MoveGenerator::new(&model, steps, &dynamics, 300.0);
        let conf = helix(12);
        let bonds = conf.bond_lengths();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(5);
        for kind in MoveKind::ALL {
            for _ in 0..20 {
                let proposal = generator.propose(kind, &conf, &mut rng);
                assert_eq!(proposal.kind, kind);
                let Some(new_conf) = proposal.conformation else {
                    continue;
                };
                for (a, b) in new_conf.bond_lengths().iter().zip(&bonds) {
                    assert!((a - b).abs() < 1e-6, "{kind}: {a} vs {b}");
                }
            }
        }
    }

    #[test]
    fn listed_terms_cover_every_changed_term() {
        let model = helix_model(10);
        let dynamics = DynamicsSettings::default();
        let steps = StepSizes::default().scaled(600.0, 10);
        let generator = MoveGenerator::new(&model, steps, &dynamics, 600.0);
        let conf = helix(10);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(9);
        for kind in MoveKind::ALL {
            for _ in 0..20 {
                let proposal = generator.propose(kind, &conf, &mut rng);
                let Some(new_conf) = &proposal.conformation else {
                    continue;
                };
                for i in 0..conf.len() - 2 {
                    if !proposal.changed_angles.contains(&i) {
                        assert!((conf.angle(i) - new_conf.angle(i)).abs() < 1e-9, "{kind} angle {i}");
                    }
                }
                for i in 0..conf.len() - 3 {
                    if !proposal.changed_torsions.contains(&i) {
                        let d = (conf.torsion(i) - new_conf.torsion(i)).abs();
                        let d = d.min(std::f64::consts::TAU - d);
                        assert!(d < 1e-9, "{kind} torsion {i}");
                    }
                }
            }
        }
    }
}
