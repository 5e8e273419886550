use super::context::SimulationContext;
use super::error::EngineError;
use super::metropolis;
use super::moves::{MoveGenerator, MoveKind};
use crate::core::forcefield::energy::EnergyModel;
use crate::core::forcefield::term::EnergyComponents;
use crate::core::models::conformation::Conformation;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};
use tracing::{instrument, warn};

/// Incremental energies may differ from a full recomputation by this much before the
/// cached components are replaced.
pub const DRIFT_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveTally {
    pub proposed: u64,
    pub accepted: u64,
    pub rejected: u64,
    /// Proposals that could not close the chain; also counted as rejected.
    pub unclosable: u64,
}

impl MoveTally {
    pub fn acceptance(&self) -> f64 {
        if self.proposed == 0 {
            0.0
        } else {
            self.accepted as f64 / self.proposed as f64
        }
    }

    fn merge(&mut self, other: &MoveTally) {
        self.proposed += other.proposed;
        self.accepted += other.accepted;
        self.rejected += other.rejected;
        self.unclosable += other.unclosable;
    }
}

/// Proposal and acceptance counts per move kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveCounters([MoveTally; MoveKind::COUNT]);

impl MoveCounters {
    pub fn total_proposed(&self) -> u64 {
        self.0.iter().map(|t| t.proposed).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MoveKind, &MoveTally)> {
        MoveKind::ALL.into_iter().zip(self.0.iter())
    }

    pub fn merged<'a>(counters: impl IntoIterator<Item = &'a MoveCounters>) -> MoveCounters {
        let mut total = MoveCounters::default();
        for c in counters {
            for (sum, tally) in total.0.iter_mut().zip(c.0.iter()) {
                sum.merge(tally);
            }
        }
        total
    }
}

impl Index<MoveKind> for MoveCounters {
    type Output = MoveTally;

    fn index(&self, kind: MoveKind) -> &MoveTally {
        &self.0[kind.index()]
    }
}

impl IndexMut<MoveKind> for MoveCounters {
    fn index_mut(&mut self, kind: MoveKind) -> &mut MoveTally {
        &mut self.0[kind.index()]
    }
}

/// One saved observation of a replica.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub move_index: u64,
    pub energy: f64,
    pub native_contacts: usize,
    pub surface: Option<f64>,
    pub restraint: Option<f64>,
}

/// Mutable state of the replica that lives at one ladder slot.
///
/// The slot, temperature and RNG stream stay put; configurations travel between slots
/// through [`ReplicaState::exchange_configuration`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicaState {
    pub slot: usize,
    pub temperature: f64,
    pub conformation: Conformation,
    pub energy: EnergyComponents,
    /// Velocities at the end of the last accepted dynamics move.
    pub velocities: Option<Vec<[f64; 3]>>,
    pub counters: MoveCounters,
    /// Samples taken since the recorder last collected them.
    pub samples: Vec<Sample>,
    rng: Xoshiro256PlusPlus,
}

impl ReplicaState {
    pub fn new(
        slot: usize,
        temperature: f64,
        conformation: Conformation,
        model: &EnergyModel,
        rng: Xoshiro256PlusPlus,
    ) -> Self {
        let energy = model.full_energy(&conformation);
        Self {
            slot,
            temperature,
            conformation,
            energy,
            velocities: None,
            counters: MoveCounters::default(),
            samples: Vec::new(),
            rng,
        }
    }

    /// Independent streams for `count` replicas, plus one left over for the scheduler.
    pub fn rng_streams(seed: u64, count: usize) -> (Vec<Xoshiro256PlusPlus>, Xoshiro256PlusPlus) {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let streams = (0..count)
            .map(|_| {
                let stream = rng.clone();
                rng.jump();
                stream
            })
            .collect();
        (streams, rng)
    }

    pub fn rng(&self) -> &Xoshiro256PlusPlus {
        &self.rng
    }

    pub(crate) fn rng_mut(&mut self) -> &mut Xoshiro256PlusPlus {
        &mut self.rng
    }

    pub fn total_energy(&self) -> f64 {
        self.energy.total()
    }

    /// Runs `moves` Monte Carlo moves; `start` is the global index of the first one.
    #[instrument(skip_all, fields(slot = self.slot, start = start))]
    pub fn run_block(&mut self, ctx: &SimulationContext, start: u64, moves: u64) -> Result<(), EngineError> {
        let model = ctx.model(self.slot);
        let generator = ctx.generator(self.slot);
        let save_interval = ctx.config().save_interval;
        for move_index in start..start + moves {
            let kind = ctx.move_table().sample(&mut self.rng);
            self.step(kind, &generator, model);
            if !self.energy.total().is_finite() {
                return Err(EngineError::NonFiniteEnergy {
                    replica: self.slot,
                    move_index,
                    energy: self.energy.total(),
                });
            }
            if (move_index + 1) % save_interval == 0 {
                self.record(model, move_index + 1);
            }
        }
        self.resync(model);
        Ok(())
    }

    /// Proposes one move and applies it if accepted.
    pub fn step(&mut self, kind: MoveKind, generator: &MoveGenerator<'_>, model: &EnergyModel) -> bool {
        self.counters[kind].proposed += 1;
        let proposal = generator.propose(kind, &self.conformation, &mut self.rng);
        let Some(candidate) = proposal.conformation else {
            let tally = &mut self.counters[kind];
            tally.unclosable += 1;
            tally.rejected += 1;
            return false;
        };
        let energy = model.incremental_energy(
            &self.energy,
            &self.conformation,
            &candidate,
            &proposal.changed_angles,
            &proposal.changed_torsions,
        );
        let delta = energy.total() - self.energy.total() + proposal.hamiltonian_shift;
        if metropolis::accept(delta, proposal.jacobian, self.temperature, &mut self.rng) {
            self.conformation = candidate;
            self.energy = energy;
            if proposal.velocities.is_some() {
                self.velocities = proposal.velocities;
            }
            self.counters[kind].accepted += 1;
            true
        } else {
            self.counters[kind].rejected += 1;
            false
        }
    }

    fn record(&mut self, model: &EnergyModel, move_index: u64) {
        self.samples.push(Sample {
            move_index,
            energy: self.energy.total(),
            native_contacts: model.native_contacts(&self.conformation),
            surface: self.energy.surface,
            restraint: self.energy.restraint,
        });
    }

    /// Replaces the cached energy with a full recomputation, warning if it had drifted.
    fn resync(&mut self, model: &EnergyModel) {
        let fresh = model.full_energy(&self.conformation);
        let drift = fresh.max_deviation(&self.energy);
        if drift > DRIFT_TOLERANCE {
            warn!(slot = self.slot, drift, "Cached energy drifted from full recomputation");
        }
        self.energy = fresh;
    }

    /// Swaps configurations (and their energies) between two slots.
    ///
    /// The restraint component is re-evaluated for the slot each configuration lands in.
    pub fn exchange_configuration(&mut self, other: &mut ReplicaState, ctx: &SimulationContext) {
        std::mem::swap(&mut self.conformation, &mut other.conformation);
        std::mem::swap(&mut self.energy, &mut other.energy);
        std::mem::swap(&mut self.velocities, &mut other.velocities);
        if ctx.slot_dependent() {
            for state in [self, other] {
                state.energy.restraint = ctx.model(state.slot).restraint_energy(&state.conformation);
            }
        }
    }

    /// Energy this slot's Hamiltonian assigns to `state`'s configuration.
    pub fn energy_of(&self, state: &ReplicaState, ctx: &SimulationContext) -> f64 {
        if self.slot == state.slot || !ctx.slot_dependent() {
            return state.energy.total();
        }
        let own = ctx
            .model(self.slot)
            .restraint_energy(&state.conformation)
            .unwrap_or(0.0);
        state.energy.total() - state.energy.restraint.unwrap_or(0.0) + own
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::forcefield::energy::tests::helix;
    use crate::engine::config::Umbrella;
    use crate::engine::context::tests::test_context;

    pub(crate) fn test_replicas(ctx: &SimulationContext) -> Vec<ReplicaState> {
        let (streams, _) = ReplicaState::rng_streams(ctx.config().seed, ctx.replica_count());
        streams
            .into_iter()
            .enumerate()
            .map(|(slot, rng)| ReplicaState::new(slot, ctx.temperature(slot), helix(9), ctx.model(slot), rng))
            .collect()
    }

    #[test]
    fn counters_add_up_after_a_block() {
        let ctx = test_context(vec![300.0], None);
        let mut replica = test_replicas(&ctx).remove(0);
        replica.run_block(&ctx, 0, 300).unwrap();
        assert_eq!(replica.counters.total_proposed(), 300);
        for (kind, tally) in replica.counters.iter() {
            assert_eq!(tally.accepted + tally.rejected, tally.proposed, "{kind}");
            assert!(tally.unclosable <= tally.rejected);
        }
        assert_eq!(replica.counters[MoveKind::Translation].proposed, 0);
    }

    #[test]
    fn cached_energy_matches_full_recomputation_after_many_moves() {
        let ctx = test_context(vec![400.0], None);
        let mut replica = test_replicas(&ctx).remove(0);
        let generator = ctx.generator(0);
        let model = ctx.model(0);
        let mut accepted = 0;
        for _ in 0..2000 {
            let kind = ctx.move_table().sample(replica.rng_mut());
            if replica.step(kind, &generator, model) {
                accepted += 1;
            }
        }
        assert!(accepted > 0);
        let full = model.full_energy(&replica.conformation);
        assert!(full.max_deviation(&replica.energy) < DRIFT_TOLERANCE);
    }

    #[test]
    fn samples_are_taken_every_save_interval() {
        let ctx = test_context(vec![300.0], None);
        let mut replica = test_replicas(&ctx).remove(0);
        replica.run_block(&ctx, 100, 100).unwrap();
        let indices: Vec<u64> = replica.samples.iter().map(|s| s.move_index).collect();
        assert_eq!(indices, vec![120, 140, 160, 180, 200]);
    }

    #[test]
    fn same_seed_reproduces_the_same_trajectory() {
        let ctx = test_context(vec![300.0], None);
        let mut a = test_replicas(&ctx).remove(0);
        let mut b = test_replicas(&ctx).remove(0);
        a.run_block(&ctx, 0, 200).unwrap();
        b.run_block(&ctx, 0, 200).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rng_streams_differ_between_replicas() {
        let (streams, scheduler) = ReplicaState::rng_streams(5, 3);
        assert_ne!(streams[0], streams[1]);
        assert_ne!(streams[1], streams[2]);
        assert_ne!(streams[2], scheduler);
    }

    #[test]
    fn exchange_updates_slot_dependent_restraints() {
        let ctx = test_context(
            vec![300.0, 310.0],
            Some(Umbrella::QPin {
                spring: 0.5,
                targets: vec![0.0, 5.0],
            }),
        );
        let mut replicas = test_replicas(&ctx);
        replicas[1].conformation.translate(&nalgebra::Vector3::new(1.0, 0.0, 0.0));
        replicas[1].energy = ctx.model(1).full_energy(&replicas[1].conformation);
        let expected_in_0 = replicas[0].energy_of(&replicas[1], &ctx);
        let (left, right) = replicas.split_at_mut(1);
        left[0].exchange_configuration(&mut right[0], &ctx);
        for replica in &replicas {
            let full = ctx.model(replica.slot).full_energy(&replica.conformation);
            assert!(full.max_deviation(&replica.energy) < 1e-9);
        }
        assert!((replicas[0].total_energy() - expected_in_0).abs() < 1e-9);
    }
}
