use super::context::SimulationContext;
use super::error::EngineError;
use super::metropolis;
use super::replica::ReplicaState;
use rand::Rng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Swap statistics for one pair of neighbouring ladder slots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeCounter {
    pub accepted: u64,
    pub rejected: u64,
}

impl EdgeCounter {
    pub fn attempted(&self) -> u64 {
        self.accepted + self.rejected
    }

    pub fn acceptance(&self) -> f64 {
        match self.attempted() {
            0 => 0.0,
            n => self.accepted as f64 / n as f64,
        }
    }
}

/// Parallel-tempering swap protocol over a fixed temperature ladder.
///
/// `permutation[slot]` is the walker whose configuration currently sits at `slot`. Walkers
/// are numbered by the slot they started in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeScheduler {
    temperatures: Vec<f64>,
    permutation: Vec<usize>,
    history: Vec<Vec<usize>>,
    edges: Vec<EdgeCounter>,
    sweeps: u64,
    rng: Xoshiro256PlusPlus,
}

impl ExchangeScheduler {
    pub fn new(temperatures: Vec<f64>, rng: Xoshiro256PlusPlus) -> Self {
        let n = temperatures.len();
        let permutation: Vec<usize> = (0..n).collect();
        Self {
            temperatures,
            history: vec![permutation.clone()],
            permutation,
            edges: vec![EdgeCounter::default(); n.saturating_sub(1)],
            sweeps: 0,
            rng,
        }
    }

    /// Starts a new run from another run's final ordering, with fresh statistics.
    pub fn continued(mut self, temperatures: Vec<f64>) -> Self {
        self.edges = vec![EdgeCounter::default(); temperatures.len().saturating_sub(1)];
        self.history = vec![self.permutation.clone()];
        self.temperatures = temperatures;
        self.sweeps = 0;
        self
    }

    #[inline]
    pub fn temperatures(&self) -> &[f64] {
        &self.temperatures
    }

    #[inline]
    pub fn permutation(&self) -> &[usize] {
        &self.permutation
    }

    /// Slot occupancy after every swap phase, starting with the initial ordering.
    #[inline]
    pub fn history(&self) -> &[Vec<usize>] {
        &self.history
    }

    #[inline]
    pub fn edges(&self) -> &[EdgeCounter] {
        &self.edges
    }

    /// Whether `permutation` is a bijection onto `0..n`.
    pub fn is_bijection(permutation: &[usize]) -> bool {
        let mut seen = vec![false; permutation.len()];
        permutation.iter().all(|&w| {
            w < seen.len() && !std::mem::replace(&mut seen[w], true)
        })
    }

    /// Runs the configured number of alternating-parity sweeps over the ladder and records
    /// the resulting ordering. Every replica must have finished its move block.
    ///
    /// Parity follows the sweep count over the whole run, so with an even number of sweeps
    /// per phase every phase starts on the even pairs `(0,1), (2,3), ...`.
    pub fn swap_phase(
        &mut self,
        replicas: &mut [ReplicaState],
        ctx: &SimulationContext,
        move_index: u64,
    ) -> Result<u64, EngineError> {
        if replicas.len() != self.permutation.len() {
            return Err(EngineError::Internal(format!(
                "{} replicas for a ladder of {} slots",
                replicas.len(),
                self.permutation.len()
            )));
        }
        if let Some(bad) = replicas.iter().find(|r| !r.total_energy().is_finite()) {
            return Err(EngineError::NonFiniteEnergy {
                replica: bad.slot,
                move_index,
                energy: bad.total_energy(),
            });
        }
        let mut accepted = 0;
        for _ in 0..ctx.config().swap_sweeps {
            let first = (self.sweeps % 2) as usize;
            for lower in (first..replicas.len().saturating_sub(1)).step_by(2) {
                if self.attempt(replicas, ctx, lower) {
                    accepted += 1;
                }
            }
            self.sweeps += 1;
        }
        self.history.push(self.permutation.clone());
        Ok(accepted)
    }

    fn attempt(&mut self, replicas: &mut [ReplicaState], ctx: &SimulationContext, lower: usize) -> bool {
        let upper = lower + 1;
        let probability = swap_probability(&replicas[lower], &replicas[upper], ctx);
        let accepted = probability >= 1.0 || self.rng.gen_range(0.0..1.0) < probability;
        trace!(lower, upper, probability, accepted, "Swap attempt");
        if accepted {
            let (left, right) = replicas.split_at_mut(upper);
            left[lower].exchange_configuration(&mut right[0], ctx);
            self.permutation.swap(lower, upper);
            self.edges[lower].accepted += 1;
        } else {
            self.edges[lower].rejected += 1;
        }
        accepted
    }
}

/// Probability of exchanging the configurations of two slots.
pub fn swap_probability(a: &ReplicaState, b: &ReplicaState, ctx: &SimulationContext) -> f64 {
    if ctx.slot_dependent() {
        metropolis::hamiltonian_swap_probability(
            a.total_energy(),
            a.energy_of(b, ctx),
            a.temperature,
            b.total_energy(),
            b.energy_of(a, ctx),
            b.temperature,
        )
    } else {
        metropolis::swap_probability(a.total_energy(), b.total_energy(), a.temperature, b.temperature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::energy::tests::helix_params;
    use crate::engine::context::tests::{test_config, test_context};
    use crate::engine::replica::tests::test_replicas;
    use rand::SeedableRng;
    use std::path::Path;
    use std::sync::Arc;

    fn scheduler(ctx: &SimulationContext) -> ExchangeScheduler {
        ExchangeScheduler::new(ctx.config().temperatures.clone(), Xoshiro256PlusPlus::seed_from_u64(3))
    }

    #[test]
    fn permutation_stays_a_bijection() {
        let ctx = test_context(vec![300.0, 330.0, 360.0, 400.0, 450.0], None);
        let mut replicas = test_replicas(&ctx);
        let mut exchange = scheduler(&ctx);
        for block in 0..6 {
            for r in replicas.iter_mut() {
                r.run_block(&ctx, block * 50, 50).unwrap();
            }
            exchange.swap_phase(&mut replicas, &ctx, (block + 1) * 50).unwrap();
            assert!(ExchangeScheduler::is_bijection(exchange.permutation()));
        }
        assert_eq!(exchange.history().len(), 7);
        assert!(exchange.history().iter().all(|p| ExchangeScheduler::is_bijection(p)));
    }

    #[test]
    fn parity_alternates_between_sweeps() {
        let ctx = test_context(vec![300.0, 310.0, 320.0, 330.0], None);
        let mut replicas = test_replicas(&ctx);
        let mut exchange = scheduler(&ctx);
        exchange.swap_phase(&mut replicas, &ctx, 0).unwrap();
        let even: Vec<u64> = exchange.edges().iter().map(EdgeCounter::attempted).collect();
        assert_eq!(even, vec![1, 0, 1]);
        exchange.swap_phase(&mut replicas, &ctx, 0).unwrap();
        let both: Vec<u64> = exchange.edges().iter().map(EdgeCounter::attempted).collect();
        assert_eq!(both, vec![1, 1, 1]);
    }

    #[test]
    fn even_sweep_count_starts_every_phase_on_even_pairs() {
        let mut config = test_config(vec![300.0, 310.0, 320.0], None, Path::new("unused"));
        config.swap_sweeps = 2;
        let ctx = SimulationContext::new(config, Arc::new(helix_params(9, false)), None).unwrap();
        let mut replicas = test_replicas(&ctx);
        let mut exchange = scheduler(&ctx);

        // Equal energies accept every swap, so the ordering records which pair went first.
        exchange.swap_phase(&mut replicas, &ctx, 0).unwrap();
        assert_eq!(exchange.permutation(), &[1, 2, 0]);
        exchange.swap_phase(&mut replicas, &ctx, 0).unwrap();
        assert_eq!(exchange.permutation(), &[2, 0, 1]);
        let attempts: Vec<u64> = exchange.edges().iter().map(EdgeCounter::attempted).collect();
        assert_eq!(attempts, vec![2, 2]);
    }

    #[test]
    fn identical_energies_always_swap_and_double_swap_restores_state() {
        let ctx = test_context(vec![300.0, 305.0], None);
        let mut replicas = test_replicas(&ctx);
        let before = replicas.clone();
        assert_eq!(swap_probability(&replicas[0], &replicas[1], &ctx), 1.0);

        let mut exchange = scheduler(&ctx);
        exchange.attempt(&mut replicas, &ctx, 0);
        assert_eq!(exchange.permutation(), &[1, 0]);
        exchange.attempt(&mut replicas, &ctx, 0);
        assert_eq!(exchange.permutation(), &[0, 1]);
        assert_eq!(replicas, before);
        assert_eq!(exchange.edges()[0].accepted, 2);
    }

    #[test]
    fn accepted_swap_moves_configuration_but_not_temperature() {
        let ctx = test_context(vec![300.0, 305.0], None);
        let mut replicas = test_replicas(&ctx);
        replicas[1].conformation.translate(&nalgebra::Vector3::new(0.0, 0.0, 2.0));
        let moved = replicas[1].conformation.clone();
        let mut exchange = scheduler(&ctx);
        exchange.attempt(&mut replicas, &ctx, 0);
        assert_eq!(replicas[0].conformation, moved);
        assert_eq!(replicas[0].temperature, 300.0);
        assert_eq!(replicas[1].slot, 1);
    }

    #[test]
    fn bijection_check_rejects_repeats_and_out_of_range() {
        assert!(ExchangeScheduler::is_bijection(&[2, 0, 1]));
        assert!(!ExchangeScheduler::is_bijection(&[0, 0, 1]));
        assert!(!ExchangeScheduler::is_bijection(&[0, 3, 1]));
    }

    #[test]
    fn single_replica_has_no_edges() {
        let ctx = test_context(vec![300.0], None);
        let mut replicas = test_replicas(&ctx);
        let mut exchange = scheduler(&ctx);
        assert_eq!(exchange.swap_phase(&mut replicas, &ctx, 0).unwrap(), 0);
        assert!(exchange.edges().is_empty());
    }
}
