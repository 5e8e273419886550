use rand::Rng;

/// Boltzmann constant in kcal/(mol·K).
pub const BOLTZMANN: f64 = 0.0019872041;

#[inline]
pub fn beta(temperature: f64) -> f64 {
    1.0 / (BOLTZMANN * temperature)
}

/// Metropolis test for a single-replica move.
///
/// `delta` is the potential energy change plus any Hamiltonian shift of the move. Anything
/// non-finite is a rejection. A downhill move with `jacobian >= 1` is accepted without
/// consuming a random number.
pub fn accept<R: Rng + ?Sized>(delta: f64, jacobian: f64, temperature: f64, rng: &mut R) -> bool {
    if !delta.is_finite() || !(jacobian > 0.0) {
        return false;
    }
    if delta <= 0.0 && jacobian >= 1.0 {
        return true;
    }
    let probability = jacobian * (-delta * beta(temperature)).exp();
    rng.gen_range(0.0..1.0) < probability
}

/// Acceptance probability for exchanging configurations between two ladder slots.
///
/// With temperature-only differences this is `min(1, exp((E_i - E_j)(β_i - β_j)))`.
pub fn swap_probability(energy_i: f64, energy_j: f64, temperature_i: f64, temperature_j: f64) -> f64 {
    let exponent = (energy_i - energy_j) * (beta(temperature_i) - beta(temperature_j));
    probability_from_exponent(exponent)
}

/// Swap probability when each slot evaluates its own Hamiltonian.
///
/// `own_*` is a slot's energy of its current configuration, `other_*` the same slot's energy
/// of the partner's configuration.
pub fn hamiltonian_swap_probability(
    own_i: f64,
    other_i: f64,
    temperature_i: f64,
    own_j: f64,
    other_j: f64,
    temperature_j: f64,
) -> f64 {
    let exponent =
        beta(temperature_i) * (own_i - other_i) + beta(temperature_j) * (own_j - other_j);
    probability_from_exponent(exponent)
}

fn probability_from_exponent(exponent: f64) -> f64 {
    if exponent.is_nan() {
        0.0
    } else if exponent >= 0.0 {
        1.0
    } else {
        exponent.exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn swap_probability_matches_closed_form_for_two_replicas() {
        let expected =
            ((-50.0f64 - (-48.0)) * (1.0 / (BOLTZMANN * 300.0) - 1.0 / (BOLTZMANN * 305.0))).exp();
        assert_eq!(swap_probability(-50.0, -48.0, 300.0, 305.0), expected);
        assert!(expected < 1.0);
    }

    #[test]
    fn swap_probability_ratio_is_exp_of_delta_e_delta_beta() {
        let (ei, ej, ti, tj) = (-50.0, -48.0, 300.0, 305.0);
        let forward = swap_probability(ei, ej, ti, tj);
        let backward = swap_probability(ej, ei, ti, tj);
        let expected = ((ei - ej) * (beta(ti) - beta(tj))).exp();
        assert!((forward / backward - expected).abs() < 1e-12);
    }

    #[test]
    fn swap_probability_is_one_when_lower_energy_moves_down() {
        assert_eq!(swap_probability(-40.0, -60.0, 300.0, 320.0), 1.0);
    }

    #[test]
    fn swap_probability_rejects_nan_energy() {
        assert_eq!(swap_probability(f64::NAN, -1.0, 300.0, 310.0), 0.0);
    }

    #[test]
    fn hamiltonian_swap_reduces_to_temperature_swap() {
        let (ei, ej, ti, tj) = (-50.0, -48.0, 300.0, 305.0);
        let generalized = hamiltonian_swap_probability(ei, ej, ti, ej, ei, tj);
        assert!((generalized - swap_probability(ei, ej, ti, tj)).abs() < 1e-15);
    }

    #[test]
    fn downhill_moves_are_always_accepted() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
        for _ in 0..100 {
            assert!(accept(-1.0, 1.0, 300.0, &mut rng));
            assert!(accept(0.0, 1.2, 300.0, &mut rng));
        }
    }

    #[test]
    fn downhill_move_with_small_jacobian_can_be_rejected() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let accepted = (0..2000).filter(|_| accept(0.0, 0.5, 300.0, &mut rng)).count();
        assert!((800..1200).contains(&accepted), "{accepted}");
    }

    #[test]
    fn non_finite_changes_are_rejected() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(2);
        assert!(!accept(f64::INFINITY, 1.0, 300.0, &mut rng));
        assert!(!accept(f64::NAN, 1.0, 300.0, &mut rng));
        assert!(!accept(-1.0, 0.0, 300.0, &mut rng));
    }

    #[test]
    fn uphill_acceptance_rate_follows_boltzmann_factor() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        let delta = BOLTZMANN * 300.0;
        let trials = 20_000;
        let accepted = (0..trials).filter(|_| accept(delta, 1.0, 300.0, &mut rng)).count();
        let rate = accepted as f64 / trials as f64;
        assert!((rate - (-1.0f64).exp()).abs() < 0.02, "{rate}");
    }
}
