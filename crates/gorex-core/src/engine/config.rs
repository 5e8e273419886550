use super::moves::MoveKind;
use crate::core::forcefield::potentials::PairForm;
use crate::core::forcefield::restraint::Restraint;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{parameter}': {reason}")]
    Invalid {
        parameter: &'static str,
        reason: String,
    },
}

fn invalid(parameter: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        parameter,
        reason: reason.into(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TemperatureLadder {
    Explicit(Vec<f64>),
    Range { low: f64, high: f64 },
}

impl TemperatureLadder {
    /// Resolves the ladder into `count` strictly increasing temperatures in Kelvin.
    pub fn resolve(&self, count: usize) -> Result<Vec<f64>, ConfigError> {
        if count == 0 {
            return Err(invalid("replicas", "at least one replica is required"));
        }
        let temperatures = match self {
            TemperatureLadder::Explicit(list) => {
                if list.len() != count {
                    return Err(invalid(
                        "temperatures",
                        format!("{} temperatures given for {} replicas", list.len(), count),
                    ));
                }
                list.clone()
            }
            TemperatureLadder::Range { low, high } => {
                if high < low {
                    return Err(invalid(
                        "temperature_range",
                        format!("upper bound {high} is below lower bound {low}"),
                    ));
                }
                match count {
                    1 => {
                        if high != low {
                            warn!(
                                "Single replica requested; running at {} K and ignoring the upper bound {} K",
                                low, high
                            );
                        }
                        vec![*low]
                    }
                    2 => vec![*low, *high],
                    n => {
                        let ratio = high / low;
                        (0..n)
                            .map(|k| low * ratio.powf(k as f64 / (n - 1) as f64))
                            .collect()
                    }
                }
            }
        };
        if let Some(&bad) = temperatures.iter().find(|t| !(t.is_finite() && **t > 0.0)) {
            return Err(invalid("temperatures", format!("{bad} is not a positive temperature")));
        }
        if temperatures.windows(2).any(|w| w[1] <= w[0]) {
            return Err(invalid("temperatures", "ladder must be strictly increasing"));
        }
        Ok(temperatures)
    }
}

/// Relative proposal weights per move family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveFrequencies {
    pub translation: f64,
    pub rotation: f64,
    pub bend: f64,
    pub torsion: f64,
    pub crankshaft: f64,
    pub parrot: f64,
    pub dynamics: f64,
}

impl Default for MoveFrequencies {
    fn default() -> Self {
        Self {
            translation: 0.0,
            rotation: 0.0,
            bend: 1.0,
            torsion: 3.0,
            crankshaft: 3.0,
            parrot: 3.0,
            dynamics: 10.0,
        }
    }
}

impl MoveFrequencies {
    pub fn weight(&self, kind: MoveKind) -> f64 {
        match kind {
            MoveKind::Translation => self.translation,
            MoveKind::Rotation => self.rotation,
            MoveKind::Bend => self.bend,
            MoveKind::Torsion => self.torsion,
            MoveKind::Crankshaft => self.crankshaft,
            MoveKind::Parrot => self.parrot,
            MoveKind::Dynamics => self.dynamics,
        }
    }

    pub fn weights(&self) -> [f64; MoveKind::COUNT] {
        MoveKind::ALL.map(|kind| self.weight(kind))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let weights = self.weights();
        if weights.iter().any(|w| !(w.is_finite() && *w >= 0.0)) {
            return Err(invalid("move_frequencies", "ratios must be finite and non-negative"));
        }
        if weights.iter().sum::<f64>() <= 0.0 {
            return Err(invalid("move_frequencies", "at least one move type needs a positive ratio"));
        }
        Ok(())
    }
}

/// Base proposal widths at 300 K for a 50-bead chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSizes {
    /// Å.
    pub translation: f64,
    /// Degrees, for this and every field below.
    pub rotation: f64,
    pub bend: f64,
    pub torsion: f64,
    pub crankshaft: f64,
    pub parrot: f64,
}

impl Default for StepSizes {
    fn default() -> Self {
        Self {
            translation: 0.25,
            rotation: 2.0,
            bend: 10.0,
            torsion: 10.0,
            crankshaft: 1.0,
            parrot: 5.0,
        }
    }
}

impl StepSizes {
    /// Widths for one replica, angular values converted to radians.
    pub fn scaled(&self, temperature: f64, beads: usize) -> ScaledSteps {
        let factor = temperature / 300.0 * 50.0 / beads.max(1) as f64;
        ScaledSteps {
            translation: self.translation * factor,
            rotation: self.rotation.to_radians() * factor,
            bend: self.bend.to_radians() * factor,
            torsion: self.torsion.to_radians() * factor,
            crankshaft: self.crankshaft.to_radians() * factor,
            parrot: self.parrot.to_radians() * factor,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaledSteps {
    pub translation: f64,
    pub rotation: f64,
    pub bend: f64,
    pub torsion: f64,
    pub crankshaft: f64,
    pub parrot: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicsSettings {
    pub time_step_fs: f64,
    pub steps: usize,
    pub constraint_tolerance: f64,
    pub max_constraint_iterations: usize,
}

impl Default for DynamicsSettings {
    fn default() -> Self {
        Self {
            time_step_fs: 45.0,
            steps: 50,
            constraint_tolerance: 1e-8,
            max_constraint_iterations: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceSettings {
    pub x_size: f64,
    pub y_size: f64,
    pub spacing: f64,
    /// Distance trimmed from each extent before beads are folded back.
    pub margin: f64,
    pub scale: f64,
    /// Height of the lowest bead above the plane when a fresh run starts.
    pub clearance: f64,
}

impl Default for SurfaceSettings {
    fn default() -> Self {
        Self {
            x_size: 150.0,
            y_size: 150.0,
            spacing: 10.0,
            margin: 20.0,
            scale: 1.0,
            clearance: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Umbrella {
    ZPin { spring: f64, target: f64 },
    /// One target per ladder slot, or a single target shared by all slots.
    QPin { spring: f64, targets: Vec<f64> },
}

impl Umbrella {
    pub fn restraint_for_slot(&self, slot: usize) -> Restraint {
        match self {
            Umbrella::ZPin { spring, target } => Restraint::ZPin {
                spring: *spring,
                target: *target,
            },
            Umbrella::QPin { spring, targets } => Restraint::QPin {
                spring: *spring,
                target: targets.get(slot).or(targets.first()).copied().unwrap_or(0.0),
            },
        }
    }

    /// Whether different slots feel different restraints.
    pub fn is_slot_dependent(&self) -> bool {
        match self {
            Umbrella::ZPin { .. } => false,
            Umbrella::QPin { targets, .. } => targets.windows(2).any(|w| w[0] != w[1]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ResumeMode {
    #[default]
    Fresh,
    /// Continue from the checkpoint in the output directory.
    Restart,
    /// Start a new run from the final checkpoint of a previous run.
    Extend(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub temperatures: Vec<f64>,
    pub total_moves: u64,
    pub swap_interval: u64,
    pub swap_sweeps: usize,
    pub save_interval: u64,
    pub checkpoint_interval: Duration,
    pub frequencies: MoveFrequencies,
    pub step_sizes: StepSizes,
    pub dynamics: DynamicsSettings,
    pub native_form: PairForm,
    pub nonnative_form: PairForm,
    pub surface: Option<SurfaceSettings>,
    pub umbrella: Option<Umbrella>,
    pub seed: u64,
    pub output_dir: PathBuf,
    pub resume: ResumeMode,
    /// Worker threads for the move phase; `0` lets the pool decide.
    pub threads: usize,
    pub worker_timeout: Option<Duration>,
}

impl SimulationConfig {
    #[inline]
    pub fn replica_count(&self) -> usize {
        self.temperatures.len()
    }
}

#[derive(Default)]
pub struct SimulationConfigBuilder {
    replicas: Option<usize>,
    ladder: Option<TemperatureLadder>,
    total_moves: Option<u64>,
    swap_interval: Option<u64>,
    swap_sweeps: Option<usize>,
    save_interval: Option<u64>,
    checkpoint_interval: Option<Duration>,
    frequencies: Option<MoveFrequencies>,
    step_sizes: Option<StepSizes>,
    dynamics: Option<DynamicsSettings>,
    native_form: Option<PairForm>,
    nonnative_form: Option<PairForm>,
    surface: Option<SurfaceSettings>,
    umbrella: Option<Umbrella>,
    seed: Option<u64>,
    output_dir: Option<PathBuf>,
    resume: Option<ResumeMode>,
    threads: Option<usize>,
    worker_timeout: Option<Duration>,
}

impl SimulationConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replicas(mut self, count: usize) -> Self {
        self.replicas = Some(count);
        self
    }
    pub fn ladder(mut self, ladder: TemperatureLadder) -> Self {
        self.ladder = Some(ladder);
        self
    }
    pub fn total_moves(mut self, moves: u64) -> Self {
        self.total_moves = Some(moves);
        self
    }
    pub fn swap_interval(mut self, moves: u64) -> Self {
        self.swap_interval = Some(moves);
        self
    }
    pub fn swap_sweeps(mut self, sweeps: usize) -> Self {
        self.swap_sweeps = Some(sweeps);
        self
    }
    pub fn save_interval(mut self, moves: u64) -> Self {
        self.save_interval = Some(moves);
        self
    }
    pub fn checkpoint_interval(mut self, interval: Duration) -> Self {
        self.checkpoint_interval = Some(interval);
        self
    }
    pub fn frequencies(mut self, frequencies: MoveFrequencies) -> Self {
        self.frequencies = Some(frequencies);
        self
    }
    pub fn step_sizes(mut self, steps: StepSizes) -> Self {
        self.step_sizes = Some(steps);
        self
    }
    pub fn dynamics(mut self, dynamics: DynamicsSettings) -> Self {
        self.dynamics = Some(dynamics);
        self
    }
    pub fn native_form(mut self, form: PairForm) -> Self {
        self.native_form = Some(form);
        self
    }
    pub fn nonnative_form(mut self, form: PairForm) -> Self {
        self.nonnative_form = Some(form);
        self
    }
    pub fn surface(mut self, surface: Option<SurfaceSettings>) -> Self {
        self.surface = surface;
        self
    }
    pub fn umbrella(mut self, umbrella: Option<Umbrella>) -> Self {
        self.umbrella = umbrella;
        self
    }
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
    pub fn output_dir(mut self, path: PathBuf) -> Self {
        self.output_dir = Some(path);
        self
    }
    pub fn resume(mut self, mode: ResumeMode) -> Self {
        self.resume = Some(mode);
        self
    }
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }
    pub fn worker_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.worker_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<SimulationConfig, ConfigError> {
        let replicas = self.replicas.unwrap_or(1);
        let temperatures = self
            .ladder
            .ok_or(ConfigError::MissingParameter("temperatures"))?
            .resolve(replicas)?;
        let total_moves = self
            .total_moves
            .ok_or(ConfigError::MissingParameter("total_moves"))?;
        let swap_interval = self.swap_interval.unwrap_or(1000);
        let save_interval = self.save_interval.unwrap_or(100);
        let swap_sweeps = self.swap_sweeps.unwrap_or(500);
        if total_moves == 0 {
            return Err(invalid("total_moves", "must be positive"));
        }
        if swap_interval == 0 {
            return Err(invalid("swap_interval", "must be positive"));
        }
        if save_interval == 0 {
            return Err(invalid("save_interval", "must be positive"));
        }
        if swap_sweeps == 0 {
            return Err(invalid("swap_sweeps", "must be positive"));
        }

        let mut frequencies = self.frequencies.unwrap_or_default();
        if self.surface.is_none() && (frequencies.translation > 0.0 || frequencies.rotation > 0.0) {
            warn!("Rigid translation and rotation have no effect without a surface; disabling them");
            frequencies.translation = 0.0;
            frequencies.rotation = 0.0;
        }
        frequencies.validate()?;

        let dynamics = self.dynamics.unwrap_or_default();
        if frequencies.dynamics > 0.0 && !(dynamics.time_step_fs > 0.0 && dynamics.steps > 0) {
            return Err(invalid("dynamics", "time step and step count must be positive"));
        }

        if let Some(surface) = &self.surface {
            if !(surface.spacing > 0.0 && surface.x_size > surface.margin && surface.y_size > surface.margin) {
                return Err(invalid(
                    "surface",
                    "spacing must be positive and the extents larger than the margin",
                ));
            }
        }
        match &self.umbrella {
            Some(Umbrella::ZPin { .. }) if self.surface.is_none() => {
                return Err(invalid("umbrella", "a z-pin restraint requires a surface"));
            }
            Some(Umbrella::QPin { targets, .. }) if targets.len() != 1 && targets.len() != replicas => {
                return Err(invalid(
                    "umbrella",
                    format!("{} Q targets given for {} replicas", targets.len(), replicas),
                ));
            }
            _ => {}
        }

        Ok(SimulationConfig {
            temperatures,
            total_moves,
            swap_interval,
            swap_sweeps,
            save_interval,
            checkpoint_interval: self.checkpoint_interval.unwrap_or(Duration::from_secs(600)),
            frequencies,
            step_sizes: self.step_sizes.unwrap_or_default(),
            dynamics,
            native_form: self.native_form.unwrap_or(PairForm::TwelveTenSix),
            nonnative_form: self.nonnative_form.unwrap_or(PairForm::Repulsive),
            surface: self.surface,
            umbrella: self.umbrella,
            seed: self.seed.unwrap_or(0),
            output_dir: self
                .output_dir
                .ok_or(ConfigError::MissingParameter("output_dir"))?,
            resume: self.resume.unwrap_or_default(),
            threads: self.threads.unwrap_or(0),
            worker_timeout: self.worker_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_builder() -> SimulationConfigBuilder {
        SimulationConfigBuilder::new()
            .ladder(TemperatureLadder::Range {
                low: 300.0,
                high: 400.0,
            })
            .total_moves(10_000)
            .output_dir(PathBuf::from("out"))
    }

    #[test]
    fn builder_succeeds_with_required_parameters() {
        let config = base_builder().build().unwrap();
        assert_eq!(config.temperatures, vec![300.0]);
        assert_eq!(config.swap_interval, 1000);
        assert_eq!(config.save_interval, 100);
        assert_eq!(config.resume, ResumeMode::Fresh);
    }

    #[test]
    fn unset_exchange_and_dynamics_options_use_long_run_defaults() {
        let config = base_builder().build().unwrap();
        assert_eq!(config.swap_sweeps, 500);
        assert_eq!(config.dynamics, DynamicsSettings::default());
        assert_eq!(config.dynamics.time_step_fs, 45.0);
        assert_eq!(config.dynamics.steps, 50);
    }

    #[test]
    fn builder_fails_without_temperatures() {
        let result = SimulationConfigBuilder::new()
            .total_moves(10)
            .output_dir(PathBuf::from("out"))
            .build();
        assert_eq!(result.unwrap_err(), ConfigError::MissingParameter("temperatures"));
    }

    #[test]
    fn builder_fails_without_total_moves() {
        let result = SimulationConfigBuilder::new()
            .ladder(TemperatureLadder::Explicit(vec![300.0]))
            .output_dir(PathBuf::from("out"))
            .build();
        assert_eq!(result.unwrap_err(), ConfigError::MissingParameter("total_moves"));
    }

    #[test]
    fn geometric_ladder_spans_the_range() {
        let temps = TemperatureLadder::Range {
            low: 300.0,
            high: 450.0,
        }
        .resolve(4)
        .unwrap();
        assert_eq!(temps.len(), 4);
        assert!((temps[0] - 300.0).abs() < 1e-9);
        assert!((temps[3] - 450.0).abs() < 1e-9);
        let r1 = temps[1] / temps[0];
        let r2 = temps[2] / temps[1];
        assert!((r1 - r2).abs() < 1e-12);
    }

    #[test]
    fn two_replicas_use_both_endpoints() {
        let temps = TemperatureLadder::Range {
            low: 300.0,
            high: 310.0,
        }
        .resolve(2)
        .unwrap();
        assert_eq!(temps, vec![300.0, 310.0]);
    }

    #[test]
    fn explicit_ladder_must_be_strictly_increasing() {
        let result = TemperatureLadder::Explicit(vec![300.0, 300.0]).resolve(2);
        assert!(matches!(result, Err(ConfigError::Invalid { parameter: "temperatures", .. })));
    }

    #[test]
    fn explicit_ladder_length_must_match_replicas() {
        let result = TemperatureLadder::Explicit(vec![300.0, 310.0]).resolve(3);
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn degenerate_range_with_many_replicas_is_rejected() {
        let result = TemperatureLadder::Range {
            low: 300.0,
            high: 300.0,
        }
        .resolve(3);
        assert!(result.is_err());
    }

    #[test]
    fn rigid_moves_are_disabled_without_surface() {
        let config = base_builder()
            .frequencies(MoveFrequencies {
                translation: 1.0,
                rotation: 1.0,
                ..MoveFrequencies::default()
            })
            .build()
            .unwrap();
        assert_eq!(config.frequencies.translation, 0.0);
        assert_eq!(config.frequencies.rotation, 0.0);
    }

    #[test]
    fn rigid_moves_are_kept_with_surface() {
        let config = base_builder()
            .surface(Some(SurfaceSettings::default()))
            .frequencies(MoveFrequencies {
                translation: 1.0,
                ..MoveFrequencies::default()
            })
            .build()
            .unwrap();
        assert_eq!(config.frequencies.translation, 1.0);
    }

    #[test]
    fn all_zero_frequencies_are_rejected() {
        let zero = MoveFrequencies {
            translation: 0.0,
            rotation: 0.0,
            bend: 0.0,
            torsion: 0.0,
            crankshaft: 0.0,
            parrot: 0.0,
            dynamics: 0.0,
        };
        let result = base_builder().frequencies(zero).build();
        assert!(matches!(result, Err(ConfigError::Invalid { parameter: "move_frequencies", .. })));
    }

    #[test]
    fn z_pin_requires_surface() {
        let result = base_builder()
            .umbrella(Some(Umbrella::ZPin {
                spring: 1.0,
                target: 20.0,
            }))
            .build();
        assert!(matches!(result, Err(ConfigError::Invalid { parameter: "umbrella", .. })));
    }

    #[test]
    fn q_pin_targets_map_to_slots() {
        let umbrella = Umbrella::QPin {
            spring: 0.5,
            targets: vec![10.0, 20.0],
        };
        assert_eq!(
            umbrella.restraint_for_slot(1),
            Restraint::QPin {
                spring: 0.5,
                target: 20.0
            }
        );
        assert!(umbrella.is_slot_dependent());
        let shared = Umbrella::QPin {
            spring: 0.5,
            targets: vec![10.0],
        };
        assert_eq!(shared.restraint_for_slot(3).target(), 10.0);
        assert!(!shared.is_slot_dependent());
    }

    #[test]
    fn step_sizes_scale_with_temperature_and_length() {
        let steps = StepSizes::default();
        let base = steps.scaled(300.0, 50);
        let hot_short = steps.scaled(600.0, 25);
        assert!((base.bend - 10f64.to_radians()).abs() < 1e-12);
        assert!((hot_short.bend - 4.0 * base.bend).abs() < 1e-12);
        assert!((hot_short.translation - 1.0).abs() < 1e-12);
    }
}
