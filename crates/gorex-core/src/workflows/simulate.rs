use crate::core::forcefield::params::ParameterTable;
use crate::core::models::conformation::Conformation;
use crate::core::models::surface::SurfaceLattice;
use crate::engine::checkpoint::CheckpointManager;
use crate::engine::config::{ResumeMode, SimulationConfig};
use crate::engine::context::SimulationContext;
use crate::engine::error::EngineError;
use crate::engine::exchange::{EdgeCounter, ExchangeScheduler};
use crate::engine::pool::{SequentialPool, WorkerPool};
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::recorder::Recorder;
use crate::engine::replica::{MoveCounters, ReplicaState};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "parallel")]
use crate::engine::pool::ThreadedPool;

/// Parsed inputs of a run: the force-field table and the starting conformation.
#[derive(Debug, Clone)]
pub struct SimulationInputs {
    pub params: ParameterTable,
    pub conformation: Conformation,
}

#[derive(Debug, Clone)]
pub struct SimulationResult {
    pub move_index: u64,
    pub replicas: Vec<ReplicaState>,
    pub exchange: ExchangeScheduler,
    pub recorder: Recorder,
}

impl SimulationResult {
    /// Move statistics summed over every replica.
    pub fn move_totals(&self) -> MoveCounters {
        MoveCounters::merged(self.replicas.iter().map(|r| &r.counters))
    }

    pub fn swap_edges(&self) -> &[EdgeCounter] {
        self.exchange.edges()
    }
}

struct Ensemble {
    move_index: u64,
    replicas: Vec<ReplicaState>,
    exchange: ExchangeScheduler,
    recorder: Recorder,
}

#[instrument(skip_all, name = "simulation_workflow")]
pub fn run(
    inputs: SimulationInputs,
    config: &SimulationConfig,
    reporter: &ProgressReporter,
) -> Result<SimulationResult, EngineError> {
    // === Phase 0: Preparation ===
    reporter.report(Progress::PhaseStart {
        name: "Preparation",
    });
    let ctx = Arc::new(prepare_context(&inputs, config)?);
    std::fs::create_dir_all(&config.output_dir).map_err(|source| EngineError::Io {
        path: config.output_dir.display().to_string(),
        source,
    })?;
    let manager = CheckpointManager::new(&config.output_dir);
    let mut ensemble = initialize_ensemble(&ctx, inputs.conformation, &manager)?;
    let pool = create_pool(config)?;
    reporter.report(Progress::PhaseFinish);

    // === Phase 1: Sampling ===
    run_sampling(&ctx, &mut ensemble, pool.as_ref(), &manager, reporter)?;

    // === Phase 2: Output ===
    reporter.report(Progress::PhaseStart { name: "Output" });
    write_outputs(&ctx, &ensemble, &manager)?;
    log_summary(&ctx, &ensemble);
    reporter.report(Progress::PhaseFinish);

    info!(
        "Simulation complete after {} moves per replica.",
        ensemble.move_index
    );
    Ok(SimulationResult {
        move_index: ensemble.move_index,
        replicas: ensemble.replicas,
        exchange: ensemble.exchange,
        recorder: ensemble.recorder,
    })
}

fn prepare_context(
    inputs: &SimulationInputs,
    config: &SimulationConfig,
) -> Result<SimulationContext, EngineError> {
    let params = inputs
        .params
        .clone()
        .with_bond_lengths_from(&inputs.conformation)?;
    info!(
        beads = params.bead_count(),
        native_pairs = params.native_pairs().len(),
        replicas = config.replica_count(),
        "Prepared parameter table"
    );
    let lattice = config.surface.as_ref().map(|s| {
        let lattice = SurfaceLattice::hexagonal(s.x_size, s.y_size, s.spacing, s.margin);
        info!(sites = lattice.len(), "Generated surface lattice");
        Arc::new(lattice)
    });
    SimulationContext::new(config.clone(), Arc::new(params), lattice)
}

fn initialize_ensemble(
    ctx: &SimulationContext,
    conformation: Conformation,
    manager: &CheckpointManager,
) -> Result<Ensemble, EngineError> {
    let config = ctx.config();
    let checkpoint = match &config.resume {
        ResumeMode::Fresh => return fresh_ensemble(ctx, conformation),
        ResumeMode::Restart => manager.restore(ctx)?,
        ResumeMode::Extend(prior) => CheckpointManager::extend(prior, ctx)?,
    };
    if checkpoint.move_index >= config.total_moves {
        warn!(
            "Checkpoint is already at move {} of {}; nothing left to sample",
            checkpoint.move_index, config.total_moves
        );
    }
    Ok(Ensemble {
        move_index: checkpoint.move_index,
        replicas: checkpoint.replicas,
        exchange: checkpoint.exchange,
        recorder: checkpoint.recorder,
    })
}

fn fresh_ensemble(ctx: &SimulationContext, conformation: Conformation) -> Result<Ensemble, EngineError> {
    let config = ctx.config();
    let (streams, scheduler_rng) = ReplicaState::rng_streams(config.seed, ctx.replica_count());
    let mut replicas = Vec::with_capacity(streams.len());
    for (slot, mut rng) in streams.into_iter().enumerate() {
        let model = ctx.model(slot);
        let mut start = conformation.clone();
        if let (Some(lattice), Some(surface)) = (model.surface(), &config.surface) {
            lattice.place_above(&mut start, surface.clearance, &mut rng);
        }
        let replica = ReplicaState::new(slot, ctx.temperature(slot), start, model, rng);
        if !replica.total_energy().is_finite() {
            return Err(EngineError::Initialization(format!(
                "starting conformation has non-finite energy {} at slot {}",
                replica.total_energy(),
                slot
            )));
        }
        debug!(slot, energy = replica.total_energy(), "Initialized replica");
        replicas.push(replica);
    }
    Ok(Ensemble {
        move_index: 0,
        replicas,
        exchange: ExchangeScheduler::new(config.temperatures.clone(), scheduler_rng),
        recorder: Recorder::new(config.temperatures.clone()),
    })
}

#[cfg(feature = "parallel")]
fn create_pool(config: &SimulationConfig) -> Result<Box<dyn WorkerPool>, EngineError> {
    if config.replica_count() == 1 || config.threads == 1 {
        return Ok(Box::new(SequentialPool));
    }
    let pool = ThreadedPool::new(config.threads, config.worker_timeout)?;
    info!(threads = pool.threads(), "Running replicas on a thread pool");
    Ok(Box::new(pool))
}

#[cfg(not(feature = "parallel"))]
fn create_pool(_config: &SimulationConfig) -> Result<Box<dyn WorkerPool>, EngineError> {
    Ok(Box::new(SequentialPool))
}

#[instrument(skip_all, name = "sampling")]
fn run_sampling(
    ctx: &Arc<SimulationContext>,
    ensemble: &mut Ensemble,
    pool: &dyn WorkerPool,
    manager: &CheckpointManager,
    reporter: &ProgressReporter,
) -> Result<(), EngineError> {
    let config = ctx.config();
    let remaining = config.total_moves.saturating_sub(ensemble.move_index);
    reporter.report(Progress::PhaseStart { name: "Sampling" });
    reporter.report(Progress::TaskStart {
        total_steps: remaining,
    });
    info!(
        start = ensemble.move_index,
        total = config.total_moves,
        "Starting replica-exchange sampling"
    );

    let mut last_checkpoint = Instant::now();
    while ensemble.move_index < config.total_moves {
        let block = config.swap_interval.min(config.total_moves - ensemble.move_index);
        let replicas = std::mem::take(&mut ensemble.replicas);
        ensemble.replicas = pool.join_all(replicas, ctx, ensemble.move_index, block)?;
        ensemble.move_index += block;

        ensemble
            .recorder
            .collect(&mut ensemble.replicas, ensemble.exchange.permutation());
        let swaps = ensemble
            .exchange
            .swap_phase(&mut ensemble.replicas, ctx, ensemble.move_index)?;
        debug!(
            move_index = ensemble.move_index,
            swaps,
            permutation = ?ensemble.exchange.permutation(),
            "Finished outer iteration"
        );
        reporter.report(Progress::TaskIncrement { steps: block });

        if last_checkpoint.elapsed() >= config.checkpoint_interval {
            write_outputs(ctx, ensemble, manager)?;
            reporter.message(format!("checkpoint written at move {}", ensemble.move_index));
            last_checkpoint = Instant::now();
        }
    }

    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);
    Ok(())
}

fn write_outputs(
    ctx: &SimulationContext,
    ensemble: &Ensemble,
    manager: &CheckpointManager,
) -> Result<(), EngineError> {
    manager.save(
        ensemble.move_index,
        &ensemble.replicas,
        &ensemble.exchange,
        &ensemble.recorder,
    )?;
    ensemble
        .recorder
        .write(&ctx.config().output_dir, &ensemble.exchange)?;
    debug!(move_index = ensemble.move_index, "Wrote checkpoint and series");
    Ok(())
}

fn log_summary(ctx: &SimulationContext, ensemble: &Ensemble) {
    let totals = MoveCounters::merged(ensemble.replicas.iter().map(|r| &r.counters));
    for (kind, tally) in totals.iter().filter(|(_, t)| t.proposed > 0) {
        info!(
            "{:<11} proposed {:>10}  accepted {:>6.2}%  unclosable {:>8}",
            kind.name(),
            tally.proposed,
            100.0 * tally.acceptance(),
            tally.unclosable
        );
    }
    for (lower, edge) in ensemble.exchange.edges().iter().enumerate() {
        info!(
            "swap {:>7.2} K <-> {:>7.2} K: {:>6.2}% of {} attempts",
            ctx.temperature(lower),
            ctx.temperature(lower + 1),
            100.0 * edge.acceptance(),
            edge.attempted()
        );
    }
}
