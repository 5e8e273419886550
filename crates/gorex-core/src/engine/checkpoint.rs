use super::context::SimulationContext;
use super::exchange::ExchangeScheduler;
use super::recorder::Recorder;
use super::replica::{MoveCounters, ReplicaState};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};

pub const CHECKPOINT_VERSION: u32 = 1;
pub const CHECKPOINT_FILE: &str = "checkpoint.json";
/// Largest tolerated difference between stored and recomputed energy terms.
pub const INTEGRITY_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("I/O error for checkpoint '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Malformed checkpoint '{path}': {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
    #[error("Checkpoint format version {found} is not supported (expected {expected})")]
    Version { found: u32, expected: u32 },
    #[error("Checkpoint does not match this run: {0}")]
    Shape(String),
    #[error("Stored energy of replica {replica} differs from recomputation by {deviation:.3e} kcal/mol")]
    IntegrityMismatch { replica: usize, deviation: f64 },
}

/// Complete ensemble state at a swap barrier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: u32,
    pub move_index: u64,
    pub replicas: Vec<ReplicaState>,
    pub exchange: ExchangeScheduler,
    pub recorder: Recorder,
}

#[derive(Serialize)]
struct CheckpointView<'a> {
    version: u32,
    move_index: u64,
    replicas: &'a [ReplicaState],
    exchange: &'a ExchangeScheduler,
    recorder: &'a Recorder,
}

#[derive(Debug, Clone)]
pub struct CheckpointManager {
    path: PathBuf,
}

impl CheckpointManager {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(CHECKPOINT_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Writes the checkpoint to a temporary file beside the target and renames it into
    /// place, so the previous checkpoint survives a failed write.
    pub fn save(
        &self,
        move_index: u64,
        replicas: &[ReplicaState],
        exchange: &ExchangeScheduler,
        recorder: &Recorder,
    ) -> Result<(), CheckpointError> {
        let view = CheckpointView {
            version: CHECKPOINT_VERSION,
            move_index,
            replicas,
            exchange,
            recorder,
        };
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let io_error = |source| CheckpointError::Io {
            path: self.path.display().to_string(),
            source,
        };
        let mut tmp = NamedTempFile::new_in(dir).map_err(io_error)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer(&mut writer, &view).map_err(|source| CheckpointError::Json {
                path: self.path.display().to_string(),
                source,
            })?;
            writer.flush().map_err(io_error)?;
        }
        tmp.as_file().sync_all().map_err(io_error)?;
        tmp.persist(&self.path).map_err(|e| io_error(e.error))?;
        debug!(move_index, path = %self.path.display(), "Checkpoint written");
        Ok(())
    }

    /// Reads and version-checks a checkpoint without validating it against a run.
    pub fn load(path: &Path) -> Result<Checkpoint, CheckpointError> {
        let file = File::open(path).map_err(|source| CheckpointError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let checkpoint: Checkpoint =
            serde_json::from_reader(BufReader::new(file)).map_err(|source| CheckpointError::Json {
                path: path.display().to_string(),
                source,
            })?;
        if checkpoint.version != CHECKPOINT_VERSION {
            return Err(CheckpointError::Version {
                found: checkpoint.version,
                expected: CHECKPOINT_VERSION,
            });
        }
        Ok(checkpoint)
    }

    /// Resumes this run from its own checkpoint.
    ///
    /// The ladder must match exactly and every stored energy must agree with a full
    /// recomputation; the cached energies are then replaced by the recomputed ones.
    pub fn restore(&self, ctx: &SimulationContext) -> Result<Checkpoint, CheckpointError> {
        let mut checkpoint = Self::load(&self.path)?;
        check_shape(&checkpoint, ctx)?;
        if checkpoint.exchange.temperatures() != ctx.config().temperatures.as_slice() {
            return Err(CheckpointError::Shape(
                "temperature ladder differs from the configured one".to_string(),
            ));
        }
        for replica in &mut checkpoint.replicas {
            let fresh = ctx.model(replica.slot).full_energy(&replica.conformation);
            let deviation = fresh.max_deviation(&replica.energy);
            if !(deviation <= INTEGRITY_TOLERANCE) {
                return Err(CheckpointError::IntegrityMismatch {
                    replica: replica.slot,
                    deviation,
                });
            }
            replica.energy = fresh;
        }
        info!(
            move_index = checkpoint.move_index,
            "Restored checkpoint from {}",
            self.path.display()
        );
        Ok(checkpoint)
    }

    /// Seeds a new run from the final checkpoint of an earlier one.
    ///
    /// Configurations, RNG streams and the slot ordering carry over; move counts,
    /// statistics and samples start from zero. Temperatures and energies follow the new run.
    pub fn extend(prior: &Path, ctx: &SimulationContext) -> Result<Checkpoint, CheckpointError> {
        let path = if prior.is_dir() {
            prior.join(CHECKPOINT_FILE)
        } else {
            prior.to_path_buf()
        };
        let mut checkpoint = Self::load(&path)?;
        check_shape(&checkpoint, ctx)?;
        for replica in &mut checkpoint.replicas {
            let model = ctx.model(replica.slot);
            replica.temperature = ctx.temperature(replica.slot);
            replica.energy = model.full_energy(&replica.conformation);
            replica.counters = MoveCounters::default();
            replica.samples.clear();
            replica.velocities = None;
        }
        let temperatures = ctx.config().temperatures.clone();
        checkpoint.exchange = checkpoint.exchange.continued(temperatures.clone());
        checkpoint.recorder = Recorder::new(temperatures);
        checkpoint.move_index = 0;
        info!(
            "Extending the run stored at {} ({} replicas)",
            path.display(),
            checkpoint.replicas.len()
        );
        Ok(checkpoint)
    }
}

fn check_shape(checkpoint: &Checkpoint, ctx: &SimulationContext) -> Result<(), CheckpointError> {
    let n = ctx.replica_count();
    if checkpoint.replicas.len() != n {
        return Err(CheckpointError::Shape(format!(
            "{} replicas stored, {} configured",
            checkpoint.replicas.len(),
            n
        )));
    }
    if let Some((k, _)) = checkpoint
        .replicas
        .iter()
        .enumerate()
        .find(|(k, r)| r.slot != *k)
    {
        return Err(CheckpointError::Shape(format!("replica {k} is stored out of slot order")));
    }
    let beads = ctx.params().bead_count();
    if let Some(r) = checkpoint.replicas.iter().find(|r| r.conformation.len() != beads) {
        return Err(CheckpointError::Shape(format!(
            "replica {} has {} beads, the parameters describe {}",
            r.slot,
            r.conformation.len(),
            beads
        )));
    }
    let permutation = checkpoint.exchange.permutation();
    if permutation.len() != n || !ExchangeScheduler::is_bijection(permutation) {
        return Err(CheckpointError::Shape(format!(
            "slot ordering {permutation:?} is not a permutation of {n} walkers"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::Umbrella;
    use crate::engine::context::tests::test_context;
    use crate::engine::replica::tests::test_replicas;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;
    use tempfile::tempdir;

    fn advanced_state(ctx: &SimulationContext) -> (Vec<ReplicaState>, ExchangeScheduler, Recorder) {
        let mut replicas = test_replicas(ctx);
        let mut exchange = ExchangeScheduler::new(
            ctx.config().temperatures.clone(),
            Xoshiro256PlusPlus::seed_from_u64(8),
        );
        let mut recorder = Recorder::new(ctx.config().temperatures.clone());
        for block in 0..3 {
            for r in replicas.iter_mut() {
                r.run_block(ctx, block * 100, 100).unwrap();
            }
            recorder.collect(&mut replicas, exchange.permutation());
            exchange.swap_phase(&mut replicas, ctx, (block + 1) * 100).unwrap();
        }
        (replicas, exchange, recorder)
    }

    #[test]
    fn restore_returns_exactly_what_was_saved() {
        let dir = tempdir().unwrap();
        let ctx = test_context(vec![300.0, 340.0, 380.0], None);
        let (replicas, exchange, recorder) = advanced_state(&ctx);
        let manager = CheckpointManager::new(dir.path());
        manager.save(300, &replicas, &exchange, &recorder).unwrap();

        let restored = manager.restore(&ctx).unwrap();
        assert_eq!(restored.move_index, 300);
        assert_eq!(restored.exchange, exchange);
        assert_eq!(restored.recorder, recorder);
        for (a, b) in restored.replicas.iter().zip(&replicas) {
            assert_eq!(a.conformation, b.conformation);
            assert_eq!(a.counters, b.counters);
            assert_eq!(a.rng(), b.rng());
            assert!(a.energy.max_deviation(&b.energy) < 1e-12);
        }
    }

    #[test]
    fn restored_run_continues_like_an_uninterrupted_one() {
        let dir = tempdir().unwrap();
        let ctx = test_context(vec![300.0, 340.0], None);
        let (mut replicas, exchange, recorder) = advanced_state(&ctx);
        let manager = CheckpointManager::new(dir.path());
        manager.save(300, &replicas, &exchange, &recorder).unwrap();
        let mut restored = manager.restore(&ctx).unwrap().replicas;

        for (a, b) in replicas.iter_mut().zip(restored.iter_mut()) {
            a.run_block(&ctx, 300, 100).unwrap();
            b.run_block(&ctx, 300, 100).unwrap();
            assert_eq!(a.conformation, b.conformation);
            assert_eq!(a.counters, b.counters);
        }
    }

    #[test]
    fn tampered_energy_fails_integrity_check() {
        let dir = tempdir().unwrap();
        let ctx = test_context(vec![300.0, 340.0], None);
        let (mut replicas, exchange, recorder) = advanced_state(&ctx);
        replicas[1].energy.nonbonded += 0.5;
        let manager = CheckpointManager::new(dir.path());
        manager.save(300, &replicas, &exchange, &recorder).unwrap();
        let err = manager.restore(&ctx).unwrap_err();
        assert!(matches!(err, CheckpointError::IntegrityMismatch { replica: 1, .. }));
    }

    #[test]
    fn restore_rejects_a_different_ladder() {
        let dir = tempdir().unwrap();
        let ctx = test_context(vec![300.0, 340.0], None);
        let (replicas, exchange, recorder) = advanced_state(&ctx);
        let manager = CheckpointManager::new(dir.path());
        manager.save(300, &replicas, &exchange, &recorder).unwrap();

        let three = test_context(vec![300.0, 340.0, 380.0], None);
        assert!(matches!(manager.restore(&three), Err(CheckpointError::Shape(_))));
        let hotter = test_context(vec![310.0, 340.0], None);
        assert!(matches!(manager.restore(&hotter), Err(CheckpointError::Shape(_))));
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let dir = tempdir().unwrap();
        let ctx = test_context(vec![300.0], None);
        let (replicas, exchange, recorder) = advanced_state(&ctx);
        let manager = CheckpointManager::new(dir.path());
        manager.save(300, &replicas, &exchange, &recorder).unwrap();
        let text = std::fs::read_to_string(manager.path()).unwrap();
        std::fs::write(manager.path(), text.replacen("\"version\":1", "\"version\":99", 1)).unwrap();
        assert!(matches!(
            manager.restore(&ctx),
            Err(CheckpointError::Version { found: 99, .. })
        ));
    }

    #[test]
    fn repeated_saves_replace_the_checkpoint_without_leftovers() {
        let dir = tempdir().unwrap();
        let ctx = test_context(vec![300.0], None);
        let (replicas, exchange, recorder) = advanced_state(&ctx);
        let manager = CheckpointManager::new(dir.path());
        manager.save(100, &replicas, &exchange, &recorder).unwrap();
        manager.save(300, &replicas, &exchange, &recorder).unwrap();
        assert_eq!(CheckpointManager::load(manager.path()).unwrap().move_index, 300);
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn extend_resets_counters_and_keeps_ordering() {
        let dir = tempdir().unwrap();
        let ctx = test_context(vec![300.0, 340.0, 380.0], None);
        let (replicas, exchange, recorder) = advanced_state(&ctx);
        CheckpointManager::new(dir.path())
            .save(300, &replicas, &exchange, &recorder)
            .unwrap();

        let umbrella = Some(Umbrella::QPin {
            spring: 0.1,
            targets: vec![2.0],
        });
        let next = test_context(vec![300.0, 340.0, 380.0], umbrella);
        let extended = CheckpointManager::extend(dir.path(), &next).unwrap();
        assert_eq!(extended.move_index, 0);
        assert_eq!(extended.exchange.permutation(), exchange.permutation());
        assert_eq!(extended.exchange.history(), &[exchange.permutation().to_vec()]);
        assert!(extended.exchange.edges().iter().all(|e| e.attempted() == 0));
        for (r, old) in extended.replicas.iter().zip(&replicas) {
            assert_eq!(r.counters.total_proposed(), 0);
            assert_eq!(r.conformation, old.conformation);
            assert!(r.energy.restraint.is_some());
        }
    }
}
