use super::context::SimulationContext;
use super::error::EngineError;
use super::replica::ReplicaState;
use std::sync::Arc;

#[cfg(feature = "parallel")]
use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::mpsc::{self, RecvTimeoutError},
    time::{Duration, Instant},
};

/// Runs one move block on an exclusively owned replica and hands it back.
pub fn run_block(
    mut replica: ReplicaState,
    ctx: &SimulationContext,
    start: u64,
    moves: u64,
) -> Result<ReplicaState, EngineError> {
    replica.run_block(ctx, start, moves)?;
    Ok(replica)
}

/// Executes the move phase for every replica and joins before returning.
///
/// Replicas come back in slot order. The first failure aborts the whole phase.
pub trait WorkerPool {
    fn join_all(
        &self,
        replicas: Vec<ReplicaState>,
        ctx: &Arc<SimulationContext>,
        start: u64,
        moves: u64,
    ) -> Result<Vec<ReplicaState>, EngineError>;
}

/// Runs blocks one after another on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct SequentialPool;

impl WorkerPool for SequentialPool {
    fn join_all(
        &self,
        replicas: Vec<ReplicaState>,
        ctx: &Arc<SimulationContext>,
        start: u64,
        moves: u64,
    ) -> Result<Vec<ReplicaState>, EngineError> {
        replicas
            .into_iter()
            .map(|replica| run_block(replica, ctx, start, moves))
            .collect()
    }
}

/// Runs one task per replica on a dedicated rayon pool, with an optional deadline.
#[cfg(feature = "parallel")]
pub struct ThreadedPool {
    pool: rayon::ThreadPool,
    timeout: Option<Duration>,
}

#[cfg(feature = "parallel")]
impl ThreadedPool {
    /// `threads == 0` uses rayon's default thread count.
    pub fn new(threads: usize, timeout: Option<Duration>) -> Result<Self, EngineError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("gorex-worker-{i}"))
            .build()
            .map_err(|e| EngineError::Initialization(format!("Failed to start worker pool: {e}")))?;
        Ok(Self { pool, timeout })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

#[cfg(feature = "parallel")]
fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "worker panicked".to_string())
}

#[cfg(feature = "parallel")]
impl WorkerPool for ThreadedPool {
    fn join_all(
        &self,
        replicas: Vec<ReplicaState>,
        ctx: &Arc<SimulationContext>,
        start: u64,
        moves: u64,
    ) -> Result<Vec<ReplicaState>, EngineError> {
        let count = replicas.len();
        let (tx, rx) = mpsc::channel();
        for replica in replicas {
            let tx = tx.clone();
            let ctx = Arc::clone(ctx);
            let slot = replica.slot;
            self.pool.spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    run_block(replica, &ctx, start, moves)
                }));
                let _ = tx.send((slot, outcome));
            });
        }
        drop(tx);

        let deadline = self.timeout.map(|t| (t, Instant::now() + t));
        let mut finished: Vec<Option<ReplicaState>> = (0..count).map(|_| None).collect();
        let mut first_error = None;
        for _ in 0..count {
            let received = match deadline {
                Some((_, at)) => rx.recv_timeout(at.saturating_duration_since(Instant::now())),
                None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match received {
                Ok((slot, Ok(Ok(replica)))) => finished[slot] = Some(replica),
                Ok((_, Ok(Err(e)))) => {
                    first_error.get_or_insert(e);
                }
                Ok((slot, Err(payload))) => {
                    first_error.get_or_insert(EngineError::WorkerFailed {
                        replica: slot,
                        reason: panic_message(payload.as_ref()),
                    });
                }
                Err(RecvTimeoutError::Timeout) => {
                    let replica = finished.iter().position(Option::is_none).unwrap_or(0);
                    let seconds = deadline.map_or(0.0, |(t, _)| t.as_secs_f64());
                    return Err(EngineError::WorkerTimeout { replica, seconds });
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(EngineError::Internal(
                        "worker channel closed before every block finished".to_string(),
                    ));
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }
        finished
            .into_iter()
            .enumerate()
            .map(|(slot, r)| {
                r.ok_or_else(|| EngineError::Internal(format!("replica {slot} was never returned")))
            })
            .collect()
    }
}
