use super::checkpoint::CheckpointError;
use super::config::ConfigError;
use crate::core::forcefield::params::{ParamLoadError, ParameterError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Configuration error: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Invalid parameters: {source}")]
    Parameters {
        #[from]
        source: ParameterError,
    },

    #[error("Failed to load inputs: {source}")]
    Load {
        #[from]
        source: ParamLoadError,
    },

    #[error("Checkpoint error: {source}")]
    Checkpoint {
        #[from]
        source: CheckpointError,
    },

    #[error("Failed to write output '{path}': {source}")]
    Output { path: String, source: csv::Error },

    #[error("I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Replica {replica} failed during its move block: {reason}")]
    WorkerFailed { replica: usize, reason: String },

    #[error("Replica {replica} did not finish its move block within {seconds:.1} s")]
    WorkerTimeout { replica: usize, seconds: f64 },

    #[error("Replica {replica} reached non-finite energy {energy} at move {move_index}")]
    NonFiniteEnergy {
        replica: usize,
        move_index: u64,
        energy: f64,
    },

    #[error("Internal logic error: {0}")]
    Internal(String),
}
