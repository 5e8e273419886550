use gorex::engine::error::EngineError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

/// Everything `gorex` can fail with before, during or after a run.
#[derive(Debug, Error)]
pub enum CliError {
    /// The simulation itself failed; the last committed checkpoint is left in place.
    #[error(transparent)]
    Simulation(#[from] EngineError),

    #[error("Invalid run configuration: {0}")]
    Config(String),

    #[error("Could not read input '{path}': {source}", path = path.display())]
    FileParsing {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing or invalid argument: {0}")]
    Argument(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
