use crate::error::{CliError, Result};
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*};

/// Console level for the `-v` count; `--quiet` keeps errors only.
fn console_level(verbosity: u8, quiet: bool) -> LevelFilter {
    match (quiet, verbosity) {
        (true, _) => LevelFilter::ERROR,
        (false, 0) => LevelFilter::WARN,
        (false, 1) => LevelFilter::INFO,
        (false, 2) => LevelFilter::DEBUG,
        (false, _) => LevelFilter::TRACE,
    }
}

/// A plain-text DEBUG layer for `--log-file`, with thread names so worker output can be told
/// apart.
fn file_layer<S>(path: &Path) -> Result<impl tracing_subscriber::Layer<S>>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    let file = File::create(path)?;
    Ok(fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_thread_names(true)
        .with_thread_ids(true)
        .with_target(true)
        .with_filter(LevelFilter::DEBUG))
}

/// Installs the global subscriber: compact console output on stderr plus an optional file.
pub fn setup_logging(verbosity: u8, quiet: bool, log_file: Option<&Path>) -> Result<()> {
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .with_filter(console_level(verbosity, quiet));
    let file = log_file.map(file_layer).transpose()?;

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| CliError::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::path::PathBuf;
    use tracing::{debug, info, trace};

    #[test]
    fn verbosity_maps_to_increasing_levels() {
        assert_eq!(console_level(0, false), LevelFilter::WARN);
        assert_eq!(console_level(1, false), LevelFilter::INFO);
        assert_eq!(console_level(2, false), LevelFilter::DEBUG);
        assert_eq!(console_level(9, false), LevelFilter::TRACE);
        assert_eq!(console_level(2, true), LevelFilter::ERROR);
    }

    #[test]
    #[serial]
    fn file_layer_writes_debug_records_with_thread_ids() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("run.log");

        let layer = file_layer(&log_path).unwrap();
        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            debug!(slot = 1, "Swap attempt between slots 1 and 2.");
            info!("Sampling finished.");
        });

        let content = std::fs::read_to_string(&log_path).unwrap();
        assert!(content.contains("Swap attempt between slots 1 and 2."));
        assert!(content.contains("slot=1"));
        assert!(content.contains("DEBUG"));
        assert!(content.contains("ThreadId"));
    }

    #[test]
    #[serial]
    fn second_initialization_is_reported_not_panicked() {
        let first = setup_logging(3, false, None);
        trace!("Logger installed for the test binary.");
        let second = setup_logging(0, false, None);
        assert!(first.is_ok() || matches!(first, Err(CliError::Logging(_))));
        assert!(matches!(second, Err(CliError::Logging(_))));
    }

    #[test]
    #[serial]
    fn unwritable_log_file_is_an_io_error() {
        let invalid_path = PathBuf::from("/");

        if cfg!(unix) && invalid_path.is_dir() {
            let result = setup_logging(0, false, Some(&invalid_path));
            assert!(matches!(result, Err(CliError::Io(_))));
        }
    }
}
