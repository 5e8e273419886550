use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Gorex Developers",
    version,
    about = "Gorex CLI - Replica-exchange Monte Carlo sampling of coarse-grained Go-model proteins, free or adsorbed on a surface.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Number of worker threads for the replica move phase.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run (or resume) a replica-exchange simulation.
    Run(RunArgs),
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    // --- Core Arguments ---
    /// Path to the run configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the Go-model parameter file (TOML).
    #[arg(short, long, value_name = "PATH")]
    pub params: Option<PathBuf>,

    /// Override the starting coordinates (CSV with x,y,z columns).
    #[arg(short = 'x', long, value_name = "PATH")]
    pub coordinates: Option<PathBuf>,

    /// Override the output directory for time series and checkpoints.
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    // --- Resume Mode ---
    #[command(flatten)]
    pub resume: ResumeArgs,

    // --- Schedule Overrides ---
    /// Override the number of replicas.
    #[arg(short = 'n', long, value_name = "INT")]
    pub replicas: Option<usize>,

    /// Override the total number of moves per replica.
    #[arg(short = 'm', long, value_name = "INT")]
    pub total_moves: Option<u64>,

    /// Override the random seed.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    /// Disable the adsorbing surface, even if it is defined in the config file.
    #[arg(long)]
    pub no_surface: bool,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S schedule.swap-interval=500
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Mutually exclusive ways of continuing earlier work.
#[derive(Args, Debug, Clone, Default)]
#[group(required = false, multiple = false)]
pub struct ResumeArgs {
    /// Continue from the checkpoint in the output directory.
    #[arg(long)]
    pub restart: bool,
    /// Start a new run from the final checkpoint of a previous run (directory or file).
    #[arg(long, value_name = "PATH")]
    pub extend: Option<PathBuf>,
}
