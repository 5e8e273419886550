use crate::cli::RunArgs;
use crate::config::{self, AppConfig};
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use gorex::{
    core::forcefield::params::{self, ParameterTable},
    engine::progress::ProgressReporter,
    workflows::simulate::{self, SimulationInputs, SimulationResult},
};
use tracing::info;

pub fn run(args: RunArgs, threads: Option<usize>) -> Result<()> {
    info!("Merging configuration from file and CLI arguments...");
    let app = config::build_config(&args, threads)?;
    let inputs = load_inputs(&app)?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    let cfg = &app.core_config;
    println!(
        "Starting replica exchange: {} replicas, {:.1}-{:.1} K, {} moves each...",
        cfg.replica_count(),
        cfg.temperatures.first().copied().unwrap_or_default(),
        cfg.temperatures.last().copied().unwrap_or_default(),
        cfg.total_moves
    );
    info!("Invoking the core simulation workflow...");

    let result = simulate::run(inputs, cfg, &reporter)?;
    print_summary(&result);
    println!("✓ Outputs written to: {}", cfg.output_dir.display());

    Ok(())
}

fn load_inputs(app: &AppConfig) -> Result<SimulationInputs> {
    info!("Loading parameters from {:?}", &app.parameters_path);
    let params =
        ParameterTable::load(&app.parameters_path).map_err(|e| CliError::FileParsing {
            path: app.parameters_path.clone(),
            source: e.into(),
        })?;

    info!("Loading starting coordinates from {:?}", &app.coordinates_path);
    let conformation =
        params::load_coordinates(&app.coordinates_path).map_err(|e| CliError::FileParsing {
            path: app.coordinates_path.clone(),
            source: e.into(),
        })?;

    Ok(SimulationInputs {
        params,
        conformation,
    })
}

fn print_summary(result: &SimulationResult) {
    println!("Finished at move {}.", result.move_index);
    println!("  {:<12} {:>10} {:>10}", "move", "proposed", "accepted");
    for (kind, tally) in result.move_totals().iter() {
        if tally.proposed == 0 {
            continue;
        }
        println!(
            "  {:<12} {:>10} {:>9.1}%",
            kind.name(),
            tally.proposed,
            100.0 * tally.acceptance()
        );
    }
    let temperatures = result.exchange.temperatures();
    for (lower, edge) in result.swap_edges().iter().enumerate() {
        println!(
            "  swap {:>7.1} K <-> {:>7.1} K: {:>5.1}% of {}",
            temperatures[lower],
            temperatures[lower + 1],
            100.0 * edge.acceptance(),
            edge.attempted()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::ResumeArgs;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    // Five beads on a zig-zag with every bond at 3.8 Å.
    const COORDINATES: &str = "x,y,z\n\
        0.0,0.0,0.0\n\
        3.8,0.0,0.0\n\
        5.7,3.290896534,0.0\n\
        9.5,3.290896534,0.0\n\
        11.4,6.581793068,0.0\n";

    fn write_inputs(dir: &Path) {
        fs::write(dir.join("native.csv"), COORDINATES).unwrap();
        fs::write(dir.join("protein.toml"), parameter_file()).unwrap();
    }

    fn parameter_file() -> String {
        let angle = "[[angles]]\nforce_constant = 10.0\ntheta0 = 120.0\n";
        let torsion = "[[torsions]]\nterms = [[0.5, 1.0, 180.0]]\n";
        format!(
            "masses = [110.0, 110.0, 110.0, 110.0, 110.0]\n\
             bonds = [3.8, 3.8, 3.8, 3.8]\n\
             {angle}{angle}{angle}{torsion}{torsion}\
             [nonnative]\ndepth = 0.1\nradii = [2.0, 2.0, 2.0, 2.0, 2.0]\n\
             [[contacts]]\ni = 0\nj = 3\ndepth = 1.0\nradius = 5.0\n\
             [[contacts]]\ni = 0\nj = 4\ndepth = 1.0\nradius = 6.0\n\
             [[contacts]]\ni = 1\nj = 4\ndepth = 1.0\nradius = 5.0\n"
        )
    }

    fn run_args(dir: &Path) -> RunArgs {
        RunArgs {
            params: Some(dir.join("protein.toml")),
            coordinates: Some(dir.join("native.csv")),
            output: Some(dir.join("out")),
            replicas: Some(2),
            total_moves: Some(200),
            seed: Some(3),
            set_values: vec![
                "replicas.temperature-range=[300.0, 330.0]".to_string(),
                "schedule.swap-interval=50".to_string(),
                "schedule.save-interval=25".to_string(),
                "moves.frequencies.dynamics=0.0".to_string(),
            ],
            ..RunArgs::default()
        }
    }

    #[test]
    fn run_writes_series_and_checkpoint() {
        let dir = tempdir().unwrap();
        write_inputs(dir.path());

        run(run_args(dir.path()), Some(1)).expect("run succeeds");

        let out = dir.path().join("out");
        assert!(out.join("checkpoint.json").exists());
        assert!(out.join("slot_0_300.0K.csv").exists());
        assert!(out.join("slot_1_330.0K.csv").exists());
        assert!(out.join("permutation.csv").exists());
    }

    #[test]
    fn restart_continues_to_a_larger_move_count() {
        let dir = tempdir().unwrap();
        write_inputs(dir.path());
        run(run_args(dir.path()), Some(1)).expect("first run succeeds");

        let mut args = run_args(dir.path());
        args.total_moves = Some(400);
        args.resume = ResumeArgs {
            restart: true,
            extend: None,
        };
        run(args, Some(1)).expect("restart succeeds");

        let series =
            fs::read_to_string(dir.path().join("out").join("slot_0_300.0K.csv")).unwrap();
        assert_eq!(series.lines().count(), 1 + 400 / 25);
    }

    #[test]
    fn missing_parameter_file_reports_its_path() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("native.csv"), COORDINATES).unwrap();

        let err = run(run_args(dir.path()), Some(1)).unwrap_err();
        match err {
            CliError::FileParsing { path, .. } => {
                assert_eq!(path, dir.path().join("protein.toml"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
