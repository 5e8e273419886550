use super::defaults::DefaultsConfig;
use super::file::{
    FileConfig, FileDynamicsConfig, FileMoveRatios, FileReplicaConfig, FileStepSizes,
    FileSurfaceConfig, FileUmbrellaConfig,
};
use super::models::AppConfig;
use crate::cli::RunArgs;
use crate::error::{CliError, Result};
use gorex::engine::config as core_config;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::info;

pub fn build_config(args: &RunArgs, threads: Option<usize>) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();

    let file_config = match &args.config {
        Some(path) => FileConfig::from_file(path, &args.set_values)?,
        None => FileConfig::from_overrides(&args.set_values)?,
    };
    // Relative paths inside a config file are taken relative to that file.
    let base_dir = args
        .config
        .as_deref()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let parameters_path = args
        .params
        .clone()
        .or_else(|| file_config.parameters.as_ref().map(|p| base_dir.join(p)))
        .ok_or_else(|| {
            CliError::Argument("a parameter file is required (--params or `parameters`)".into())
        })?;
    let coordinates_path = args
        .coordinates
        .clone()
        .or_else(|| file_config.coordinates.as_ref().map(|p| base_dir.join(p)))
        .ok_or_else(|| {
            CliError::Argument(
                "starting coordinates are required (--coordinates or `coordinates`)".into(),
            )
        })?;
    let output_dir = args
        .output
        .clone()
        .or_else(|| file_config.output_dir.as_ref().map(|p| base_dir.join(p)))
        .unwrap_or_else(|| defaults.output_dir.clone());

    let replica_file = file_config.replicas.clone().unwrap_or_default();
    let (replicas, ladder) = merge_ladder(args.replicas, replica_file, &defaults);

    let schedule = file_config.schedule.clone().unwrap_or_default();
    let total_moves = args
        .total_moves
        .or(schedule.total_moves)
        .unwrap_or(defaults.total_moves);
    let checkpoint_seconds = schedule
        .checkpoint_seconds
        .unwrap_or(defaults.checkpoint_seconds);

    let moves = file_config.moves.clone().unwrap_or_default();
    let potentials = file_config.potentials.clone().unwrap_or_default();
    let surface = if args.no_surface {
        None
    } else {
        merge_surface(file_config.surface.clone())
    };
    let umbrella = file_config
        .umbrella
        .clone()
        .map(|u| merge_umbrella(u, &defaults));

    let seed = args.seed.or(file_config.seed).unwrap_or_else(|| {
        let seed = clock_seed();
        info!("No seed given; using {} from the system clock.", seed);
        seed
    });

    let mut builder = core_config::SimulationConfigBuilder::new()
        .replicas(replicas)
        .ladder(ladder)
        .total_moves(total_moves)
        .swap_interval(schedule.swap_interval.unwrap_or(defaults.swap_interval))
        .swap_sweeps(schedule.swap_sweeps.unwrap_or(defaults.swap_sweeps))
        .save_interval(schedule.save_interval.unwrap_or(defaults.save_interval))
        .checkpoint_interval(Duration::from_secs(checkpoint_seconds))
        .frequencies(merge_frequencies(moves.frequencies))
        .step_sizes(merge_step_sizes(moves.step_sizes))
        .dynamics(merge_dynamics(file_config.dynamics.clone()))
        .surface(surface)
        .umbrella(umbrella)
        .seed(seed)
        .output_dir(output_dir)
        .resume(merge_resume(args))
        .threads(threads.or(file_config.threads).unwrap_or(0))
        .worker_timeout(schedule.worker_timeout_seconds.map(Duration::from_secs));
    if let Some(form) = potentials.native {
        builder = builder.native_form(form);
    }
    if let Some(form) = potentials.nonnative {
        builder = builder.nonnative_form(form);
    }

    let core_config = builder
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    Ok(AppConfig {
        parameters_path,
        coordinates_path,
        core_config,
    })
}

fn merge_ladder(
    cli_replicas: Option<usize>,
    file_val: FileReplicaConfig,
    defaults: &DefaultsConfig,
) -> (usize, core_config::TemperatureLadder) {
    match file_val.temperatures {
        Some(list) => {
            let count = cli_replicas.or(file_val.count).unwrap_or(list.len());
            (count, core_config::TemperatureLadder::Explicit(list))
        }
        None => {
            let [low, high] = file_val
                .temperature_range
                .unwrap_or(defaults.temperature_range);
            let count = cli_replicas
                .or(file_val.count)
                .unwrap_or(defaults.replicas);
            (count, core_config::TemperatureLadder::Range { low, high })
        }
    }
}

fn merge_frequencies(file_val: Option<FileMoveRatios>) -> core_config::MoveFrequencies {
    let base = core_config::MoveFrequencies::default();
    let Some(f) = file_val else {
        return base;
    };
    core_config::MoveFrequencies {
        translation: f.translation.unwrap_or(base.translation),
        rotation: f.rotation.unwrap_or(base.rotation),
        bend: f.bend.unwrap_or(base.bend),
        torsion: f.torsion.unwrap_or(base.torsion),
        crankshaft: f.crankshaft.unwrap_or(base.crankshaft),
        parrot: f.parrot.unwrap_or(base.parrot),
        dynamics: f.dynamics.unwrap_or(base.dynamics),
    }
}

fn merge_step_sizes(file_val: Option<FileStepSizes>) -> core_config::StepSizes {
    let base = core_config::StepSizes::default();
    let Some(s) = file_val else {
        return base;
    };
    core_config::StepSizes {
        translation: s.translation.unwrap_or(base.translation),
        rotation: s.rotation.unwrap_or(base.rotation),
        bend: s.bend.unwrap_or(base.bend),
        torsion: s.torsion.unwrap_or(base.torsion),
        crankshaft: s.crankshaft.unwrap_or(base.crankshaft),
        parrot: s.parrot.unwrap_or(base.parrot),
    }
}

fn merge_dynamics(file_val: Option<FileDynamicsConfig>) -> core_config::DynamicsSettings {
    let base = core_config::DynamicsSettings::default();
    let Some(d) = file_val else {
        return base;
    };
    core_config::DynamicsSettings {
        time_step_fs: d.time_step_fs.unwrap_or(base.time_step_fs),
        steps: d.steps.unwrap_or(base.steps),
        constraint_tolerance: d.constraint_tolerance.unwrap_or(base.constraint_tolerance),
        max_constraint_iterations: d
            .max_constraint_iterations
            .unwrap_or(base.max_constraint_iterations),
    }
}

/// A `[surface]` section turns the surface on unless it says `enabled = false`.
fn merge_surface(file_val: Option<FileSurfaceConfig>) -> Option<core_config::SurfaceSettings> {
    let s = file_val?;
    if s.enabled == Some(false) {
        return None;
    }
    let base = core_config::SurfaceSettings::default();
    Some(core_config::SurfaceSettings {
        x_size: s.x_size.unwrap_or(base.x_size),
        y_size: s.y_size.unwrap_or(base.y_size),
        spacing: s.spacing.unwrap_or(base.spacing),
        margin: s.margin.unwrap_or(base.margin),
        scale: s.scale.unwrap_or(base.scale),
        clearance: s.clearance.unwrap_or(base.clearance),
    })
}

fn merge_umbrella(file_val: FileUmbrellaConfig, defaults: &DefaultsConfig) -> core_config::Umbrella {
    match file_val {
        FileUmbrellaConfig::ZPin { spring, target } => core_config::Umbrella::ZPin {
            spring: spring.unwrap_or(defaults.z_pin_spring),
            target,
        },
        FileUmbrellaConfig::QPin { spring, targets } => core_config::Umbrella::QPin {
            spring: spring.unwrap_or(defaults.q_pin_spring),
            targets,
        },
    }
}

fn merge_resume(args: &RunArgs) -> core_config::ResumeMode {
    match (&args.resume.extend, args.resume.restart) {
        (Some(prior), _) => core_config::ResumeMode::Extend(prior.clone()),
        (None, true) => core_config::ResumeMode::Restart,
        (None, false) => core_config::ResumeMode::Fresh,
    }
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}
