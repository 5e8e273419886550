use crate::error::{CliError, Result};
use gorex::core::forcefield::potentials::PairForm;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The run configuration as written in TOML. Every field is optional so that command-line
/// arguments and built-in defaults can fill the gaps.
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    pub parameters: Option<PathBuf>,
    pub coordinates: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub seed: Option<u64>,
    pub threads: Option<usize>,
    pub replicas: Option<FileReplicaConfig>,
    pub schedule: Option<FileScheduleConfig>,
    pub moves: Option<FileMovesConfig>,
    pub dynamics: Option<FileDynamicsConfig>,
    pub potentials: Option<FilePotentialsConfig>,
    pub surface: Option<FileSurfaceConfig>,
    pub umbrella: Option<FileUmbrellaConfig>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileReplicaConfig {
    pub count: Option<usize>,
    pub temperatures: Option<Vec<f64>>,
    pub temperature_range: Option<[f64; 2]>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileScheduleConfig {
    pub total_moves: Option<u64>,
    pub swap_interval: Option<u64>,
    pub swap_sweeps: Option<usize>,
    pub save_interval: Option<u64>,
    pub checkpoint_seconds: Option<u64>,
    pub worker_timeout_seconds: Option<u64>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileMovesConfig {
    pub frequencies: Option<FileMoveRatios>,
    pub step_sizes: Option<FileStepSizes>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileMoveRatios {
    pub translation: Option<f64>,
    pub rotation: Option<f64>,
    pub bend: Option<f64>,
    pub torsion: Option<f64>,
    pub crankshaft: Option<f64>,
    pub parrot: Option<f64>,
    pub dynamics: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileStepSizes {
    pub translation: Option<f64>,
    pub rotation: Option<f64>,
    pub bend: Option<f64>,
    pub torsion: Option<f64>,
    pub crankshaft: Option<f64>,
    pub parrot: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileDynamicsConfig {
    pub time_step_fs: Option<f64>,
    pub steps: Option<usize>,
    pub constraint_tolerance: Option<f64>,
    pub max_constraint_iterations: Option<usize>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FilePotentialsConfig {
    pub native: Option<PairForm>,
    pub nonnative: Option<PairForm>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileSurfaceConfig {
    pub enabled: Option<bool>,
    pub x_size: Option<f64>,
    pub y_size: Option<f64>,
    pub spacing: Option<f64>,
    pub margin: Option<f64>,
    pub scale: Option<f64>,
    pub clearance: Option<f64>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", tag = "type", deny_unknown_fields)]
pub enum FileUmbrellaConfig {
    ZPin {
        spring: Option<f64>,
        target: f64,
    },
    QPin {
        spring: Option<f64>,
        targets: Vec<f64>,
    },
}

impl FileConfig {
    /// Reads a TOML file and applies `KEY=VALUE` overrides to the document before it is
    /// deserialized, so overrides are validated exactly like file content.
    pub fn from_file(path: &Path, set_values: &[String]) -> Result<Self> {
        debug!("Loading run configuration from {:?}", path);
        let content = std::fs::read_to_string(path)?;
        let document: toml::Table =
            toml::from_str(&content).map_err(|e| CliError::FileParsing {
                path: path.to_path_buf(),
                source: e.into(),
            })?;
        Self::from_document(document, set_values).map_err(|e| match e {
            CliError::Config(msg) => CliError::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    /// Builds a configuration from overrides alone.
    pub fn from_overrides(set_values: &[String]) -> Result<Self> {
        Self::from_document(toml::Table::new(), set_values)
    }

    fn from_document(mut document: toml::Table, set_values: &[String]) -> Result<Self> {
        for kv_pair in set_values {
            apply_set_value(&mut document, kv_pair)?;
        }
        toml::Value::Table(document)
            .try_into()
            .map_err(|e: toml::de::Error| CliError::Config(e.to_string()))
    }
}

fn apply_set_value(document: &mut toml::Table, kv_pair: &str) -> Result<()> {
    let Some((key, value_str)) = kv_pair.split_once('=') else {
        return Err(CliError::Config(format!(
            "Invalid --set format: '{}'. Expected KEY=VALUE.",
            kv_pair
        )));
    };
    let path: Vec<&str> = key.trim().split('.').collect();
    if path.iter().any(|segment| segment.is_empty()) {
        return Err(CliError::Config(format!("Invalid --set key: '{}'", key)));
    }

    let (leaf, parents) = path.split_last().ok_or_else(|| {
        CliError::Config(format!("Invalid --set key: '{}'", key))
    })?;
    let mut table = document;
    for segment in parents {
        let entry = table
            .entry(segment.to_string())
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));
        table = entry.as_table_mut().ok_or_else(|| {
            CliError::Config(format!("'{}' in --set key '{}' is not a table", segment, key))
        })?;
    }
    table.insert(leaf.to_string(), parse_value(value_str.trim()));
    Ok(())
}

/// Interprets the right-hand side of `KEY=VALUE` as a TOML value, falling back to a bare
/// string so that paths and names need no quoting.
fn parse_value(raw: &str) -> toml::Value {
    toml::from_str::<toml::Table>(&format!("value = {raw}"))
        .ok()
        .and_then(|mut t| t.remove("value"))
        .unwrap_or_else(|| toml::Value::String(raw.to_string()))
}
