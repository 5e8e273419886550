use gorex::engine::config as core_config;
use std::path::PathBuf;

pub struct AppConfig {
    pub parameters_path: PathBuf,
    pub coordinates_path: PathBuf,
    pub core_config: core_config::SimulationConfig,
}
