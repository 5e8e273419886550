use std::path::PathBuf;

/// Values used when neither the command line nor the config file sets an option. The
/// engine supplies its own defaults for move ratios, step sizes and dynamics settings.
pub struct DefaultsConfig {
    pub replicas: usize,
    pub temperature_range: [f64; 2],
    pub total_moves: u64,
    pub swap_interval: u64,
    pub swap_sweeps: usize,
    pub save_interval: u64,
    pub checkpoint_seconds: u64,
    pub output_dir: PathBuf,
    pub z_pin_spring: f64,
    pub q_pin_spring: f64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            replicas: 8,
            temperature_range: [200.0, 400.0],
            total_moves: 10_000,
            swap_interval: 1_000,
            swap_sweeps: 500,
            save_interval: 1_000,
            checkpoint_seconds: 600,
            output_dir: PathBuf::from("."),
            z_pin_spring: 1.0,
            q_pin_spring: 10.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exchange_defaults_match_long_production_runs() {
        let defaults = DefaultsConfig::default();
        assert_eq!(defaults.swap_sweeps, 500);
        assert_eq!(defaults.swap_interval, 1_000);
        assert_eq!(defaults.replicas, 8);
        assert_eq!(defaults.temperature_range, [200.0, 400.0]);
    }
}
