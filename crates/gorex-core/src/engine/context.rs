use super::config::{ScaledSteps, SimulationConfig};
use super::error::EngineError;
use super::moves::{MoveGenerator, MoveTable};
use crate::core::forcefield::energy::EnergyModel;
use crate::core::forcefield::params::ParameterTable;
use crate::core::models::surface::SurfaceLattice;
use std::sync::Arc;

/// Read-only state shared by every replica for the whole run.
///
/// Each ladder slot gets its own [`EnergyModel`]; the models share the parameter table and
/// surface lattice and differ only in their umbrella restraint.
#[derive(Debug, Clone)]
pub struct SimulationContext {
    config: SimulationConfig,
    models: Vec<EnergyModel>,
    steps: Vec<ScaledSteps>,
    move_table: MoveTable,
}

impl SimulationContext {
    pub fn new(
        config: SimulationConfig,
        params: Arc<ParameterTable>,
        lattice: Option<Arc<SurfaceLattice>>,
    ) -> Result<Self, EngineError> {
        let mut base = EnergyModel::new(Arc::clone(&params), config.native_form, config.nonnative_form);
        if let (Some(lattice), Some(surface)) = (lattice, &config.surface) {
            base = base.with_surface(lattice, surface.scale)?;
        }
        let models = (0..config.replica_count())
            .map(|slot| {
                base.clone()
                    .with_restraint(config.umbrella.as_ref().map(|u| u.restraint_for_slot(slot)))
            })
            .collect();
        let steps = config
            .temperatures
            .iter()
            .map(|&t| config.step_sizes.scaled(t, params.bead_count()))
            .collect();
        let move_table = MoveTable::new(&config.frequencies)?;
        Ok(Self {
            config,
            models,
            steps,
            move_table,
        })
    }

    #[inline]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    #[inline]
    pub fn params(&self) -> &ParameterTable {
        self.models[0].params()
    }

    #[inline]
    pub fn replica_count(&self) -> usize {
        self.models.len()
    }

    #[inline]
    pub fn temperature(&self, slot: usize) -> f64 {
        self.config.temperatures[slot]
    }

    #[inline]
    pub fn model(&self, slot: usize) -> &EnergyModel {
        &self.models[slot]
    }

    #[inline]
    pub fn move_table(&self) -> &MoveTable {
        &self.move_table
    }

    /// Whether slots evaluate different Hamiltonians, not just different temperatures.
    pub fn slot_dependent(&self) -> bool {
        self.config
            .umbrella
            .as_ref()
            .is_some_and(|u| u.is_slot_dependent())
    }

    pub fn generator(&self, slot: usize) -> MoveGenerator<'_> {
        MoveGenerator::new(
            &self.models[slot],
            self.steps[slot],
            &self.config.dynamics,
            self.temperature(slot),
        )
    }
}
