use super::error::EngineError;
use super::exchange::ExchangeScheduler;
use super::replica::ReplicaState;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One row of a per-temperature time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotRow {
    pub move_index: u64,
    pub walker: usize,
    pub energy: f64,
    pub native_contacts: usize,
    pub surface: Option<f64>,
    pub restraint: Option<f64>,
}

/// One row of a walker's series across the temperatures it visited.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalkerRow {
    pub move_index: u64,
    pub slot: usize,
    pub temperature: f64,
    pub energy: f64,
    pub native_contacts: usize,
}

#[derive(Debug, Serialize)]
struct EdgeRow {
    lower_slot: usize,
    upper_slot: usize,
    lower_temperature: f64,
    upper_temperature: f64,
    attempted: u64,
    accepted: u64,
    acceptance: f64,
}

/// Collects the samples of every slot and writes the run's CSV outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recorder {
    temperatures: Vec<f64>,
    slots: Vec<Vec<SlotRow>>,
}

impl Recorder {
    pub fn new(temperatures: Vec<f64>) -> Self {
        let slots = vec![Vec::new(); temperatures.len()];
        Self { temperatures, slots }
    }

    /// Moves pending samples out of the replicas, tagging each with the walker that
    /// occupied the slot during the block.
    pub fn collect(&mut self, replicas: &mut [ReplicaState], permutation: &[usize]) {
        for replica in replicas.iter_mut() {
            let walker = permutation[replica.slot];
            self.slots[replica.slot].extend(replica.samples.drain(..).map(|s| SlotRow {
                move_index: s.move_index,
                walker,
                energy: s.energy,
                native_contacts: s.native_contacts,
                surface: s.surface,
                restraint: s.restraint,
            }));
        }
    }

    pub fn slot_series(&self, slot: usize) -> &[SlotRow] {
        &self.slots[slot]
    }

    /// Rebuilds one walker's trajectory through the ladder from the per-slot series.
    pub fn walker_series(&self, walker: usize) -> Vec<WalkerRow> {
        self.slots
            .iter()
            .enumerate()
            .flat_map(|(slot, rows)| {
                rows.iter().filter(move |r| r.walker == walker).map(move |r| WalkerRow {
                    move_index: r.move_index,
                    slot,
                    temperature: self.temperatures[slot],
                    energy: r.energy,
                    native_contacts: r.native_contacts,
                })
            })
            .sorted_by_key(|r| r.move_index)
            .collect()
    }

    pub fn slot_file_name(slot: usize, temperature: f64) -> String {
        format!("slot_{slot}_{temperature:.1}K.csv")
    }

    /// Writes every series plus the swap history into `dir`, replacing earlier files.
    pub fn write(&self, dir: &Path, exchange: &ExchangeScheduler) -> Result<(), EngineError> {
        for (slot, rows) in self.slots.iter().enumerate() {
            let path = dir.join(Self::slot_file_name(slot, self.temperatures[slot]));
            write_rows(&path, rows)?;
        }
        for walker in 0..self.slots.len() {
            let path = dir.join(format!("walker_{walker}.csv"));
            write_rows(&path, &self.walker_series(walker))?;
        }
        self.write_permutations(&dir.join("permutation.csv"), exchange.history())?;

        let temps = &self.temperatures;
        let edges: Vec<EdgeRow> = exchange
            .edges()
            .iter()
            .enumerate()
            .map(|(lower, edge)| EdgeRow {
                lower_slot: lower,
                upper_slot: lower + 1,
                lower_temperature: temps[lower],
                upper_temperature: temps[lower + 1],
                attempted: edge.attempted(),
                accepted: edge.accepted,
                acceptance: edge.acceptance(),
            })
            .collect();
        write_rows(&dir.join("swaps.csv"), &edges)
    }

    fn write_permutations(&self, path: &Path, history: &[Vec<usize>]) -> Result<(), EngineError> {
        let mut writer = csv::Writer::from_path(path).map_err(|e| output_error(path, e))?;
        let header = std::iter::once("phase".to_string())
            .chain((0..self.slots.len()).map(|s| format!("slot_{s}")))
            .collect_vec();
        writer.write_record(&header).map_err(|e| output_error(path, e))?;
        for (phase, permutation) in history.iter().enumerate() {
            let record = std::iter::once(phase.to_string())
                .chain(permutation.iter().map(usize::to_string))
                .collect_vec();
            writer.write_record(&record).map_err(|e| output_error(path, e))?;
        }
        writer.flush().map_err(|e| EngineError::Io {
            path: path.display().to_string(),
            source: e,
        })
    }
}

fn output_error(path: &Path, source: csv::Error) -> EngineError {
    EngineError::Output {
        path: path.display().to_string(),
        source,
    }
}

fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), EngineError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| output_error(path, e))?;
    for row in rows {
        writer.serialize(row).map_err(|e| output_error(path, e))?;
    }
    writer.flush().map_err(|e| EngineError::Io {
        path: path.display().to_string(),
        source: e,
    })
}
