//! # Force Field Module
//!
//! Energy evaluation for Go-model chains: the bonded angle and torsion terms, native and
//! nonnative pair potentials, the optional adsorbing surface, and umbrella restraints.
//!
//! ## Key Components
//!
//! - [`params`] - The immutable [`params::ParameterTable`] and its TOML loader
//! - [`potentials`] - Pair forms, harmonic and Fourier terms with their derivatives
//! - [`term`] - [`term::EnergyComponents`], the cached per-term energies of a replica
//! - [`energy`] - [`energy::EnergyModel`], full and incremental evaluation plus forces
//! - [`restraint`] - Harmonic umbrella restraints on collective coordinates
//!
//! ## Usage
//!
//! ```ignore
//! use gorex::core::forcefield::{energy::EnergyModel, params::ParameterTable, potentials::PairForm};
//!
//! let params = Arc::new(ParameterTable::load(path)?);
//! let model = EnergyModel::new(params, PairForm::TwelveTenSix, PairForm::Repulsive);
//! let energy = model.full_energy(&conformation);
//! ```

pub mod energy;
pub mod params;
pub mod potentials;
pub mod restraint;
pub mod term;
