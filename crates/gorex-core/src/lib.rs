//! # Gorex Core Library
//!
//! Replica-exchange Monte Carlo sampling for coarse-grained Go-model proteins, with optional
//! adsorption onto a planar surface and umbrella restraints.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Stateless data and mathematics: the immutable
//!   `ParameterTable`, pair and bonded potentials, the `EnergyModel` with full and
//!   incremental evaluation, chain conformations and the surface lattice.
//!
//! - **[`engine`]: The Sampling Machinery.** Stateful components that drive a run: move
//!   proposals, the Metropolis test, per-replica state, the parallel-tempering swap
//!   protocol, the worker pool that runs move blocks, checkpoints and output recording.
//!
//! - **[`workflows`]: The Public API.** End-to-end procedures that tie `engine` and `core`
//!   together. A caller supplies parsed inputs and a `SimulationConfig` and receives the
//!   final ensemble, with every output file written along the way.

pub mod core;
pub mod engine;
pub mod workflows;
