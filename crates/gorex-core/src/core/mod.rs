//! # Core Module
//!
//! Stateless building blocks shared by every replica: chain and surface geometry, the
//! parameter table and the energy model.
//!
//! - **Models** ([`models`]) - Bead conformations and the adsorbing surface lattice
//! - **Energy** ([`forcefield`]) - Parameters, potentials and energy evaluation
//! - **Geometry** ([`utils`]) - Angles, dihedrals, rotations and their gradients

pub mod forcefield;
pub mod models;
pub mod utils;
