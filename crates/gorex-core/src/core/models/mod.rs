//! Data models for a single coarse-grained chain and its environment.
//!
//! - [`conformation`] - Ordered bead positions of one chain
//! - [`surface`] - Periodic hexagonal lattice of adsorbing sites

pub mod conformation;
pub mod surface;
