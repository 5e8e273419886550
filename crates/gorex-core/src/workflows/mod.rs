//! # Workflows Module
//!
//! High-level entry points that run complete simulations.
//!
//! - **Simulation Workflow** ([`simulate`]) - Fresh, restarted or extended replica-exchange
//!   runs, including periodic checkpoints, per-temperature output and a final summary.

pub mod simulate;
