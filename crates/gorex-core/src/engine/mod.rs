//! # Engine Module
//!
//! Stateful machinery of a replica-exchange run.
//!
//! ## Overview
//!
//! Each outer iteration runs a block of Monte Carlo moves on every replica in parallel,
//! waits for all of them at a barrier, and then attempts configuration swaps between
//! neighbouring temperatures. Replicas never share mutable state during the move phase;
//! the swap phase is serial and deterministic.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Run parameters and their builder
//! - **Context** ([`context`]) - Read-only per-slot energy models and move tables
//! - **Moves** ([`moves`]) - Proposal generators for every move family
//! - **Acceptance** ([`metropolis`]) - Metropolis and swap probabilities
//! - **Replicas** ([`replica`]) - Per-slot state, counters and the move-block loop
//! - **Exchange** ([`exchange`]) - Alternating-parity swaps and the slot permutation
//! - **Workers** ([`pool`]) - Sequential and thread-pool execution of move blocks
//! - **Persistence** ([`checkpoint`], [`recorder`]) - Checkpoints and CSV time series
//! - **Progress Monitoring** ([`progress`]) - Progress reporting callbacks
//! - **Error Handling** ([`error`]) - Engine error taxonomy

pub mod checkpoint;
pub mod config;
pub mod context;
pub mod error;
pub mod exchange;
pub mod metropolis;
pub mod moves;
pub mod pool;
pub mod progress;
pub mod recorder;
pub mod replica;
