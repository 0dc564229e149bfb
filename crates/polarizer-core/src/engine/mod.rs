//! # Engine Module
//!
//! Building blocks that drive a polarization run without knowing the file formats:
//! run configuration, error classification, progress events, the one-way stage
//! machine and the source of shadow particle displacements.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Input/output paths, perturbation and validation
//!   settings with their defaults
//! - **Error Handling** ([`error`]) - [`error::EngineError`] and its
//!   [`error::ErrorKind`] classification
//! - **Progress Monitoring** ([`progress`]) - Stage-level progress events
//! - **State Tracking** ([`state`]) - The [`state::Stage`] sequence of a run
//! - **Displacement** ([`displacement`]) - Injectable offsets for new shadow particles

pub mod config;
pub mod displacement;
pub mod error;
pub mod progress;
pub mod state;
