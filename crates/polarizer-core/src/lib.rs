//! # Polarizer Core Library
//!
//! Converts a non-polarizable atomistic topology and its OpenMM force field into a
//! polarizable one by attaching a charged Drude (shadow) particle to every atom whose
//! non-bonded type carries a polarizability.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Topology`, `Forcefield`,
//!   `DrudeParameterSet`), the fixed-column record codec and the file readers/writers.
//!
//! - **[`engine`]: The Logic Core.** Configuration, error kinds, progress reporting, the
//!   one-way stage machine and the injectable displacement source used to place shadow
//!   particles.
//!
//! - **[`workflows`]: The Public API.** Ties `engine` and `core` together so that the
//!   topology and the force field are augmented in lock-step and written consistently.

pub mod core;
pub mod engine;
pub mod workflows;
