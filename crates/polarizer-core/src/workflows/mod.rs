//! # Workflows Module
//!
//! High-level entry points that load the three input files, drive a
//! [`polarize::Polarizer`] through every stage and report progress on the way.
//!
//! - **Polarization** ([`polarize::run`]) - The complete conversion, ending with both
//!   augmented files written
//! - **Dry run** ([`polarize::check`]) - Stops after validation and returns the Drude
//!   types a full run would use

pub mod polarize;
