//! # Core Module
//!
//! Fundamental building blocks of the polarizer: the data models for particle
//! topologies and force fields, the polarizability parameter set, and the file formats
//! they are read from and written to.
//!
//! ## Architecture
//!
//! - **Topology Representation** ([`models`]) - Particles, bonds and the simulation cell
//! - **Force Field** ([`forcefield`]) - OpenMM XML tree, typed sections, lookup indices
//!   and the Drude augmentation of atom types, residues and force sections
//! - **Polarizability** ([`drude`]) - Polarizability file parsing, hydrogen merging and
//!   induced charge derivation
//! - **File I/O** ([`io`]) - Fixed-column PDB records and the large-index record codec
//! - **Identifiers** ([`utils`]) - Naming conventions shared across the modules

pub mod drude;
pub mod forcefield;
pub mod io;
pub mod models;
pub mod utils;
