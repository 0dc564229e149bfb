//! # Core Models Module
//!
//! Data structures describing one molecular configuration as read from a fixed-column
//! coordinate file.
//!
//! ## Key Components
//!
//! - [`particle`] - A single particle with its record fields and resolved types
//! - [`topology`] - Particles, bonds and cell, plus type resolution, hydrogen counting
//!   and index-consistent particle insertion
//!
//! ## Usage
//!
//! ```ignore
//! use polarizer::core::models::topology::{Bond, Cell, CrossResidueBondPolicy, Topology};
//!
//! let mut topology = Topology::new(cell, particles, bonds, CrossResidueBondPolicy::Strict)?;
//! topology.count_bonded_hydrogens();
//! let counts = topology.check_hydrogen_count_by_type()?;
//! ```

pub mod particle;
pub mod topology;
