//! # Drude Parameters Module
//!
//! Reads the polarizability file and turns its per-base-type rows into Drude
//! parameters for every polarizable atom type of a force field.
//!
//! The polarizability of bonded hydrogens is merged into their heavy atom, and the
//! charge of the shadow particle follows from the spring constant and the merged
//! polarizability: `q = -sqrt(k * alpha / 1389.35457)`.

pub mod params;
