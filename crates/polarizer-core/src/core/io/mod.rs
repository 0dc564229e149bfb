//! Provides input/output functionality for the model file formats.
//!
//! This module contains the fixed-column PDB reader and writer, the codec used for
//! indices that outgrow their PDB columns, and the trait shared with the force-field
//! XML format.

pub mod codec;
pub mod pdb;
pub mod traits;
