//! # Force Field Module
//!
//! Reading, lookup and Drude augmentation of OpenMM force-field XML files.
//!
//! ## Key Components
//!
//! - [`xml`] - A generic element tree over `quick-xml` events with deterministic output
//! - [`model`] - Typed atom types, residue templates and verbatim force sections
//! - [`index`] - Lookup tables from PDB residue labels and atom names to types
//! - [`augment`] - Drude shadow types, residue atoms and shared force terms
//!
//! ## Usage
//!
//! ```ignore
//! use polarizer::core::forcefield::model::ForcefieldXmlFile;
//! use polarizer::core::io::traits::ModelFile;
//!
//! let mut forcefield = ForcefieldXmlFile::read_from_path("field.xml", &())?;
//! forcefield.polarize_types(&parameters);
//! forcefield.polarize_residues(&parameters)?;
//! forcefield.add_shared_force_terms(&parameters)?;
//! ```

pub mod augment;
pub mod index;
pub mod model;
pub mod xml;

/// Class shared by every shadow particle type.
pub const DRUDE_CLASS: &str = "DRUD";
/// Prefix turning a core atom type name into its shadow type name.
pub const DRUDE_TYPE_PREFIX: &str = "D-";
/// Prefix of shadow particle names within a residue.
pub const SHADOW_NAME_PREFIX: &str = "D";
/// Element placeholder written for shadow particles.
pub const SHADOW_ELEMENT: &str = "EP";
