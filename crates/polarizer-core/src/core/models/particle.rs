use nalgebra::Point3;
use thiserror::Error;

/// Width of the atom name field of a PDB record (columns 13-16).
pub const NAME_FIELD_WIDTH: usize = 4;
/// Width of the residue label field of a PDB record (columns 18-20).
pub const RESIDUE_LABEL_WIDTH: usize = 3;
/// Width of the element field of a PDB record (columns 77-78).
pub const ELEMENT_FIELD_WIDTH: usize = 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParticleError {
    #[error("Particle name must not be empty")]
    EmptyName,
    #[error("Particle name '{0}' exceeds 4 characters")]
    NameTooLong(String),
    #[error("Residue label must not be empty")]
    EmptyResidueLabel,
    #[error("Residue label '{0}' exceeds 3 characters")]
    ResidueLabelTooLong(String),
    #[error("Element symbol '{0}' exceeds 2 characters")]
    ElementTooLong(String),
    #[error("Particle serial must be at least 1")]
    ZeroSerial,
}

/// A single particle (atom or shadow particle) of a topology.
///
/// The record-level fields are validated on construction so that every particle can
/// be written back into the fixed-column layout it was read from. The derived fields
/// (`bonded_hydrogens`, `nonbonded_type`, `class`) are filled in by the topology
/// operations after the force field has been loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    /// 1-based position in the topology; contiguous across the whole system.
    pub serial: usize,
    /// Short name, unique within its residue instance (e.g. "C1", "DC1").
    pub name: String,
    /// Residue label of at most three characters (e.g. "CLX").
    pub residue_name: String,
    /// Sequence number of the residue instance this particle belongs to.
    pub residue_seq: usize,
    /// Cartesian position in Angstroms.
    pub position: Point3<f64>,
    /// Element symbol, or the extra-point placeholder for shadow particles.
    pub element: String,
    /// Number of hydrogens bonded to this particle.
    pub bonded_hydrogens: usize,
    /// Resolved non-bonded type token, if the particle matched a residue template.
    pub nonbonded_type: Option<String>,
    /// Resolved bonded class token.
    pub class: Option<String>,
}

impl Particle {
    /// Creates a validated particle with no resolved types.
    ///
    /// # Errors
    ///
    /// Returns a [`ParticleError`] if the serial is zero, the name or residue label is
    /// empty, or any field exceeds its PDB column width.
    pub fn new(
        serial: usize,
        name: &str,
        residue_name: &str,
        residue_seq: usize,
        position: Point3<f64>,
        element: &str,
    ) -> Result<Self, ParticleError> {
        let name = name.trim();
        let residue_name = residue_name.trim();
        let element = element.trim();

        if serial == 0 {
            return Err(ParticleError::ZeroSerial);
        }
        if name.is_empty() {
            return Err(ParticleError::EmptyName);
        }
        if name.chars().count() > NAME_FIELD_WIDTH {
            return Err(ParticleError::NameTooLong(name.to_string()));
        }
        if residue_name.is_empty() {
            return Err(ParticleError::EmptyResidueLabel);
        }
        if residue_name.chars().count() > RESIDUE_LABEL_WIDTH {
            return Err(ParticleError::ResidueLabelTooLong(residue_name.to_string()));
        }
        if element.chars().count() > ELEMENT_FIELD_WIDTH {
            return Err(ParticleError::ElementTooLong(element.to_string()));
        }

        Ok(Self {
            serial,
            name: name.to_string(),
            residue_name: residue_name.to_string(),
            residue_seq,
            position,
            element: element.to_string(),
            bonded_hydrogens: 0,
            nonbonded_type: None,
            class: None,
        })
    }

    /// Returns `true` if both particles belong to the same residue instance.
    pub fn same_residue(&self, other: &Particle) -> bool {
        self.residue_seq == other.residue_seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Point3<f64> {
        Point3::new(0.0, 0.0, 0.0)
    }

    #[test]
    fn new_trims_and_accepts_valid_fields() {
        let p = Particle::new(1, " C1 ", "CLX", 1, origin(), "C").unwrap();
        assert_eq!(p.name, "C1");
        assert_eq!(p.residue_name, "CLX");
        assert_eq!(p.bonded_hydrogens, 0);
        assert!(p.nonbonded_type.is_none());
        assert!(p.class.is_none());
    }

    #[test]
    fn new_rejects_fields_that_do_not_fit_the_record() {
        assert_eq!(
            Particle::new(1, "C1234", "CLX", 1, origin(), "C"),
            Err(ParticleError::NameTooLong("C1234".into()))
        );
        assert_eq!(
            Particle::new(1, "C1", "CLXX", 1, origin(), "C"),
            Err(ParticleError::ResidueLabelTooLong("CLXX".into()))
        );
        assert_eq!(
            Particle::new(1, "C1", "CLX", 1, origin(), "CLX"),
            Err(ParticleError::ElementTooLong("CLX".into()))
        );
        assert_eq!(
            Particle::new(1, "  ", "CLX", 1, origin(), "C"),
            Err(ParticleError::EmptyName)
        );
        assert_eq!(
            Particle::new(1, "C1", "", 1, origin(), "C"),
            Err(ParticleError::EmptyResidueLabel)
        );
        assert_eq!(
            Particle::new(0, "C1", "CLX", 1, origin(), "C"),
            Err(ParticleError::ZeroSerial)
        );
    }

    #[test]
    fn same_residue_compares_sequence_numbers() {
        let a = Particle::new(1, "C1", "CLX", 1, origin(), "C").unwrap();
        let b = Particle::new(2, "CL1", "CLX", 1, origin(), "Cl").unwrap();
        let c = Particle::new(3, "C1", "CLX", 2, origin(), "C").unwrap();
        assert!(a.same_residue(&b));
        assert!(!a.same_residue(&c));
    }
}
