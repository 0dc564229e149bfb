use crate::core::forcefield::DRUDE_TYPE_PREFIX;
use crate::core::forcefield::model::Forcefield;
use crate::core::utils::identifiers::is_hydrogen_name;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

/// Coulomb constant in kJ mol⁻¹ Å e⁻², i.e. `1 / (4πε₀)` in the units of the
/// polarizability file.
pub const COULOMB_CONSTANT: f64 = 1389.35457;

const MIN_COLUMNS: usize = 6;

#[derive(Debug, Error)]
pub enum DrudeError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Line {line}: expected at least 6 columns (type dm dq k alpha thole), found {found}")]
    TooFewColumns { line: usize, found: usize },
    #[error("Line {line}: invalid number '{value}' in column '{column}'")]
    InvalidNumber {
        line: usize,
        column: &'static str,
        value: String,
    },
    #[error("Line {line}: type '{base_type}' is listed more than once")]
    DuplicateType { line: usize, base_type: String },
    #[error("Spring constant of type '{type_name}' must be positive (got {value})")]
    NonPositiveSpringConstant { type_name: String, value: f64 },
    #[error("Polarizability of type '{type_name}' must be positive (got {value})")]
    NonPositivePolarizability { type_name: String, value: f64 },
}

impl DrudeError {
    /// Whether the error comes from physically meaningless parameters rather than
    /// from the file layout.
    pub fn is_physics(&self) -> bool {
        matches!(
            self,
            DrudeError::NonPositiveSpringConstant { .. }
                | DrudeError::NonPositivePolarizability { .. }
        )
    }
}

/// One row of the polarizability file.
#[derive(Debug, Clone, PartialEq)]
pub struct DrudeSpec {
    pub base_type: String,
    /// Mass to move onto the shadow particle (amu). Read for completeness; shadow
    /// particles are massless in the generated force field.
    pub mass_shift: f64,
    /// Nominal charge of the row (e). Informational only.
    pub charge: f64,
    /// Core-shadow spring constant (kJ mol⁻¹ Å⁻²).
    pub spring_constant: f64,
    /// Polarizability (Å³).
    pub polarizability: f64,
    pub thole: f64,
}

/// Drude parameters of one polarizable core atom type.
#[derive(Debug, Clone, PartialEq)]
pub struct DrudeType {
    pub core_type: String,
    pub shadow_type: String,
    pub base_type: String,
    pub spring_constant: f64,
    pub thole: f64,
    pub polarizability: f64,
    pub hydrogen_count: usize,
    /// Polarizability with the increments of the bonded hydrogens added (Å³).
    pub merged_polarizability: f64,
    /// Charge of the shadow particle (e); always negative.
    pub induced_charge: f64,
}

/// Induced charge `q = -sqrt(k * alpha / C)` of a shadow particle.
pub fn induced_charge(spring_constant: f64, polarizability: f64) -> f64 {
    -(spring_constant * polarizability / COULOMB_CONSTANT).sqrt()
}

/// Rows of the polarizability file and the Drude types derived from them.
#[derive(Debug, Clone, Default)]
pub struct DrudeParameterSet {
    specs: Vec<DrudeSpec>,
    spec_index: HashMap<String, usize>,
    hydrogen_polarizability: f64,
    drude_types: Vec<DrudeType>,
    type_index: HashMap<String, usize>,
}

fn parse_column(
    value: &str,
    line: usize,
    column: &'static str,
) -> Result<f64, DrudeError> {
    value.parse().map_err(|_| DrudeError::InvalidNumber {
        line,
        column,
        value: value.to_string(),
    })
}

impl DrudeParameterSet {
    /// Reads a polarizability file.
    ///
    /// # Errors
    ///
    /// Returns a [`DrudeError`] if the file cannot be read or does not parse.
    pub fn load(path: &Path) -> Result<Self, DrudeError> {
        let content = std::fs::read_to_string(path).map_err(|e| DrudeError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::parse(&content)
    }

    /// Parses whitespace-separated rows `type dm dq k alpha thole`.
    ///
    /// Blank lines and lines starting with `#` are skipped; extra trailing columns are
    /// ignored. Rows whose type starts with `H` describe the polarizability increment
    /// per bonded hydrogen; the first such row is used.
    pub fn parse(content: &str) -> Result<Self, DrudeError> {
        let mut set = Self::default();
        let mut hydrogen: Option<f64> = None;

        for (idx, raw_line) in content.lines().enumerate() {
            let line = idx + 1;
            let trimmed = raw_line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let columns: Vec<&str> = trimmed.split_whitespace().collect();
            if columns.len() < MIN_COLUMNS {
                return Err(DrudeError::TooFewColumns {
                    line,
                    found: columns.len(),
                });
            }

            let spec = DrudeSpec {
                base_type: columns[0].to_string(),
                mass_shift: parse_column(columns[1], line, "dm")?,
                charge: parse_column(columns[2], line, "dq")?,
                spring_constant: parse_column(columns[3], line, "k")?,
                polarizability: parse_column(columns[4], line, "alpha")?,
                thole: parse_column(columns[5], line, "thole")?,
            };

            if is_hydrogen_name(&spec.base_type) {
                match hydrogen {
                    None => hydrogen = Some(spec.polarizability),
                    Some(existing) if existing != spec.polarizability => warn!(
                        "Line {}: hydrogen row '{}' has polarizability {} but {} is already in use; ignoring it",
                        line, spec.base_type, spec.polarizability, existing
                    ),
                    Some(_) => {}
                }
                continue;
            }

            if set.spec_index.contains_key(&spec.base_type) {
                return Err(DrudeError::DuplicateType {
                    line,
                    base_type: spec.base_type,
                });
            }
            set.spec_index
                .insert(spec.base_type.clone(), set.specs.len());
            set.specs.push(spec);
        }

        set.hydrogen_polarizability = hydrogen.unwrap_or(0.0);
        debug!(
            "Parsed {} polarizable types (hydrogen increment {}).",
            set.specs.len(),
            set.hydrogen_polarizability
        );
        Ok(set)
    }

    pub fn specs(&self) -> &[DrudeSpec] {
        &self.specs
    }

    pub fn spec(&self, base_type: &str) -> Option<&DrudeSpec> {
        self.spec_index.get(base_type).map(|&i| &self.specs[i])
    }

    pub fn hydrogen_polarizability(&self) -> f64 {
        self.hydrogen_polarizability
    }

    /// Derived Drude types, in the order of the force field's atom types.
    pub fn drude_types(&self) -> &[DrudeType] {
        &self.drude_types
    }

    pub fn drude_type(&self, core_type: &str) -> Option<&DrudeType> {
        self.type_index.get(core_type).map(|&i| &self.drude_types[i])
    }

    /// Derives one [`DrudeType`] per polarizable atom type of `forcefield`.
    ///
    /// The number of bonded hydrogens of a type comes from `hydrogen_counts` (as
    /// measured on the topology) or, for types no particle uses, from the bonds of the
    /// first residue template containing the type.
    ///
    /// # Errors
    ///
    /// Returns [`DrudeError::NonPositiveSpringConstant`] or
    /// [`DrudeError::NonPositivePolarizability`] for parameters that admit no real
    /// induced charge.
    pub fn derive(
        &mut self,
        forcefield: &Forcefield,
        hydrogen_counts: &BTreeMap<String, usize>,
    ) -> Result<(), DrudeError> {
        let mut drude_types = Vec::new();
        let mut type_index = HashMap::new();

        for atom_type in forcefield.atom_types.iter().filter(|t| !t.is_drude()) {
            let Some(base_type) = atom_type.base_type() else {
                continue;
            };
            let Some(spec) = self.spec(base_type) else {
                continue;
            };

            let hydrogen_count = match hydrogen_counts.get(&atom_type.name) {
                Some(&count) => count,
                None => forcefield
                    .template_hydrogen_count(&atom_type.name)
                    .unwrap_or(0),
            };
            let merged =
                spec.polarizability + hydrogen_count as f64 * self.hydrogen_polarizability;

            if spec.spring_constant <= 0.0 {
                return Err(DrudeError::NonPositiveSpringConstant {
                    type_name: atom_type.name.clone(),
                    value: spec.spring_constant,
                });
            }
            if merged <= 0.0 {
                return Err(DrudeError::NonPositivePolarizability {
                    type_name: atom_type.name.clone(),
                    value: merged,
                });
            }

            let drude_type = DrudeType {
                core_type: atom_type.name.clone(),
                shadow_type: format!("{}{}", DRUDE_TYPE_PREFIX, atom_type.name),
                base_type: base_type.to_string(),
                spring_constant: spec.spring_constant,
                thole: spec.thole,
                polarizability: spec.polarizability,
                hydrogen_count,
                merged_polarizability: merged,
                induced_charge: induced_charge(spec.spring_constant, merged),
            };
            debug!(
                "Drude type {}: nH={}, alpha={:.4}, q={:.6}",
                drude_type.core_type,
                drude_type.hydrogen_count,
                drude_type.merged_polarizability,
                drude_type.induced_charge
            );
            type_index.insert(drude_type.core_type.clone(), drude_types.len());
            drude_types.push(drude_type);
        }

        self.drude_types = drude_types;
        self.type_index = type_index;
        Ok(())
    }
}
