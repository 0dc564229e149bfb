//! Drude augmentation of a force field.
//!
//! The three steps are independent of the topology: shadow atom types, shadow atoms
//! in every residue template, and the force entries shared by all shadow particles.

use super::model::{Forcefield, ForcefieldError, ResidueAtom};
use super::xml::XmlNode;
use super::{DRUDE_CLASS, SHADOW_NAME_PREFIX};
use crate::core::drude::params::DrudeParameterSet;
use crate::core::forcefield::model::AtomType;
use crate::core::models::particle::NAME_FIELD_WIDTH;
use crate::core::utils::identifiers::base32_token;
use std::collections::HashSet;
use tracing::{debug, info, warn};

const HARMONIC_BOND_FORCE: &str = "HarmonicBondForce";
const NONBONDED_FORCE: &str = "NonbondedForce";
const LENNARD_JONES_FORCE: &str = "LennardJonesForce";
const DRUDE_FORCE: &str = "DrudeForce";
const USE_RESIDUE_ATTRIBUTE: &str = "UseAttributeFromResidue";

/// Shadow particles interact through their charge only.
const SHADOW_SIGMA: &str = "1.0";
const SHADOW_EPSILON: &str = "0.0";
const SHADOW_MASS: &str = "0.0";

const CHARGE_DECIMALS: i32 = 6;
/// kJ mol⁻¹ Å⁻² to kJ mol⁻¹ nm⁻².
const SPRING_CONSTANT_TO_NM: f64 = 100.0;
/// Å³ to nm³.
const POLARIZABILITY_TO_NM: f64 = 1.0e-3;

/// Rounds a charge to the precision it is written with.
pub fn round_charge(charge: f64) -> f64 {
    let scale = 10f64.powi(CHARGE_DECIMALS);
    (charge * scale).round() / scale
}

pub fn format_charge(charge: f64) -> String {
    let text = format!("{:.6}", charge);
    if text == "-0.000000" {
        "0.000000".to_string()
    } else {
        text
    }
}

/// Shortest representation that parses back to the same value.
pub fn format_number(value: f64) -> String {
    format!("{}", value)
}

fn has_drude_entry(entries: &[XmlNode], tag: &str, attribute: &str, value: &str) -> bool {
    entries
        .iter()
        .any(|e| e.tag == tag && e.attr(attribute) == Some(value))
}

impl Forcefield {
    /// Appends a shadow atom type for every atom type with Drude parameters.
    ///
    /// # Return
    ///
    /// The number of appended types; types already present are skipped.
    pub fn polarize_types(&mut self, parameters: &DrudeParameterSet) -> usize {
        let existing: HashSet<&str> = self.atom_types.iter().map(|t| t.name.as_str()).collect();
        let new_types: Vec<AtomType> = self
            .atom_types
            .iter()
            .filter(|t| !t.is_drude())
            .filter_map(|t| parameters.drude_type(&t.name))
            .filter(|d| !existing.contains(d.shadow_type.as_str()))
            .map(|d| AtomType {
                name: d.shadow_type.clone(),
                class: DRUDE_CLASS.to_string(),
                element: None,
                mass: SHADOW_MASS.to_string(),
                extra: Vec::new(),
            })
            .collect();

        let added = new_types.len();
        self.atom_types.extend(new_types);
        debug!("Added {} shadow atom types.", added);
        added
    }

    /// Inserts a shadow atom directly after every polarizable atom of every residue
    /// template and moves the induced charge off the core atom.
    ///
    /// Shadow atoms are named `D` + core name. If any polarizable atom name is too long
    /// for that, every residue switches to `D` + a base-32 per-residue counter instead.
    /// Each shadow atom records its core in [`ResidueAtom::core`].
    ///
    /// # Return
    ///
    /// The number of inserted template atoms.
    ///
    /// # Errors
    ///
    /// Returns [`ForcefieldError::MissingCharge`] if a polarizable atom has no charge,
    /// and a naming error if a shadow name collides with an existing atom or does not
    /// fit the PDB name field. The force field is unchanged on error.
    pub fn polarize_residues(
        &mut self,
        parameters: &DrudeParameterSet,
    ) -> Result<usize, ForcefieldError> {
        let compact = self
            .residues
            .iter()
            .flat_map(|r| r.atoms.iter())
            .filter(|a| parameters.drude_type(&a.type_name).is_some())
            .any(|a| a.name.chars().count() + SHADOW_NAME_PREFIX.len() > NAME_FIELD_WIDTH);
        if compact {
            info!("Atom names too long for prefixed shadow names; using compact shadow names.");
        }

        let mut new_atoms = Vec::with_capacity(self.residues.len());
        let mut inserted = 0;

        for residue in &self.residues {
            let mut taken: HashSet<String> =
                residue.atoms.iter().map(|a| a.name.clone()).collect();
            let mut atoms = Vec::with_capacity(residue.atoms.len() * 2);
            let mut counter = 0;

            for atom in &residue.atoms {
                let Some(drude) = parameters.drude_type(&atom.type_name) else {
                    atoms.push(atom.clone());
                    continue;
                };

                let charge = atom
                    .charge_value(&residue.name)?
                    .ok_or_else(|| ForcefieldError::MissingCharge {
                        residue: residue.name.clone(),
                        atom: atom.name.clone(),
                    })?;

                let shadow_name = if compact {
                    let name = format!("{}{}", SHADOW_NAME_PREFIX, base32_token(counter));
                    counter += 1;
                    name
                } else {
                    format!("{}{}", SHADOW_NAME_PREFIX, atom.name)
                };
                if shadow_name.chars().count() > NAME_FIELD_WIDTH {
                    return Err(ForcefieldError::ShadowNameTooLong {
                        residue: residue.name.clone(),
                        name: shadow_name,
                    });
                }
                if !taken.insert(shadow_name.clone()) {
                    return Err(ForcefieldError::ShadowNameCollision {
                        residue: residue.name.clone(),
                        name: shadow_name,
                    });
                }

                let induced = round_charge(drude.induced_charge);
                let mut core = atom.clone();
                core.charge = Some(format_charge(charge - induced));
                atoms.push(core);
                atoms.push(ResidueAtom {
                    name: shadow_name,
                    type_name: drude.shadow_type.clone(),
                    charge: Some(format_charge(induced)),
                    core: Some(atom.name.clone()),
                    extra: Vec::new(),
                });
                inserted += 1;
            }
            new_atoms.push(atoms);
        }

        for (residue, atoms) in self.residues.iter_mut().zip(new_atoms) {
            residue.atoms = atoms;
        }
        debug!("Inserted {} shadow atoms into residue templates.", inserted);
        Ok(inserted)
    }

    /// Adds the force entries shared by all shadow particles: the core-shadow spring,
    /// zero Lennard-Jones interaction, and one `DrudeForce` particle per Drude type.
    ///
    /// # Errors
    ///
    /// Returns [`ForcefieldError::MissingNonbondedForce`] if the force field has no
    /// `NonbondedForce` section, and [`ForcefieldError::PerTypeCharges`] if that section
    /// does not read charges from the residue templates.
    pub fn add_shared_force_terms(
        &mut self,
        parameters: &DrudeParameterSet,
    ) -> Result<(), ForcefieldError> {
        let Some(first) = parameters.drude_types().first() else {
            debug!("No polarizable types; force sections left unchanged.");
            return Ok(());
        };
        match self.force(NONBONDED_FORCE) {
            None => return Err(ForcefieldError::MissingNonbondedForce),
            Some(nonbonded) if !nonbonded.has_entry(USE_RESIDUE_ATTRIBUTE) => {
                return Err(ForcefieldError::PerTypeCharges);
            }
            Some(_) => {}
        }

        for other in &parameters.drude_types()[1..] {
            if other.spring_constant != first.spring_constant {
                warn!(
                    "Type {} has spring constant {} but the shared core-shadow bond uses {} from {}",
                    other.core_type, other.spring_constant, first.spring_constant, first.core_type
                );
            }
        }

        let bonds = self.force_or_insert(HARMONIC_BOND_FORCE);
        if !has_drude_entry(&bonds.entries, "Bond", "class2", DRUDE_CLASS) {
            bonds.entries.push(
                XmlNode::new("Bond")
                    .with_attr("class1", "")
                    .with_attr("class2", DRUDE_CLASS)
                    .with_attr("length", "0.0")
                    .with_attr(
                        "k",
                        format_number(first.spring_constant * SPRING_CONSTANT_TO_NM),
                    ),
            );
        }

        if let Some(nonbonded) = self.force_mut(NONBONDED_FORCE) {
            if !has_drude_entry(&nonbonded.entries, "Atom", "class", DRUDE_CLASS) {
                nonbonded.entries.push(
                    XmlNode::new("Atom")
                        .with_attr("class", DRUDE_CLASS)
                        .with_attr("sigma", SHADOW_SIGMA)
                        .with_attr("epsilon", SHADOW_EPSILON),
                );
            }
        }

        if let Some(lennard_jones) = self.force_mut(LENNARD_JONES_FORCE) {
            if !has_drude_entry(&lennard_jones.entries, "Atom", "class", DRUDE_CLASS) {
                lennard_jones.entries.push(
                    XmlNode::new("Atom")
                        .with_attr("class", DRUDE_CLASS)
                        .with_attr("sigma", SHADOW_SIGMA)
                        .with_attr("epsilon", SHADOW_EPSILON),
                );
            }
        }

        let drude_force = self.force_or_insert(DRUDE_FORCE);
        for drude in parameters.drude_types() {
            if has_drude_entry(&drude_force.entries, "Particle", "type1", &drude.shadow_type) {
                continue;
            }
            drude_force.entries.push(
                XmlNode::new("Particle")
                    .with_attr("type1", &drude.shadow_type)
                    .with_attr("type2", &drude.core_type)
                    .with_attr("charge", format_charge(round_charge(drude.induced_charge)))
                    .with_attr(
                        "polarizability",
                        format_number(drude.merged_polarizability * POLARIZABILITY_TO_NM),
                    )
                    .with_attr("thole", format_number(drude.thole / 2.0)),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::model::ForcefieldXmlFile;
    use crate::core::io::traits::ModelFile;
    use std::collections::BTreeMap;
    use std::io::Cursor;

    const FIELD: &str = r#"<ForceField>
  <AtomTypes>
    <Type name="CLX-CT-1" class="CT" element="C" mass="12.011"/>
    <Type name="CLX-HC-2" class="HC" element="H" mass="1.008"/>
    <Type name="CLX-CL-3" class="CL" element="Cl" mass="35.453"/>
  </AtomTypes>
  <Residues>
    <Residue name="CLX">
      <Atom name="C1" type="CLX-CT-1" charge="-0.1"/>
      <Atom name="H1" type="CLX-HC-2" charge="0.15"/>
      <Atom name="CL1" type="CLX-CL-3" charge="-0.05"/>
      <Bond atomName1="C1" atomName2="H1"/>
      <Bond atomName1="C1" atomName2="CL1"/>
    </Residue>
  </Residues>
  <HarmonicBondForce>
    <Bond class1="CT" class2="HC" length="0.109" k="284512.0"/>
  </HarmonicBondForce>
  <NonbondedForce coulomb14scale="0.5" lj14scale="0.5">
    <UseAttributeFromResidue name="charge"/>
    <Atom type="CLX-CT-1" sigma="0.35" epsilon="0.276144"/>
  </NonbondedForce>
</ForceField>
"#;

    const TABLE: &str = "CT 0.4 0.0 4184.0 1.0 2.6\nCL 0.4 0.0 4184.0 2.0 2.6\n";

    fn setup(field: &str, table: &str) -> (Forcefield, DrudeParameterSet) {
        let ff = ForcefieldXmlFile::read_from(&mut Cursor::new(field), &()).unwrap();
        let mut params = DrudeParameterSet::parse(table).unwrap();
        params.derive(&ff, &BTreeMap::new()).unwrap();
        (ff, params)
    }

    fn atom_names(ff: &Forcefield) -> Vec<&str> {
        ff.residues[0].atoms.iter().map(|a| a.name.as_str()).collect()
    }

    #[test]
    fn format_helpers_round_and_shorten() {
        assert_eq!(round_charge(-1.735358834052557), -1.735359);
        assert_eq!(format_charge(-1.735359), "-1.735359");
        assert_eq!(format_charge(-0.0000001), "0.000000");
        assert_eq!(format_number(418400.0), "418400");
        assert_eq!(format_number(0.001), "0.001");
    }

    #[test]
    fn polarize_types_appends_massless_shadow_types_once() {
        let (mut ff, params) = setup(FIELD, TABLE);
        assert_eq!(ff.polarize_types(&params), 2);
        assert_eq!(ff.polarize_types(&params), 0);

        let shadow = ff.atom_type("D-CLX-CT-1").unwrap();
        assert_eq!(shadow.class, "DRUD");
        assert_eq!(shadow.mass, "0.0");
        assert_eq!(shadow.element, None);
        assert!(ff.atom_type("D-CLX-CL-3").is_some());
        assert!(ff.atom_type("D-CLX-HC-2").is_none());
        assert_eq!(ff.atom_type("CLX-CT-1").unwrap().mass, "12.011");
    }

    #[test]
    fn polarize_residues_inserts_shadows_after_cores_and_conserves_charge() {
        let (mut ff, params) = setup(FIELD, TABLE);
        let original: f64 = ff.residues[0]
            .atoms
            .iter()
            .map(|a| a.charge_value("CLX").unwrap().unwrap())
            .sum();

        assert_eq!(ff.polarize_residues(&params).unwrap(), 2);
        assert_eq!(atom_names(&ff), vec!["C1", "DC1", "H1", "CL1", "DCL1"]);

        let residue = &ff.residues[0];
        let dc1 = residue.atom("DC1").unwrap();
        assert_eq!(dc1.type_name, "D-CLX-CT-1");
        assert_eq!(dc1.charge.as_deref(), Some("-1.735359"));
        assert_eq!(dc1.core.as_deref(), Some("C1"));
        assert_eq!(residue.atom("C1").unwrap().charge.as_deref(), Some("1.635359"));
        assert_eq!(residue.atom("DCL1").unwrap().charge.as_deref(), Some("-2.454168"));
        assert_eq!(residue.bonds.len(), 2);

        let total: f64 = residue
            .atoms
            .iter()
            .map(|a| a.charge_value("CLX").unwrap().unwrap())
            .sum();
        assert!((total - original).abs() < 1e-9);
    }

    #[test]
    fn long_names_switch_every_residue_to_compact_shadow_names() {
        let field = FIELD.replace(r#"name="CL1""#, r#"name="CL12""#).replace(
            r#"atomName2="CL1""#,
            r#"atomName2="CL12""#,
        );
        let (mut ff, params) = setup(&field, TABLE);
        ff.polarize_residues(&params).unwrap();
        assert_eq!(atom_names(&ff), vec!["C1", "D0", "H1", "CL12", "D1"]);
    }

    #[test]
    fn shadow_name_collision_is_rejected() {
        let field = FIELD.replace(r#"name="H1""#, r#"name="DC1""#).replace(
            r#"atomName2="H1""#,
            r#"atomName2="DC1""#,
        );
        let (mut ff, params) = setup(&field, TABLE);
        let before = ff.clone();
        let err = ff.polarize_residues(&params).unwrap_err();
        assert!(matches!(
            err,
            ForcefieldError::ShadowNameCollision { ref name, .. } if name == "DC1"
        ));
        assert_eq!(ff, before);
    }

    #[test]
    fn polarizable_atom_without_charge_is_rejected() {
        let field = FIELD.replace(r#" charge="-0.1""#, "");
        let (mut ff, params) = setup(&field, TABLE);
        assert!(matches!(
            ff.polarize_residues(&params),
            Err(ForcefieldError::MissingCharge { ref atom, .. }) if atom == "C1"
        ));
    }

    #[test]
    fn shared_terms_cover_bond_nonbonded_and_drude_sections() {
        let (mut ff, params) = setup(FIELD, TABLE);
        ff.add_shared_force_terms(&params).unwrap();
        ff.add_shared_force_terms(&params).unwrap();

        let bonds = ff.force("HarmonicBondForce").unwrap();
        assert_eq!(bonds.entries.len(), 2);
        assert_eq!(
            bonds.entries[1].attributes,
            vec![
                ("class1".to_string(), "".to_string()),
                ("class2".to_string(), "DRUD".to_string()),
                ("length".to_string(), "0.0".to_string()),
                ("k".to_string(), "418400".to_string()),
            ]
        );

        let nonbonded = ff.force("NonbondedForce").unwrap();
        let drud = nonbonded.entries.last().unwrap();
        assert_eq!(drud.attr("class"), Some("DRUD"));
        assert_eq!(drud.attr("charge"), None);
        assert_eq!(drud.attr("sigma"), Some("1.0"));
        assert_eq!(drud.attr("epsilon"), Some("0.0"));
        assert!(ff.force("LennardJonesForce").is_none());

        let drude = ff.force("DrudeForce").unwrap();
        assert_eq!(drude.entries.len(), 2);
        let particle = &drude.entries[0];
        assert_eq!(particle.attr("type1"), Some("D-CLX-CT-1"));
        assert_eq!(particle.attr("type2"), Some("CLX-CT-1"));
        assert_eq!(particle.attr("charge"), Some("-1.735359"));
        assert_eq!(particle.attr("polarizability"), Some("0.001"));
        assert_eq!(particle.attr("thole"), Some("1.3"));
        assert_eq!(drude.entries[1].attr("polarizability"), Some("0.002"));
    }

    #[test]
    fn lennard_jones_entry_follows_existing_section() {
        let field = FIELD
            .replace(
                "</ForceField>",
                "  <LennardJonesForce lj14scale=\"0.5\"/>\n</ForceField>",
            )
            .replace(
                "  <HarmonicBondForce>\n    <Bond class1=\"CT\" class2=\"HC\" length=\"0.109\" k=\"284512.0\"/>\n  </HarmonicBondForce>\n",
                "",
            );
        let (mut ff, params) = setup(&field, TABLE);
        ff.add_shared_force_terms(&params).unwrap();

        let drud = ff.force("NonbondedForce").unwrap().entries.last().unwrap();
        assert_eq!(drud.attr("class"), Some("DRUD"));
        assert_eq!(drud.attr("charge"), None);
        let lj = ff.force("LennardJonesForce").unwrap();
        assert_eq!(lj.entries.len(), 1);
        assert_eq!(lj.entries[0].attr("class"), Some("DRUD"));
        assert_eq!(ff.force("HarmonicBondForce").unwrap().entries.len(), 1);
    }

    #[test]
    fn per_type_nonbonded_charges_are_rejected() {
        let field = FIELD.replace("    <UseAttributeFromResidue name=\"charge\"/>\n", "");
        let (mut ff, params) = setup(&field, TABLE);
        let before = ff.clone();
        assert!(matches!(
            ff.add_shared_force_terms(&params),
            Err(ForcefieldError::PerTypeCharges)
        ));
        assert_eq!(ff, before);
    }

    #[test]
    fn missing_nonbonded_force_is_rejected() {
        let field = FIELD.replace("NonbondedForce", "CustomNonbondedForce");
        let (mut ff, params) = setup(&field, TABLE);
        assert!(matches!(
            ff.add_shared_force_terms(&params),
            Err(ForcefieldError::MissingNonbondedForce)
        ));
    }
}
