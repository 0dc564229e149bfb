use super::model::Forcefield;
use crate::core::utils::identifiers::residue_label;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tracing::warn;

/// The shadow particle generated for one core atom of a residue template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShadowEntry {
    pub name: String,
    pub type_name: String,
}

/// Explicit lookup tables from PDB-level identifiers to force-field types.
///
/// Residues are keyed by their PDB label (see
/// [`residue_label`](crate::core::utils::identifiers::residue_label)), so templates
/// such as `c4mim+` are found from records labelled `c4m`.
#[derive(Debug, Clone, Default)]
pub struct TypeIndex {
    types: HashMap<String, HashMap<String, String>>,
    classes: HashMap<String, String>,
    shadows: HashMap<String, HashMap<String, ShadowEntry>>,
}

impl TypeIndex {
    pub fn build(forcefield: &Forcefield) -> Self {
        let mut index = Self::default();

        for atom_type in &forcefield.atom_types {
            index
                .classes
                .insert(atom_type.name.clone(), atom_type.class.clone());
        }

        for residue in &forcefield.residues {
            let label = residue_label(&residue.name);
            let atoms = match index.types.entry(label.clone()) {
                Entry::Occupied(_) => {
                    warn!(
                        "Residue template '{}' maps onto label '{}' already taken by an earlier template; it is ignored for type lookup",
                        residue.name, label
                    );
                    continue;
                }
                Entry::Vacant(slot) => slot.insert(HashMap::new()),
            };

            let mut shadows = HashMap::new();
            for atom in &residue.atoms {
                atoms.insert(atom.name.clone(), atom.type_name.clone());
                if let Some(core) = &atom.core {
                    shadows.insert(
                        core.clone(),
                        ShadowEntry {
                            name: atom.name.clone(),
                            type_name: atom.type_name.clone(),
                        },
                    );
                }
            }
            if !shadows.is_empty() {
                index.shadows.insert(label, shadows);
            }
        }
        index
    }

    /// Type token of the atom `name` in residues labelled `label`.
    pub fn type_of(&self, label: &str, name: &str) -> Option<&str> {
        self.types.get(label)?.get(name).map(String::as_str)
    }

    pub fn class_of(&self, type_name: &str) -> Option<&str> {
        self.classes.get(type_name).map(String::as_str)
    }

    /// Shadow particle attached to core atom `core_name` in residues labelled `label`.
    pub fn shadow_of(&self, label: &str, core_name: &str) -> Option<&ShadowEntry> {
        self.shadows.get(label)?.get(core_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::model::{AtomType, ResidueAtom, ResidueTemplate};

    fn atom(name: &str, type_name: &str, core: Option<&str>) -> ResidueAtom {
        ResidueAtom {
            name: name.into(),
            type_name: type_name.into(),
            charge: Some("0.0".into()),
            core: core.map(str::to_string),
            extra: Vec::new(),
        }
    }

    fn residue(name: &str, atoms: Vec<ResidueAtom>) -> ResidueTemplate {
        ResidueTemplate {
            name: name.into(),
            extra: Vec::new(),
            atoms,
            bonds: Vec::new(),
            external_bonds: Vec::new(),
            others: Vec::new(),
        }
    }

    fn atom_type(name: &str, class: &str) -> AtomType {
        AtomType {
            name: name.into(),
            class: class.into(),
            element: None,
            mass: "0.0".into(),
            extra: Vec::new(),
        }
    }

    #[test]
    fn lookups_use_pdb_residue_labels() {
        let ff = Forcefield {
            atom_types: vec![atom_type("c4m-NA-1", "NA"), atom_type("BF4-B-1", "B")],
            residues: vec![
                residue("c4mim+", vec![atom("N1", "c4m-NA-1", None)]),
                residue("BF4-", vec![atom("B", "BF4-B-1", None)]),
            ],
            ..Default::default()
        };
        let index = TypeIndex::build(&ff);
        assert_eq!(index.type_of("c4m", "N1"), Some("c4m-NA-1"));
        assert_eq!(index.type_of("BF4", "B"), Some("BF4-B-1"));
        assert_eq!(index.type_of("c4mim+", "N1"), None);
        assert_eq!(index.type_of("c4m", "N2"), None);
        assert_eq!(index.class_of("c4m-NA-1"), Some("NA"));
        assert_eq!(index.class_of("unknown"), None);
    }

    #[test]
    fn shadows_are_indexed_by_core_name() {
        let ff = Forcefield {
            residues: vec![residue(
                "CLX",
                vec![
                    atom("C1", "CLX-CT-1", None),
                    atom("DC1", "D-CLX-CT-1", Some("C1")),
                ],
            )],
            ..Default::default()
        };
        let index = TypeIndex::build(&ff);
        let shadow = index.shadow_of("CLX", "C1").unwrap();
        assert_eq!(shadow.name, "DC1");
        assert_eq!(shadow.type_name, "D-CLX-CT-1");
        assert!(index.shadow_of("CLX", "DC1").is_none());
    }

    #[test]
    fn first_template_wins_on_label_collision() {
        let ff = Forcefield {
            residues: vec![
                residue("ABCD", vec![atom("X1", "ABC-X-1", None)]),
                residue("ABCE", vec![atom("X1", "ABC-X-2", None)]),
            ],
            ..Default::default()
        };
        let index = TypeIndex::build(&ff);
        assert_eq!(index.type_of("ABC", "X1"), Some("ABC-X-1"));
        assert_eq!(index.type_of("ABC", "X2"), None);
    }
}
