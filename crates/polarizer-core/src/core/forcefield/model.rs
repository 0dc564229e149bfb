use super::xml::{self, XmlError, XmlNode};
use super::DRUDE_CLASS;
use crate::core::io::traits::ModelFile;
use crate::core::utils::identifiers::is_hydrogen_name;
use std::collections::HashSet;
use std::io::{self, BufRead, Write};
use thiserror::Error;

const ROOT_TAG: &str = "ForceField";
const ATOM_TYPES_TAG: &str = "AtomTypes";
const RESIDUES_TAG: &str = "Residues";
const FORCE_SUFFIX: &str = "Force";

#[derive(Debug, Error)]
pub enum ForcefieldError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Xml(#[from] XmlError),
    #[error("Root element is '{0}', expected 'ForceField'")]
    UnexpectedRoot(String),
    #[error("Element '{element}' is missing the '{attribute}' attribute")]
    MissingAttribute {
        element: String,
        attribute: &'static str,
    },
    #[error("Invalid value '{value}' for attribute '{attribute}' of '{element}'")]
    InvalidValue {
        element: String,
        attribute: &'static str,
        value: String,
    },
    #[error(
        "Atom type name '{0}' is not of the form <residue>-<type>-<serial>; generate the force field with globally unique type names enabled"
    )]
    InvalidTypeName(String),
    #[error("Atom type '{0}' is defined more than once")]
    DuplicateType(String),
    #[error("Residue '{residue}' contains atom name '{name}' more than once")]
    DuplicateAtomName { residue: String, name: String },
    #[error("Residue '{residue}' has a bond referring to unknown atom '{reference}'")]
    UnknownBondAtom { residue: String, reference: String },
    #[error("Shadow name '{name}' collides with an existing atom of residue '{residue}'")]
    ShadowNameCollision { residue: String, name: String },
    #[error("Shadow name '{name}' of residue '{residue}' does not fit the 4-character name field")]
    ShadowNameTooLong { residue: String, name: String },
    #[error("Atom '{atom}' of residue '{residue}' is polarizable but carries no charge")]
    MissingCharge { residue: String, atom: String },
    #[error("Force field has no NonbondedForce section")]
    MissingNonbondedForce,
    #[error(
        "NonbondedForce takes charges from atom types; Drude charges live in residue templates and need <UseAttributeFromResidue name=\"charge\"/>"
    )]
    PerTypeCharges,
}

/// Returns the base type of a globally unique type name, i.e. every hyphen-separated
/// component between the residue prefix and the serial (`CLX-CT-1` gives `CT`).
pub fn base_type_of(type_name: &str) -> Option<&str> {
    let first = type_name.find('-')?;
    let last = type_name.rfind('-')?;
    if last <= first + 1 || first == 0 || last + 1 == type_name.len() {
        return None;
    }
    Some(&type_name[first + 1..last])
}

/// One `<Type>` entry of the `AtomTypes` section.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomType {
    pub name: String,
    pub class: String,
    pub element: Option<String>,
    /// Mass as written in the file; never recomputed.
    pub mass: String,
    pub extra: Vec<(String, String)>,
}

impl AtomType {
    pub fn is_drude(&self) -> bool {
        self.class == DRUDE_CLASS
    }

    pub fn base_type(&self) -> Option<&str> {
        base_type_of(&self.name)
    }

    fn from_node(mut node: XmlNode) -> Result<Self, ForcefieldError> {
        let name = take_required(&mut node, "name")?;
        let class = take_required(&mut node, "class")?;
        let element = node.remove_attr("element");
        let mass = node.remove_attr("mass").unwrap_or_else(|| "0.0".to_string());
        Ok(Self {
            name,
            class,
            element,
            mass,
            extra: node.attributes,
        })
    }

    fn to_node(&self) -> XmlNode {
        let mut node = XmlNode::new("Type")
            .with_attr("name", &self.name)
            .with_attr("class", &self.class);
        if let Some(element) = &self.element {
            node.set_attr("element", element);
        }
        node.set_attr("mass", &self.mass);
        node.attributes.extend(self.extra.iter().cloned());
        node
    }
}

/// One `<Atom>` of a residue template.
#[derive(Debug, Clone, PartialEq)]
pub struct ResidueAtom {
    pub name: String,
    pub type_name: String,
    /// Partial charge as written in the file, if the template carries charges.
    pub charge: Option<String>,
    /// For shadow atoms, the local name of the core atom they belong to. Lives only in
    /// memory and is never serialized.
    pub core: Option<String>,
    pub extra: Vec<(String, String)>,
}

impl ResidueAtom {
    pub fn charge_value(&self, residue: &str) -> Result<Option<f64>, ForcefieldError> {
        self.charge
            .as_deref()
            .map(|raw| {
                raw.trim().parse::<f64>().map_err(|_| ForcefieldError::InvalidValue {
                    element: format!("{}/{}", residue, self.name),
                    attribute: "charge",
                    value: raw.to_string(),
                })
            })
            .transpose()
    }

    fn to_node(&self) -> XmlNode {
        let mut node = XmlNode::new("Atom")
            .with_attr("name", &self.name)
            .with_attr("type", &self.type_name);
        if let Some(charge) = &self.charge {
            node.set_attr("charge", charge);
        }
        node.attributes.extend(self.extra.iter().cloned());
        node
    }
}

/// One `<Residue>` template. Bonds are kept by local atom name.
#[derive(Debug, Clone, PartialEq)]
pub struct ResidueTemplate {
    pub name: String,
    pub extra: Vec<(String, String)>,
    pub atoms: Vec<ResidueAtom>,
    pub bonds: Vec<(String, String)>,
    pub external_bonds: Vec<String>,
    /// Children other than atoms and bonds (virtual sites, ...), kept verbatim.
    pub others: Vec<XmlNode>,
}

impl ResidueTemplate {
    pub fn atom(&self, name: &str) -> Option<&ResidueAtom> {
        self.atoms.iter().find(|a| a.name == name)
    }

    /// Number of hydrogens bonded to the local atom `name` within this template.
    pub fn hydrogen_neighbors(&self, name: &str) -> usize {
        self.bonds
            .iter()
            .filter_map(|(a, b)| match (a == name, b == name) {
                (true, false) => Some(b),
                (false, true) => Some(a),
                _ => None,
            })
            .filter(|other| is_hydrogen_name(other))
            .count()
    }

    fn from_node(mut node: XmlNode) -> Result<Self, ForcefieldError> {
        let name = take_required(&mut node, "name")?;
        let mut template = Self {
            name,
            extra: node.attributes,
            atoms: Vec::new(),
            bonds: Vec::new(),
            external_bonds: Vec::new(),
            others: Vec::new(),
        };

        let mut seen = HashSet::new();
        let mut pending_bonds = Vec::new();
        for mut child in node.children {
            match child.tag.as_str() {
                "Atom" => {
                    let atom_name = take_required(&mut child, "name")?;
                    let type_name = take_required(&mut child, "type")?;
                    if !seen.insert(atom_name.clone()) {
                        return Err(ForcefieldError::DuplicateAtomName {
                            residue: template.name,
                            name: atom_name,
                        });
                    }
                    let charge = child.remove_attr("charge");
                    template.atoms.push(ResidueAtom {
                        name: atom_name,
                        type_name,
                        charge,
                        core: None,
                        extra: child.attributes,
                    });
                }
                "Bond" | "ExternalBond" => pending_bonds.push(child),
                _ => template.others.push(child),
            }
        }

        // Index-form bonds refer to atom positions, so they are resolved once all atoms
        // are known.
        for bond in pending_bonds {
            if bond.tag == "Bond" {
                let a = template.resolve_reference(&bond, "atomName1", "from")?;
                let b = template.resolve_reference(&bond, "atomName2", "to")?;
                template.bonds.push((a, b));
            } else {
                let a = template.resolve_reference(&bond, "atomName", "from")?;
                template.external_bonds.push(a);
            }
        }
        Ok(template)
    }

    fn resolve_reference(
        &self,
        bond: &XmlNode,
        name_attr: &'static str,
        index_attr: &'static str,
    ) -> Result<String, ForcefieldError> {
        let unknown = |reference: &str| ForcefieldError::UnknownBondAtom {
            residue: self.name.clone(),
            reference: reference.to_string(),
        };

        if let Some(name) = bond.attr(name_attr) {
            return match self.atom(name) {
                Some(atom) => Ok(atom.name.clone()),
                None => Err(unknown(name)),
            };
        }
        let index = bond
            .attr(index_attr)
            .ok_or_else(|| ForcefieldError::MissingAttribute {
                element: format!("{}/{}", self.name, bond.tag),
                attribute: name_attr,
            })?;
        index
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|i| self.atoms.get(i))
            .map(|atom| atom.name.clone())
            .ok_or_else(|| unknown(index))
    }

    fn to_node(&self) -> XmlNode {
        let mut node = XmlNode::new("Residue").with_attr("name", &self.name);
        node.attributes.extend(self.extra.iter().cloned());
        node.children
            .extend(self.atoms.iter().map(ResidueAtom::to_node));
        node.children.extend(self.bonds.iter().map(|(a, b)| {
            XmlNode::new("Bond")
                .with_attr("atomName1", a)
                .with_attr("atomName2", b)
        }));
        node.children.extend(
            self.external_bonds
                .iter()
                .map(|a| XmlNode::new("ExternalBond").with_attr("atomName", a)),
        );
        node.children.extend(self.others.iter().cloned());
        node
    }
}

/// A top-level `...Force` section. Entries are kept verbatim, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct ForceSection {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub entries: Vec<XmlNode>,
}

impl ForceSection {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            attributes: Vec::new(),
            entries: Vec::new(),
        }
    }

    pub fn has_entry(&self, tag: &str) -> bool {
        self.entries.iter().any(|e| e.tag == tag)
    }

    fn to_node(&self) -> XmlNode {
        XmlNode {
            tag: self.tag.clone(),
            attributes: self.attributes.clone(),
            children: self.entries.clone(),
        }
    }
}

/// An OpenMM force field: atom types, residue templates and force sections.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Forcefield {
    pub root_attributes: Vec<(String, String)>,
    /// Top-level elements that are neither types, residues nor forces (`Info`, ...).
    pub preamble: Vec<XmlNode>,
    pub atom_types: Vec<AtomType>,
    pub residues: Vec<ResidueTemplate>,
    pub forces: Vec<ForceSection>,
}

impl Forcefield {
    /// Builds the typed model from a parsed document.
    ///
    /// # Errors
    ///
    /// Returns a [`ForcefieldError`] if the root is not `ForceField`, a required
    /// attribute is missing, a residue is malformed, or a non-Drude type name does not
    /// follow the `<residue>-<type>-<serial>` convention.
    pub fn from_xml(root: XmlNode) -> Result<Self, ForcefieldError> {
        if root.tag != ROOT_TAG {
            return Err(ForcefieldError::UnexpectedRoot(root.tag));
        }

        let mut forcefield = Self {
            root_attributes: root.attributes,
            ..Default::default()
        };
        let mut type_names = HashSet::new();

        for child in root.children {
            match child.tag.as_str() {
                ATOM_TYPES_TAG => {
                    for type_node in child.children {
                        let atom_type = AtomType::from_node(type_node)?;
                        if !atom_type.is_drude() && atom_type.base_type().is_none() {
                            return Err(ForcefieldError::InvalidTypeName(atom_type.name));
                        }
                        if !type_names.insert(atom_type.name.clone()) {
                            return Err(ForcefieldError::DuplicateType(atom_type.name));
                        }
                        forcefield.atom_types.push(atom_type);
                    }
                }
                RESIDUES_TAG => {
                    for residue_node in child.children {
                        forcefield
                            .residues
                            .push(ResidueTemplate::from_node(residue_node)?);
                    }
                }
                _ if child.tag.ends_with(FORCE_SUFFIX) => forcefield.forces.push(ForceSection {
                    tag: child.tag,
                    attributes: child.attributes,
                    entries: child.children,
                }),
                _ => forcefield.preamble.push(child),
            }
        }
        Ok(forcefield)
    }

    /// Converts back into a document. Transient annotations are not emitted.
    pub fn to_xml(&self) -> XmlNode {
        let mut root = XmlNode {
            tag: ROOT_TAG.to_string(),
            attributes: self.root_attributes.clone(),
            children: self.preamble.clone(),
        };
        if !self.atom_types.is_empty() {
            let mut types = XmlNode::new(ATOM_TYPES_TAG);
            types.children = self.atom_types.iter().map(AtomType::to_node).collect();
            root.children.push(types);
        }
        if !self.residues.is_empty() {
            let mut residues = XmlNode::new(RESIDUES_TAG);
            residues.children = self.residues.iter().map(ResidueTemplate::to_node).collect();
            root.children.push(residues);
        }
        root.children
            .extend(self.forces.iter().map(ForceSection::to_node));
        root
    }

    pub fn atom_type(&self, name: &str) -> Option<&AtomType> {
        self.atom_types.iter().find(|t| t.name == name)
    }

    pub fn force(&self, tag: &str) -> Option<&ForceSection> {
        self.forces.iter().find(|f| f.tag == tag)
    }

    pub fn force_mut(&mut self, tag: &str) -> Option<&mut ForceSection> {
        self.forces.iter_mut().find(|f| f.tag == tag)
    }

    /// Returns the section `tag`, appending an empty one first if it does not exist.
    pub fn force_or_insert(&mut self, tag: &str) -> &mut ForceSection {
        let pos = match self.forces.iter().position(|f| f.tag == tag) {
            Some(pos) => pos,
            None => {
                self.forces.push(ForceSection::new(tag));
                self.forces.len() - 1
            }
        };
        &mut self.forces[pos]
    }

    /// Hydrogen count of a type taken from the first residue template atom using it.
    pub fn template_hydrogen_count(&self, type_name: &str) -> Option<usize> {
        self.residues.iter().find_map(|residue| {
            residue
                .atoms
                .iter()
                .find(|atom| atom.type_name == type_name)
                .map(|atom| residue.hydrogen_neighbors(&atom.name))
        })
    }
}

fn take_required(node: &mut XmlNode, attribute: &'static str) -> Result<String, ForcefieldError> {
    node.remove_attr(attribute)
        .ok_or_else(|| ForcefieldError::MissingAttribute {
            element: node.tag.clone(),
            attribute,
        })
}

pub struct ForcefieldXmlFile;

impl ModelFile for ForcefieldXmlFile {
    type Model = Forcefield;
    type ReadOptions = ();
    type Error = ForcefieldError;

    fn read_from(reader: &mut impl BufRead, _options: &()) -> Result<Forcefield, Self::Error> {
        Forcefield::from_xml(xml::parse(reader)?)
    }

    fn write_to(forcefield: &Forcefield, writer: &mut impl Write) -> Result<(), Self::Error> {
        xml::write(&forcefield.to_xml(), writer)?;
        Ok(())
    }
}
