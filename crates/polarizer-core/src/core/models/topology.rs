use super::particle::Particle;
use crate::core::forcefield::index::TypeIndex;
use crate::core::utils::identifiers::is_hydrogen_name;
use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

/// How a bond between two different residue instances is treated on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CrossResidueBondPolicy {
    /// Reject the topology with a consistency error.
    #[default]
    Strict,
    /// Log a warning and keep the bond.
    Permissive,
}

#[derive(Debug, Error, PartialEq)]
pub enum TopologyError {
    #[error(
        "Particles of type '{type_name}' have different bonded hydrogen counts ({expected} vs {found} at particle {serial}); the type no longer describes a single chemical environment"
    )]
    InconsistentHydrogenCount {
        type_name: String,
        expected: usize,
        found: usize,
        serial: usize,
    },
    #[error(
        "Bond {serial1}-{serial2} connects residue instances {residue1} and {residue2}"
    )]
    CrossResidueBond {
        serial1: usize,
        serial2: usize,
        residue1: usize,
        residue2: usize,
    },
    #[error("Bond references unknown particle serial {0}")]
    UnknownSerial(usize),
}

/// Orthorhombic simulation cell in Angstroms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl Cell {
    pub fn new(a: f64, b: f64, c: f64) -> Self {
        Self { a, b, c }
    }
}

/// A bond between two particles, stored by serial with the lower serial first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Bond {
    pub serial1: usize,
    pub serial2: usize,
}

impl Bond {
    pub fn new(serial1: usize, serial2: usize) -> Self {
        Self {
            serial1: serial1.min(serial2),
            serial2: serial1.max(serial2),
        }
    }

    pub fn contains(&self, serial: usize) -> bool {
        self.serial1 == serial || self.serial2 == serial
    }
}

/// Particles, intra-residue bonds and the simulation cell of one configuration.
///
/// Particle serials always form the contiguous sequence `1..=N` in storage order, so a
/// serial doubles as an index into the particle list (`serial - 1`).
#[derive(Debug, Clone, PartialEq)]
pub struct Topology {
    /// Unrecognized header records (REMARK, TITLE, ...) re-emitted verbatim on write.
    pub header_lines: Vec<String>,
    cell: Cell,
    particles: Vec<Particle>,
    bonds: Vec<Bond>,
}

impl Topology {
    /// Creates a topology from particles already numbered `1..=N` in order.
    ///
    /// Bonds are normalized, sorted and deduplicated; each must reference existing
    /// particles and, under [`CrossResidueBondPolicy::Strict`], stay within one residue
    /// instance.
    pub fn new(
        cell: Cell,
        particles: Vec<Particle>,
        bonds: Vec<Bond>,
        policy: CrossResidueBondPolicy,
    ) -> Result<Self, TopologyError> {
        let mut bonds: Vec<Bond> = bonds
            .into_iter()
            .map(|b| Bond::new(b.serial1, b.serial2))
            .collect();
        bonds.sort_unstable();
        bonds.dedup();

        let mut topology = Self {
            header_lines: Vec::new(),
            cell,
            particles,
            bonds,
        };
        for (idx, particle) in topology.particles.iter_mut().enumerate() {
            particle.serial = idx + 1;
        }
        topology.check_bonds(policy)?;
        Ok(topology)
    }

    fn check_bonds(&self, policy: CrossResidueBondPolicy) -> Result<(), TopologyError> {
        for bond in &self.bonds {
            let p1 = self
                .particle(bond.serial1)
                .ok_or(TopologyError::UnknownSerial(bond.serial1))?;
            let p2 = self
                .particle(bond.serial2)
                .ok_or(TopologyError::UnknownSerial(bond.serial2))?;
            if p1.same_residue(p2) {
                continue;
            }
            let error = TopologyError::CrossResidueBond {
                serial1: bond.serial1,
                serial2: bond.serial2,
                residue1: p1.residue_seq,
                residue2: p2.residue_seq,
            };
            match policy {
                CrossResidueBondPolicy::Strict => return Err(error),
                CrossResidueBondPolicy::Permissive => warn!("{}; keeping it", error),
            }
        }
        Ok(())
    }

    pub fn cell(&self) -> Cell {
        self.cell
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    /// Looks up a particle by its 1-based serial.
    pub fn particle(&self, serial: usize) -> Option<&Particle> {
        serial.checked_sub(1).and_then(|idx| self.particles.get(idx))
    }

    /// Number of distinct residue instances, counted as runs of equal sequence numbers.
    pub fn residue_count(&self) -> usize {
        let mut count = 0;
        let mut previous = None;
        for particle in &self.particles {
            let key = (particle.residue_seq, particle.residue_name.as_str());
            if previous != Some(key) {
                count += 1;
                previous = Some(key);
            }
        }
        count
    }

    /// Assigns non-bonded type and class to every particle from the force-field index.
    ///
    /// # Return
    ///
    /// The serials of particles that matched no residue template atom; those keep
    /// `None` for both type and class.
    pub fn resolve_types(&mut self, index: &TypeIndex) -> Vec<usize> {
        let mut unresolved = Vec::new();
        for particle in &mut self.particles {
            match index.type_of(&particle.residue_name, &particle.name) {
                Some(type_name) => {
                    particle.class = index.class_of(type_name).map(str::to_string);
                    particle.nonbonded_type = Some(type_name.to_string());
                }
                None => {
                    particle.nonbonded_type = None;
                    particle.class = None;
                    unresolved.push(particle.serial);
                }
            }
        }
        debug!(
            "Resolved types for {} of {} particles.",
            self.particles.len() - unresolved.len(),
            self.particles.len()
        );
        unresolved
    }

    /// Recounts, for every particle, the hydrogens it is bonded to.
    ///
    /// A bond contributes only when exactly one endpoint is a hydrogen; H-H and
    /// heavy-heavy bonds leave the counters untouched.
    pub fn count_bonded_hydrogens(&mut self) {
        for particle in &mut self.particles {
            particle.bonded_hydrogens = 0;
        }
        for bond in &self.bonds {
            let (i, j) = (bond.serial1 - 1, bond.serial2 - 1);
            let h1 = is_hydrogen_name(&self.particles[i].name);
            let h2 = is_hydrogen_name(&self.particles[j].name);
            match (h1, h2) {
                (true, false) => self.particles[j].bonded_hydrogens += 1,
                (false, true) => self.particles[i].bonded_hydrogens += 1,
                _ => {}
            }
        }
    }

    /// Verifies that all particles sharing a resolved type have the same number of
    /// bonded hydrogens.
    ///
    /// # Return
    ///
    /// The hydrogen count of every resolved type.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::InconsistentHydrogenCount`] for the first particle that
    /// disagrees with an earlier particle of its type.
    pub fn check_hydrogen_count_by_type(&self) -> Result<BTreeMap<String, usize>, TopologyError> {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for particle in &self.particles {
            let Some(type_name) = particle.nonbonded_type.as_deref() else {
                continue;
            };
            match counts.get(type_name) {
                Some(&expected) if expected != particle.bonded_hydrogens => {
                    return Err(TopologyError::InconsistentHydrogenCount {
                        type_name: type_name.to_string(),
                        expected,
                        found: particle.bonded_hydrogens,
                        serial: particle.serial,
                    });
                }
                Some(_) => {}
                None => {
                    counts.insert(type_name.to_string(), particle.bonded_hydrogens);
                }
            }
        }
        Ok(counts)
    }

    /// Inserts a generated particle directly after every particle accepted by `is_core`.
    ///
    /// The new particle receives the serial following its core; all later particles
    /// and all bond endpoints at or beyond that serial move up by one, so existing bonds
    /// keep pointing at the same particles. No bond is created between a core and its
    /// generated partner, and generated particles are never offered to `is_core`.
    ///
    /// # Arguments
    ///
    /// * `is_core` - Selects the particles that receive a partner.
    /// * `generator` - Builds the partner of a core; the core passed in already carries
    ///   its final serial. The serial of the returned particle is overwritten.
    ///
    /// # Return
    ///
    /// The number of inserted particles.
    ///
    /// # Errors
    ///
    /// Propagates the first generator error; the topology is left unchanged in that case.
    pub fn insert_after<E>(
        &mut self,
        mut is_core: impl FnMut(&Particle) -> bool,
        mut generator: impl FnMut(&Particle) -> Result<Particle, E>,
    ) -> Result<usize, E> {
        let mut renumbered = Vec::with_capacity(self.particles.len());
        let mut new_serial_of = vec![0usize; self.particles.len() + 1];
        let mut inserted = 0;

        for particle in &self.particles {
            let mut core = particle.clone();
            core.serial = particle.serial + inserted;
            new_serial_of[particle.serial] = core.serial;

            let partner = if is_core(particle) {
                let mut partner = generator(&core)?;
                partner.serial = core.serial + 1;
                Some(partner)
            } else {
                None
            };

            renumbered.push(core);
            if let Some(partner) = partner {
                renumbered.push(partner);
                inserted += 1;
            }
        }

        self.particles = renumbered;
        for bond in &mut self.bonds {
            *bond = Bond::new(new_serial_of[bond.serial1], new_serial_of[bond.serial2]);
        }
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn particle(serial: usize, name: &str, residue_seq: usize) -> Particle {
        Particle::new(
            serial,
            name,
            "TST",
            residue_seq,
            Point3::new(serial as f64, 0.0, 0.0),
            "C",
        )
        .unwrap()
    }

    fn methanol_pair() -> Topology {
        // Two residues: C1 bonded to three hydrogens and O1, O1 bonded to H4.
        let mut particles = Vec::new();
        let mut bonds = Vec::new();
        for res in 0..2 {
            let base = res * 6;
            let names = ["C1", "H1", "H2", "H3", "O1", "H4"];
            for (i, name) in names.iter().enumerate() {
                particles.push(particle(base + i + 1, name, res + 1));
            }
            bonds.extend([
                Bond::new(base + 1, base + 2),
                Bond::new(base + 1, base + 3),
                Bond::new(base + 1, base + 4),
                Bond::new(base + 1, base + 5),
                Bond::new(base + 5, base + 6),
            ]);
        }
        Topology::new(
            Cell::new(20.0, 20.0, 20.0),
            particles,
            bonds,
            CrossResidueBondPolicy::Strict,
        )
        .unwrap()
    }

    fn assign_types(topology: &mut Topology) {
        for p in &mut topology.particles {
            let t = match p.name.as_str() {
                "C1" => "TST-CT-1",
                "O1" => "TST-OH-2",
                "H4" => "TST-HO-3",
                _ => "TST-HC-4",
            };
            p.nonbonded_type = Some(t.to_string());
        }
    }

    #[test]
    fn new_normalizes_and_deduplicates_bonds() {
        let particles = vec![particle(1, "C1", 1), particle(2, "C2", 1)];
        let topology = Topology::new(
            Cell::new(1.0, 1.0, 1.0),
            particles,
            vec![Bond::new(2, 1), Bond::new(1, 2), Bond { serial1: 2, serial2: 1 }],
            CrossResidueBondPolicy::Strict,
        )
        .unwrap();
        assert_eq!(topology.bonds(), &[Bond { serial1: 1, serial2: 2 }]);
    }

    #[test]
    fn new_rejects_bond_to_unknown_particle() {
        let result = Topology::new(
            Cell::new(1.0, 1.0, 1.0),
            vec![particle(1, "C1", 1)],
            vec![Bond::new(1, 7)],
            CrossResidueBondPolicy::Strict,
        );
        assert_eq!(result, Err(TopologyError::UnknownSerial(7)));
    }

    #[test]
    fn cross_residue_bond_is_fatal_when_strict() {
        let result = Topology::new(
            Cell::new(1.0, 1.0, 1.0),
            vec![particle(1, "C1", 1), particle(2, "C1", 2)],
            vec![Bond::new(1, 2)],
            CrossResidueBondPolicy::Strict,
        );
        assert!(matches!(
            result,
            Err(TopologyError::CrossResidueBond {
                residue1: 1,
                residue2: 2,
                ..
            })
        ));
    }

    #[test]
    fn cross_residue_bond_is_kept_when_permissive() {
        let particles = vec![particle(1, "C1", 1), particle(2, "C1", 2)];
        let topology = Topology::new(
            Cell::new(1.0, 1.0, 1.0),
            particles.clone(),
            vec![Bond::new(1, 2)],
            CrossResidueBondPolicy::Permissive,
        )
        .unwrap();
        assert_eq!(topology.bonds().len(), 1);
        assert_eq!(topology.particles(), particles.as_slice());
    }

    #[test]
    fn count_bonded_hydrogens_ignores_h_h_and_heavy_heavy_bonds() {
        let particles = vec![
            particle(1, "H1", 1),
            particle(2, "h2", 1),
            particle(3, "C1", 1),
            particle(4, "C2", 1),
        ];
        let mut topology = Topology::new(
            Cell::new(1.0, 1.0, 1.0),
            particles,
            vec![Bond::new(1, 2), Bond::new(3, 4), Bond::new(2, 3)],
            CrossResidueBondPolicy::Strict,
        )
        .unwrap();
        topology.count_bonded_hydrogens();
        let counts: Vec<_> = topology
            .particles()
            .iter()
            .map(|p| p.bonded_hydrogens)
            .collect();
        assert_eq!(counts, vec![0, 0, 1, 0]);
    }

    #[test]
    fn count_bonded_hydrogens_is_idempotent() {
        let mut topology = methanol_pair();
        topology.count_bonded_hydrogens();
        topology.count_bonded_hydrogens();
        assert_eq!(topology.particle(1).unwrap().bonded_hydrogens, 3);
        assert_eq!(topology.particle(5).unwrap().bonded_hydrogens, 1);
        assert_eq!(topology.particle(7).unwrap().bonded_hydrogens, 3);
    }

    #[test]
    fn hydrogen_counts_by_type_are_reported() {
        let mut topology = methanol_pair();
        assign_types(&mut topology);
        topology.count_bonded_hydrogens();
        let counts = topology.check_hydrogen_count_by_type().unwrap();
        assert_eq!(counts["TST-CT-1"], 3);
        assert_eq!(counts["TST-OH-2"], 1);
        assert_eq!(counts["TST-HC-4"], 0);
    }

    #[test]
    fn differing_hydrogen_counts_within_a_type_are_rejected() {
        let mut topology = methanol_pair();
        assign_types(&mut topology);
        topology.bonds.retain(|b| *b != Bond::new(7, 8));
        topology.count_bonded_hydrogens();
        let err = topology.check_hydrogen_count_by_type().unwrap_err();
        assert_eq!(
            err,
            TopologyError::InconsistentHydrogenCount {
                type_name: "TST-CT-1".into(),
                expected: 3,
                found: 2,
                serial: 7,
            }
        );
    }

    #[test]
    fn insert_after_keeps_serials_contiguous_and_bonds_attached() {
        let mut topology = methanol_pair();
        let original = topology.clone();
        let identity = |p: &Particle| (p.residue_seq, p.name.clone());

        let inserted = topology
            .insert_after(
                |p| !is_hydrogen_name(&p.name),
                |core| {
                    let mut shadow = core.clone();
                    shadow.name = format!("D{}", core.name);
                    Ok::<_, ()>(shadow)
                },
            )
            .unwrap();

        assert_eq!(inserted, 4);
        assert_eq!(topology.particles().len(), original.particles().len() + 4);
        for (idx, p) in topology.particles().iter().enumerate() {
            assert_eq!(p.serial, idx + 1);
        }
        assert_eq!(topology.particle(2).unwrap().name, "DC1");
        assert_eq!(topology.particle(7).unwrap().name, "DO1");
        assert_eq!(topology.particle(8).unwrap().name, "H4");

        assert_eq!(topology.bonds().len(), original.bonds().len());
        let before: Vec<_> = original
            .bonds()
            .iter()
            .map(|b| {
                (
                    identity(original.particle(b.serial1).unwrap()),
                    identity(original.particle(b.serial2).unwrap()),
                )
            })
            .collect();
        let after: Vec<_> = topology
            .bonds()
            .iter()
            .map(|b| {
                (
                    identity(topology.particle(b.serial1).unwrap()),
                    identity(topology.particle(b.serial2).unwrap()),
                )
            })
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn insert_after_does_not_revisit_generated_particles() {
        let mut topology = methanol_pair();
        let inserted = topology
            .insert_after(|p| p.name == "C1", |core| Ok::<_, ()>(core.clone()))
            .unwrap();
        assert_eq!(inserted, 2);
        assert_eq!(topology.particles().len(), 14);
    }

    #[test]
    fn insert_after_leaves_topology_untouched_on_generator_error() {
        let mut topology = methanol_pair();
        let original = topology.clone();
        let result = topology.insert_after(|p| p.name == "O1", |_| Err("no template"));
        assert_eq!(result, Err("no template"));
        assert_eq!(topology, original);
    }

    #[test]
    fn residue_count_counts_runs() {
        assert_eq!(methanol_pair().residue_count(), 2);
    }
}
