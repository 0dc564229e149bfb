use crate::core::drude::params::{DrudeParameterSet, DrudeType};
use crate::core::forcefield::index::TypeIndex;
use crate::core::forcefield::model::{Forcefield, ForcefieldXmlFile};
use crate::core::forcefield::{DRUDE_CLASS, SHADOW_ELEMENT};
use crate::core::io::pdb::{PdbFile, PdbReadOptions};
use crate::core::io::traits::ModelFile;
use crate::core::models::particle::Particle;
use crate::core::models::topology::{Cell, Topology};
use crate::engine::config::{ConfigError, OutputConfig, PolarizerConfig};
use crate::engine::displacement::{DisplacementSource, SeededDisplacement};
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::state::Stage;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument, warn};

/// Counts describing the state of a run, printed at the end of the command line tool.
#[derive(Debug, Clone, PartialEq)]
pub struct PolarizationSummary {
    pub stage: Stage,
    pub residues: usize,
    pub particles: usize,
    pub bonds: usize,
    pub cell: Cell,
    pub polarized_types: usize,
    pub shadow_particles: usize,
    pub unresolved_particles: usize,
}

impl fmt::Display for PolarizationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} molecules {} atoms {} bonds",
            self.residues, self.particles, self.bonds
        )?;
        writeln!(
            f,
            "box {:.3} {:.3} {:.3} A",
            self.cell.a, self.cell.b, self.cell.c
        )?;
        write!(
            f,
            "{} polarizable types, {} Drude particles added",
            self.polarized_types, self.shadow_particles
        )?;
        if self.unresolved_particles > 0 {
            write!(f, ", {} unresolved particles kept", self.unresolved_particles)?;
        }
        Ok(())
    }
}

/// Drives the topology and the force field through the polarization stages in
/// lock-step.
///
/// Each public transition method checks that the run is at the preceding stage, so
/// the models can never be written half-augmented or augmented twice.
pub struct Polarizer<D: DisplacementSource> {
    stage: Stage,
    config: PolarizerConfig,
    topology: Topology,
    forcefield: Forcefield,
    parameters: DrudeParameterSet,
    index: TypeIndex,
    displacement: D,
    unresolved: Vec<usize>,
    hydrogen_counts: BTreeMap<String, usize>,
    shadow_particles: usize,
}

impl Polarizer<SeededDisplacement> {
    /// Reads the three input files named in `config`.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] naming the file that could not be read or parsed.
    pub fn load(config: &PolarizerConfig) -> Result<Self, EngineError> {
        let input = &config.input;
        let options = PdbReadOptions {
            bond_policy: config.validation.bond_policy,
        };
        let topology = PdbFile::read_from_path(&input.topology_path, &options).map_err(
            |source| EngineError::TopologyFile {
                path: input.topology_path.clone(),
                source,
            },
        )?;
        let forcefield = ForcefieldXmlFile::read_from_path(&input.forcefield_path, &())
            .map_err(|source| EngineError::ForcefieldFile {
                path: input.forcefield_path.clone(),
                source,
            })?;
        let parameters = DrudeParameterSet::load(&input.polarizability_path)
            .map_err(EngineError::Polarizability)?;

        let displacement =
            SeededDisplacement::new(config.perturbation.seed, config.perturbation.max_offset);
        Ok(Self::from_models(
            config.clone(),
            topology,
            forcefield,
            parameters,
            displacement,
        ))
    }
}

impl<D: DisplacementSource> Polarizer<D> {
    /// Starts a run from models that are already in memory.
    pub fn from_models(
        config: PolarizerConfig,
        topology: Topology,
        forcefield: Forcefield,
        parameters: DrudeParameterSet,
        displacement: D,
    ) -> Self {
        info!(
            "Loaded {} particles in {} residues, {} atom types, {} residue templates, {} polarizable base types.",
            topology.particles().len(),
            topology.residue_count(),
            forcefield.atom_types.len(),
            forcefield.residues.len(),
            parameters.specs().len()
        );
        let index = TypeIndex::build(&forcefield);
        Self {
            stage: Stage::Loaded,
            config,
            topology,
            forcefield,
            parameters,
            index,
            displacement,
            unresolved: Vec::new(),
            hydrogen_counts: BTreeMap::new(),
            shadow_particles: 0,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn forcefield(&self) -> &Forcefield {
        &self.forcefield
    }

    /// Drude types derived during validation, in atom type order.
    pub fn drude_types(&self) -> &[DrudeType] {
        self.parameters.drude_types()
    }

    pub fn summary(&self) -> PolarizationSummary {
        PolarizationSummary {
            stage: self.stage,
            residues: self.topology.residue_count(),
            particles: self.topology.particles().len(),
            bonds: self.topology.bonds().len(),
            cell: self.topology.cell(),
            polarized_types: self.parameters.drude_types().len(),
            shadow_particles: self.shadow_particles,
            unresolved_particles: self.unresolved.len(),
        }
    }

    fn advance(&mut self, operation: &'static str, from: Stage) -> Result<(), EngineError> {
        match from.next() {
            Some(to) if self.stage == from => {
                debug!("Stage {} -> {}", from, to);
                self.stage = to;
                Ok(())
            }
            _ => Err(EngineError::Stage {
                operation,
                expected: from,
                actual: self.stage,
            }),
        }
    }

    fn require(&self, operation: &'static str, expected: Stage) -> Result<(), EngineError> {
        if self.stage == expected {
            Ok(())
        } else {
            Err(EngineError::Stage {
                operation,
                expected,
                actual: self.stage,
            })
        }
    }

    /// Assigns force-field types and classes to every particle.
    pub fn resolve_types(&mut self) -> Result<(), EngineError> {
        self.require("resolve_types", Stage::Loaded)?;
        self.unresolved = self.topology.resolve_types(&self.index);
        if !self.unresolved.is_empty() {
            warn!(
                "{} particle(s) match no residue template atom.",
                self.unresolved.len()
            );
        }
        self.advance("resolve_types", Stage::Loaded)
    }

    pub fn count_hydrogens(&mut self) -> Result<(), EngineError> {
        self.require("count_hydrogens", Stage::TypesResolved)?;
        self.topology.count_bonded_hydrogens();
        self.advance("count_hydrogens", Stage::TypesResolved)
    }

    /// Checks the topology against the force field and derives the Drude parameters.
    ///
    /// # Errors
    ///
    /// Fails if particles of one type carry different hydrogen counts, if particles are
    /// unresolved and that is not allowed, or if a polarizable type has non-physical
    /// parameters.
    pub fn validate(&mut self) -> Result<(), EngineError> {
        self.require("validate", Stage::HydrogenCounted)?;

        self.hydrogen_counts = self.topology.check_hydrogen_count_by_type()?;

        if let Some(&serial) = self.unresolved.first() {
            let count = self.unresolved.len();
            if !self.config.validation.allow_unresolved {
                let (name, residue) = self
                    .topology
                    .particle(serial)
                    .map(|p| (p.name.clone(), p.residue_name.clone()))
                    .unwrap_or_default();
                return Err(EngineError::UnresolvedParticles {
                    count,
                    serial,
                    name,
                    residue,
                });
            }
            warn!(
                "Keeping {} unresolved particle(s) without a Drude partner.",
                count
            );
        }

        self.parameters
            .derive(&self.forcefield, &self.hydrogen_counts)
            .map_err(EngineError::Derivation)?;
        info!(
            "Derived {} Drude types.",
            self.parameters.drude_types().len()
        );
        self.advance("validate", Stage::HydrogenCounted)
    }

    /// Adds shadow types, shadow template atoms and the shared force entries.
    pub fn augment_forcefield(&mut self) -> Result<(), EngineError> {
        self.require("augment_forcefield", Stage::Validated)?;

        let mut forcefield = self.forcefield.clone();
        let types = forcefield.polarize_types(&self.parameters);
        let atoms = forcefield.polarize_residues(&self.parameters)?;
        forcefield.add_shared_force_terms(&self.parameters)?;

        self.forcefield = forcefield;
        self.index = TypeIndex::build(&self.forcefield);
        info!(
            "Force field augmented: {} shadow types, {} shadow template atoms.",
            types, atoms
        );
        self.advance("augment_forcefield", Stage::Validated)
    }

    /// Inserts one shadow particle after every particle of a polarizable type.
    pub fn augment_topology(&mut self) -> Result<(), EngineError> {
        self.require("augment_topology", Stage::ForcefieldAugmented)?;

        let Self {
            topology,
            parameters,
            index,
            displacement,
            ..
        } = self;

        let is_core = |p: &Particle| {
            p.nonbonded_type
                .as_deref()
                .is_some_and(|t| parameters.drude_type(t).is_some())
        };
        let make_shadow = |core: &Particle| -> Result<Particle, EngineError> {
            let shadow = index.shadow_of(&core.residue_name, &core.name).ok_or_else(|| {
                EngineError::MissingShadow {
                    serial: core.serial,
                    name: core.name.clone(),
                    residue: core.residue_name.clone(),
                }
            })?;
            let mut particle = Particle::new(
                core.serial + 1,
                &shadow.name,
                &core.residue_name,
                core.residue_seq,
                core.position + displacement.next_offset(),
                SHADOW_ELEMENT,
            )?;
            particle.nonbonded_type = Some(shadow.type_name.clone());
            particle.class = Some(DRUDE_CLASS.to_string());
            Ok(particle)
        };

        let inserted = topology.insert_after(is_core, make_shadow)?;
        self.shadow_particles = inserted;
        info!("Inserted {} Drude particles.", inserted);
        self.advance("augment_topology", Stage::ForcefieldAugmented)
    }

    /// Writes both augmented models.
    ///
    /// Both outputs are rendered in memory and staged in temporary files next to their
    /// targets; the targets are only replaced once both staged files are complete. If the
    /// second target cannot be replaced, the first one is removed again.
    pub fn write(&mut self, output: &OutputConfig) -> Result<(), EngineError> {
        self.require("write", Stage::TopologyAugmented)?;

        let topology_bytes = PdbFile::to_bytes(&self.topology)?;
        let forcefield_bytes = ForcefieldXmlFile::to_bytes(&self.forcefield)?;

        let staged_topology = stage_file(&output.topology_path, &topology_bytes)?;
        let staged_forcefield = stage_file(&output.forcefield_path, &forcefield_bytes)?;

        persist(staged_topology, &output.topology_path)?;
        if let Err(e) = persist(staged_forcefield, &output.forcefield_path) {
            if let Err(cleanup) = fs::remove_file(&output.topology_path) {
                warn!(
                    "Could not remove {} after a failed write: {}",
                    output.topology_path.display(),
                    cleanup
                );
            }
            return Err(e);
        }
        info!(
            "Wrote {} and {}.",
            output.topology_path.display(),
            output.forcefield_path.display()
        );
        self.advance("write", Stage::TopologyAugmented)
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> EngineError + '_ {
    move |source| EngineError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Writes `bytes` to a temporary file in the directory of `path`.
fn stage_file(path: &Path, bytes: &[u8]) -> Result<NamedTempFile, EngineError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut staged = NamedTempFile::new_in(dir).map_err(io_error(path))?;
    staged.write_all(bytes).map_err(io_error(path))?;
    staged.as_file().sync_all().map_err(io_error(path))?;
    Ok(staged)
}

fn persist(staged: NamedTempFile, path: &Path) -> Result<(), EngineError> {
    staged
        .persist(path)
        .map(|_| ())
        .map_err(|e| io_error(path)(e.error))
}

fn validate_run<D: DisplacementSource>(
    polarizer: &mut Polarizer<D>,
    reporter: &ProgressReporter,
) -> Result<(), EngineError> {
    reporter.phase("Resolving types", || polarizer.resolve_types())?;
    reporter.report(Progress::TaskIncrement);
    reporter.phase("Counting hydrogens", || polarizer.count_hydrogens())?;
    reporter.report(Progress::TaskIncrement);
    reporter.phase("Validating", || polarizer.validate())?;
    reporter.report(Progress::TaskIncrement);
    Ok(())
}

/// Runs every stage and writes the outputs named in `config`.
///
/// # Errors
///
/// Returns the first [`EngineError`]; no output file is written unless every
/// preceding stage succeeded.
#[instrument(skip_all, name = "polarize_workflow")]
pub fn run(
    config: &PolarizerConfig,
    reporter: &ProgressReporter,
) -> Result<PolarizationSummary, EngineError> {
    let output = config
        .output
        .clone()
        .ok_or(ConfigError::MissingParameter("output paths"))?;

    reporter.report(Progress::TaskStart { total_steps: 7 });
    let mut polarizer = reporter.phase("Loading inputs", || Polarizer::load(config))?;
    reporter.report(Progress::TaskIncrement);

    validate_run(&mut polarizer, reporter)?;
    reporter.phase("Augmenting force field", || polarizer.augment_forcefield())?;
    reporter.report(Progress::TaskIncrement);
    reporter.phase("Inserting Drude particles", || polarizer.augment_topology())?;
    reporter.report(Progress::TaskIncrement);
    reporter.phase("Writing outputs", || polarizer.write(&output))?;
    reporter.report(Progress::TaskIncrement);
    reporter.report(Progress::TaskFinish);

    let summary = polarizer.summary();
    info!(
        "Workflow complete: {} Drude particles for {} polarizable types.",
        summary.shadow_particles, summary.polarized_types
    );
    Ok(summary)
}

/// Outcome of a dry run: the summary of the unmodified input and the Drude types
/// that a full run would use.
#[derive(Debug, Clone)]
pub struct CheckReport {
    pub summary: PolarizationSummary,
    pub drude_types: Vec<DrudeType>,
}

/// Runs up to and including validation without modifying or writing anything.
#[instrument(skip_all, name = "check_workflow")]
pub fn check(
    config: &PolarizerConfig,
    reporter: &ProgressReporter,
) -> Result<CheckReport, EngineError> {
    reporter.report(Progress::TaskStart { total_steps: 4 });
    let mut polarizer = reporter.phase("Loading inputs", || Polarizer::load(config))?;
    reporter.report(Progress::TaskIncrement);
    validate_run(&mut polarizer, reporter)?;
    reporter.report(Progress::TaskFinish);

    Ok(CheckReport {
        summary: polarizer.summary(),
        drude_types: polarizer.drude_types().to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::topology::CrossResidueBondPolicy;
    use crate::engine::config::PolarizerConfigBuilder;
    use crate::engine::displacement::ZeroDisplacement;
    use crate::engine::error::ErrorKind;
    use std::io::Cursor;

    const TOPOLOGY: &str = "\
CRYST1   30.000   30.000   30.000  90.00  90.00  90.00 P 1           1
HETATM    1  C1  CLX     1       0.000   0.000   0.000  1.00  0.00           C
HETATM    2  H1  CLX     1       1.090   0.000   0.000  1.00  0.00           H
HETATM    3 CL1  CLX     1      -1.780   0.000   0.000  1.00  0.00          Cl
CONECT    1    2    3
END
";

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
  <NonbondedForce coulomb14scale="0.5" lj14scale="0.5">
    <UseAttributeFromResidue name="charge"/>
  </NonbondedForce>
</ForceField>
"#;

    const TABLE: &str = "CT 0.4 0.0 4184.0 1.0 2.6\nCL 0.4 0.0 4184.0 2.0 2.6\n";

    fn config(allow_unresolved: bool) -> PolarizerConfig {
        PolarizerConfigBuilder::new()
            .topology_path("in.pdb".into())
            .forcefield_path("in.xml".into())
            .polarizability_path("alpha.ff".into())
            .allow_unresolved(allow_unresolved)
            .build()
            .unwrap()
    }

    fn polarizer_for(topology: &str, allow_unresolved: bool) -> Polarizer<ZeroDisplacement> {
        let topology = PdbFile::read_from(
            &mut Cursor::new(topology),
            &PdbReadOptions {
                bond_policy: CrossResidueBondPolicy::Strict,
            },
        )
        .unwrap();
        let forcefield = ForcefieldXmlFile::read_from(&mut Cursor::new(FIELD), &()).unwrap();
        let parameters = DrudeParameterSet::parse(TABLE).unwrap();
        Polarizer::from_models(
            config(allow_unresolved),
            topology,
            forcefield,
            parameters,
            ZeroDisplacement,
        )
    }

    fn advance_to_validated<D: DisplacementSource>(p: &mut Polarizer<D>) -> Result<(), EngineError> {
        p.resolve_types()?;
        p.count_hydrogens()?;
        p.validate()
    }

    #[test]
    fn stages_must_be_visited_in_order() {
        let mut polarizer = polarizer_for(TOPOLOGY, false);
        let err = polarizer.validate().unwrap_err();
        assert!(matches!(
            err,
            EngineError::Stage {
                expected: Stage::HydrogenCounted,
                actual: Stage::Loaded,
                ..
            }
        ));
        assert_eq!(err.kind(), ErrorKind::Internal);

        advance_to_validated(&mut polarizer).unwrap();
        assert_eq!(polarizer.stage(), Stage::Validated);
        assert!(polarizer.resolve_types().is_err());
        assert!(polarizer.augment_topology().is_err());
    }

    #[test]
    fn augmentation_inserts_shadows_in_lock_step() {
        let mut polarizer = polarizer_for(TOPOLOGY, false);
        advance_to_validated(&mut polarizer).unwrap();
        polarizer.augment_forcefield().unwrap();
        polarizer.augment_topology().unwrap();

        let names: Vec<_> = polarizer
            .topology()
            .particles()
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["C1", "DC1", "H1", "CL1", "DCL1"]);

        let shadow = polarizer.topology().particle(2).unwrap();
        assert_eq!(shadow.element, "EP");
        assert_eq!(shadow.class.as_deref(), Some("DRUD"));
        assert_eq!(shadow.nonbonded_type.as_deref(), Some("D-CLX-CT-1"));
        assert_eq!(shadow.position, polarizer.topology().particle(1).unwrap().position);

        let summary = polarizer.summary();
        assert_eq!(summary.shadow_particles, 2);
        assert_eq!(summary.polarized_types, 2);
        assert_eq!(summary.particles, 5);
        assert_eq!(summary.bonds, 2);
        assert_eq!(summary.stage, Stage::TopologyAugmented);
    }

    #[test]
    fn unresolved_particles_fail_unless_allowed() {
        let topology = TOPOLOGY.replace(
            "CONECT",
            "HETATM    4  X1  CLX     1       5.000   0.000   0.000  1.00  0.00           C\nCONECT",
        );

        let mut strict = polarizer_for(&topology, false);
        let err = advance_to_validated(&mut strict).unwrap_err();
        assert!(matches!(
            err,
            EngineError::UnresolvedParticles { count: 1, serial: 4, .. }
        ));
        assert_eq!(err.kind(), ErrorKind::Resolution);

        let mut lenient = polarizer_for(&topology, true);
        advance_to_validated(&mut lenient).unwrap();
        lenient.augment_forcefield().unwrap();
        lenient.augment_topology().unwrap();
        assert_eq!(lenient.summary().unresolved_particles, 1);
        assert_eq!(lenient.summary().shadow_particles, 2);
    }

    #[test]
    fn summary_renders_molecule_banner() {
        let polarizer = polarizer_for(TOPOLOGY, false);
        let text = polarizer.summary().to_string();
        assert!(text.starts_with("1 molecules 3 atoms 2 bonds\nbox 30.000 30.000 30.000 A"));
    }
}
