use thiserror::Error;

use super::config::ConfigError;
use super::state::Stage;
use crate::core::drude::params::DrudeError;
use crate::core::forcefield::model::ForcefieldError;
use crate::core::io::pdb::PdbError;
use crate::core::models::particle::ParticleError;
use crate::core::models::topology::TopologyError;
use std::path::PathBuf;

/// Broad classification of a failed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// An input or output file does not follow its format.
    Format,
    /// A particle or core atom could not be matched to the force field.
    Resolution,
    /// The models contradict each other or themselves.
    Consistency,
    /// Parameters admit no physical Drude particle.
    Physics,
    Io,
    Configuration,
    Internal,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to process topology file '{path}': {source}")]
    TopologyFile { path: PathBuf, source: PdbError },

    #[error("Failed to process force field file '{path}': {source}")]
    ForcefieldFile {
        path: PathBuf,
        source: ForcefieldError,
    },

    #[error("Failed to load polarizability file: {0}")]
    Polarizability(#[source] DrudeError),

    #[error("Drude parameter derivation failed: {0}")]
    Derivation(#[source] DrudeError),

    #[error("Topology check failed: {0}")]
    Topology(#[from] TopologyError),

    #[error("Force field update failed: {0}")]
    Augmentation(#[from] ForcefieldError),

    #[error("Failed to render topology: {0}")]
    Rendering(#[from] PdbError),

    #[error(
        "{count} particle(s) match no residue template atom; first is serial {serial} ('{name}' in residue '{residue}')"
    )]
    UnresolvedParticles {
        count: usize,
        serial: usize,
        name: String,
        residue: String,
    },

    #[error("No shadow atom is defined for core particle {serial} ('{name}' in residue '{residue}')")]
    MissingShadow {
        serial: usize,
        name: String,
        residue: String,
    },

    #[error("Invalid shadow particle: {0}")]
    ShadowParticle(#[from] ParticleError),

    #[error("Failed to write '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("'{operation}' requires stage '{expected}' but the run is at stage '{actual}'")]
    Stage {
        operation: &'static str,
        expected: Stage,
        actual: Stage,
    },
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::TopologyFile { source, .. } | EngineError::Rendering(source) => {
                match source {
                    PdbError::Io(_) => ErrorKind::Io,
                    PdbError::Topology(_) => ErrorKind::Consistency,
                    _ => ErrorKind::Format,
                }
            }
            EngineError::ForcefieldFile { source, .. } | EngineError::Augmentation(source) => {
                match source {
                    ForcefieldError::Io(_) => ErrorKind::Io,
                    _ => ErrorKind::Format,
                }
            }
            EngineError::Polarizability(source) | EngineError::Derivation(source) => match source {
                DrudeError::Io { .. } => ErrorKind::Io,
                e if e.is_physics() => ErrorKind::Physics,
                _ => ErrorKind::Format,
            },
            EngineError::Topology(_) => ErrorKind::Consistency,
            EngineError::UnresolvedParticles { .. } | EngineError::MissingShadow { .. } => {
                ErrorKind::Resolution
            }
            EngineError::ShadowParticle(_) => ErrorKind::Format,
            EngineError::Io { .. } => ErrorKind::Io,
            EngineError::Config(_) => ErrorKind::Configuration,
            EngineError::Stage { .. } => ErrorKind::Internal,
        }
    }
}
