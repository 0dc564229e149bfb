use crate::core::models::topology::CrossResidueBondPolicy;
use std::path::PathBuf;
use thiserror::Error;

/// Default upper bound of the per-axis shadow displacement, in Angstroms.
pub const DEFAULT_MAX_OFFSET: f64 = 0.1;
/// Default seed of the displacement generator.
pub const DEFAULT_SEED: u64 = 1234;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct InputConfig {
    pub topology_path: PathBuf,
    pub forcefield_path: PathBuf,
    pub polarizability_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputConfig {
    pub topology_path: PathBuf,
    pub forcefield_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerturbationConfig {
    /// Largest displacement of a shadow particle from its core along each axis (Å).
    pub max_offset: f64,
    pub seed: u64,
}

impl Default for PerturbationConfig {
    fn default() -> Self {
        Self {
            max_offset: DEFAULT_MAX_OFFSET,
            seed: DEFAULT_SEED,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ValidationConfig {
    pub bond_policy: CrossResidueBondPolicy,
    /// Keep particles that match no residue template instead of failing.
    pub allow_unresolved: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolarizerConfig {
    pub input: InputConfig,
    /// Absent for dry runs that stop before writing.
    pub output: Option<OutputConfig>,
    pub perturbation: PerturbationConfig,
    pub validation: ValidationConfig,
}

#[derive(Default)]
pub struct PolarizerConfigBuilder {
    topology_path: Option<PathBuf>,
    forcefield_path: Option<PathBuf>,
    polarizability_path: Option<PathBuf>,
    output_topology_path: Option<PathBuf>,
    output_forcefield_path: Option<PathBuf>,
    max_offset: Option<f64>,
    seed: Option<u64>,
    bond_policy: Option<CrossResidueBondPolicy>,
    allow_unresolved: Option<bool>,
}

impl PolarizerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn topology_path(mut self, path: PathBuf) -> Self {
        self.topology_path = Some(path);
        self
    }
    pub fn forcefield_path(mut self, path: PathBuf) -> Self {
        self.forcefield_path = Some(path);
        self
    }
    pub fn polarizability_path(mut self, path: PathBuf) -> Self {
        self.polarizability_path = Some(path);
        self
    }
    pub fn output_topology_path(mut self, path: PathBuf) -> Self {
        self.output_topology_path = Some(path);
        self
    }
    pub fn output_forcefield_path(mut self, path: PathBuf) -> Self {
        self.output_forcefield_path = Some(path);
        self
    }
    pub fn max_offset(mut self, offset: f64) -> Self {
        self.max_offset = Some(offset);
        self
    }
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
    pub fn bond_policy(mut self, policy: CrossResidueBondPolicy) -> Self {
        self.bond_policy = Some(policy);
        self
    }
    pub fn allow_unresolved(mut self, allow: bool) -> Self {
        self.allow_unresolved = Some(allow);
        self
    }

    pub fn build(self) -> Result<PolarizerConfig, ConfigError> {
        let input = InputConfig {
            topology_path: self
                .topology_path
                .ok_or(ConfigError::MissingParameter("topology_path"))?,
            forcefield_path: self
                .forcefield_path
                .ok_or(ConfigError::MissingParameter("forcefield_path"))?,
            polarizability_path: self
                .polarizability_path
                .ok_or(ConfigError::MissingParameter("polarizability_path"))?,
        };

        let output = match (self.output_topology_path, self.output_forcefield_path) {
            (Some(topology_path), Some(forcefield_path)) => Some(OutputConfig {
                topology_path,
                forcefield_path,
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::MissingParameter("output_forcefield_path")),
            (None, Some(_)) => return Err(ConfigError::MissingParameter("output_topology_path")),
        };

        let max_offset = self.max_offset.unwrap_or(DEFAULT_MAX_OFFSET);
        if !max_offset.is_finite() || max_offset < 0.0 {
            return Err(ConfigError::InvalidParameter {
                name: "max_offset",
                reason: format!("must be a finite, non-negative distance (got {})", max_offset),
            });
        }

        Ok(PolarizerConfig {
            input,
            output,
            perturbation: PerturbationConfig {
                max_offset,
                seed: self.seed.unwrap_or(DEFAULT_SEED),
            },
            validation: ValidationConfig {
                bond_policy: self.bond_policy.unwrap_or_default(),
                allow_unresolved: self.allow_unresolved.unwrap_or(false),
            },
        })
    }
}
