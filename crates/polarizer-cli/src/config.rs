use crate::cli::InputArgs;
use crate::error::{CliError, Result};
use polarizer::core::models::topology::CrossResidueBondPolicy;
use polarizer::engine::config::{PolarizerConfig, PolarizerConfigBuilder};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialPerturbationConfig {
    #[serde(rename = "max-offset")]
    max_offset: Option<f64>,
    seed: Option<u64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialValidationConfig {
    #[serde(rename = "cross-residue-bonds")]
    cross_residue_bonds: Option<CrossResidueBondPolicy>,
    #[serde(rename = "allow-unresolved")]
    allow_unresolved: Option<bool>,
}

/// Settings read from the optional TOML file, before CLI flags are applied.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialPolarizerConfig {
    perturbation: Option<PartialPerturbationConfig>,
    validation: Option<PartialValidationConfig>,
}

/// Output paths of the `polarize` subcommand.
pub struct OutputPaths<'a> {
    pub topology: &'a Path,
    pub forcefield: &'a Path,
}

impl PartialPolarizerConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|source| CliError::FileParsing {
            path: path.to_path_buf(),
            source,
        })
    }

    fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Reads the file named by `--config`, or starts empty.
    pub fn load(args: &InputArgs) -> Result<Self> {
        match &args.config {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Applies `-S` overrides, then CLI flags, on top of the file values.
    pub fn merge_with_cli(
        mut self,
        args: &InputArgs,
        outputs: Option<OutputPaths<'_>>,
    ) -> Result<PolarizerConfig> {
        self.apply_set_values(&args.set_values)?;

        let perturbation = self.perturbation.take().unwrap_or_default();
        let validation = self.validation.take().unwrap_or_default();

        let bond_policy = if args.permissive {
            CrossResidueBondPolicy::Permissive
        } else {
            validation.cross_residue_bonds.unwrap_or_default()
        };
        let allow_unresolved =
            args.allow_unresolved || validation.allow_unresolved.unwrap_or(false);

        let mut builder = PolarizerConfigBuilder::new()
            .topology_path(args.topology.clone())
            .forcefield_path(args.forcefield.clone())
            .polarizability_path(args.polarizability.clone())
            .bond_policy(bond_policy)
            .allow_unresolved(allow_unresolved);

        if let Some(max_offset) = args.max_offset.or(perturbation.max_offset) {
            builder = builder.max_offset(max_offset);
        }
        if let Some(seed) = args.seed.or(perturbation.seed) {
            builder = builder.seed(seed);
        }
        if let Some(outputs) = outputs {
            builder = builder
                .output_topology_path(PathBuf::from(outputs.topology))
                .output_forcefield_path(PathBuf::from(outputs.forcefield));
        }

        builder.build().map_err(|e| CliError::Config(e.to_string()))
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let Some((key, value_str)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };

            match key {
                "perturbation.max-offset" => {
                    self.perturbation
                        .get_or_insert_with(Default::default)
                        .max_offset = Some(parse_value(key, value_str, "float")?);
                }
                "perturbation.seed" => {
                    self.perturbation.get_or_insert_with(Default::default).seed =
                        Some(parse_value(key, value_str, "integer")?);
                }
                "validation.cross-residue-bonds" => {
                    let policy = match value_str {
                        "strict" => CrossResidueBondPolicy::Strict,
                        "permissive" => CrossResidueBondPolicy::Permissive,
                        _ => {
                            return Err(CliError::Config(format!(
                                "Invalid value for {}: {} (expected 'strict' or 'permissive')",
                                key, value_str
                            )));
                        }
                    };
                    self.validation
                        .get_or_insert_with(Default::default)
                        .cross_residue_bonds = Some(policy);
                }
                "validation.allow-unresolved" => {
                    self.validation
                        .get_or_insert_with(Default::default)
                        .allow_unresolved = Some(parse_value(key, value_str, "boolean")?);
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str, kind: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid {} value for {}: {}", kind, key, value)))
}
