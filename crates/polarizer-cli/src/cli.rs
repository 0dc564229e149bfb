use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Polarizer CLI - Adds Drude oscillators to OpenMM force fields and PDB configurations.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Insert Drude particles and write the polarizable topology and force field.
    Polarize(PolarizeArgs),
    /// Validate the inputs and print the derived Drude types without writing anything.
    Check(CheckArgs),
}

/// Input files and tuning options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Path to the input PDB configuration (needs a CRYST1 record and CONECT bonds).
    #[arg(short = 'p', long = "pdb", required = true, value_name = "PATH")]
    pub topology: PathBuf,

    /// Path to the OpenMM force field XML file.
    #[arg(short = 'f', long = "forcefield", required = true, value_name = "PATH")]
    pub forcefield: PathBuf,

    /// Path to the Drude polarizability file.
    #[arg(short = 'a', long = "alpha", required = true, value_name = "PATH")]
    pub polarizability: PathBuf,

    /// Optional configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the largest per-axis displacement of a Drude particle (Angstrom).
    #[arg(long, value_name = "FLOAT")]
    pub max_offset: Option<f64>,

    /// Override the seed of the displacement generator.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    /// Keep bonds between different residues with a warning instead of failing.
    #[arg(long)]
    pub permissive: bool,

    /// Keep particles that match no residue template instead of failing.
    #[arg(long)]
    pub allow_unresolved: bool,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S perturbation.seed=42
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `polarize` subcommand.
#[derive(Args, Debug)]
pub struct PolarizeArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Path for the output PDB configuration with Drude particles.
    #[arg(short = 'o', long = "output-pdb", required = true, value_name = "PATH")]
    pub output_topology: PathBuf,

    /// Path for the output force field XML file.
    #[arg(short = 'x', long = "output-xml", required = true, value_name = "PATH")]
    pub output_forcefield: PathBuf,
}

/// Arguments for the `check` subcommand.
#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub input: InputArgs,
}
