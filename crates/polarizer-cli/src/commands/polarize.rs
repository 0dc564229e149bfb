use super::with_progress;
use crate::cli::PolarizeArgs;
use crate::config::{OutputPaths, PartialPolarizerConfig};
use crate::error::Result;
use polarizer::workflows;
use tracing::info;

pub fn run(args: PolarizeArgs, quiet: bool) -> Result<()> {
    let partial_config = PartialPolarizerConfig::load(&args.input)?;
    info!("Merging configuration from file and CLI arguments...");
    let config = partial_config.merge_with_cli(
        &args.input,
        Some(OutputPaths {
            topology: &args.output_topology,
            forcefield: &args.output_forcefield,
        }),
    )?;

    info!("Invoking the polarization workflow...");
    let summary = with_progress(quiet, |reporter| {
        workflows::polarize::run(&config, reporter)
    })?;

    println!("{}", summary);
    println!(
        "✓ Polarizable configuration written to: {}",
        args.output_topology.display()
    );
    println!(
        "✓ Polarizable force field written to: {}",
        args.output_forcefield.display()
    );
    Ok(())
}
