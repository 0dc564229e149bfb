use super::with_progress;
use crate::cli::CheckArgs;
use crate::config::PartialPolarizerConfig;
use crate::error::Result;
use polarizer::core::drude::params::DrudeType;
use polarizer::workflows;
use std::fmt::Write;
use tracing::info;

pub fn run(args: CheckArgs, quiet: bool) -> Result<()> {
    let config = PartialPolarizerConfig::load(&args.input)?.merge_with_cli(&args.input, None)?;

    info!("Validating inputs without writing output...");
    let report = with_progress(quiet, |reporter| {
        workflows::polarize::check(&config, reporter)
    })?;

    println!("{}", report.summary);
    print!("{}", drude_table(&report.drude_types));
    println!("✓ Inputs are consistent; no files were written.");
    Ok(())
}

/// Formats the derived Drude types as an aligned table.
fn drude_table(types: &[DrudeType]) -> String {
    let mut out = String::new();
    if types.is_empty() {
        out.push_str("No polarizable atom types found.\n");
        return out;
    }

    let width = types
        .iter()
        .map(|t| t.core_type.len())
        .max()
        .unwrap_or(0)
        .max("TYPE".len());

    let _ = writeln!(
        out,
        "{:<width$} {:>3} {:>10} {:>10} {:>10} {:>7} {:>10}",
        "TYPE", "H", "ALPHA", "ALPHA+H", "K", "THOLE", "Q"
    );
    for t in types {
        let _ = writeln!(
            out,
            "{:<width$} {:>3} {:>10.4} {:>10.4} {:>10.1} {:>7.3} {:>10.5}",
            t.core_type,
            t.hydrogen_count,
            t.polarizability,
            t.merged_polarizability,
            t.spring_constant,
            t.thole,
            t.induced_charge
        );
    }
    out
}
