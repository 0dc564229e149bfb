pub mod check;
pub mod polarize;

use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use polarizer::engine::error::EngineError;
use polarizer::engine::progress::ProgressReporter;

/// Runs `workflow` with a progress bar attached, abandoning the bar on failure.
fn with_progress<T>(
    quiet: bool,
    workflow: impl FnOnce(&ProgressReporter) -> std::result::Result<T, EngineError>,
) -> Result<T> {
    let handler = if quiet {
        CliProgressHandler::hidden()
    } else {
        CliProgressHandler::new()
    };
    let reporter = ProgressReporter::with_callback(handler.get_callback());

    workflow(&reporter).map_err(|e| {
        handler.abandon();
        e.into()
    })
}
