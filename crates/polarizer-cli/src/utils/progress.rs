use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use polarizer::engine::progress::{Progress, ProgressCallback};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

const SPINNER_TICK_MS: u64 = 80;

/// Renders workflow [`Progress`] events as a single stage bar on stderr.
///
/// Each stage announces itself with a phase event; the bar advances once per
/// completed stage and is cleared when the workflow finishes.
#[derive(Clone)]
pub struct CliProgressHandler {
    pb: Arc<Mutex<ProgressBar>>,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    /// Builds a handler that draws nowhere, for `--quiet` runs.
    pub fn hidden() -> Self {
        Self::with_target(ProgressDrawTarget::hidden())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        let pb = ProgressBar::with_draw_target(Some(0), target).with_style(stage_style());
        Self {
            pb: Arc::new(Mutex::new(pb)),
        }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let pb = Arc::clone(&self.pb);

        Box::new(move |progress: Progress| {
            let Ok(pb) = pb.lock() else {
                warn!("Progress bar mutex was poisoned. Cannot update progress.");
                return;
            };

            match progress {
                Progress::TaskStart { total_steps } => {
                    pb.reset();
                    pb.set_length(total_steps);
                    pb.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
                }
                Progress::PhaseStart { name } => pb.set_message(name),
                Progress::PhaseFinish => {}
                Progress::TaskIncrement => pb.inc(1),
                Progress::TaskFinish => {
                    if let Some(length) = pb.length() {
                        pb.set_position(length);
                    }
                    pb.finish_and_clear();
                }
            }
        })
    }

    /// Stops the bar after a failed run, leaving the last stage visible.
    pub fn abandon(&self) {
        if let Ok(pb) = self.pb.lock() {
            pb.abandon();
        }
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}

fn stage_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} [{pos}/{len}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn callback_tracks_stages() {
        let handler = CliProgressHandler::hidden();
        let callback = handler.get_callback();

        callback(Progress::TaskStart { total_steps: 4 });
        callback(Progress::PhaseStart {
            name: "Loading inputs",
        });
        {
            let pb = handler.pb.lock().unwrap();
            assert_eq!(pb.length(), Some(4));
            assert_eq!(pb.position(), 0);
            assert_eq!(pb.message(), "Loading inputs");
        }

        callback(Progress::PhaseFinish);
        callback(Progress::TaskIncrement);
        assert_eq!(handler.pb.lock().unwrap().position(), 1);

        callback(Progress::TaskFinish);
        let pb = handler.pb.lock().unwrap();
        assert!(pb.is_finished());
        assert_eq!(pb.position(), 4);
    }

    #[test]
    fn callback_is_thread_safe() {
        let handler = CliProgressHandler::hidden();
        let callback = handler.get_callback();

        thread::spawn(move || {
            callback(Progress::TaskStart { total_steps: 2 });
            callback(Progress::PhaseStart { name: "Validating" });
            callback(Progress::TaskIncrement);
        })
        .join()
        .unwrap();

        let pb = handler.pb.lock().unwrap();
        assert_eq!(pb.position(), 1);
        assert_eq!(pb.message(), "Validating");
    }

    #[test]
    fn abandon_finishes_the_bar() {
        let handler = CliProgressHandler::hidden();
        handler.get_callback()(Progress::TaskStart { total_steps: 7 });
        handler.abandon();
        assert!(handler.pb.lock().unwrap().is_finished());
    }
}
