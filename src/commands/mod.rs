pub mod install;
pub mod update;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use mmm::{Config, Error, ModFailure, Outcome, SyncContext};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Exit code for a run that finished
pub fn exit_code(outcome: Outcome) -> i32 {
    match outcome {
        Outcome::NothingToDo | Outcome::Completed => 0,
        Outcome::PartialFailure => 2,
    }
}

/// Exit code for a run that stopped with an error
pub fn error_exit_code(error: &anyhow::Error) -> i32 {
    match error.downcast_ref::<Error>() {
        // Unreadable project state is an ordinary failure
        Some(Error::ConfigNotFound { .. } | Error::ConfigInvalid { .. } | Error::LockInvalid { .. }) => 1,
        Some(e) if e.is_precondition() => 3,
        _ => 1,
    }
}

/// Catalogs and downloader from the user configuration
pub fn context(cancel: CancellationToken) -> Result<SyncContext> {
    let config = Config::load()?;
    Ok(SyncContext::from_config(&config)?.with_cancel(cancel))
}

pub fn spinner(message: &str, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        spinner.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

pub fn print_failures(failures: &[ModFailure]) {
    for failure in failures {
        println!(
            "  ✗ {} ({} {}): {}",
            failure.name, failure.platform, failure.project_id, failure.error
        );
    }
}
