use anyhow::Result;
use mmm::install::run_install;
use mmm::{InstallReport, Metadata, Outcome};
use std::path::Path;
use tokio_util::sync::CancellationToken;

pub async fn run(config_path: &Path, quiet: bool, cancel: CancellationToken) -> Result<Outcome> {
    let meta = Metadata::new(config_path);
    let ctx = super::context(cancel)?;

    let spinner = super::spinner("Installing mods...", quiet);
    let result = run_install(&meta, &ctx).await;
    spinner.finish_and_clear();

    let report = result?;
    print_report(&report, quiet);
    Ok(report.outcome())
}

fn print_report(report: &InstallReport, quiet: bool) {
    if !quiet {
        for name in &report.installed {
            println!("  ✓ Installed {}", name);
        }
        for name in &report.restored {
            println!("  ✓ Restored {}", name);
        }
        for file in &report.unmanaged {
            match file.hits.first() {
                Some(hit) => println!(
                    "  ! {} is not in the mod list (looks like {} on {})",
                    file.file_name, hit.project_name, hit.platform
                ),
                None => println!("  ! {} is not in the mod list", file.file_name),
            }
        }
    }
    super::print_failures(&report.failures);

    match report.outcome() {
        Outcome::NothingToDo => println!(
            "✓ All {} mods already installed",
            report.already_present.len()
        ),
        Outcome::Completed => println!(
            "✓ Installed {} mods ({} already present)",
            report.changes(),
            report.already_present.len()
        ),
        Outcome::PartialFailure => println!(
            "✗ Installed {} mods, {} failed",
            report.changes(),
            report.failures.len()
        ),
    }
}
