use anyhow::Result;
use mmm::update::run_update;
use mmm::{Metadata, Outcome, UpdateReport};
use std::path::Path;
use tokio_util::sync::CancellationToken;

pub async fn run(config_path: &Path, quiet: bool, cancel: CancellationToken) -> Result<Outcome> {
    let meta = Metadata::new(config_path);
    let ctx = super::context(cancel)?;

    let spinner = super::spinner("Checking for updates...", quiet);
    let result = run_update(&meta, &ctx).await;
    spinner.finish_and_clear();

    let report = result?;
    print_report(&report, quiet);
    Ok(report.outcome())
}

fn print_report(report: &UpdateReport, quiet: bool) {
    if !quiet {
        for name in report.install.installed.iter().chain(&report.install.restored) {
            println!("  ✓ Installed {}", name);
        }
        for updated in &report.updated {
            if updated.old_file == updated.new_file {
                println!("  ✓ Updated {} ({})", updated.name, updated.new_file);
            } else {
                println!(
                    "  ✓ Updated {} ({} → {})",
                    updated.name, updated.old_file, updated.new_file
                );
            }
        }
        for name in &report.pinned {
            println!("  - {} is pinned", name);
        }
    }
    super::print_failures(&report.failures);

    if report.updated.is_empty() && report.failures.is_empty() {
        println!("✓ All mods are up to date");
    } else if report.failures.is_empty() {
        println!("✓ Updated {} mods", report.updated.len());
    } else {
        println!(
            "✗ Updated {} mods, {} failed",
            report.updated.len(),
            report.failures.len()
        );
    }
}
