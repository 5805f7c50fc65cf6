//! `neurovision scan` command implementation.

use std::path::Path;

use colored::Colorize;

use super::display::print_warnings;
use super::open_and_scan;

/// Run the scan command.
pub fn run(root: &Path, config: Option<&Path>) -> Result<(), neurovision::Error> {
    println!("{} {}...", "Scanning".cyan().bold(), root.display());

    let (_, summary) = open_and_scan(root, config)?;

    println!();
    println!(
        "{} {} files, {} dependency edges",
        "Scanned".green().bold(),
        summary.files_scanned,
        summary.edges
    );
    println!("{}: {:.2?}", "Duration".dimmed(), summary.duration);

    if summary.files_unchanged > 0 {
        println!("{}: {} files", "Unchanged".dimmed(), summary.files_unchanged);
    }
    if summary.files_skipped > 0 {
        println!(
            "{}: {} files (unreadable, not UTF-8 or too large)",
            "Skipped".yellow(),
            summary.files_skipped
        );
    }
    if summary.unresolved > 0 {
        println!(
            "{}: {} (likely external packages)",
            "Unresolved dependencies".dimmed(),
            summary.unresolved
        );
    }

    print_warnings(&summary.warnings);
    Ok(())
}
