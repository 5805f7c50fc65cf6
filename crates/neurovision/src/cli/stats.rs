//! `neurovision stats` command implementation.

use std::collections::BTreeMap;
use std::path::Path;

use colored::Colorize;

use super::open_and_scan;

/// Run the stats command.
pub fn run(root: &Path, config: Option<&Path>) -> Result<(), neurovision::Error> {
    let (engine, summary) = open_and_scan(root, config)?;
    let stats = engine.stats();

    println!("{}", "NeuroVision Graph Statistics".cyan().bold());
    println!();
    println!(
        "  {}: {} ({})",
        "Project".white().bold(),
        engine.root().display(),
        engine.state()
    );
    println!("  {}: {:.2?}", "Scan time".white().bold(), summary.duration);
    println!();

    println!(
        "  {}: {} total",
        "Nodes".white().bold(),
        stats.nodes.to_string().green()
    );
    print_counts(&stats.nodes_by_kind);
    println!();

    let files = stats.nodes_by_kind.get("file").copied().unwrap_or(0);
    println!(
        "  {}: {} total",
        "Files".white().bold(),
        files.to_string().green()
    );
    print_counts(&stats.files_by_language);
    println!();

    println!(
        "  {}: {} total",
        "Edges".white().bold(),
        stats.edges.to_string().green()
    );
    print_counts(&stats.edges_by_kind);
    println!(
        "    {}: {}",
        "unresolved".dimmed(),
        stats.unresolved_edges.to_string().yellow()
    );

    if !summary.warnings.is_empty() {
        println!();
        println!(
            "  {}: {} files could not be scanned (run `neurovision scan` for details)",
            "Warning".yellow().bold(),
            summary.warnings.len()
        );
    }

    Ok(())
}

/// Print counts sorted by count descending, then by name.
fn print_counts(counts: &BTreeMap<&'static str, usize>) {
    let mut sorted: Vec<_> = counts.iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (name, count) in sorted {
        println!("    {}: {}", name.dimmed(), count);
    }
}
