//! `neurovision impact` command implementation.

use std::path::Path;

use colored::Colorize;
use neurovision::{ImpactOutcome, ImpactResult};

use super::display::{print_impacted, short_id};
use super::open_and_scan;

/// Flags of the impact command.
pub struct ImpactArgs {
    pub max_hops: Option<u32>,
    pub min_confidence: Option<f64>,
    pub paths: Option<usize>,
    pub json: bool,
}

/// Run the impact command.
pub fn run(
    root: &Path,
    config: Option<&Path>,
    target: &str,
    args: &ImpactArgs,
) -> Result<(), neurovision::Error> {
    let (engine, _) = open_and_scan(root, config)?;

    let mut options = engine.impact_options();
    if args.max_hops.is_some() {
        options.max_hops = args.max_hops;
    }
    if let Some(paths) = args.paths {
        options.max_paths = paths;
    }
    if let Some(min_confidence) = args.min_confidence {
        options.min_confidence = min_confidence;
    }

    let outcome = engine.analyze_impact(target, &options)?;

    if args.json {
        let json = serde_json::to_string_pretty(&outcome).map_err(std::io::Error::from)?;
        println!("{json}");
        return Ok(());
    }

    match outcome {
        ImpactOutcome::Found(result) => {
            println!(
                "Impact analysis for {}:",
                short_id(&result.root, engine.root()).cyan().bold()
            );
            print_impact_analysis(&result, engine.root());
        }
        ImpactOutcome::NotFound { target } => {
            println!("{}: no node matches {}", "Not found".yellow().bold(), target.cyan());
        }
    }
    Ok(())
}

/// Display impact analysis results.
fn print_impact_analysis(result: &ImpactResult, root: &Path) {
    println!();

    let (direct, transitive): (Vec<_>, Vec<_>) = result
        .impacted
        .iter()
        .filter(|n| n.node != result.root)
        .partition(|n| n.distance == 1);

    println!(
        "  {} ({} files):",
        "Direct dependents".white().bold(),
        direct.len().to_string().green()
    );
    print_impacted(&direct, root, "(none)");

    println!();

    println!(
        "  {} ({} files):",
        "Transitive dependents".white().bold(),
        transitive.len().to_string().yellow()
    );
    print_impacted(&transitive, root, "(none beyond direct)");

    if result.impacted.iter().any(|n| n.node == result.root) {
        println!();
        println!("  {}", "Target is part of a dependency cycle".yellow());
    }

    println!();
    let risk = result.risk_score.to_string();
    let risk = match result.risk_score {
        0..=29 => risk.green(),
        30..=69 => risk.yellow(),
        _ => risk.red(),
    };
    println!("  {}: {}/100", "Risk score".white().bold(), risk.bold());
    if result.truncated {
        println!(
            "  {}",
            "Traversal stopped at --max-hops; more dependents may exist".dimmed()
        );
    }
}
