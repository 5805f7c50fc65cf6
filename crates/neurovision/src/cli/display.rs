//! Common display utilities for CLI commands.

use std::path::Path;

use colored::Colorize;
use neurovision::{ConfidenceLevel, ImpactedNode, NodeId, ParseWarning};

const MAX_DISPLAY_ITEMS: usize = 10;

/// A node id shortened to its path relative to `root` when possible.
pub fn short_id(id: &NodeId, root: &Path) -> String {
    Path::new(id.as_str())
        .strip_prefix(root)
        .map_or_else(|_| id.to_string(), |p| p.display().to_string())
}

/// Display impacted nodes with distance and confidence.
///
/// Shows up to `MAX_DISPLAY_ITEMS` nodes. If there are more, shows
/// "... and N more". If empty, shows the provided `empty_message`.
pub fn print_impacted(nodes: &[&ImpactedNode], root: &Path, empty_message: &str) {
    if nodes.is_empty() {
        println!("    {}", empty_message.dimmed());
        return;
    }

    for node in nodes.iter().take(MAX_DISPLAY_ITEMS) {
        let confidence = format!("{:.2}", node.confidence);
        let confidence = match node.level {
            ConfidenceLevel::High => confidence.green(),
            ConfidenceLevel::Low => confidence.yellow(),
        };
        println!(
            "    {} {} {}",
            "•".dimmed(),
            short_id(&node.node, root),
            format!("(confidence {confidence})").dimmed()
        );
        for path in &node.paths {
            let chain: Vec<String> = path.iter().map(|id| short_id(id, root)).collect();
            println!("      {}", chain.join(" → ").dimmed());
        }
    }

    if nodes.len() > MAX_DISPLAY_ITEMS {
        println!(
            "    {} ... and {} more",
            "•".dimmed(),
            nodes.len() - MAX_DISPLAY_ITEMS
        );
    }
}

/// Display the first few scan warnings.
pub fn print_warnings(warnings: &[ParseWarning]) {
    if warnings.is_empty() {
        return;
    }
    println!();
    println!("{} ({}):", "Warnings".yellow().bold(), warnings.len());
    for warning in warnings.iter().take(5) {
        println!(
            "  {} {}: {}",
            "•".yellow(),
            warning.path.display(),
            warning.message
        );
    }
    if warnings.len() > 5 {
        println!("  ... and {} more", warnings.len() - 5);
    }
}
