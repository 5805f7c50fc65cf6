//! CLI command implementations.

mod display;

pub mod graph;
pub mod impact;
pub mod scan;
pub mod stats;

use std::path::Path;

use neurovision::{NeuroVision, ScanSummary};
use tokio_util::sync::CancellationToken;

/// Open the project and build its graph.
fn open_and_scan(
    root: &Path,
    config: Option<&Path>,
) -> Result<(NeuroVision, ScanSummary), neurovision::Error> {
    let engine = NeuroVision::discover(root, config)?;
    let summary = engine.scan(&CancellationToken::new())?;
    Ok((engine, summary))
}
