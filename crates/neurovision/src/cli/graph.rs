//! `neurovision graph` command implementation.

use std::io::Write;
use std::path::Path;

use neurovision::VisualizeOptions;

use super::open_and_scan;

/// Run the graph command.
pub fn run(
    root: &Path,
    config: Option<&Path>,
    max_depth: Option<usize>,
    include_external: bool,
) -> Result<(), neurovision::Error> {
    let (engine, _) = open_and_scan(root, config)?;

    let view = engine.visualize(&VisualizeOptions {
        max_depth,
        include_external,
        ..VisualizeOptions::default()
    });

    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &view).map_err(std::io::Error::from)?;
    writeln!(stdout)?;
    Ok(())
}
