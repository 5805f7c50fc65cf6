//! # NeuroVision: Live Dependency Graph for AI Coding Agents
//!
//! NeuroVision scans a project, extracts file-level dependencies from Python,
//! JavaScript/TypeScript, Rust and C/C++ sources, and keeps them in an
//! in-memory graph. Agents query the graph for the ripple effect of a change
//! and attach runtime telemetry to its nodes.
//!
//! ## Design Philosophy
//!
//! - **Best effort scanning** - One bad file never fails a scan; it becomes a warning
//! - **Snapshots, not locks** - Readers get an immutable view and never block writers
//! - **Facts, not policy** - Impact results report distances and confidence; callers decide
//! - **Embeddable** - Library first; the CLI and the MCP server are thin adapters
//!
//! ## Quick Start
//!
//! ```no_run
//! use neurovision::{Config, ImpactOptions, ImpactOutcome, NeuroVision, TelemetryEvent};
//! use std::path::Path;
//! use tokio_util::sync::CancellationToken;
//!
//! let engine = NeuroVision::open(Path::new("/path/to/project"), Config::default())?;
//!
//! // Build the graph
//! let summary = engine.scan(&CancellationToken::new())?;
//! println!("Scanned {} files, {} edges", summary.files_scanned, summary.edges);
//!
//! // Who breaks if src/db.py changes?
//! if let ImpactOutcome::Found(result) = engine.analyze_impact("src/db.py", &ImpactOptions::default())? {
//!     println!("risk {}: {} dependents", result.risk_score, result.impacted.len());
//! }
//!
//! // Attach a runtime event
//! engine.send_telemetry(TelemetryEvent::new("src/db.py", "error", "pool exhausted", "agent-7"))?;
//! # Ok::<(), neurovision::Error>(())
//! ```

pub mod config;
mod error;
pub mod extract;
mod impact;
mod scanner;
mod snapshot;
mod store;
mod telemetry;
mod types;

pub use config::Config;
pub use error::{
    Error, GraphError, ParseWarning, ParseWarningKind, Result, ScanError, ValidationError,
};
pub use impact::{
    ConfidenceLevel, ConfidencePolicy, ImpactAnalyzer, ImpactOptions, ImpactOutcome,
    ImpactResult, ImpactedNode,
};
pub use scanner::{FileScanner, ScanItem, ScanIter};
pub use snapshot::{EdgeView, GraphView, NodeView, ViewCounts, VisualizeOptions};
pub use store::{CommitReport, GraphBatch, GraphSnapshot, GraphState, GraphStore, Neighbor, Topology};
pub use telemetry::{
    EventKind, NodeActivity, Severity, TelemetryAck, TelemetryAnnotation, TelemetryBridge,
    TelemetryEvent,
};
pub use types::{
    EXTERNAL_PREFIX, EdgeData, EdgeKind, EdgeSpec, FileDescriptor, GraphStats, Language, NodeData,
    NodeId, NodeKind, RescanOutcome, ScanSummary, normalize_path,
};

use parking_lot::Mutex;
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use extract::{Extractor, FileExtraction, Resolver, load_source};

/// What a full scan decided for one file.
enum FilePlan {
    /// Size and mtime match the graph; not read
    Unchanged,
    /// Read, but the content hash matches; only metadata is refreshed
    Refreshed(NodeData),
    /// Parsed; outgoing edges are replaced
    Extracted(NodeData, FileExtraction),
    /// Could not be read
    Skipped(ParseWarning),
    /// The scan was cancelled before the file was looked at
    Cancelled,
}

/// Dependency graph engine for one project.
///
/// `NeuroVision` owns the project root, its configuration, the graph store
/// and the telemetry bridge. It is `Send + Sync`; share it as
/// `Arc<NeuroVision>` between threads. Reads, telemetry and scans may run
/// concurrently; full scans and single-file rescans are serialized.
#[derive(Debug)]
pub struct NeuroVision {
    root: PathBuf,
    config: Config,
    scanner: FileScanner,
    extractor: Extractor,
    analyzer: ImpactAnalyzer,
    store: GraphStore,
    bridge: TelemetryBridge,
    scan_lock: Mutex<()>,
}

impl NeuroVision {
    /// Open a project with an explicit configuration.
    ///
    /// The graph starts empty; call [`scan`](Self::scan) to populate it.
    ///
    /// # Errors
    ///
    /// Returns `Error::Scan` if the root is missing or not a directory, or
    /// an ignore pattern is invalid.
    pub fn open(root: &Path, config: Config) -> Result<Self> {
        let scanner = FileScanner::new(root, config.scan.clone())?;
        let extractor = Extractor::new()?;
        let root = scanner.root().to_path_buf();
        debug!(root = %root.display(), "Opened project");

        Ok(Self {
            analyzer: ImpactAnalyzer::new(&root),
            bridge: TelemetryBridge::new(config.telemetry.annotation_capacity),
            store: GraphStore::new(),
            scan_lock: Mutex::new(()),
            root,
            config,
            scanner,
            extractor,
        })
    }

    /// Open a project, loading `config_path` or the project's
    /// `.neurovision.yaml` (see [`Config::discover`]).
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the root cannot
    /// be opened.
    pub fn discover(root: &Path, config_path: Option<&Path>) -> Result<Self> {
        let config = Config::discover(root, config_path)?;
        Self::open(root, config)
    }

    /// The canonical project root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> GraphState {
        self.store.state()
    }

    /// Immutable view of the current graph.
    #[must_use]
    pub fn snapshot(&self) -> GraphSnapshot {
        self.store.snapshot()
    }

    /// Impact options built from the configured defaults.
    #[must_use]
    pub fn impact_options(&self) -> ImpactOptions {
        ImpactOptions::from(&self.config.impact)
    }

    // === Scanning ===

    /// Scan the whole project and commit the result in one step.
    ///
    /// Files are extracted in parallel outside every lock. A file whose
    /// size, mtime and content hash match its node is not re-extracted, as
    /// long as the set of project files is the same as in the graph (new or
    /// removed files can change how other files resolve).
    ///
    /// # Errors
    ///
    /// Returns `Error::Scan` if the root cannot be walked and
    /// `Error::Cancelled` if `cancel` fired before the commit. The graph is
    /// unchanged and the prior lifecycle state restored in both cases.
    pub fn scan(&self, cancel: &CancellationToken) -> Result<ScanSummary> {
        let _guard = self.scan_lock.lock();
        let prior = self.store.begin_scan();
        match self.scan_locked(cancel) {
            Ok(summary) => {
                self.store.finish_scan();
                Ok(summary)
            }
            Err(e) => {
                self.store.abort_scan(prior);
                if matches!(e, Error::Cancelled) {
                    info!(root = %self.root.display(), "Scan cancelled");
                } else {
                    warn!(root = %self.root.display(), error = %e, "Scan failed");
                }
                Err(e)
            }
        }
    }

    fn scan_locked(&self, cancel: &CancellationToken) -> Result<ScanSummary> {
        let start = Instant::now();
        let mut descriptors = Vec::new();
        let mut warnings = Vec::new();

        let mut walk = self.scanner.scan()?;
        for item in walk.by_ref() {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            match item {
                ScanItem::File(descriptor) => descriptors.push(descriptor),
                ScanItem::Warning(warning) => warnings.push(warning),
            }
        }
        debug!(
            files = descriptors.len(),
            unsupported = walk.unsupported_count(),
            warnings = warnings.len(),
            "Walk finished"
        );

        let snapshot = self.store.snapshot();
        let previous: HashSet<&NodeId> = snapshot
            .nodes()
            .filter(|n| n.kind == NodeKind::File)
            .map(|n| &n.id)
            .collect();
        let present: HashSet<NodeId> = descriptors
            .iter()
            .map(FileDescriptor::node_id)
            .chain(warnings.iter().map(|w| NodeId::from_path(&w.path)))
            .collect();
        let removals: Vec<NodeId> = previous
            .iter()
            .filter(|&&id| !present.contains(id))
            .map(|id| (*id).clone())
            .collect();
        let file_set_changed = !removals.is_empty()
            || descriptors
                .iter()
                .any(|d| !previous.contains(&d.node_id()));
        if file_set_changed {
            debug!(removed = removals.len(), "Project file set changed; re-extracting all files");
        }

        let resolver = Resolver::new(
            &self.root,
            descriptors.iter().map(|d| d.path.clone()),
            self.config.resolution,
        );
        let plans: Vec<FilePlan> = descriptors
            .par_iter()
            .map(|descriptor| {
                self.plan_file(descriptor, &snapshot, &resolver, file_set_changed, cancel)
            })
            .collect();
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let mut summary = ScanSummary {
            warnings,
            ..ScanSummary::default()
        };
        let mut batch = GraphBatch::new();
        for plan in plans {
            match plan {
                FilePlan::Unchanged => summary.files_unchanged += 1,
                FilePlan::Refreshed(node) => {
                    summary.files_unchanged += 1;
                    batch.refresh(node);
                }
                FilePlan::Extracted(node, extraction) => {
                    summary.files_scanned += 1;
                    batch.replace(node, extraction.edges());
                }
                FilePlan::Skipped(warning) => summary.warnings.push(warning),
                FilePlan::Cancelled => return Err(Error::Cancelled),
            }
        }
        summary.files_skipped = summary.warnings.len();
        for id in &removals {
            batch.remove(id.clone());
        }

        // Last chance to back out; nothing has been written yet.
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let report = self
            .store
            .apply(batch, |removed| self.bridge.forget(removed))?;

        let committed = self.store.snapshot();
        summary.files_removed = report
            .removed
            .iter()
            .filter(|id| removals.contains(id))
            .count();
        summary.edges = committed.edge_count();
        summary.unresolved = committed.edges().filter(|(_, _, e)| !e.resolved).count();
        summary.duration = start.elapsed();

        info!(
            files_scanned = summary.files_scanned,
            files_unchanged = summary.files_unchanged,
            files_skipped = summary.files_skipped,
            files_removed = summary.files_removed,
            edges = summary.edges,
            unresolved = summary.unresolved,
            duration_ms = summary.duration.as_millis(),
            "Scan complete"
        );
        Ok(summary)
    }

    fn plan_file(
        &self,
        descriptor: &FileDescriptor,
        snapshot: &GraphSnapshot,
        resolver: &Resolver,
        force: bool,
        cancel: &CancellationToken,
    ) -> FilePlan {
        if cancel.is_cancelled() {
            return FilePlan::Cancelled;
        }
        let previous = snapshot
            .node(descriptor.node_id().as_str())
            .filter(|n| n.kind == NodeKind::File);
        if !force
            && previous.is_some_and(|n| {
                n.size_bytes == descriptor.size_bytes && n.mtime_ns == descriptor.mtime_ns
            })
        {
            return FilePlan::Unchanged;
        }

        let source = match load_source(&descriptor.path) {
            Ok(source) => source,
            Err(warning) => {
                debug!(path = %descriptor.path.display(), kind = %warning.kind, "Skipping file");
                return FilePlan::Skipped(warning);
            }
        };
        let node = NodeData::file(descriptor, source.content_hash);
        if !force && previous.is_some_and(|n| n.content_hash == Some(source.content_hash)) {
            return FilePlan::Refreshed(node);
        }
        let extraction = self
            .extractor
            .extract_file(descriptor, &source.content, resolver);
        FilePlan::Extracted(node, extraction)
    }

    /// Re-extract one file and replace its outgoing edges.
    ///
    /// A file that no longer exists has its node removed and the files
    /// importing it are re-resolved. Otherwise other files are not touched;
    /// a full scan re-resolves everything.
    ///
    /// # Errors
    ///
    /// Returns `Error::Graph` only if extraction produced an invalid edge.
    pub fn rescan_file(&self, path: &Path) -> Result<RescanOutcome> {
        let _guard = self.scan_lock.lock();
        let absolute = self.scanner.absolute(path);
        let id = NodeId::from_path(&absolute);

        if !absolute.exists() {
            return self.remove_deleted_file(absolute, id);
        }

        let descriptor = match self.scanner.describe(&absolute) {
            Ok(Some(descriptor)) => descriptor,
            Ok(None) => return Ok(RescanOutcome::Ignored { path: absolute }),
            Err(warning) => {
                return Ok(RescanOutcome::Skipped {
                    path: absolute,
                    reason: warning.to_string(),
                });
            }
        };
        let source = match load_source(&descriptor.path) {
            Ok(source) => source,
            Err(warning) => {
                return Ok(RescanOutcome::Skipped {
                    path: absolute,
                    reason: warning.to_string(),
                });
            }
        };

        let node = NodeData::file(&descriptor, source.content_hash);
        let (unchanged, mut files) = self.store.read(|t| {
            let unchanged = t.node(id.as_str()).is_some_and(|n| {
                n.kind == NodeKind::File && n.content_hash == Some(source.content_hash)
            });
            let files: Vec<PathBuf> = t
                .nodes()
                .filter(|n| n.kind == NodeKind::File)
                .map(|n| PathBuf::from(n.id.as_str()))
                .collect();
            (unchanged, files)
        });
        if unchanged {
            self.store.upsert_node(node);
            debug!(node = %id, "Content unchanged");
            return Ok(RescanOutcome::Unchanged { node: id });
        }

        files.push(descriptor.path.clone());
        let resolver = Resolver::new(&self.root, files, self.config.resolution);
        let extraction = self
            .extractor
            .extract_file(&descriptor, &source.content, &resolver);
        let edges = extraction.edges();
        let edge_count = edges.len();
        self.store
            .replace_outgoing(node, edges, |removed| self.bridge.forget(removed))?;
        info!(node = %id, edges = edge_count, "Rescanned file");
        Ok(RescanOutcome::Updated {
            node: id,
            edges: edge_count,
        })
    }

    /// Drop the node of a deleted file and re-resolve the files importing it,
    /// so their references fall back to external nodes in the same commit.
    fn remove_deleted_file(&self, absolute: PathBuf, id: NodeId) -> Result<RescanOutcome> {
        let Some((dependents, files)) = self.store.read(|t| {
            t.node(id.as_str()).filter(|n| n.kind == NodeKind::File)?;
            let mut dependents: Vec<PathBuf> = t
                .neighbors(id.as_str(), petgraph::Direction::Incoming)
                .ok()?
                .into_iter()
                .filter(|n| n.node != id)
                .filter(|n| t.node(n.node.as_str()).is_some_and(|d| d.kind == NodeKind::File))
                .map(|n| PathBuf::from(n.node.as_str()))
                .collect();
            dependents.dedup();
            let files: Vec<PathBuf> = t
                .nodes()
                .filter(|n| n.kind == NodeKind::File && n.id != id)
                .map(|n| PathBuf::from(n.id.as_str()))
                .collect();
            Some((dependents, files))
        }) else {
            return Ok(RescanOutcome::Ignored { path: absolute });
        };

        let resolver = Resolver::new(&self.root, files, self.config.resolution);
        let mut batch = GraphBatch::new();
        batch.remove(id.clone());
        let mut reresolved = 0;
        for path in &dependents {
            let descriptor = match self.scanner.describe(path) {
                Ok(Some(descriptor)) => descriptor,
                Ok(None) => continue,
                Err(warning) => {
                    debug!(path = %path.display(), kind = %warning.kind, "Dependent not re-resolved");
                    continue;
                }
            };
            let source = match load_source(&descriptor.path) {
                Ok(source) => source,
                Err(warning) => {
                    debug!(path = %path.display(), kind = %warning.kind, "Dependent not re-resolved");
                    continue;
                }
            };
            let extraction = self
                .extractor
                .extract_file(&descriptor, &source.content, &resolver);
            batch.replace(
                NodeData::file(&descriptor, source.content_hash),
                extraction.edges(),
            );
            reresolved += 1;
        }

        self.store.apply(batch, |removed| self.bridge.forget(removed))?;
        info!(node = %id, dependents = reresolved, "Removed node of deleted file");
        Ok(RescanOutcome::Removed {
            node: id,
            dependents: reresolved,
        })
    }

    /// Compare the filesystem with the graph.
    ///
    /// Returns `true` when a file was added, removed or modified since it was
    /// scanned; a `Ready` graph then becomes `Stale`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Scan` if the root can no longer be walked.
    pub fn check_staleness(&self) -> Result<bool> {
        let snapshot = self.store.snapshot();
        let mut seen = HashSet::new();
        let mut changed = false;

        for item in self.scanner.scan()? {
            let ScanItem::File(descriptor) = item else {
                continue;
            };
            let id = descriptor.node_id();
            let current = snapshot.node(id.as_str()).is_some_and(|n| {
                n.kind == NodeKind::File
                    && n.size_bytes == descriptor.size_bytes
                    && n.mtime_ns == descriptor.mtime_ns
            });
            if !current {
                debug!(path = %descriptor.path.display(), "File changed since last scan");
                changed = true;
                break;
            }
            seen.insert(id);
        }
        if !changed {
            changed = snapshot
                .nodes()
                .any(|n| n.kind == NodeKind::File && !seen.contains(&n.id));
        }

        if changed && self.store.mark_stale() {
            info!(root = %self.root.display(), "Graph is stale");
        }
        Ok(changed)
    }

    // === Queries ===

    /// Attach a runtime event to a node, creating a placeholder if needed.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` for a blank required field or unknown
    /// severity.
    pub fn send_telemetry(&self, event: TelemetryEvent) -> Result<TelemetryAck> {
        Ok(self.bridge.ingest(&self.store, &self.root, event)?)
    }

    /// Annotations of a node, newest first.
    #[must_use]
    pub fn annotations(&self, id: &str) -> Vec<TelemetryAnnotation> {
        self.bridge.annotations(id)
    }

    /// A consistent view of the graph and its annotations.
    #[must_use]
    pub fn visualize(&self, options: &VisualizeOptions) -> GraphView {
        let state = self.store.state();
        snapshot::compose(&self.store.snapshot(), &self.bridge, &self.root, state, options)
    }

    /// The ripple set of `target` (node id, absolute path, path relative to
    /// the root, or path suffix).
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if the options are out of range. A target
    /// that matches no node is `ImpactOutcome::NotFound`, not an error.
    pub fn analyze_impact(&self, target: &str, options: &ImpactOptions) -> Result<ImpactOutcome> {
        if target.trim().is_empty() {
            return Err(ValidationError::missing("target").into());
        }
        if !(0.0..=1.0).contains(&options.min_confidence) {
            return Err(ValidationError::new(
                "min_confidence",
                format!("must be within [0, 1], got {}", options.min_confidence),
            )
            .into());
        }
        if options.max_paths == 0 {
            return Err(ValidationError::new("max_paths", "must be at least 1").into());
        }
        options
            .confidence
            .validate()
            .map_err(|reason| ValidationError::new("confidence", reason))?;

        Ok(self
            .analyzer
            .analyze(&self.store.snapshot(), target, options))
    }

    /// Node and edge counts of the current graph.
    #[must_use]
    pub fn stats(&self) -> GraphStats {
        let snapshot = self.store.snapshot();
        let mut stats = GraphStats {
            nodes: snapshot.node_count(),
            edges: snapshot.edge_count(),
            annotated_nodes: self.bridge.annotated_nodes(),
            generation: snapshot.generation(),
            ..GraphStats::default()
        };
        for node in snapshot.nodes() {
            *stats.nodes_by_kind.entry(node.kind.as_str()).or_default() += 1;
            if let (NodeKind::File, Some(language)) = (node.kind, node.language) {
                *stats.files_by_language.entry(language.as_str()).or_default() += 1;
            }
        }
        for (_, _, edge) in snapshot.edges() {
            *stats.edges_by_kind.entry(edge.kind.as_str()).or_default() += 1;
            if !edge.resolved {
                stats.unresolved_edges += 1;
            }
        }
        stats
    }
}
