//! Domain types for the NeuroVision dependency graph.
//!
//! These types represent the core domain model:
//! - **Identity**: `NodeId` (normalized absolute path or synthetic id)
//! - **Graph payloads**: `NodeData`, `EdgeData` (owned by the graph store)
//! - **Scanner output**: `FileDescriptor`
//! - **Results**: `ScanSummary`, `RescanOutcome`, `GraphStats`
//!
//! ## Design Decisions
//!
//! | Decision | Choice | Rationale |
//! |----------|--------|-----------|
//! | Node identity | Normalized absolute path | Unique, stable across rescans |
//! | External targets | `external:<spec>` nodes | Unresolved imports stay visible |
//! | Edge identity | (source, target, kind) | Duplicates collapse |
//! | Language | Enum not String | Extraction rules are per language |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use crate::error::ParseWarning;

/// Prefix of synthetic ids for unresolved dependency targets.
pub const EXTERNAL_PREFIX: &str = "external:";

// ============================================================================
// Node identity
// ============================================================================

/// Unique identifier of a graph node.
///
/// For project files this is the normalized absolute path. Unresolved
/// dependency targets use `external:<reference>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Wrap a raw identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier for a project file.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        Self(normalize_path(path).to_string_lossy().into_owned())
    }

    /// Identifier for an unresolved reference as written in source.
    #[must_use]
    pub fn external(spec: &str) -> Self {
        Self(format!("{EXTERNAL_PREFIX}{spec}"))
    }

    /// Whether this id names a synthetic external node.
    #[must_use]
    pub fn is_external(&self) -> bool {
        self.0.starts_with(EXTERNAL_PREFIX)
    }

    /// Borrow the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Lexically normalize a path: drop `.` components and fold `..` into the
/// preceding component.
///
/// Does not touch the filesystem, so it works for files that no longer exist.
#[must_use]
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

// ============================================================================
// Enums
// ============================================================================

/// Source languages the dependency extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Python source files (`.py`)
    Python,
    /// JavaScript source files (`.js`, `.jsx`, `.mjs`, `.cjs`)
    JavaScript,
    /// TypeScript source files (`.ts`, `.tsx`)
    TypeScript,
    /// Rust source files (`.rs`)
    Rust,
    /// C source and header files (`.c`, `.h`)
    C,
    /// C++ source and header files
    Cpp,
}

impl Language {
    /// Every supported language.
    pub const ALL: [Language; 6] = [
        Self::Python,
        Self::JavaScript,
        Self::TypeScript,
        Self::Rust,
        Self::C,
        Self::Cpp,
    ];

    /// File extensions handled by this language.
    #[must_use]
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Python => &["py"],
            Self::JavaScript => &["js", "jsx", "mjs", "cjs"],
            Self::TypeScript => &["ts", "tsx"],
            Self::Rust => &["rs"],
            Self::C => &["c", "h"],
            Self::Cpp => &["cc", "cpp", "cxx", "hpp", "hh", "hxx"],
        }
    }

    /// Detect language from file extension.
    ///
    /// # Returns
    ///
    /// `None` if the extension is not recognized.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|lang| lang.extensions().contains(&ext.as_str()))
    }

    /// Detect language from a path's extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Stable lowercase name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Rust => "rust",
            Self::C => "c",
            Self::Cpp => "cpp",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a node stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// A scanned project file
    File,
    /// Target of an unresolved reference (external package, missing file)
    External,
    /// Created by telemetry for something not (yet) scanned
    Placeholder,
}

impl NodeKind {
    /// Stable lowercase name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::External => "external",
            Self::Placeholder => "placeholder",
        }
    }
}

/// How a dependency was expressed in source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// `import` / `from … import` / ES module import or re-export
    Import,
    /// C/C++ `#include`
    Include,
    /// CommonJS `require` or dynamic `import()`
    Require,
    /// Rust `mod` declaration
    Module,
    /// A file referencing itself; the only kind allowed as a self-loop
    Cycle,
}

impl EdgeKind {
    /// Stable lowercase name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Import => "import",
            Self::Include => "include",
            Self::Require => "require",
            Self::Module => "module",
            Self::Cycle => "cycle",
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Graph payloads
// ============================================================================

/// Attributes stored on a graph node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeData {
    /// Unique identifier
    pub id: NodeId,
    /// What the node stands for
    pub kind: NodeKind,
    /// Detected language (files only)
    pub language: Option<Language>,
    /// File size in bytes
    pub size_bytes: u64,
    /// File modification time in nanoseconds since epoch
    pub mtime_ns: i64,
    /// xxHash64 of file content (for change detection)
    pub content_hash: Option<u64>,
    /// When the file was last scanned
    pub scanned_at: Option<DateTime<Utc>>,
}

impl NodeData {
    /// A synthetic node for an unresolved reference.
    #[must_use]
    pub fn external(id: NodeId) -> Self {
        Self::bare(id, NodeKind::External)
    }

    /// A node created by telemetry before the file was scanned.
    #[must_use]
    pub fn placeholder(id: NodeId) -> Self {
        Self::bare(id, NodeKind::Placeholder)
    }

    /// A node for a scanned file.
    #[must_use]
    pub fn file(descriptor: &FileDescriptor, content_hash: u64) -> Self {
        Self {
            id: NodeId::from_path(&descriptor.path),
            kind: NodeKind::File,
            language: Some(descriptor.language),
            size_bytes: descriptor.size_bytes,
            mtime_ns: descriptor.mtime_ns,
            content_hash: Some(content_hash),
            scanned_at: Some(Utc::now()),
        }
    }

    fn bare(id: NodeId, kind: NodeKind) -> Self {
        Self {
            id,
            kind,
            language: None,
            size_bytes: 0,
            mtime_ns: 0,
            content_hash: None,
            scanned_at: None,
        }
    }

    /// Default payload for a node first seen as an edge endpoint.
    #[must_use]
    pub fn implied(id: NodeId) -> Self {
        if id.is_external() {
            Self::external(id)
        } else {
            Self::placeholder(id)
        }
    }
}

/// Attributes stored on a graph edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeData {
    /// How the dependency was written
    pub kind: EdgeKind,
    /// `false` when the target is a synthetic external node
    pub resolved: bool,
}

/// A directed dependency between two nodes, as requested by a writer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeSpec {
    /// The depending node
    pub source: NodeId,
    /// The node depended upon
    pub target: NodeId,
    /// Edge payload
    #[serde(flatten)]
    pub data: EdgeData,
}

impl EdgeSpec {
    /// An edge between two project files.
    #[must_use]
    pub fn resolved(source: NodeId, target: NodeId, kind: EdgeKind) -> Self {
        Self {
            source,
            target,
            data: EdgeData {
                kind,
                resolved: true,
            },
        }
    }

    /// An edge to a synthetic external node.
    #[must_use]
    pub fn unresolved(source: NodeId, spec: &str, kind: EdgeKind) -> Self {
        Self {
            source,
            target: NodeId::external(spec),
            data: EdgeData {
                kind,
                resolved: false,
            },
        }
    }
}

// ============================================================================
// Scanner output
// ============================================================================

/// A candidate source file found by the scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDescriptor {
    /// Absolute, normalized path
    pub path: PathBuf,
    /// Path relative to the project root
    pub relative_path: PathBuf,
    /// Detected language
    pub language: Language,
    /// File size in bytes
    pub size_bytes: u64,
    /// File modification time in nanoseconds since epoch
    pub mtime_ns: i64,
}

impl FileDescriptor {
    /// Graph identifier for this file.
    #[must_use]
    pub fn node_id(&self) -> NodeId {
        NodeId::from_path(&self.path)
    }
}

// ============================================================================
// Operation Results
// ============================================================================

/// Statistics from a full scan.
///
/// Returned by `NeuroVision::scan()`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanSummary {
    /// Files parsed and committed in this scan
    pub files_scanned: usize,
    /// Files whose size, mtime and content hash were unchanged (not re-parsed)
    pub files_unchanged: usize,
    /// Files skipped (unreadable, not UTF-8, too large)
    pub files_skipped: usize,
    /// Nodes removed because their file disappeared
    pub files_removed: usize,
    /// Dependency edges in the graph after the scan
    pub edges: usize,
    /// References that could not be matched to a project file
    pub unresolved: usize,
    /// How long the scan took
    #[serde(with = "duration_millis")]
    pub duration: Duration,
    /// File-level problems (non-fatal)
    pub warnings: Vec<ParseWarning>,
}

/// Result of rescanning a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RescanOutcome {
    /// The file was (re)parsed and its outgoing edges replaced
    Updated {
        /// The rescanned node
        node: NodeId,
        /// Number of outgoing edges after the rescan
        edges: usize,
    },
    /// Content hash matched; nothing changed
    Unchanged {
        /// The rescanned node
        node: NodeId,
    },
    /// The file no longer exists and its node was removed
    Removed {
        /// The removed node
        node: NodeId,
        /// Files that imported it and were re-resolved
        dependents: usize,
    },
    /// The path is not a supported source file
    Ignored {
        /// The requested path
        path: PathBuf,
    },
    /// The file exists but could not be read; the graph was not touched
    Skipped {
        /// The requested path
        path: PathBuf,
        /// Why it was skipped
        reason: String,
    },
}

/// Node and edge counts of the current graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    /// Total nodes
    pub nodes: usize,
    /// Total edges
    pub edges: usize,
    /// Nodes by kind
    pub nodes_by_kind: BTreeMap<&'static str, usize>,
    /// File nodes by language
    pub files_by_language: BTreeMap<&'static str, usize>,
    /// Edges by kind
    pub edges_by_kind: BTreeMap<&'static str, usize>,
    /// Edges to external nodes
    pub unresolved_edges: usize,
    /// Nodes carrying telemetry annotations
    pub annotated_nodes: usize,
    /// Commit counter of the graph
    pub generation: u64,
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    #[allow(clippy::trivially_copy_pass_by_ref)] // serde `with` signature
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u128(duration.as_millis())
    }
}
