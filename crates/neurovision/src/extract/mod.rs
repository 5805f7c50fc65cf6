//! Dependency extraction.
//!
//! Extraction happens in two steps:
//! 1. [`Extractor::extract_references`] finds raw references as written in a
//!    file (pattern-based, comments ignored).
//! 2. [`Resolver::resolve`] matches each reference to a known project file,
//!    producing a tagged [`Extraction`].
//!
//! [`Extractor::extract_file`] combines both for one file.

mod c;
mod javascript;
mod python;
mod resolve;
mod rust;
mod source;

pub use resolve::Resolver;
pub use source::{SourceText, load_source};

use serde::Serialize;

use crate::types::{EdgeKind, EdgeSpec, FileDescriptor, Language, NodeId};

/// A dependency reference exactly as written in source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawReference {
    /// The module path, specifier or include path as written
    pub spec: String,
    /// Statement kind
    pub kind: EdgeKind,
    /// 1-based line of the reference
    pub line: usize,
    /// The last segment may name a member of the enclosing module rather
    /// than a submodule (`from . import name`)
    pub member: bool,
}

impl RawReference {
    /// Create a raw reference.
    pub fn new(spec: impl Into<String>, kind: EdgeKind, line: usize) -> Self {
        Self {
            spec: spec.into(),
            kind,
            line,
            member: false,
        }
    }

    /// A reference to `module.name` where `name` is a submodule or a member
    /// defined in `module` itself.
    pub fn member(spec: impl Into<String>, kind: EdgeKind, line: usize) -> Self {
        Self {
            member: true,
            ..Self::new(spec, kind, line)
        }
    }
}

/// A reference that did not match any project file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedRef {
    /// Edge to the synthetic `external:` node
    pub edge: EdgeSpec,
    /// The reference as written
    pub spec: String,
    /// 1-based line of the reference
    pub line: usize,
}

/// Why a reference produced no edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The reference was blank
    Empty,
    /// A compiler directive rather than a module (`from __future__ import`)
    CompilerDirective,
    /// The specifier is computed at runtime (template literal)
    DynamicSpecifier,
}

/// Outcome of resolving one reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Extraction {
    /// Matched a project file (or the file itself, as a cycle edge)
    Resolved(EdgeSpec),
    /// Kept as an edge to an external node
    Unresolved(UnresolvedRef),
    /// No edge
    Skipped(SkipReason),
}

impl Extraction {
    /// The edge this outcome contributes, if any.
    #[must_use]
    pub fn edge(&self) -> Option<&EdgeSpec> {
        match self {
            Self::Resolved(edge) => Some(edge),
            Self::Unresolved(unresolved) => Some(&unresolved.edge),
            Self::Skipped(_) => None,
        }
    }
}

/// All outcomes for one file.
#[derive(Debug, Clone, Serialize)]
pub struct FileExtraction {
    /// The file's node
    pub node: NodeId,
    /// One outcome per raw reference, in source order
    pub outcomes: Vec<Extraction>,
}

impl FileExtraction {
    /// Distinct outgoing edges, in first-seen order.
    #[must_use]
    pub fn edges(&self) -> Vec<EdgeSpec> {
        let mut seen = std::collections::HashSet::new();
        self.outcomes
            .iter()
            .filter_map(Extraction::edge)
            .filter(|edge| seen.insert((*edge).clone()))
            .cloned()
            .collect()
    }

    /// Number of references kept as unresolved edges.
    #[must_use]
    pub fn unresolved_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, Extraction::Unresolved(_)))
            .count()
    }
}

/// Compiled reference patterns for every supported language.
pub struct Extractor {
    python: python::PythonPatterns,
    js: javascript::JsPatterns,
    rust: rust::RustPatterns,
    c: c::IncludePatterns,
}

impl Extractor {
    /// Compile the reference patterns.
    ///
    /// # Errors
    ///
    /// Returns the regex error if a built-in pattern fails to compile.
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            python: python::PythonPatterns::new()?,
            js: javascript::JsPatterns::new()?,
            rust: rust::RustPatterns::new()?,
            c: c::IncludePatterns::new()?,
        })
    }

    /// Raw references in `content`, ordered by line.
    #[must_use]
    pub fn extract_references(&self, language: Language, content: &str) -> Vec<RawReference> {
        let mut refs = match language {
            Language::Python => self.python.references(content),
            Language::JavaScript | Language::TypeScript => self.js.references(content),
            Language::Rust => self.rust.references(content),
            Language::C | Language::Cpp => self.c.references(content),
        };
        refs.sort_by_key(|r| r.line);
        refs
    }

    /// Extract and resolve every reference in one file.
    #[must_use]
    pub fn extract_file(
        &self,
        descriptor: &FileDescriptor,
        content: &str,
        resolver: &Resolver,
    ) -> FileExtraction {
        let outcomes = self
            .extract_references(descriptor.language, content)
            .iter()
            .map(|raw| resolver.resolve(descriptor, raw))
            .collect();
        FileExtraction {
            node: descriptor.node_id(),
            outcomes,
        }
    }
}

impl std::fmt::Debug for Extractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extractor").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolutionConfig;
    use std::path::{Path, PathBuf};

    fn descriptor(path: &str) -> FileDescriptor {
        let path = PathBuf::from(path);
        FileDescriptor {
            language: Language::from_path(&path).unwrap(),
            relative_path: path.strip_prefix("/proj").unwrap().to_path_buf(),
            path,
            size_bytes: 0,
            mtime_ns: 0,
        }
    }

    #[test]
    fn missing_module_becomes_single_external_edge() {
        let extractor = Extractor::new().unwrap();
        let file = descriptor("/proj/app.py");
        let resolver = Resolver::new(
            Path::new("/proj"),
            [file.path.clone()],
            ResolutionConfig::default(),
        );

        let result = extractor.extract_file(&file, "import does_not_exist\n", &resolver);

        let edges = result.edges();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].target, NodeId::external("does_not_exist"));
        assert!(!edges[0].data.resolved);
        assert_eq!(result.unresolved_count(), 1);
    }

    #[test]
    fn duplicate_references_collapse_into_one_edge() {
        let extractor = Extractor::new().unwrap();
        let app = descriptor("/proj/app.py");
        let util = PathBuf::from("/proj/util.py");
        let resolver = Resolver::new(
            Path::new("/proj"),
            [app.path.clone(), util.clone()],
            ResolutionConfig::default(),
        );

        let result = extractor.extract_file(&app, "import util\nfrom util import x\n", &resolver);

        assert_eq!(result.outcomes.len(), 2);
        assert_eq!(result.edges().len(), 1);
        assert_eq!(result.edges()[0].target, NodeId::from_path(&util));
    }

    #[test]
    fn references_are_ordered_by_line() {
        let extractor = Extractor::new().unwrap();
        let refs = extractor.extract_references(
            Language::Python,
            "from a import b\nimport c\n",
        );
        let lines: Vec<_> = refs.iter().map(|r| (r.spec.as_str(), r.line)).collect();
        assert_eq!(lines, vec![("a", 1), ("c", 2)]);
    }

    #[test]
    fn skipped_references_contribute_no_edge() {
        let extractor = Extractor::new().unwrap();
        let file = descriptor("/proj/app.py");
        let resolver = Resolver::new(Path::new("/proj"), [file.path.clone()], ResolutionConfig::default());

        let result =
            extractor.extract_file(&file, "from __future__ import annotations\n", &resolver);

        assert_eq!(result.outcomes, vec![Extraction::Skipped(SkipReason::CompilerDirective)]);
        assert!(result.edges().is_empty());
    }
}
