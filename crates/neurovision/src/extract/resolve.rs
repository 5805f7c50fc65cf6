//! Reference resolution against the set of known project files.
//!
//! Resolution never touches the filesystem: every candidate path is looked up
//! in the file set captured at the start of a scan, so the outcome is
//! deterministic for a given scan.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use super::{Extraction, RawReference, SkipReason, UnresolvedRef};
use crate::config::ResolutionConfig;
use crate::types::{EdgeKind, EdgeSpec, FileDescriptor, Language, NodeId, normalize_path};

/// Probe order for extension-less JavaScript/TypeScript specifiers.
const JS_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs"];

/// Files that own their directory's module in Rust.
const RUST_DIR_OWNERS: &[&str] = &["mod.rs", "lib.rs", "main.rs"];

/// Resolves raw references to project files.
#[derive(Debug, Clone)]
pub struct Resolver {
    root: PathBuf,
    files: HashSet<PathBuf>,
    /// Lowercased path -> real path; populated only when matching ignores case
    folded: Option<HashMap<String, PathBuf>>,
}

impl Resolver {
    /// Create a resolver over `files` (absolute, normalized paths).
    pub fn new(
        root: &Path,
        files: impl IntoIterator<Item = PathBuf>,
        config: ResolutionConfig,
    ) -> Self {
        let files: HashSet<PathBuf> = files.into_iter().collect();
        let folded = config.case_insensitive.then(|| {
            let mut map = HashMap::with_capacity(files.len());
            // Sorted so the lexicographically first path wins a case collision.
            let mut sorted: Vec<&PathBuf> = files.iter().collect();
            sorted.sort();
            for path in sorted {
                map.entry(fold(path)).or_insert_with(|| path.clone());
            }
            map
        });
        Self {
            root: root.to_path_buf(),
            files,
            folded,
        }
    }

    /// Number of known files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether no files are known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Look up a candidate path among the known files.
    #[must_use]
    pub fn lookup(&self, candidate: &Path) -> Option<PathBuf> {
        let candidate = normalize_path(candidate);
        if self.files.contains(&candidate) {
            return Some(candidate);
        }
        self.folded.as_ref()?.get(&fold(&candidate)).cloned()
    }

    /// Resolve one raw reference made by `file`.
    #[must_use]
    pub fn resolve(&self, file: &FileDescriptor, raw: &RawReference) -> Extraction {
        let spec = raw.spec.trim();
        if spec.is_empty() {
            return Extraction::Skipped(SkipReason::Empty);
        }
        let target = match file.language {
            Language::Python => {
                if spec == "__future__" {
                    return Extraction::Skipped(SkipReason::CompilerDirective);
                }
                self.resolve_python(&file.path, spec, raw.member)
            }
            Language::JavaScript | Language::TypeScript => {
                if spec.contains("${") {
                    return Extraction::Skipped(SkipReason::DynamicSpecifier);
                }
                self.resolve_js(&file.path, spec)
            }
            Language::Rust => match raw.kind {
                EdgeKind::Module => self.resolve_rust_mod(&file.path, spec),
                _ => self.resolve_rust_use(&file.path, spec),
            },
            Language::C | Language::Cpp => self.resolve_include(&file.path, spec),
        };

        let source = file.node_id();
        match target {
            Some(path) if path == file.path => Extraction::Resolved(EdgeSpec::resolved(
                source.clone(),
                source,
                EdgeKind::Cycle,
            )),
            Some(path) => Extraction::Resolved(EdgeSpec::resolved(
                source,
                NodeId::from_path(&path),
                raw.kind,
            )),
            None => {
                let external = self.unresolved_name(file, raw.kind, spec);
                Extraction::Unresolved(UnresolvedRef {
                    edge: EdgeSpec::unresolved(source, &external, raw.kind),
                    spec: spec.to_string(),
                    line: raw.line,
                })
            }
        }
    }

    /// Name of the external node for a reference that matched no file.
    ///
    /// Relative references are keyed by the path they point at, relative to
    /// the root, so missing modules in different directories stay distinct.
    fn unresolved_name(&self, file: &FileDescriptor, kind: EdgeKind, spec: &str) -> String {
        let candidate = match file.language {
            Language::Python => python_relative_path(&file.path, spec),
            Language::JavaScript | Language::TypeScript if is_relative_specifier(spec) => file
                .path
                .parent()
                .map(|dir| normalize_path(&dir.join(spec))),
            Language::Rust if kind == EdgeKind::Module => {
                rust_module_dir(&file.path).map(|dir| dir.join(spec))
            }
            _ => None,
        };
        candidate
            .map(|path| self.display_relative(&path))
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| spec.trim_start_matches('<').trim_end_matches('>').to_string())
    }

    fn display_relative(&self, path: &Path) -> String {
        match path.strip_prefix(&self.root) {
            Ok(relative) => relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/"),
            Err(_) => path.to_string_lossy().into_owned(),
        }
    }

    // === Python ===

    fn resolve_python(&self, file: &Path, spec: &str, member: bool) -> Option<PathBuf> {
        let dots = spec.chars().take_while(|&c| c == '.').count();
        let rest = &spec[dots..];
        let segments: Vec<&str> = rest.split('.').filter(|s| !s.is_empty()).collect();

        if dots > 0 {
            let base = python_relative_base(file, dots)?;
            return self.python_module(&base, &segments).or_else(|| {
                let (_, package) = segments.split_last()?;
                member.then(|| self.python_module(&base, package)).flatten()
            });
        }

        self.python_module(&self.root, &segments)
            .or_else(|| self.python_module(file.parent()?, &segments))
    }

    fn python_module(&self, base: &Path, segments: &[&str]) -> Option<PathBuf> {
        let mut path = base.to_path_buf();
        path.extend(segments);
        if segments.is_empty() {
            return self.lookup(&path.join("__init__.py"));
        }
        self.lookup(&path.with_extension("py"))
            .or_else(|| self.lookup(&path.join("__init__.py")))
    }

    // === JavaScript / TypeScript ===

    fn resolve_js(&self, file: &Path, spec: &str) -> Option<PathBuf> {
        if !is_relative_specifier(spec) {
            return None;
        }
        let base = normalize_path(&file.parent()?.join(spec));

        if base.extension().is_some() {
            if let Some(found) = self.lookup(&base) {
                return Some(found);
            }
            // ESM TypeScript imports name the emitted `.js` file.
            if base.extension().and_then(|e| e.to_str()) == Some("js") {
                for ext in ["ts", "tsx"] {
                    if let Some(found) = self.lookup(&base.with_extension(ext)) {
                        return Some(found);
                    }
                }
            }
        }
        JS_EXTENSIONS
            .iter()
            .find_map(|ext| self.lookup(&append_extension(&base, ext)))
            .or_else(|| {
                JS_EXTENSIONS
                    .iter()
                    .find_map(|ext| self.lookup(&base.join(format!("index.{ext}"))))
            })
    }

    // === Rust ===

    fn resolve_rust_mod(&self, file: &Path, name: &str) -> Option<PathBuf> {
        let dir = rust_module_dir(file)?;
        self.rust_module(&dir, &[name])
    }

    fn resolve_rust_use(&self, file: &Path, spec: &str) -> Option<PathBuf> {
        let segments: Vec<&str> = spec.split("::").collect();
        let (first, rest) = segments.split_first()?;
        match *first {
            "crate" => {
                let crate_root = self.rust_crate_root(file)?;
                let root_dir = crate_root.parent()?.to_path_buf();
                self.rust_longest_prefix(&root_dir, rest)
                    .or(Some(crate_root))
            }
            "self" => {
                let dir = rust_module_dir(file)?;
                self.rust_longest_prefix(&dir, rest)
                    .or_else(|| Some(file.to_path_buf()))
            }
            "super" => {
                let mut dir = rust_module_dir(file)?.parent()?.to_path_buf();
                let mut rest = rest;
                while let Some((&"super", tail)) = rest.split_first() {
                    dir = dir.parent()?.to_path_buf();
                    rest = tail;
                }
                self.rust_longest_prefix(&dir, rest)
                    .or_else(|| self.rust_module_owner(&dir))
            }
            _ => None,
        }
    }

    /// Resolve the longest prefix of `segments` that names a module file.
    fn rust_longest_prefix(&self, dir: &Path, segments: &[&str]) -> Option<PathBuf> {
        (1..=segments.len())
            .rev()
            .find_map(|n| self.rust_module(dir, &segments[..n]))
    }

    /// `dir/a/b.rs` or `dir/a/b/mod.rs`.
    fn rust_module(&self, dir: &Path, segments: &[&str]) -> Option<PathBuf> {
        let mut path = dir.to_path_buf();
        path.extend(segments);
        self.lookup(&path.with_extension("rs"))
            .or_else(|| self.lookup(&path.join("mod.rs")))
    }

    /// The file that declares the module whose children live in `dir`.
    fn rust_module_owner(&self, dir: &Path) -> Option<PathBuf> {
        RUST_DIR_OWNERS
            .iter()
            .find_map(|owner| self.lookup(&dir.join(owner)))
            .or_else(|| self.lookup(&dir.with_extension("rs")))
    }

    /// Nearest `lib.rs`/`main.rs` at or above the file, within the root.
    fn rust_crate_root(&self, file: &Path) -> Option<PathBuf> {
        file.ancestors()
            .skip(1)
            .take_while(|dir| dir.starts_with(&self.root))
            .find_map(|dir| {
                ["lib.rs", "main.rs"]
                    .iter()
                    .find_map(|name| self.lookup(&dir.join(name)))
            })
    }

    // === C / C++ ===

    fn resolve_include(&self, file: &Path, spec: &str) -> Option<PathBuf> {
        if spec.starts_with('<') {
            return None;
        }
        self.lookup(&file.parent()?.join(spec))
            .or_else(|| self.lookup(&self.root.join(spec)))
    }
}

/// Package directory a Python relative import with `dots` leading dots
/// starts from.
fn python_relative_base(file: &Path, dots: usize) -> Option<PathBuf> {
    let mut base = file.parent()?.to_path_buf();
    for _ in 1..dots {
        base = base.parent()?.to_path_buf();
    }
    Some(base)
}

/// `..pkg.mod` from `a/b/x.py` is `a/pkg/mod`; `None` for absolute imports.
fn python_relative_path(file: &Path, spec: &str) -> Option<PathBuf> {
    let dots = spec.chars().take_while(|&c| c == '.').count();
    if dots == 0 {
        return None;
    }
    let mut path = python_relative_base(file, dots)?;
    path.extend(spec[dots..].split('.').filter(|s| !s.is_empty()));
    Some(path)
}

fn is_relative_specifier(spec: &str) -> bool {
    spec.starts_with("./") || spec.starts_with("../") || spec == "." || spec == ".."
}

/// Directory holding the child modules of the module defined by `file`.
///
/// `mod.rs`, `lib.rs` and `main.rs` own their directory; `foo.rs` owns
/// `foo/`.
fn rust_module_dir(file: &Path) -> Option<PathBuf> {
    let parent = file.parent()?;
    let name = file.file_name()?.to_str()?;
    if RUST_DIR_OWNERS.contains(&name) {
        Some(parent.to_path_buf())
    } else {
        Some(parent.join(file.file_stem()?))
    }
}

fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".");
    os.push(ext);
    PathBuf::from(os)
}

fn fold(path: &Path) -> String {
    path.to_string_lossy().to_lowercase()
}
