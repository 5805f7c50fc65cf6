//! Project context management for the MCP server.
//!
//! This module handles:
//! - Path canonicalization and validation
//! - Per-project engine instance management
//! - Cancelling the in-flight scan when the current project changes
//!
//! # Lock Ordering
//!
//! The `Context` lock (via `Arc<RwLock<Context>>`) is only held while
//! looking up or mounting an engine. Engine operations run after it has been
//! released, so a long scan never blocks other tool calls.

use crate::error::{Error, Result};
use neurovision::NeuroVision;
use std::collections::{HashMap, VecDeque};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Maximum number of cached projects to prevent resource exhaustion.
///
/// When this limit is reached, the oldest project is evicted from cache.
pub const MAX_CACHED_PROJECTS: usize = 32;

/// Global context state for the MCP server.
pub struct Context {
    /// The current active project root.
    current_project: Option<PathBuf>,

    /// Cancels scans of the current project; replaced when it changes.
    current_scan: CancellationToken,

    /// Per-project engines (limited to [`MAX_CACHED_PROJECTS`]).
    engines: HashMap<PathBuf, Arc<NeuroVision>>,

    /// Insertion order for FIFO cache eviction.
    cache_order: VecDeque<PathBuf>,
}

/// A project mounted by [`Context::set_project`].
pub struct Mounted {
    /// The canonical project root.
    pub project_root: PathBuf,
    /// The project's engine.
    pub engine: Arc<NeuroVision>,
    /// Token for scans of this project; cancelled if the project changes.
    pub cancel: CancellationToken,
}

impl Context {
    /// Create a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current_project: None,
            current_scan: CancellationToken::new(),
            engines: HashMap::new(),
            cache_order: VecDeque::new(),
        }
    }

    /// Set the current project root.
    ///
    /// This will:
    /// 1. Canonicalize the path (resolves `..`, symlinks, validates existence)
    /// 2. Validate the path is a safe, absolute directory
    /// 3. Cancel any scan of the previous project
    /// 4. Create or retrieve the engine, loading `.neurovision.yaml` if present
    ///
    /// A new engine starts empty; the caller decides when to scan it.
    ///
    /// # Errors
    ///
    /// Returns an error if the path doesn't exist or isn't a directory, or if
    /// the project's configuration is invalid.
    pub fn set_project(&mut self, project_root: &Path) -> Result<Mounted> {
        debug!(path = %project_root.display(), "Setting project");

        let canonical = canonicalize(project_root)?;
        validate_path(&canonical)?;

        if self.current_project.as_ref() != Some(&canonical) {
            if let Some(previous) = &self.current_project {
                debug!(previous = %previous.display(), "Project changed, cancelling scans");
            }
            self.current_scan.cancel();
            self.current_scan = CancellationToken::new();
        }

        let engine = if let Some(engine) = self.engines.get(&canonical) {
            debug!("Using cached engine");
            Arc::clone(engine)
        } else {
            debug!("Creating new engine");
            let engine = Arc::new(NeuroVision::discover(&canonical, None)?);
            while self.engines.len() >= MAX_CACHED_PROJECTS {
                self.evict_oldest();
            }
            self.engines.insert(canonical.clone(), Arc::clone(&engine));
            self.cache_order.push_back(canonical.clone());
            engine
        };

        self.current_project = Some(canonical.clone());

        Ok(Mounted {
            project_root: canonical,
            engine,
            cancel: self.current_scan.clone(),
        })
    }

    /// Evict the oldest cached project to make room for new entries.
    fn evict_oldest(&mut self) {
        if let Some(oldest) = self.cache_order.pop_front() {
            self.engines.remove(&oldest);
            if self.current_project.as_ref() == Some(&oldest) {
                self.current_project = None;
            }
            debug!(project = %oldest.display(), "Evicted project from cache");
        }
    }

    /// Get the current project root.
    #[must_use]
    pub fn current_project(&self) -> Option<&PathBuf> {
        self.current_project.as_ref()
    }

    /// Number of cached engines.
    #[must_use]
    pub fn cache_size(&self) -> usize {
        self.engines.len()
    }

    /// Get the engine for a specific project, or the current one if not
    /// specified, with the token its scans should observe.
    ///
    /// Only scans of the current project are cancelled by a project switch;
    /// other projects get a fresh token.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No context is set and no project path is provided
    /// - The project path doesn't exist (with IO error context)
    /// - The project exists but wasn't mounted via `set_project()`
    pub fn engine_for(&self, project_root: Option<&Path>) -> Result<Mounted> {
        let project = match project_root {
            Some(path) => canonicalize(path)?,
            None => self.current_project.clone().ok_or(Error::NoContext)?,
        };

        let engine = self
            .engines
            .get(&project)
            .cloned()
            .ok_or_else(|| Error::ProjectNotMounted(project.display().to_string()))?;
        let cancel = if self.current_project.as_ref() == Some(&project) {
            self.current_scan.clone()
        } else {
            CancellationToken::new()
        };

        Ok(Mounted {
            project_root: project,
            engine,
            cancel,
        })
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

fn canonicalize(path: &Path) -> Result<PathBuf> {
    path.canonicalize().map_err(|e| Error::ProjectNotFound {
        path: path.display().to_string(),
        source: Some(e),
    })
}

/// Validate that a path is safe to use as a project root.
///
/// - Path must be absolute (canonicalization ensures this)
/// - Path must not contain null bytes
/// - Path must not contain `..` components after canonicalization
/// - Path must be a directory
fn validate_path(path: &Path) -> Result<()> {
    let invalid = |reason: &str| Error::InvalidArgument {
        field: "project_root",
        reason: format!("{reason}: {}", path.display()),
    };

    if !path.is_absolute() {
        return Err(invalid("must be absolute"));
    }
    if path.to_string_lossy().contains('\0') {
        return Err(invalid("contains invalid characters"));
    }
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(invalid("contains parent directory references"));
    }
    if !path.is_dir() {
        return Err(invalid("is not a directory"));
    }

    Ok(())
}
