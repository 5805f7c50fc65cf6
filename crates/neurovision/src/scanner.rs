//! Project file discovery.
//!
//! [`FileScanner`] walks a project root and yields a lazy stream of
//! [`ScanItem`]s: one per supported source file, plus a warning for every
//! entry that could not be read. Each call to [`FileScanner::scan`] walks the
//! filesystem afresh.
//!
//! Entries are skipped when any of these hold:
//! - the name starts with `.` (hidden files and directories)
//! - a directory is one of the common build/dependency folders
//! - the path relative to the root matches a configured ignore glob

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

use crate::config::ScanConfig;
use crate::error::{ParseWarning, ParseWarningKind, ScanError};
use crate::types::{FileDescriptor, Language, normalize_path};

/// Directory names never descended into.
const EXCLUDED_DIRS: &[&str] = &[
    "target",
    "node_modules",
    "vendor",
    "build",
    "dist",
    "__pycache__",
    "venv",
];

/// One item produced by a scan.
#[derive(Debug, Clone)]
pub enum ScanItem {
    /// A supported source file
    File(FileDescriptor),
    /// An entry that was skipped because it could not be read
    Warning(ParseWarning),
}

/// Walks a project root for source files.
#[derive(Debug)]
pub struct FileScanner {
    root: PathBuf,
    config: ScanConfig,
    ignore: GlobSet,
}

impl FileScanner {
    /// Create a scanner for `root`.
    ///
    /// The root is canonicalized so every descriptor carries an absolute path.
    ///
    /// # Errors
    ///
    /// Returns `ScanError` if the root does not exist, is not a directory, or
    /// an ignore pattern is not a valid glob.
    pub fn new(root: &Path, config: ScanConfig) -> Result<Self, ScanError> {
        let canonical = root.canonicalize().map_err(|source| ScanError::RootNotFound {
            path: root.to_path_buf(),
            source,
        })?;
        if !canonical.is_dir() {
            return Err(ScanError::NotADirectory { path: canonical });
        }

        let mut builder = GlobSetBuilder::new();
        for pattern in &config.ignore {
            let glob = Glob::new(pattern).map_err(|e| ScanError::InvalidIgnore {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?;
            builder.add(glob);
        }
        let ignore = builder.build().map_err(|e| ScanError::InvalidIgnore {
            pattern: config.ignore.join(", "),
            reason: e.to_string(),
        })?;

        Ok(Self {
            root: canonical,
            config,
            ignore,
        })
    }

    /// The canonical project root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start a new walk of the project root.
    ///
    /// # Errors
    ///
    /// Returns `ScanError` if the root has vanished or cannot be listed since
    /// the scanner was created.
    pub fn scan(&self) -> Result<ScanIter<'_>, ScanError> {
        match std::fs::read_dir(&self.root) {
            Ok(_) => {}
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                return Err(ScanError::RootNotFound {
                    path: self.root.clone(),
                    source,
                });
            }
            Err(source) => {
                return Err(ScanError::RootUnreadable {
                    path: self.root.clone(),
                    source,
                });
            }
        }

        // Files directly under the root are at walker depth 1.
        let mut walker = WalkDir::new(&self.root)
            .follow_links(self.config.follow_symlinks)
            .sort_by_file_name();
        if let Some(depth) = self.config.max_depth {
            walker = walker.max_depth(depth.saturating_add(1));
        }

        debug!(root = %self.root.display(), "Starting project walk");
        Ok(ScanIter {
            scanner: self,
            walker: walker.into_iter(),
            unsupported: 0,
        })
    }

    /// Turn a user-supplied path (absolute or relative to the root) into a
    /// normalized absolute path.
    #[must_use]
    pub fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            normalize_path(path)
        } else {
            normalize_path(&self.root.join(path))
        }
    }

    /// Path relative to the root, or `None` when outside it.
    #[must_use]
    pub fn relative<'a>(&self, path: &'a Path) -> Option<&'a Path> {
        path.strip_prefix(&self.root).ok()
    }

    /// Describe a single file the way a full scan would.
    ///
    /// Returns `Ok(None)` when the path lies outside the root, is ignored, or
    /// has no supported language.
    ///
    /// # Errors
    ///
    /// Returns a `ParseWarning` when the file cannot be stat'ed or exceeds the
    /// size limit.
    pub fn describe(&self, path: &Path) -> Result<Option<FileDescriptor>, ParseWarning> {
        let path = self.absolute(path);
        let Some(relative) = self.relative(&path).map(Path::to_path_buf) else {
            return Ok(None);
        };
        if relative
            .ancestors()
            .filter(|p| !p.as_os_str().is_empty())
            .any(|p| self.is_ignored(p, p != relative.as_path()))
        {
            return Ok(None);
        }
        let metadata =
            std::fs::metadata(&path).map_err(|e| ParseWarning::io_error(path.clone(), &e))?;
        if !metadata.is_file() {
            return Ok(None);
        }
        self.descriptor(path, relative, &metadata)
    }

    /// Whether `relative` is excluded from scanning.
    #[must_use]
    pub fn is_ignored(&self, relative: &Path, is_dir: bool) -> bool {
        let hidden_or_excluded = relative
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| {
                name.starts_with('.') || (is_dir && EXCLUDED_DIRS.contains(&name))
            });
        hidden_or_excluded || self.ignore.is_match(relative)
    }

    fn descriptor(
        &self,
        path: PathBuf,
        relative_path: PathBuf,
        metadata: &Metadata,
    ) -> Result<Option<FileDescriptor>, ParseWarning> {
        let Some(language) = Language::from_path(&path) else {
            return Ok(None);
        };
        let size_bytes = metadata.len();
        if size_bytes > self.config.max_file_size {
            return Err(ParseWarning::too_large(
                path,
                size_bytes,
                self.config.max_file_size,
            ));
        }
        Ok(Some(FileDescriptor {
            path,
            relative_path,
            language,
            size_bytes,
            mtime_ns: mtime_ns(metadata),
        }))
    }
}

/// Modification time in nanoseconds since the Unix epoch, 0 if unavailable.
#[must_use]
pub fn mtime_ns(metadata: &Metadata) -> i64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
}

/// Lazy iterator over one walk of the project.
pub struct ScanIter<'a> {
    scanner: &'a FileScanner,
    walker: walkdir::IntoIter,
    unsupported: usize,
}

impl ScanIter<'_> {
    /// Files seen so far that had no supported language.
    #[must_use]
    pub fn unsupported_count(&self) -> usize {
        self.unsupported
    }
}

impl Iterator for ScanIter<'_> {
    type Item = ScanItem;

    fn next(&mut self) -> Option<ScanItem> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e
                        .path()
                        .map_or_else(|| self.scanner.root.clone(), Path::to_path_buf);
                    warn!(path = %path.display(), error = %e, "Walk error, skipping entry");
                    return Some(ScanItem::Warning(ParseWarning::new(
                        path,
                        ParseWarningKind::WalkError,
                        e.to_string(),
                    )));
                }
            };
            if entry.depth() == 0 {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(&self.scanner.root) else {
                continue;
            };
            let file_type = entry.file_type();
            if self.scanner.is_ignored(relative, file_type.is_dir()) {
                trace!(path = %relative.display(), "Ignored");
                if file_type.is_dir() {
                    self.walker.skip_current_dir();
                }
                continue;
            }
            if !file_type.is_file() {
                continue;
            }

            let relative = relative.to_path_buf();
            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "Cannot stat file, skipping");
                    return Some(ScanItem::Warning(ParseWarning::new(
                        entry.path().to_path_buf(),
                        ParseWarningKind::IoError,
                        e.to_string(),
                    )));
                }
            };
            match self
                .scanner
                .descriptor(entry.into_path(), relative, &metadata)
            {
                Ok(Some(descriptor)) => return Some(ScanItem::File(descriptor)),
                Ok(None) => self.unsupported += 1,
                Err(warning) => {
                    warn!(warning = %warning, "Skipping file");
                    return Some(ScanItem::Warning(warning));
                }
            }
        }
    }
}
