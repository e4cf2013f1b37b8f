//! PW-011: Tree walker. Deterministic set of relative regular-file paths.
//!
//! Symlinks are never followed and never reported; only regular files are
//! enumerated. Relative paths always use `/` separators. Files whose name is
//! not valid UTF-8 are skipped with a warning.

use crate::core::error::MonitorError;
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// What to leave out of a walk.
#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    /// Root-relative subtrees (or files) that are skipped entirely.
    pub exclude_prefixes: Vec<PathBuf>,
    /// Patterns matched against the `/`-separated relative path.
    pub exclude_globs: Vec<glob::Pattern>,
}

impl WalkOptions {
    /// Compile glob strings; invalid patterns are a config error.
    pub fn with_globs(patterns: &[String]) -> Result<Self, MonitorError> {
        let mut exclude_globs = Vec::with_capacity(patterns.len());
        for p in patterns {
            let pat = glob::Pattern::new(p)
                .map_err(|e| MonitorError::Config(format!("exclude pattern '{}': {}", p, e)))?;
            exclude_globs.push(pat);
        }
        Ok(Self {
            exclude_prefixes: Vec::new(),
            exclude_globs,
        })
    }

    fn excludes(&self, rel: &Path, rel_str: &str) -> bool {
        self.exclude_prefixes.iter().any(|p| rel.starts_with(p))
            || self.exclude_globs.iter().any(|g| g.matches(rel_str))
    }
}

/// Render a relative path with `/` separators.
pub fn rel_string(rel: &Path) -> String {
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Fail unless `root` is a readable directory.
pub fn ensure_root(root: &Path) -> Result<(), MonitorError> {
    let meta = std::fs::metadata(root).map_err(|source| MonitorError::RootInaccessible {
        path: root.to_path_buf(),
        source,
    })?;
    if !meta.is_dir() {
        return Err(MonitorError::RootInaccessible {
            path: root.to_path_buf(),
            source: std::io::Error::other("not a directory"),
        });
    }
    std::fs::read_dir(root).map_err(|source| MonitorError::RootInaccessible {
        path: root.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Enumerate all regular files under `root` as relative paths.
///
/// Only an inaccessible root is an error; unreadable entries below it are
/// logged and skipped.
pub fn walk(root: &Path, opts: &WalkOptions) -> Result<BTreeSet<String>, MonitorError> {
    ensure_root(root)?;

    let mut files = BTreeSet::new();
    let iter = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 {
                return true;
            }
            match entry.path().strip_prefix(root) {
                Ok(rel) => !opts.excludes(rel, &rel_string(rel)),
                Err(_) => true,
            }
        });

    for entry in iter {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(root = %root.display(), error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        match entry.path().strip_prefix(root) {
            // A lossy key would not map back to the file on disk.
            Ok(rel) if rel.to_str().is_none() => {
                warn!(
                    root = %root.display(),
                    path = %rel_string(rel),
                    "skipping file with non-UTF-8 name"
                );
            }
            Ok(rel) => {
                files.insert(rel_string(rel));
            }
            Err(e) => warn!(path = %entry.path().display(), error = %e, "path outside root"),
        }
    }

    Ok(files)
}
