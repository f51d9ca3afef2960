//! mtime snapshots and the `file` recipe staleness predicate.
//!
//! Persisted as a newline-delimited `path<TAB>mtime_ns` list under the
//! configured cache directory (see [`crate::config::Config`]); a missing or
//! unreadable cache file is treated as cold start rather than an error.
//!
//! The snapshot map sits behind an internal `Mutex` so a shared `&Cache`
//! can be read and updated from multiple worker threads (see
//! [`crate::parallel::ParallelExecutor`]), each call locking only for the
//! duration of its own read or write rather than for a whole recipe run.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

use tracing::{debug, warn};

use crate::glob;

/// An mtime snapshot keyed by path, with on-disk persistence.
#[derive(Debug, Default)]
pub struct Cache {
    snapshots: Mutex<HashMap<PathBuf, u128>>,
}

impl Cache {
    /// An empty, in-memory-only cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot file written by [`Cache::persist`]. Missing or
    /// unreadable files are treated as cold start (an empty cache), not an
    /// error.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        let Ok(contents) = fs::read_to_string(path) else {
            debug!(path = %path.display(), "no cache file found, starting cold");
            return Self::new();
        };

        let mut snapshots = HashMap::new();
        for line in contents.lines() {
            if let Some((path_str, mtime_str)) = line.split_once('\t') {
                if let Ok(mtime_ns) = mtime_str.parse::<u128>() {
                    snapshots.insert(PathBuf::from(path_str), mtime_ns);
                }
            }
        }
        Self {
            snapshots: Mutex::new(snapshots),
        }
    }

    /// Write the snapshot to `path` as `path<TAB>mtime_ns` lines.
    ///
    /// # Errors
    ///
    /// Propagates any I/O failure writing the cache file.
    pub fn persist(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let snapshots = self.snapshots.lock().unwrap_or_else(PoisonError::into_inner);
        let mut body = String::new();
        for (p, mtime) in snapshots.iter() {
            body.push_str(&p.to_string_lossy());
            body.push('\t');
            body.push_str(&mtime.to_string());
            body.push('\n');
        }
        fs::write(path, body)
    }

    /// Refresh the snapshot for a single output path from its current
    /// on-disk mtime. A missing path clears any existing snapshot for it.
    pub fn update(&self, path: &Path) {
        let mut snapshots = self.snapshots.lock().unwrap_or_else(PoisonError::into_inner);
        match mtime_ns(path) {
            Some(ns) => {
                let _ = snapshots.insert(path.to_path_buf(), ns);
            }
            None => {
                let _ = snapshots.remove(path);
            }
        }
    }

    /// `true` if any file matching `dep` (a glob pattern or literal path)
    /// has an mtime newer than the recorded snapshot, or if no snapshot
    /// exists for it yet.
    #[must_use]
    pub fn is_glob_stale(&self, dep: &str) -> bool {
        let paths = match glob::expand(dep) {
            Ok(paths) => paths,
            Err(_) => return true,
        };
        if paths.is_empty() {
            warn!(pattern = dep, "glob pattern matched zero files");
            return true;
        }
        let snapshots = self.snapshots.lock().unwrap_or_else(PoisonError::into_inner);
        paths.iter().any(|path| match (mtime_ns(path), snapshots.get(path)) {
            (Some(current), Some(&recorded)) => current > recorded,
            _ => true,
        })
    }
}

fn mtime_ns(path: &Path) -> Option<u128> {
    let metadata = fs::metadata(path).ok()?;
    let modified = metadata.modified().ok()?;
    modified
        .duration_since(SystemTime::UNIX_EPOCH)
        .ok()
        .map(|d| d.as_nanos())
}

/// `true` if `output` exists and every pattern in `file_deps` is
/// non-stale against `cache` — the file recipe's up-to-date check.
#[must_use]
pub fn is_up_to_date(cache: &Cache, output: &Path, file_deps: &[String]) -> bool {
    if !output.exists() {
        return false;
    }
    !file_deps.iter().any(|dep| cache.is_glob_stale(dep))
}
