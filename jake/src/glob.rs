//! Glob pattern detection and expansion.

use std::path::PathBuf;

use crate::error::{JakeError, JakeResult};

/// `true` iff `pattern` contains any of the glob metacharacters `*`, `?`,
/// `[`.
#[must_use]
pub fn is_glob_pattern(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

/// Expand a glob pattern to the list of matching paths, relative to the
/// process's current working directory unless `pattern` is absolute.
/// `**` matches across any number of directory components via
/// `glob_with`'s `require_literal_separator: false`.
///
/// A non-glob pattern naming a directory is walked recursively (via
/// `walkdir`) and expanded to every regular file beneath it, so a `file`
/// recipe depending on a whole directory tree is staled by a change to
/// any file inside it, not just the directory entry's own mtime. A
/// non-glob pattern naming anything else (a plain file, or a path that
/// doesn't exist yet) is returned as a single literal path without
/// checking existence — staleness callers decide what a missing path
/// means.
///
/// # Errors
///
/// Returns [`JakeError::InvalidPath`] if `pattern` itself is malformed.
pub fn expand(pattern: &str) -> JakeResult<Vec<PathBuf>> {
    if !is_glob_pattern(pattern) {
        let path = PathBuf::from(pattern);
        if path.is_dir() {
            return Ok(walk_files(&path));
        }
        return Ok(vec![path]);
    }

    let options = glob::MatchOptions {
        case_sensitive: true,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };

    let paths = glob::glob_with(pattern, options)
        .map_err(|_| JakeError::InvalidPath(PathBuf::from(pattern)))?
        .filter_map(Result::ok)
        .collect();
    Ok(paths)
}

/// Every regular file under `root`, recursively. Unreadable entries
/// (permission errors, broken symlinks encountered mid-walk) are skipped
/// rather than failing the whole walk.
fn walk_files(root: &std::path::Path) -> Vec<PathBuf> {
    walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn detects_glob_metacharacters() {
        assert!(is_glob_pattern("src/*.zig"));
        assert!(is_glob_pattern("file?.txt"));
        assert!(is_glob_pattern("file[0-9].txt"));
        assert!(!is_glob_pattern("src/main.zig"));
    }

    #[test]
    fn non_glob_pattern_returns_itself() {
        let result = expand("plain/path.txt").unwrap();
        assert_eq!(result, vec![PathBuf::from("plain/path.txt")]);
    }

    #[test]
    fn expands_wildcard_against_real_files() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), "").unwrap();
        fs::write(tmp.path().join("b.txt"), "").unwrap();
        fs::write(tmp.path().join("c.rs"), "").unwrap();

        let pattern = tmp.path().join("*.txt");
        let matches = expand(pattern.to_str().unwrap()).unwrap();
        assert_eq!(matches.len(), 2);
    }

    #[test]
    fn double_star_matches_across_directories() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("a/b/c");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("file.rs"), "").unwrap();

        let pattern = tmp.path().join("**/*.rs");
        let matches = expand(pattern.to_str().unwrap()).unwrap();
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn literal_directory_expands_to_every_nested_file() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("src/inner");
        fs::create_dir_all(&nested).unwrap();
        fs::write(tmp.path().join("src/top.rs"), "").unwrap();
        fs::write(nested.join("leaf.rs"), "").unwrap();

        let dir = tmp.path().join("src");
        let matches = expand(dir.to_str().unwrap()).unwrap();
        assert_eq!(matches.len(), 2);
    }

    #[test]
    fn literal_file_is_not_walked() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("plain.txt");
        fs::write(&file, "").unwrap();

        let matches = expand(file.to_str().unwrap()).unwrap();
        assert_eq!(matches, vec![file]);
    }
}
