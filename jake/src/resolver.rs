//! Recursive `@import` resolution with cycle detection and namespace
//! prefixing.
//!
//! An `in_progress: HashSet<PathBuf>` of canonical paths guards against
//! import cycles and a `resolved: HashSet<PathBuf>` turns a repeat import
//! of the same file into a no-op rather than a re-parse. A read-size cap
//! rejects runaway imports before they're fully read, and `prefix`
//! rewrites both an imported recipe's name and any dependency names
//! referring to another recipe imported under the same prefix.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::ast::{Hook, ImportDirective, Jakefile, Recipe};
use crate::error::{JakeError, JakeResult};
use crate::parser;

/// Default cap on a single imported Jakefile's size, in bytes.
pub const MAX_IMPORT_SIZE: u64 = 1024 * 1024;

/// Walks every `@import` transitively reachable from `root` and merges
/// them in-place.
pub struct ImportResolver {
    in_progress: HashSet<PathBuf>,
    resolved: HashSet<PathBuf>,
    max_import_size: u64,
}

impl ImportResolver {
    /// A resolver with the default 1 MiB read cap.
    #[must_use]
    pub fn new() -> Self {
        Self {
            in_progress: HashSet::new(),
            resolved: HashSet::new(),
            max_import_size: MAX_IMPORT_SIZE,
        }
    }

    /// Override the per-file read cap (mainly for tests).
    #[must_use]
    pub fn with_max_import_size(mut self, bytes: u64) -> Self {
        self.max_import_size = bytes;
        self
    }

    /// Resolve every import reachable from `root`, merging each into
    /// `root` in declared order.
    ///
    /// `root_path` is the root Jakefile's own path (used to seed the
    /// resolved-set so the root can't transitively import itself) and to
    /// establish the base directory relative imports are resolved against.
    ///
    /// # Errors
    ///
    /// Returns [`JakeError::CircularImport`] on a cycle, or an I/O-flavored
    /// variant if an import can't be read or parsed.
    pub fn resolve(&mut self, root: &mut Jakefile, root_path: &Path) -> JakeResult<()> {
        let root_canonical = canonicalize_best_effort(root_path);
        let _ = self.resolved.insert(root_canonical);
        let base_dir = root_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let imports = root.imports.clone();
        for import in &imports {
            self.merge_import(root, import, &base_dir)?;
        }
        Ok(())
    }

    fn merge_import(
        &mut self,
        target: &mut Jakefile,
        import: &ImportDirective,
        base_dir: &Path,
    ) -> JakeResult<()> {
        let raw_path = PathBuf::from(&import.path);
        let resolved_path = if raw_path.is_absolute() {
            raw_path
        } else {
            base_dir.join(&raw_path)
        };
        let canonical = canonicalize_best_effort(&resolved_path);

        if self.in_progress.contains(&canonical) {
            return Err(JakeError::CircularImport(canonical));
        }
        if self.resolved.contains(&canonical) {
            debug!(path = %canonical.display(), "import already resolved, skipping");
            return Ok(());
        }

        let _ = self.in_progress.insert(canonical.clone());
        let result = self.load_and_merge(target, &canonical, import.prefix.as_deref());
        let _ = self.in_progress.remove(&canonical);
        result?;
        let _ = self.resolved.insert(canonical);
        Ok(())
    }

    fn load_and_merge(
        &mut self,
        target: &mut Jakefile,
        path: &Path,
        prefix: Option<&str>,
    ) -> JakeResult<()> {
        let metadata = fs::metadata(path).map_err(|e| io_error(path, &e))?;
        if metadata.len() > self.max_import_size {
            return Err(JakeError::OutOfMemory {
                path: path.to_path_buf(),
                size: metadata.len(),
            });
        }

        debug!(path = %path.display(), "parsing imported jakefile");
        let src = fs::read_to_string(path).map_err(|e| io_error(path, &e))?;
        let mut imported =
            parser::parse(&src).map_err(|issues| JakeError::ParseError(format_issues(&issues)))?;

        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let nested_imports = imported.imports.clone();
        for nested in &nested_imports {
            self.merge_import(&mut imported, nested, &base_dir)?;
        }

        merge_jakefile(target, imported, prefix);
        Ok(())
    }
}

impl Default for ImportResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Merge `imported` into `target`, applying `prefix` to imported recipe
/// names and to any dependency name that refers to another imported
/// recipe.
fn merge_jakefile(target: &mut Jakefile, mut imported: Jakefile, prefix: Option<&str>) {
    if let Some(prefix) = prefix {
        let imported_names: HashSet<String> =
            imported.recipes.iter().map(|r| r.name.clone()).collect();

        for recipe in &mut imported.recipes {
            recipe.name = format!("{prefix}.{}", recipe.name);
            recipe.aliases = recipe
                .aliases
                .iter()
                .map(|a| format!("{prefix}.{a}"))
                .collect();
            for dep in &mut recipe.dependencies {
                if imported_names.contains(dep) {
                    *dep = format!("{prefix}.{dep}");
                }
            }
        }
    }

    for recipe in &mut imported.recipes {
        recipe.is_default = false;
    }

    target.variables.extend(imported.variables);
    target.recipes.extend(imported.recipes);
    target.directives.extend(imported.directives);
    target.pre_hooks.extend(imported.pre_hooks);
    target.post_hooks.extend(imported.post_hooks);
    target.on_error_hooks.extend(imported.on_error_hooks);
}

fn canonicalize_best_effort(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn io_error(path: &Path, err: &std::io::Error) -> JakeError {
    match err.kind() {
        std::io::ErrorKind::NotFound => JakeError::FileNotFound(path.to_path_buf()),
        std::io::ErrorKind::PermissionDenied => JakeError::AccessDenied(path.to_path_buf()),
        _ => JakeError::InvalidPath(path.to_path_buf()),
    }
}

fn format_issues(issues: &[parser::ParseIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Returns `true` if `hook` should fire for the recipe currently executing
/// (used by on-error dispatch): a global hook (`recipe_name: None`) always
/// applies; a targeted hook applies only to its named recipe.
#[must_use]
pub fn hook_applies(hook: &Hook, current_recipe: &str) -> bool {
    match &hook.recipe_name {
        None => true,
        Some(name) => name == current_recipe,
    }
}

/// Look up a recipe by name or alias, first match wins.
#[must_use]
pub fn find_recipe_by_name_or_alias<'a>(jakefile: &'a Jakefile, name: &str) -> Option<&'a Recipe> {
    jakefile
        .recipes
        .iter()
        .find(|r| r.name == name || r.aliases.iter().any(|a| a == name))
}
