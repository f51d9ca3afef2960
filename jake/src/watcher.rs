//! Poll + debounce file-watch loop: reruns a recipe whenever any of its
//! watched files change.
//!
//! Mtimes are polled on an interval and compared against a recorded
//! snapshot rather than driven by a filesystem-event API. No
//! inotify/kqueue/FSEvents: polling is the explicit, portable mechanism
//! used here.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::ast::CommandDirective;
use crate::cache::Cache;
use crate::config::{DEFAULT_DEBOUNCE_MS, DEFAULT_POLL_INTERVAL_MS};
use crate::executor::Executor;
use crate::glob;
use crate::hooks::RunOptions;
use crate::index::JakefileIndex;
use crate::prompt::Prompt;

/// Timing knobs for the watch loop.
#[derive(Debug, Clone, Copy)]
pub struct WatchOptions {
    /// How often to re-scan watched files for changes.
    pub poll_interval: Duration,
    /// Minimum quiet time after the last observed change before
    /// re-running the recipe.
    pub debounce: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
        }
    }
}

/// Drives a recipe's re-execution whenever a watched file changes.
pub struct Watcher<'a> {
    index: &'a JakefileIndex<'a>,
    options: WatchOptions,
    extra_patterns: Vec<String>,
}

impl<'a> Watcher<'a> {
    /// Build a watcher over an indexed Jakefile with the given timing.
    #[must_use]
    pub fn new(index: &'a JakefileIndex<'a>, options: WatchOptions) -> Self {
        Self {
            index,
            options,
            extra_patterns: Vec::new(),
        }
    }

    /// Add an explicit pattern to watch, independent of what the recipe
    /// itself declares.
    pub fn add_pattern(&mut self, pattern: impl Into<String>) {
        self.extra_patterns.push(pattern.into());
    }

    /// Run `recipe_name` once, then repeat it every time a watched file
    /// changes (debounced), until `should_continue` returns `false`.
    /// Recipe failures are logged and do not stop the loop.
    ///
    /// # Errors
    ///
    /// Only propagates a failure from the very first run; failures in
    /// subsequent re-runs are logged, not returned, so the loop keeps
    /// running.
    pub fn watch(
        &self,
        recipe_name: &str,
        cache: &mut Cache,
        prompt: &dyn Prompt,
        run_options: RunOptions,
        mut should_continue: impl FnMut() -> bool,
    ) {
        let patterns = self.collect_patterns(recipe_name);

        println!("watching {} pattern(s) for `{recipe_name}`:", patterns.len());
        for pattern in &patterns {
            println!("  {pattern}");
        }
        println!("Press Ctrl+C to stop");

        let mut snapshot = self.snapshot(&patterns, run_options.verbose);
        run_once(self.index, recipe_name, cache, prompt, run_options);

        let mut pending_since: Option<Instant> = None;
        while should_continue() {
            std::thread::sleep(self.options.poll_interval);

            if self.poll_for_change(&patterns, &mut snapshot, run_options.verbose) {
                pending_since = Some(Instant::now());
            }

            if let Some(since) = pending_since {
                if since.elapsed() >= self.options.debounce {
                    pending_since = None;
                    info!(recipe = recipe_name, "change detected, re-running");
                    run_once(self.index, recipe_name, cache, prompt, run_options);
                }
            }
        }
    }

    /// Patterns for `recipe_name`: explicit [`Self::add_pattern`] calls,
    /// its `file_deps`, and `@watch` directives inside its command list,
    /// followed transitively through its dependencies.
    fn collect_patterns(&self, recipe_name: &str) -> Vec<String> {
        let mut patterns = self.extra_patterns.clone();
        let mut visited = HashSet::new();
        self.collect_from_recipe(recipe_name, &mut patterns, &mut visited);
        patterns
    }

    fn collect_from_recipe(
        &self,
        recipe_name: &str,
        patterns: &mut Vec<String>,
        visited: &mut HashSet<String>,
    ) {
        if !visited.insert(recipe_name.to_string()) {
            return;
        }
        let Some(recipe) = self.index.recipe(recipe_name) else {
            return;
        };
        patterns.extend(recipe.file_deps.iter().cloned());
        for command in &recipe.commands {
            if let Some(CommandDirective::Watch(pattern)) = &command.directive {
                patterns.push(pattern.clone());
            }
        }
        for dep in &recipe.dependencies {
            self.collect_from_recipe(dep, patterns, visited);
        }
    }

    /// Resolve every pattern (glob expansion for wildcards, direct
    /// existence check otherwise) and snapshot mtimes keyed by resolved
    /// path. Missing files are logged-and-skipped in verbose mode.
    fn snapshot(&self, patterns: &[String], verbose: bool) -> HashMap<PathBuf, u128> {
        let mut snapshot = HashMap::new();
        for pattern in patterns {
            let Ok(paths) = resolve_pattern(pattern) else {
                if verbose {
                    warn!(pattern, "invalid watch pattern, skipping");
                }
                continue;
            };
            for path in paths {
                match mtime_ns(&path) {
                    Some(ns) => {
                        let _ = snapshot.insert(path, ns);
                    }
                    None => {
                        if verbose {
                            warn!(path = %path.display(), "watched file missing, skipping");
                        }
                    }
                }
            }
        }
        snapshot
    }

    /// Re-check every resolved file's mtime and re-expand glob patterns to
    /// pick up newly created matches (deduplicated against `snapshot`).
    /// Returns `true` if anything changed.
    fn poll_for_change(
        &self,
        patterns: &[String],
        snapshot: &mut HashMap<PathBuf, u128>,
        verbose: bool,
    ) -> bool {
        let mut changed = false;
        for pattern in patterns {
            let Ok(paths) = resolve_pattern(pattern) else {
                continue;
            };
            for path in paths {
                match mtime_ns(&path) {
                    Some(current) => match snapshot.get(&path) {
                        Some(&recorded) if recorded == current => {}
                        _ => {
                            if verbose {
                                debug!(path = %path.display(), "change detected");
                            }
                            let _ = snapshot.insert(path, current);
                            changed = true;
                        }
                    },
                    None => {
                        if snapshot.remove(&path).is_some() {
                            changed = true;
                        }
                    }
                }
            }
        }
        changed
    }
}

fn run_once(
    index: &JakefileIndex<'_>,
    recipe_name: &str,
    cache: &mut Cache,
    prompt: &dyn Prompt,
    options: RunOptions,
) {
    let mut executor = Executor::new(index, cache, prompt, options);
    if let Err(e) = executor.run(recipe_name, &[]) {
        warn!(recipe = recipe_name, error = %e, "recipe failed during watch run");
    }
}

fn resolve_pattern(pattern: &str) -> crate::error::JakeResult<Vec<PathBuf>> {
    glob::expand(pattern).map(|paths| {
        paths
            .into_iter()
            .map(|p| std::fs::canonicalize(&p).unwrap_or(p))
            .collect()
    })
}

fn mtime_ns(path: &std::path::Path) -> Option<u128> {
    let metadata = std::fs::metadata(path).ok()?;
    let modified = metadata.modified().ok()?;
    modified
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .ok()
        .map(|d| d.as_nanos())
}
