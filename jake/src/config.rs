//! Layered process configuration: CLI flags (highest precedence), then
//! environment variables, then built-in defaults — assembled once at
//! startup into a plain immutable [`Config`]. Nothing downstream re-reads
//! `argv` or the environment once a `Config` exists.
//!
//! This module deliberately does not depend on `clap`: argument parsing is
//! the CLI binary's job (see `jake-cli`), which hands its parsed flags in
//! as a [`CliFlags`] and gets back a fully layered [`Config`].

use std::env;
use std::path::{Path, PathBuf};

/// Default cache directory name, created under the Jakefile's own
/// directory unless overridden.
const DEFAULT_CACHE_DIR_NAME: &str = ".jake-cache";

/// File name the on-disk mtime snapshot is persisted under, inside the
/// cache directory.
const SNAPSHOT_FILE_NAME: &str = "snapshot.tsv";

/// Default poll interval for the watch loop, in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Default debounce window for the watch loop, in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 100;

/// Whether ANSI color output is enabled, resolved once from the process
/// environment. Out of scope beyond this contract: the actual
/// color/theme rendering (palette selection, truecolor fallback) is an
/// external collaborator's concern, not this crate's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorPolicy {
    /// Color is always emitted, regardless of terminal detection.
    Always,
    /// Color is never emitted.
    Never,
    /// Left to the renderer's own terminal detection.
    Auto,
}

impl ColorPolicy {
    /// Resolve from `NO_COLOR`, `CLICOLOR`, and `CLICOLOR_FORCE`, in that
    /// precedence order (`NO_COLOR` wins if set to anything, per the
    /// de facto standard; `CLICOLOR_FORCE` forces color on next;
    /// `CLICOLOR=0` disables; anything else is `Auto`).
    #[must_use]
    pub fn from_env() -> Self {
        if env::var_os("NO_COLOR").is_some() {
            return ColorPolicy::Never;
        }
        if env::var_os("CLICOLOR_FORCE").is_some_and(|v| v != "0") {
            return ColorPolicy::Always;
        }
        if let Some(v) = env::var_os("CLICOLOR") {
            if v == "0" {
                return ColorPolicy::Never;
            }
        }
        ColorPolicy::Auto
    }
}

/// The raw, already-parsed CLI surface (flags + positionals), before
/// environment layering. Constructed by the binary from its `clap` struct.
#[derive(Debug, Clone, Default)]
pub struct CliFlags {
    /// `--file PATH` — explicit Jakefile location.
    pub jakefile: Option<PathBuf>,
    /// The positional `<recipe>` target, if given.
    pub recipe: Option<String>,
    /// Trailing positional `[args...]` bound to the recipe's `params`.
    pub args: Vec<String>,
    /// `--dry-run`
    pub dry_run: bool,
    /// `--verbose`
    pub verbose: bool,
    /// `--yes`
    pub yes: bool,
    /// `--jobs N`
    pub jobs: Option<usize>,
    /// `--watch`
    pub watch: bool,
    /// `--list`
    pub list: bool,
}

/// Fully layered, immutable configuration for one process run.
#[derive(Debug, Clone)]
pub struct Config {
    /// The Jakefile to read, resolved from `--file` or the default
    /// `Jakefile` in the current directory.
    pub jakefile_path: PathBuf,
    /// The requested recipe target, if any (absent means "use the
    /// default recipe").
    pub recipe: Option<String>,
    /// Positional arguments bound to the recipe's declared params.
    pub args: Vec<String>,
    /// Print expanded commands instead of running them.
    pub dry_run: bool,
    /// Raise logging to `debug` and echo expanded commands before running.
    pub verbose: bool,
    /// Auto-answer every `@confirm` prompt with "yes".
    pub yes: bool,
    /// Worker thread count for the parallel executor.
    pub jobs: usize,
    /// Re-run the target on file changes instead of running it once.
    pub watch: bool,
    /// Print the recipe table instead of executing anything.
    pub list: bool,
    /// Directory mtime snapshots and other cache state live under.
    pub cache_dir: PathBuf,
    /// Resolved once from `NO_COLOR`/`CLICOLOR`/`CLICOLOR_FORCE`.
    pub color: ColorPolicy,
}

impl Config {
    /// Layer `flags` over environment variables and defaults into a
    /// complete [`Config`]. Infallible: every input has a sensible
    /// fallback, including a missing or unreadable cache directory, which
    /// is treated as cold start rather than an error.
    #[must_use]
    pub fn load(flags: CliFlags) -> Self {
        let jakefile_path = flags
            .jakefile
            .unwrap_or_else(|| PathBuf::from("Jakefile"));

        let cache_dir = env::var_os("JAKE_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| default_cache_dir(&jakefile_path));

        let jobs = flags
            .jobs
            .or_else(|| env::var("JAKE_JOBS").ok().and_then(|s| s.parse().ok()))
            .unwrap_or_else(num_cpus::get);

        Self {
            jakefile_path,
            recipe: flags.recipe,
            args: flags.args,
            dry_run: flags.dry_run,
            verbose: flags.verbose,
            yes: flags.yes,
            jobs: jobs.max(1),
            watch: flags.watch,
            list: flags.list,
            cache_dir,
            color: ColorPolicy::from_env(),
        }
    }

    /// Path to the persisted mtime snapshot file under [`Self::cache_dir`].
    #[must_use]
    pub fn cache_snapshot_path(&self) -> PathBuf {
        self.cache_dir.join(SNAPSHOT_FILE_NAME)
    }

    /// The directory the Jakefile lives in, used to resolve relative
    /// `@import` paths and as the default cache directory's parent.
    #[must_use]
    pub fn jakefile_dir(&self) -> PathBuf {
        self.jakefile_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

fn default_cache_dir(jakefile_path: &Path) -> PathBuf {
    jakefile_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(DEFAULT_CACHE_DIR_NAME)
}
