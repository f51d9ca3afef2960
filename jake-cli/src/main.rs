//! `jake` — the command-line entry point wiring `Config`, structured
//! logging, and the parser/resolver/index/cache/executor core into a
//! runnable tool.
//!
//! Subcommand-free by design: the single positional `<recipe> [args...]`
//! plus the flags below is the entire surface. This binary owns
//! translating the error taxonomy in [`jake::error`] into process exit
//! codes and printing the `error:`-prefixed line; no other component
//! writes directly to the process's real stdout/stderr outside of
//! spawned-command output and hook output.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use jake::cache::Cache;
use jake::config::{CliFlags, Config};
use jake::error::{exit_code, JakeError, JakeResult};
use jake::executor::Executor;
use jake::hooks::RunOptions;
use jake::index::JakefileIndex;
use jake::parallel::ParallelExecutor;
use jake::parser;
use jake::prompt::{AutoConfirm, Prompt, StdinPrompt};
use jake::resolver::ImportResolver;
use jake::watcher::{WatchOptions, Watcher};

/// A Jakefile-driven command runner.
#[derive(Parser, Debug)]
#[command(name = "jake", version, about = "A Jakefile-driven command runner")]
struct Cli {
    /// Recipe to run. Defaults to the Jakefile's `@default` recipe, or
    /// its first recipe if none is marked default.
    recipe: Option<String>,

    /// Positional arguments bound to the recipe's declared params.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,

    /// Print expanded commands instead of running them.
    #[arg(long)]
    dry_run: bool,

    /// Raise logging to debug and echo commands before running them.
    #[arg(long)]
    verbose: bool,

    /// Auto-answer every `@confirm` prompt with yes.
    #[arg(long)]
    yes: bool,

    /// Worker thread count for the parallel scheduler.
    #[arg(long)]
    jobs: Option<usize>,

    /// Re-run the target whenever one of its watched files changes.
    #[arg(long)]
    watch: bool,

    /// Path to the Jakefile to read. Defaults to `./Jakefile`.
    #[arg(long = "file", value_name = "PATH")]
    file: Option<PathBuf>,

    /// Print the recipe table (name, group, description) instead of
    /// executing anything.
    #[arg(long)]
    list: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = Config::load(CliFlags {
        jakefile: cli.file,
        recipe: cli.recipe,
        args: cli.args,
        dry_run: cli.dry_run,
        verbose: cli.verbose,
        yes: cli.yes,
        jobs: cli.jobs,
        watch: cli.watch,
        list: cli.list,
    });

    init_tracing(config.verbose);

    match run(&config) {
        Ok(()) => ExitCode::from(0),
        Err(err) => {
            tracing::error!(error = %err, "run failed");
            eprintln!("error: {err}");
            ExitCode::from(u8::try_from(exit_code(&err)).unwrap_or(1))
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "jake=debug" } else { "jake=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn run(config: &Config) -> JakeResult<()> {
    let src = std::fs::read_to_string(&config.jakefile_path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            JakeError::FileNotFound(config.jakefile_path.clone())
        } else {
            JakeError::Unexpected(e)
        }
    })?;

    let mut file = parser::parse(&src).map_err(|issues| {
        JakeError::ParseError(
            issues
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; "),
        )
    })?;

    ImportResolver::new().resolve(&mut file, &config.jakefile_path)?;
    let index = JakefileIndex::build(&file);

    if config.list {
        print_recipe_table(&index);
        return Ok(());
    }

    let recipe_name = config
        .recipe
        .clone()
        .or_else(|| index.default_recipe().map(|r| r.name.clone()))
        .ok_or_else(|| JakeError::RecipeNotFound("no recipes defined".to_string()))?;

    let snapshot_path = config.cache_snapshot_path();
    let mut cache = Cache::load(&snapshot_path);
    let prompt: Box<dyn Prompt + Sync> = if config.yes {
        Box::new(AutoConfirm)
    } else {
        Box::new(StdinPrompt)
    };
    let run_options = RunOptions {
        dry_run: config.dry_run,
        verbose: config.verbose,
    };

    if config.watch {
        let watcher = Watcher::new(&index, WatchOptions::default());
        watcher.watch(&recipe_name, &mut cache, prompt.as_ref(), run_options, || true);
    } else if config.jobs > 1 && !config.dry_run {
        let parallel = ParallelExecutor::new(&index, config.jobs, run_options);
        let stats = parallel.run(&recipe_name, &mut cache, prompt.as_ref())?;
        if config.verbose {
            println!(
                "executed {} of {} recipes (max parallel: {})",
                stats.executed, stats.total, stats.max_parallel
            );
        }
    } else {
        let mut executor = Executor::new(&index, &mut cache, prompt.as_ref(), run_options);
        executor.run(&recipe_name, &config.args)?;
    }

    cache.persist(&snapshot_path)?;
    Ok(())
}

fn print_recipe_table(index: &JakefileIndex<'_>) {
    for recipe in index.recipes_in_order() {
        let group = recipe.group.as_deref().unwrap_or("-");
        let desc = recipe.description.as_deref().unwrap_or("");
        println!("{:<24} {:<12} {desc}", recipe.name, group);
    }
}
