//! Core parser, import resolver, dependency scheduler and executor for
//! Jakefile-driven builds.
//!
//! A typical run wires the pieces in this crate together like so:
//!
//! ```no_run
//! use jake::cache::Cache;
//! use jake::config::{CliFlags, Config};
//! use jake::executor::Executor;
//! use jake::hooks::RunOptions;
//! use jake::index::JakefileIndex;
//! use jake::prompt::AutoConfirm;
//! use jake::resolver::ImportResolver;
//!
//! # fn run() -> jake::error::JakeResult<()> {
//! let config = Config::load(CliFlags::default());
//! let src = std::fs::read_to_string(&config.jakefile_path)?;
//! let mut file = jake::parser::parse(&src).map_err(|issues| {
//!     jake::error::JakeError::ParseError(
//!         issues.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "),
//!     )
//! })?;
//! ImportResolver::new().resolve(&mut file, &config.jakefile_path)?;
//! let index = JakefileIndex::build(&file);
//! let mut cache = Cache::load(&config.cache_snapshot_path());
//! let prompt = AutoConfirm;
//! let options = RunOptions { dry_run: config.dry_run, verbose: config.verbose };
//! let mut executor = Executor::new(&index, &mut cache, &prompt, options);
//! executor.run("build", &[])?;
//! cache.persist(&config.cache_snapshot_path())?;
//! # Ok(())
//! # }
//! ```

pub mod ast;
pub mod cache;
pub mod config;
pub mod error;
pub mod executor;
pub mod expand;
pub mod glob;
pub mod hooks;
pub mod index;
pub mod lexer;
pub mod parallel;
pub mod parser;
pub mod prompt;
pub mod resolver;
pub mod syntax_kind;
pub mod watcher;

pub use error::{JakeError, JakeResult};
