//! The error taxonomy surfaced by every stage of a Jakefile run.

use std::path::PathBuf;

/// Every way a run can fail, from parsing through execution.
#[derive(Debug, thiserror::Error)]
pub enum JakeError {
    /// Malformed Jakefile syntax.
    #[error("parse error: {0}")]
    ParseError(String),

    /// An `@import` chain forms a cycle.
    #[error("circular import: {0}")]
    CircularImport(PathBuf),

    /// An imported or watched file does not exist.
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    /// An imported file exists but couldn't be read.
    #[error("access denied: {0}")]
    AccessDenied(PathBuf),

    /// A path could not be canonicalized or is otherwise invalid.
    #[error("invalid path: {0}")]
    InvalidPath(PathBuf),

    /// An I/O failure that doesn't map to a more specific variant.
    #[error("unexpected I/O error: {0}")]
    Unexpected(#[from] std::io::Error),

    /// A dependency or target name does not resolve to any recipe.
    #[error("recipe not found: {0}")]
    RecipeNotFound(String),

    /// The dependency graph built for a target contains a cycle.
    #[error("cyclic dependency: {0}")]
    CyclicDependency(String),

    /// A shell command or hook exited non-zero.
    #[error("command failed in recipe `{recipe}` (exit code {code})")]
    CommandFailed {
        /// Name of the recipe whose command failed.
        recipe: String,
        /// The command's exit code, if the process exited normally.
        code: i32,
    },

    /// A hook command exited non-zero.
    #[error("hook failed: {0}")]
    HookFailed(String),

    /// The OS failed to spawn a child process.
    #[error("failed to spawn command: {0}")]
    SpawnFailed(String),

    /// Waiting on a spawned child process failed.
    #[error("failed to wait on command: {0}")]
    WaitFailed(String),

    /// An import file exceeded the size cap before it could be read.
    #[error("out of memory: refusing to read {path} ({size} bytes exceeds cap)")]
    OutOfMemory {
        /// Path that was too large to read.
        path: PathBuf,
        /// Size of the file, in bytes.
        size: u64,
    },

    /// The user declined an `@confirm` prompt.
    #[error("confirmation denied")]
    ConfirmDenied,
}

impl From<jake_graph::GraphError> for JakeError {
    fn from(err: jake_graph::GraphError) -> Self {
        JakeError::CyclicDependency(err.to_string())
    }
}

/// Result type used throughout this crate.
pub type JakeResult<T> = Result<T, JakeError>;

/// Maps a [`JakeError`] to the process exit code defined for it.
#[must_use]
pub fn exit_code(err: &JakeError) -> i32 {
    match err {
        JakeError::ParseError(_)
        | JakeError::CircularImport(_)
        | JakeError::FileNotFound(_)
        | JakeError::AccessDenied(_)
        | JakeError::InvalidPath(_)
        | JakeError::Unexpected(_)
        | JakeError::OutOfMemory { .. } => 2,
        JakeError::CyclicDependency(_) => 3,
        JakeError::RecipeNotFound(_) => 4,
        JakeError::CommandFailed { .. }
        | JakeError::HookFailed(_)
        | JakeError::SpawnFailed(_)
        | JakeError::WaitFailed(_)
        | JakeError::ConfirmDenied => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_failures_exit_one() {
        assert_eq!(exit_code(&JakeError::ConfirmDenied), 1);
        assert_eq!(
            exit_code(&JakeError::CommandFailed {
                recipe: "build".to_string(),
                code: 7,
            }),
            1
        );
        assert_eq!(exit_code(&JakeError::HookFailed("x".to_string())), 1);
    }

    #[test]
    fn parse_and_import_failures_exit_two() {
        assert_eq!(exit_code(&JakeError::ParseError("bad".to_string())), 2);
        assert_eq!(
            exit_code(&JakeError::CircularImport(PathBuf::from("a.jake"))),
            2
        );
        assert_eq!(
            exit_code(&JakeError::OutOfMemory {
                path: PathBuf::from("big.jake"),
                size: 2_000_000,
            }),
            2
        );
    }

    #[test]
    fn cyclic_dependency_exits_three() {
        assert_eq!(exit_code(&JakeError::CyclicDependency("a -> b -> a".to_string())), 3);
    }

    #[test]
    fn recipe_not_found_exits_four() {
        assert_eq!(exit_code(&JakeError::RecipeNotFound("ghost".to_string())), 4);
    }

    #[test]
    fn graph_error_maps_to_cyclic_dependency() {
        let mut dag = jake_graph::DAG::new();
        let a = dag.add_node(());
        let b = dag.add_node(());
        dag.add_edge(a, b, ()).unwrap();
        dag.add_edge(b, a, ()).unwrap();

        let cycle = dag.find_cycles().into_iter().next().unwrap();
        let graph_err = jake_graph::GraphError::CycleDetected(cycle);
        let err: JakeError = graph_err.into();
        assert!(matches!(err, JakeError::CyclicDependency(_)));
    }
}
