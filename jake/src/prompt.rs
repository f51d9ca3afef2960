//! The `@confirm` contract: asking the user (or not) before a command runs.

use std::io::{self, Write};

/// An external collaborator the executor asks before running an
/// `@confirm`-guarded command. Kept as a trait so tests and `--yes` can
/// swap in a non-interactive implementation without touching the executor.
pub trait Prompt {
    /// Ask `message`; `true` proceeds, `false` aborts the recipe with
    /// [`crate::error::JakeError::ConfirmDenied`].
    fn confirm(&self, message: &str) -> bool;
}

/// Reads a `y`/`yes` answer from stdin, defaulting to "no" on EOF or any
/// unrecognized input.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinPrompt;

impl Prompt for StdinPrompt {
    fn confirm(&self, message: &str) -> bool {
        print!("{message} [y/N] ");
        if io::stdout().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        if io::stdin().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

/// Answers every confirmation with `true`, for `--yes` / non-interactive
/// runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm;

impl Prompt for AutoConfirm {
    fn confirm(&self, _message: &str) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_confirm_always_says_yes() {
        assert!(AutoConfirm.confirm("proceed?"));
    }
}
