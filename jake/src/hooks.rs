//! Pre/post/on-error hook execution: pre hooks run global, then targeted,
//! then recipe-local, short-circuiting on the first failure; post hooks
//! run in reverse, always running every stage even after an earlier
//! failure; on-error hooks are best-effort and never fail the run.

use std::collections::HashMap;
use std::process::Command as ProcessCommand;

use tracing::{debug, warn};

use crate::ast::{Hook, Jakefile};
use crate::error::{JakeError, JakeResult};
use crate::expand::{self, Builtins};
use crate::resolver::hook_applies;

/// Hooks always run through `/bin/sh -c <expanded>`, regardless of a
/// recipe's own `@shell` override.
const HOOK_SHELL: &str = "/bin/sh";

/// Runtime flags that change how a hook command is dispatched rather than
/// what it does.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Print the expanded command instead of running it.
    pub dry_run: bool,
    /// Print the expanded command before running it.
    pub verbose: bool,
}

/// Executes hooks with `{{var}}` expansion and global/targeted/local
/// ordering.
pub struct HookRunner<'a> {
    jakefile: &'a Jakefile,
    options: RunOptions,
    exported_env: HashMap<String, String>,
}

impl<'a> HookRunner<'a> {
    /// Build a runner over `jakefile`'s global hook lists.
    #[must_use]
    pub fn new(jakefile: &'a Jakefile, options: RunOptions) -> Self {
        let exported_env = crate::index::exported_env(jakefile);
        Self {
            jakefile,
            options,
            exported_env,
        }
    }

    /// Run pre-hooks: global, then targeted, then the recipe's own,
    /// short-circuiting on the first failure (a failed pre-hook prevents
    /// the recipe's own commands from starting).
    ///
    /// # Errors
    ///
    /// Returns the first hook failure encountered.
    pub fn run_pre(
        &self,
        recipe_name: &str,
        recipe_pre_hooks: &[Hook],
        variables: &HashMap<String, String>,
    ) -> JakeResult<()> {
        let builtins = Builtins {
            name: recipe_name,
            status: None,
            error: None,
        };
        for hook in self
            .jakefile
            .pre_hooks
            .iter()
            .filter(|h| h.recipe_name.is_none())
        {
            self.run_one(hook, &builtins, variables)?;
        }
        for hook in self
            .jakefile
            .pre_hooks
            .iter()
            .filter(|h| hook_applies(h, recipe_name) && h.recipe_name.is_some())
        {
            self.run_one(hook, &builtins, variables)?;
        }
        for hook in recipe_pre_hooks {
            self.run_one(hook, &builtins, variables)?;
        }
        Ok(())
    }

    /// Run post-hooks: recipe-local, then targeted, then global. All
    /// stages run regardless of earlier failures; the first error
    /// encountered is returned once every stage has executed.
    pub fn run_post(
        &self,
        recipe_name: &str,
        recipe_post_hooks: &[Hook],
        success: bool,
        error_message: Option<&str>,
        variables: &HashMap<String, String>,
    ) -> JakeResult<()> {
        let status = if success { "success" } else { "failed" };
        let builtins = Builtins {
            name: recipe_name,
            status: Some(status),
            error: error_message,
        };

        let mut first_error = None;
        for hook in recipe_post_hooks {
            if let Err(e) = self.run_one(hook, &builtins, variables) {
                first_error.get_or_insert(e);
            }
        }
        for hook in self
            .jakefile
            .post_hooks
            .iter()
            .filter(|h| hook_applies(h, recipe_name) && h.recipe_name.is_some())
        {
            if let Err(e) = self.run_one(hook, &builtins, variables) {
                first_error.get_or_insert(e);
            }
        }
        for hook in self
            .jakefile
            .post_hooks
            .iter()
            .filter(|h| h.recipe_name.is_none())
        {
            if let Err(e) = self.run_one(hook, &builtins, variables) {
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Run every registered on-error hook applicable to `recipe_name`.
    /// Failures are swallowed (logged only) — an on-error hook can't itself
    /// fail the run.
    pub fn run_on_error(
        &self,
        recipe_name: &str,
        error_message: &str,
        variables: &HashMap<String, String>,
    ) {
        let builtins = Builtins {
            name: recipe_name,
            status: Some("failed"),
            error: Some(error_message),
        };
        for hook in self
            .jakefile
            .on_error_hooks
            .iter()
            .filter(|h| hook_applies(h, recipe_name))
        {
            if let Err(e) = self.run_one(hook, &builtins, variables) {
                warn!(recipe = recipe_name, error = %e, "on-error hook failed, ignoring");
            }
        }
    }

    fn run_one(
        &self,
        hook: &Hook,
        builtins: &Builtins<'_>,
        variables: &HashMap<String, String>,
    ) -> JakeResult<()> {
        let expanded = expand::expand(&hook.command, builtins, variables);
        debug!(hook.kind = ?hook.kind, hook.recipe = recipe_label(hook), hook.command = %expanded, "running hook");

        if self.options.dry_run {
            println!("(dry-run) {expanded}");
            return Ok(());
        }
        if self.options.verbose {
            println!("+ {expanded}");
        }

        let status = ProcessCommand::new(HOOK_SHELL)
            .arg("-c")
            .arg(&expanded)
            .envs(&self.exported_env)
            .status()
            .map_err(|e| JakeError::SpawnFailed(e.to_string()))?;

        if status.success() {
            Ok(())
        } else {
            warn!(hook.command = %expanded, code = status.code(), "hook exited non-zero");
            Err(JakeError::HookFailed(expanded))
        }
    }
}

fn recipe_label(hook: &Hook) -> &str {
    hook.recipe_name.as_deref().unwrap_or("*")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::HookKind;

    fn hook(command: &str, kind: HookKind, recipe_name: Option<&str>) -> Hook {
        Hook {
            command: command.to_string(),
            kind,
            recipe_name: recipe_name.map(str::to_string),
        }
    }

    #[test]
    fn pre_hooks_run_in_global_then_targeted_then_local_order() {
        let mut file = Jakefile::new();
        file.pre_hooks.push(hook("echo 1 >> order.txt", HookKind::Pre, None));
        file.pre_hooks
            .push(hook("echo 2 >> order.txt", HookKind::Pre, Some("deploy")));

        let tmp = tempfile::TempDir::new().unwrap();
        std::env::set_current_dir(tmp.path()).unwrap();

        let runner = HookRunner::new(&file, RunOptions::default());
        let local = vec![hook("echo 3 >> order.txt", HookKind::Pre, None)];
        let vars = HashMap::new();
        runner.run_pre("deploy", &local, &vars).unwrap();

        let contents = std::fs::read_to_string("order.txt").unwrap();
        assert_eq!(contents, "1\n2\n3\n");
    }

    #[test]
    fn post_hooks_all_run_even_when_earlier_stage_fails() {
        let file = Jakefile::new();
        let tmp = tempfile::TempDir::new().unwrap();
        std::env::set_current_dir(tmp.path()).unwrap();

        let runner = HookRunner::new(&file, RunOptions::default());
        let local = vec![
            hook("exit 1", HookKind::Post, None),
            hook("echo ran >> post.txt", HookKind::Post, None),
        ];
        let vars = HashMap::new();
        let result = runner.run_post("deploy", &local, true, None, &vars);
        assert!(result.is_err());
        assert_eq!(std::fs::read_to_string("post.txt").unwrap(), "ran\n");
    }

    #[test]
    fn on_error_hook_failure_is_swallowed() {
        let mut file = Jakefile::new();
        file.on_error_hooks.push(hook("exit 1", HookKind::OnError, None));

        let runner = HookRunner::new(&file, RunOptions::default());
        let vars = HashMap::new();
        // Should not panic and has no Result to check: swallowed by design.
        runner.run_on_error("deploy", "boom", &vars);
    }

    #[test]
    fn dry_run_does_not_execute() {
        let mut file = Jakefile::new();
        let tmp = tempfile::TempDir::new().unwrap();
        std::env::set_current_dir(tmp.path()).unwrap();

        file.pre_hooks.push(hook(
            "echo should-not-run >> sentinel.txt",
            HookKind::Pre,
            None,
        ));
        let runner = HookRunner::new(&file, RunOptions { dry_run: true, verbose: false });
        let vars = HashMap::new();
        runner.run_pre("x", &[], &vars).unwrap();
        assert!(!std::path::Path::new("sentinel.txt").exists());
    }
}
