//! Sequential, depth-first recipe execution: the default runner used when
//! parallelism isn't requested or isn't worth it (see
//! [`crate::parallel::ParallelExecutor`] for the worker-pool variant).

use std::collections::{HashMap, HashSet};
use std::process::Command as ProcessCommand;

use tracing::{debug, info, instrument, warn};

use crate::ast::{Command, CommandDirective, Recipe};
use crate::cache::{self, Cache};
use crate::error::{JakeError, JakeResult};
use crate::expand::{self, Builtins};
use crate::hooks::{HookRunner, RunOptions};
use crate::index::JakefileIndex;
use crate::prompt::Prompt;

/// Runs one named recipe and everything it transitively depends on, each
/// dependency visited at most once, in declaration order, depth-first.
pub struct Executor<'a> {
    index: &'a JakefileIndex<'a>,
    cache: &'a mut Cache,
    prompt: &'a dyn Prompt,
    options: RunOptions,
    visited: HashSet<String>,
    in_progress: Vec<String>,
}

impl<'a> Executor<'a> {
    /// Build a sequential executor over an indexed, import-resolved
    /// Jakefile.
    pub fn new(
        index: &'a JakefileIndex<'a>,
        cache: &'a mut Cache,
        prompt: &'a dyn Prompt,
        options: RunOptions,
    ) -> Self {
        Self {
            index,
            cache,
            prompt,
            options,
            visited: HashSet::new(),
            in_progress: Vec::new(),
        }
    }

    /// Run `recipe_name` with positional `args` bound to its declared
    /// `params`.
    ///
    /// # Errors
    ///
    /// Returns [`JakeError::RecipeNotFound`] if the name doesn't resolve,
    /// [`JakeError::CyclicDependency`] if the dependency chain loops back on
    /// itself, and whatever a hook or command failure produces otherwise.
    #[instrument(skip(self, args), fields(recipe = recipe_name))]
    pub fn run(&mut self, recipe_name: &str, args: &[String]) -> JakeResult<()> {
        if self.visited.contains(recipe_name) {
            return Ok(());
        }
        if self.in_progress.iter().any(|r| r == recipe_name) {
            return Err(JakeError::CyclicDependency(format!(
                "{} -> {recipe_name}",
                self.in_progress.join(" -> ")
            )));
        }

        let recipe = self
            .index
            .recipe(recipe_name)
            .ok_or_else(|| JakeError::RecipeNotFound(recipe_name.to_string()))?
            .clone();

        if !recipe.only_os.is_empty() && !recipe.only_os.contains(current_os()) {
            debug!(recipe = recipe_name, os = current_os(), "skipping: not targeted at this OS");
            let _ = self.visited.insert(recipe_name.to_string());
            return Ok(());
        }

        if recipe.kind == crate::ast::RecipeKind::File {
            if let Some(output) = &recipe.output {
                if cache::is_up_to_date(self.cache, output, &recipe.file_deps) {
                    info!(recipe = recipe_name, output = %output.display(), "up to date, skipping");
                    let _ = self.visited.insert(recipe_name.to_string());
                    return Ok(());
                }
            }
        }

        self.in_progress.push(recipe_name.to_string());
        let dep_result = self.run_dependencies(&recipe);
        self.in_progress.pop();
        dep_result?;

        let variables = self.build_variables(&recipe, args);
        let result = execute_once(
            &recipe,
            self.index.jakefile(),
            self.cache,
            self.prompt,
            self.options,
            &variables,
        );

        let _ = self.visited.insert(recipe_name.to_string());
        result
    }

    fn run_dependencies(&mut self, recipe: &Recipe) -> JakeResult<()> {
        for dep in &recipe.dependencies {
            self.run(dep, &[])?;
        }
        Ok(())
    }

    fn build_variables(&self, recipe: &Recipe, args: &[String]) -> HashMap<String, String> {
        let mut variables = self.index.variables();
        for (i, param) in recipe.params.iter().enumerate() {
            let value = args.get(i).cloned().unwrap_or_default();
            let _ = variables.insert(param.clone(), value);
        }
        variables
    }
}

/// Run one recipe's own pre-hooks, commands, and post/on-error hooks — the
/// unit of work both [`Executor`] (after recursing dependencies) and
/// [`crate::parallel::ParallelExecutor`] (after the scheduler clears a node)
/// hand off to. Does not look at `dependencies`, `only_os`, or staleness;
/// callers decide whether a recipe runs at all.
///
/// # Errors
///
/// Returns the first hook or command failure encountered.
pub(crate) fn execute_once(
    recipe: &Recipe,
    jakefile: &crate::ast::Jakefile,
    cache: &Cache,
    prompt: &dyn Prompt,
    options: RunOptions,
    variables: &HashMap<String, String>,
) -> JakeResult<()> {
    let hook_runner = HookRunner::new(jakefile, options);
    hook_runner.run_pre(&recipe.name, &recipe.pre_hooks, variables)?;

    let exported_env = crate::index::exported_env(jakefile);
    let mut run_result = Ok(());
    for command in &recipe.commands {
        if let Err(e) = run_command(recipe, command, prompt, options, variables, &exported_env) {
            run_result = Err(e);
            break;
        }
    }
    let success = run_result.is_ok();

    if success {
        if let Some(output) = &recipe.output {
            cache.update(output);
        }
    }

    let error_message = run_result.as_ref().err().map(ToString::to_string);
    let post_result = hook_runner.run_post(
        &recipe.name,
        &recipe.post_hooks,
        success,
        error_message.as_deref(),
        variables,
    );
    if !success {
        hook_runner.run_on_error(&recipe.name, error_message.as_deref().unwrap_or(""), variables);
    }

    run_result.and(post_result)
}

fn run_command(
    recipe: &Recipe,
    command: &Command,
    prompt: &dyn Prompt,
    options: RunOptions,
    variables: &HashMap<String, String>,
    exported_env: &HashMap<String, String>,
) -> JakeResult<()> {
    let builtins = Builtins {
        name: &recipe.name,
        status: None,
        error: None,
    };

    match &command.directive {
        Some(CommandDirective::Confirm(message)) => {
            let expanded = expand::expand(message, &builtins, variables);
            if options.dry_run {
                println!("(dry-run) confirm: {expanded}");
                return Ok(());
            }
            if options.verbose {
                println!("? {expanded}");
            }
            if prompt.confirm(&expanded) {
                Ok(())
            } else {
                Err(JakeError::ConfirmDenied)
            }
        }
        Some(CommandDirective::Needs(binary)) => {
            let expanded = expand::expand(binary, &builtins, variables);
            if binary_on_path(&expanded) {
                Ok(())
            } else {
                Err(JakeError::FileNotFound(std::path::PathBuf::from(expanded)))
            }
        }
        Some(CommandDirective::Watch(_)) => Ok(()),
        None => run_shell_line(recipe, &command.line, &builtins, options, variables, exported_env),
    }
}

fn run_shell_line(
    recipe: &Recipe,
    line: &str,
    builtins: &Builtins<'_>,
    options: RunOptions,
    variables: &HashMap<String, String>,
    exported_env: &HashMap<String, String>,
) -> JakeResult<()> {
    let expanded = expand::expand(line, builtins, variables);

    if !recipe.quiet {
        println!("+ {expanded}");
    }
    if options.dry_run {
        println!("(dry-run) {expanded}");
        return Ok(());
    }

    let shell = recipe.shell.as_deref().unwrap_or("/bin/sh");
    let mut cmd = ProcessCommand::new(shell);
    let _ = cmd.arg("-c").arg(&expanded);
    let _ = cmd.envs(exported_env);
    if let Some(dir) = &recipe.working_dir {
        let _ = cmd.current_dir(dir);
    }

    let mut child = cmd
        .spawn()
        .map_err(|e| JakeError::SpawnFailed(e.to_string()))?;
    let status = child
        .wait()
        .map_err(|e| JakeError::WaitFailed(e.to_string()))?;

    if status.success() {
        Ok(())
    } else {
        let code = status.code().unwrap_or(-1);
        warn!(recipe = recipe.name, command = %expanded, code, "command exited non-zero");
        Err(JakeError::CommandFailed {
            recipe: recipe.name.clone(),
            code,
        })
    }
}

fn current_os() -> &'static str {
    std::env::consts::OS
}

/// `true` if `binary` resolves to an executable file on `PATH`, or is
/// itself an absolute/relative path that exists.
fn binary_on_path(binary: &str) -> bool {
    let path = std::path::Path::new(binary);
    if path.is_absolute() || binary.contains(std::path::MAIN_SEPARATOR) {
        return path.is_file();
    }
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(binary).is_file()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Jakefile, Recipe};
    use crate::prompt::AutoConfirm;

    fn index_for(file: &Jakefile) -> JakefileIndex<'_> {
        JakefileIndex::build(file)
    }

    #[test]
    fn runs_dependency_before_dependent() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::env::set_current_dir(tmp.path()).unwrap();

        let mut file = Jakefile::new();
        let mut dep = Recipe::new_task("dep");
        dep.commands.push(Command::shell("echo dep >> order.txt"));
        let mut main = Recipe::new_task("main");
        main.dependencies.push("dep".to_string());
        main.commands.push(Command::shell("echo main >> order.txt"));
        file.recipes.push(main);
        file.recipes.push(dep);

        let index = index_for(&file);
        let mut cache = Cache::new();
        let prompt = AutoConfirm;
        let mut executor = Executor::new(&index, &mut cache, &prompt, RunOptions::default());
        executor.run("main", &[]).unwrap();

        assert_eq!(std::fs::read_to_string("order.txt").unwrap(), "dep\nmain\n");
    }

    #[test]
    fn dependency_runs_only_once() {
        let mut file = Jakefile::new();
        let shared = Recipe::new_task("shared");
        let mut a = Recipe::new_task("a");
        a.dependencies.push("shared".to_string());
        let mut b = Recipe::new_task("b");
        b.dependencies.push("shared".to_string());
        b.dependencies.push("a".to_string());
        file.recipes.push(b);
        file.recipes.push(a);
        file.recipes.push(shared);

        let index = index_for(&file);
        let mut cache = Cache::new();
        let prompt = AutoConfirm;
        let mut executor = Executor::new(&index, &mut cache, &prompt, RunOptions::default());
        executor.run("b", &[]).unwrap();

        assert_eq!(executor.visited.len(), 3);
    }

    #[test]
    fn cyclic_dependency_is_an_error() {
        let mut file = Jakefile::new();
        let mut a = Recipe::new_task("a");
        a.dependencies.push("b".to_string());
        let mut b = Recipe::new_task("b");
        b.dependencies.push("a".to_string());
        file.recipes.push(a);
        file.recipes.push(b);

        let index = index_for(&file);
        let mut cache = Cache::new();
        let prompt = AutoConfirm;
        let mut executor = Executor::new(&index, &mut cache, &prompt, RunOptions::default());
        let result = executor.run("a", &[]);
        assert!(matches!(result, Err(JakeError::CyclicDependency(_))));
    }

    #[test]
    fn missing_recipe_is_reported() {
        let file = Jakefile::new();
        let index = index_for(&file);
        let mut cache = Cache::new();
        let prompt = AutoConfirm;
        let mut executor = Executor::new(&index, &mut cache, &prompt, RunOptions::default());
        let result = executor.run("nope", &[]);
        assert!(matches!(result, Err(JakeError::RecipeNotFound(_))));
    }

    #[test]
    fn failing_command_still_runs_post_and_on_error_hooks() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::env::set_current_dir(tmp.path()).unwrap();

        let mut file = Jakefile::new();
        let mut r = Recipe::new_task("broken");
        r.commands.push(Command::shell("exit 1"));
        r.post_hooks
            .push(crate::ast::Hook {
                command: "echo post >> ran.txt".to_string(),
                kind: crate::ast::HookKind::Post,
                recipe_name: None,
            });
        file.on_error_hooks.push(crate::ast::Hook {
            command: "echo onerror >> ran.txt".to_string(),
            kind: crate::ast::HookKind::OnError,
            recipe_name: None,
        });
        file.recipes.push(r);

        let index = index_for(&file);
        let mut cache = Cache::new();
        let prompt = AutoConfirm;
        let mut executor = Executor::new(&index, &mut cache, &prompt, RunOptions::default());
        let result = executor.run("broken", &[]);
        assert!(result.is_err());

        let contents = std::fs::read_to_string("ran.txt").unwrap();
        assert!(contents.contains("post"));
        assert!(contents.contains("onerror"));
    }

    #[test]
    fn params_bind_positionally_into_variables() {
        let mut file = Jakefile::new();
        let mut r = Recipe::new_task("greet");
        r.params.push("who".to_string());
        r.commands
            .push(Command::shell("echo hello {{who}} >> greeting.txt".to_string()));
        file.recipes.push(r);

        let tmp = tempfile::TempDir::new().unwrap();
        std::env::set_current_dir(tmp.path()).unwrap();

        let index = index_for(&file);
        let mut cache = Cache::new();
        let prompt = AutoConfirm;
        let mut executor = Executor::new(&index, &mut cache, &prompt, RunOptions::default());
        executor.run("greet", &["world".to_string()]).unwrap();

        assert_eq!(std::fs::read_to_string("greeting.txt").unwrap(), "hello world\n");
    }

    #[test]
    fn exported_variable_reaches_spawned_command_environment() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::env::set_current_dir(tmp.path()).unwrap();

        let mut file = Jakefile::new();
        file.variables.push(crate::ast::Variable {
            name: "GREETING".to_string(),
            value: "hi-from-jakefile".to_string(),
        });
        file.directives.push(crate::ast::Directive {
            kind: crate::ast::DirectiveKind::Export,
            payload: "GREETING".to_string(),
        });
        let mut r = Recipe::new_task("greet");
        r.commands.push(Command::shell("echo $GREETING >> env.txt".to_string()));
        file.recipes.push(r);

        let index = index_for(&file);
        let mut cache = Cache::new();
        let prompt = AutoConfirm;
        let mut executor = Executor::new(&index, &mut cache, &prompt, RunOptions::default());
        executor.run("greet", &[]).unwrap();

        assert_eq!(std::fs::read_to_string("env.txt").unwrap(), "hi-from-jakefile\n");
    }
}
