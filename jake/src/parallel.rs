//! Worker-pool execution of an entire dependency graph at once.
//!
//! Builds a [`jake_graph::DAG`] over the recipes reachable from a target,
//! rejects it up front if [`jake_graph::DAG::find_cycles`] finds anything,
//! then drains it with a fixed pool of OS threads: a node becomes runnable
//! once every recipe it depends on has finished, mirroring the in-degree
//! bookkeeping `DAG::topological_sort` already does, just spread across
//! workers instead of done inline.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use jake_graph::{NodeId, DAG};
use tracing::{debug, info, warn};

use crate::ast::{Jakefile, Recipe};
use crate::cache::{self, Cache};
use crate::error::{JakeError, JakeResult};
use crate::executor::execute_once;
use crate::hooks::RunOptions;
use crate::index::JakefileIndex;
use crate::prompt::Prompt;

/// Parallelism statistics collected over one run, useful for `--verbose`
/// summaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Total recipes that were actually executed (skips not counted).
    pub executed: usize,
    /// Total recipes in the graph, executed or skipped.
    pub total: usize,
    /// The widest number of recipes that were ever simultaneously running.
    pub max_parallel: usize,
}

struct SchedulerState {
    remaining: HashMap<NodeId, usize>,
    ready: VecDeque<NodeId>,
    in_flight: usize,
    completed: usize,
    max_parallel_seen: usize,
    failure: Option<JakeError>,
}

/// Runs every recipe in a target's dependency graph using a fixed pool of
/// OS threads, honoring dependency order via in-degree tracking rather than
/// topological levels computed up front.
pub struct ParallelExecutor<'a> {
    index: &'a JakefileIndex<'a>,
    jobs: usize,
    options: RunOptions,
}

impl<'a> ParallelExecutor<'a> {
    /// Build an executor that will use at most `jobs` worker threads
    /// (clamped to the graph's own node count at run time).
    #[must_use]
    pub fn new(index: &'a JakefileIndex<'a>, jobs: usize, options: RunOptions) -> Self {
        Self { index, jobs, options }
    }

    /// Run `recipe_name` and its full transitive dependency graph.
    ///
    /// Falls back to running everything on the calling thread, in
    /// topological order, when `jobs <= 1`, when dry-run is requested, or
    /// when the graph has only one node — spinning up a pool buys nothing
    /// in those cases.
    ///
    /// # Errors
    ///
    /// Returns [`JakeError::RecipeNotFound`] if the target doesn't resolve,
    /// [`JakeError::CyclicDependency`] if the graph contains a cycle, or the
    /// first recipe/hook failure encountered otherwise.
    pub fn run(
        &self,
        recipe_name: &str,
        cache: &mut Cache,
        prompt: &(dyn Prompt + Sync),
    ) -> JakeResult<RunStats> {
        let (dag, names) = build_graph(self.index, recipe_name)?;

        if let Some(cycle) = dag.find_cycles().into_iter().next() {
            let cycle_names: Vec<&str> = cycle
                .iter()
                .filter_map(|id| names.get(id).map(String::as_str))
                .collect();
            return Err(JakeError::CyclicDependency(cycle_names.join(" -> ")));
        }

        let total = dag.node_count();
        let worker_count = self.jobs.clamp(1, total.max(1));

        if worker_count <= 1 || self.options.dry_run || total <= 1 {
            return self.run_sequentially(&dag, &names, cache, prompt, total);
        }

        self.run_with_pool(&dag, &names, cache, prompt, worker_count, total)
    }

    fn run_sequentially(
        &self,
        dag: &DAG<(), ()>,
        names: &HashMap<NodeId, String>,
        cache: &mut Cache,
        prompt: &(dyn Prompt + Sync),
        total: usize,
    ) -> JakeResult<RunStats> {
        let order = dag
            .topological_sort()
            .map_err(|e| JakeError::CyclicDependency(e.to_string()))?;

        let mut executed = 0;
        for id in order {
            let name = &names[&id];
            if self.run_node(name, cache, prompt)? {
                executed += 1;
            }
        }
        Ok(RunStats {
            executed,
            total,
            max_parallel: 1,
        })
    }

    fn run_with_pool(
        &self,
        dag: &DAG<(), ()>,
        names: &HashMap<NodeId, String>,
        cache: &Cache,
        prompt: &(dyn Prompt + Sync),
        worker_count: usize,
        total: usize,
    ) -> JakeResult<RunStats> {
        let remaining: HashMap<NodeId, usize> = dag
            .node_ids()
            .into_iter()
            .map(|id| (id, dag.in_degree(id).unwrap_or(0)))
            .collect();
        let ready: VecDeque<NodeId> = remaining
            .iter()
            .filter(|&(_, &deg)| deg == 0)
            .map(|(&id, _)| id)
            .collect();

        let state = Arc::new((
            Mutex::new(SchedulerState {
                remaining,
                ready,
                in_flight: 0,
                completed: 0,
                max_parallel_seen: 0,
                failure: None,
            }),
            Condvar::new(),
        ));

        let executed = Arc::new(Mutex::new(0usize));

        thread::scope(|scope| {
            for worker_id in 0..worker_count {
                let state = Arc::clone(&state);
                let executed = Arc::clone(&executed);
                let _ = scope.spawn(move || {
                    worker_loop(
                        worker_id,
                        dag,
                        names,
                        self.index,
                        &state,
                        &executed,
                        cache,
                        prompt,
                        self.options,
                    );
                });
            }
        });

        let (lock, _) = &*state;
        let mut final_state = lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(err) = final_state.failure.take() {
            return Err(err);
        }

        let executed = *executed.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(RunStats {
            executed,
            total,
            max_parallel: final_state.max_parallel_seen,
        })
    }

    /// Run a single node inline (used by the sequential fallback). Returns
    /// `true` if the recipe actually executed (as opposed to being skipped
    /// by `only_os` or file staleness).
    fn run_node(
        &self,
        recipe_name: &str,
        cache: &mut Cache,
        prompt: &(dyn Prompt + Sync),
    ) -> JakeResult<bool> {
        let recipe = self
            .index
            .recipe(recipe_name)
            .ok_or_else(|| JakeError::RecipeNotFound(recipe_name.to_string()))?;

        if should_skip(recipe, cache) {
            return Ok(false);
        }

        let variables = self.index.variables();
        execute_once(
            recipe,
            self.index.jakefile(),
            cache,
            prompt,
            self.options,
            &variables,
        )?;
        Ok(true)
    }
}

#[allow(clippy::too_many_arguments)]
fn worker_loop(
    worker_id: usize,
    dag: &DAG<(), ()>,
    names: &HashMap<NodeId, String>,
    index: &JakefileIndex<'_>,
    state: &Arc<(Mutex<SchedulerState>, Condvar)>,
    executed: &Arc<Mutex<usize>>,
    cache: &Cache,
    prompt: &(dyn Prompt + Sync),
    options: RunOptions,
) {
    let (lock, condvar) = &**state;
    loop {
        let node = {
            let mut guard = lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            let dispatched = loop {
                if guard.failure.is_some() {
                    return;
                }
                if let Some(node) = guard.ready.pop_front() {
                    guard.in_flight += 1;
                    let running = guard.in_flight;
                    if running > guard.max_parallel_seen {
                        guard.max_parallel_seen = running;
                    }
                    break Some(node);
                }
                if guard.in_flight == 0 && guard.completed == dag.node_count() {
                    break None;
                }
                guard = condvar
                    .wait(guard)
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
            };
            match dispatched {
                Some(node) => node,
                None => return,
            }
        };

        let name = names[&node].clone();
        debug!(worker = worker_id, recipe = name.as_str(), "dispatching");

        let outcome = match index.recipe(&name) {
            Some(recipe) => run_recipe_on_pool(recipe, index, cache, prompt, options),
            None => Err(JakeError::RecipeNotFound(name.clone())),
        };

        let mut guard = lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.in_flight -= 1;
        guard.completed += 1;

        match outcome {
            Ok(did_run) => {
                if did_run {
                    let mut count = executed
                        .lock()
                        .unwrap_or_else(std::sync::PoisonError::into_inner);
                    *count += 1;
                }
                for dependent in dag.dependents(node).unwrap_or_default() {
                    if let Some(deg) = guard.remaining.get_mut(&dependent) {
                        *deg -= 1;
                        if *deg == 0 {
                            guard.ready.push_back(dependent);
                        }
                    }
                }
            }
            Err(e) => {
                warn!(worker = worker_id, recipe = name.as_str(), error = %e, "recipe failed");
                if guard.failure.is_none() {
                    guard.failure = Some(e);
                }
            }
        }
        drop(guard);
        condvar.notify_all();
    }
}

/// Runs one recipe's hooks and commands on a worker thread. Only ever
/// touches `cache` through its own internal locking (a brief lock for the
/// staleness read, another for the post-run update) — never holds a lock
/// across the spawned child's `wait()`, so workers run concurrently instead
/// of serializing behind the cache.
fn run_recipe_on_pool(
    recipe: &Recipe,
    index: &JakefileIndex<'_>,
    cache: &Cache,
    prompt: &(dyn Prompt + Sync),
    options: RunOptions,
) -> JakeResult<bool> {
    if should_skip(recipe, cache) {
        return Ok(false);
    }
    let variables = index.variables();
    execute_once(recipe, index.jakefile(), cache, prompt, options, &variables)?;
    Ok(true)
}

fn should_skip(recipe: &Recipe, cache: &Cache) -> bool {
    if !recipe.only_os.is_empty() && !recipe.only_os.contains(std::env::consts::OS) {
        return true;
    }
    if recipe.kind == crate::ast::RecipeKind::File {
        if let Some(output) = &recipe.output {
            if cache::is_up_to_date(cache, output, &recipe.file_deps) {
                return true;
            }
        }
    }
    false
}

fn build_graph<'a>(
    index: &JakefileIndex<'a>,
    root: &str,
) -> JakeResult<(DAG<(), ()>, HashMap<NodeId, String>)> {
    let mut dag = DAG::new();
    let mut ids: HashMap<String, NodeId> = HashMap::new();
    let mut names: HashMap<NodeId, String> = HashMap::new();

    // `ids` doubles as the visited-set: a name already present means its
    // node (and outgoing edges) were already built, including mid-cycle —
    // that's what lets a cyclic graph terminate here instead of recursing
    // forever; `DAG::find_cycles` is what actually reports the cycle.
    fn visit<'a>(
        index: &JakefileIndex<'a>,
        name: &str,
        dag: &mut DAG<(), ()>,
        ids: &mut HashMap<String, NodeId>,
        names: &mut HashMap<NodeId, String>,
    ) -> JakeResult<NodeId> {
        if let Some(&id) = ids.get(name) {
            return Ok(id);
        }
        let recipe = index
            .recipe(name)
            .ok_or_else(|| JakeError::RecipeNotFound(name.to_string()))?;

        let id = dag.add_node(());
        let _ = ids.insert(name.to_string(), id);
        let _ = names.insert(id, name.to_string());

        for dep in &recipe.dependencies {
            let dep_id = visit(index, dep, dag, ids, names)?;
            dag.add_edge(id, dep_id, ())?;
        }
        Ok(id)
    }

    let _ = visit(index, root, &mut dag, &mut ids, &mut names)?;
    Ok((dag, names))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Command, Jakefile, Recipe};
    use crate::prompt::AutoConfirm;

    fn index_for(file: &Jakefile) -> JakefileIndex<'_> {
        JakefileIndex::build(file)
    }

    #[test]
    fn cyclic_dependency_is_rejected_before_anything_runs() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::env::set_current_dir(tmp.path()).unwrap();

        let mut file = Jakefile::new();
        let mut a = Recipe::new_task("a");
        a.dependencies.push("b".to_string());
        a.commands.push(Command::shell("echo a >> order.txt"));
        let mut b = Recipe::new_task("b");
        b.dependencies.push("a".to_string());
        b.commands.push(Command::shell("echo b >> order.txt"));
        file.recipes.push(a);
        file.recipes.push(b);

        let index = index_for(&file);
        let mut cache = Cache::new();
        let prompt = AutoConfirm;
        let exec = ParallelExecutor::new(&index, 4, RunOptions::default());
        let result = exec.run("a", &mut cache, &prompt);

        assert!(matches!(result, Err(JakeError::CyclicDependency(_))));
        assert!(!std::path::Path::new("order.txt").exists());
    }

    #[test]
    fn missing_target_recipe_is_reported() {
        let file = Jakefile::new();
        let index = index_for(&file);
        let mut cache = Cache::new();
        let prompt = AutoConfirm;
        let exec = ParallelExecutor::new(&index, 4, RunOptions::default());
        let result = exec.run("nope", &mut cache, &prompt);
        assert!(matches!(result, Err(JakeError::RecipeNotFound(_))));
    }

    #[test]
    fn single_worker_falls_back_to_sequential_topological_order() {
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
        let exec = ParallelExecutor::new(&index, 1, RunOptions::default());
        let stats = exec.run("main", &mut cache, &prompt).unwrap();

        assert_eq!(stats.executed, 2);
        assert_eq!(stats.max_parallel, 1);
        assert_eq!(std::fs::read_to_string("order.txt").unwrap(), "dep\nmain\n");
    }

    #[test]
    fn diamond_dependency_executes_shared_node_exactly_once() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::env::set_current_dir(tmp.path()).unwrap();

        let mut file = Jakefile::new();
        let mut shared = Recipe::new_task("shared");
        shared.commands.push(Command::shell("echo shared >> order.txt"));
        let mut a = Recipe::new_task("a");
        a.dependencies.push("shared".to_string());
        let mut b = Recipe::new_task("b");
        b.dependencies.push("shared".to_string());
        let mut root = Recipe::new_task("root");
        root.dependencies.push("a".to_string());
        root.dependencies.push("b".to_string());
        file.recipes.push(root);
        file.recipes.push(a);
        file.recipes.push(b);
        file.recipes.push(shared);

        let index = index_for(&file);
        let mut cache = Cache::new();
        let prompt = AutoConfirm;
        let exec = ParallelExecutor::new(&index, 4, RunOptions::default());
        let stats = exec.run("root", &mut cache, &prompt).unwrap();

        assert_eq!(stats.total, 4);
        assert_eq!(
            std::fs::read_to_string("order.txt").unwrap().lines().count(),
            1,
            "shared dependency must run exactly once regardless of how many paths reach it"
        );
    }

    #[test]
    fn worker_pool_runs_independent_siblings_before_their_common_dependent() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::env::set_current_dir(tmp.path()).unwrap();

        let mut file = Jakefile::new();
        for name in ["a", "b", "c"] {
            let mut r = Recipe::new_task(name);
            r.commands
                .push(Command::shell(format!("echo {name} >> order.txt")));
            file.recipes.push(r);
        }
        let mut d = Recipe::new_task("d");
        d.dependencies = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        d.commands.push(Command::shell("echo d >> order.txt"));
        file.recipes.push(d);

        let index = index_for(&file);
        let mut cache = Cache::new();
        let prompt = AutoConfirm;
        let exec = ParallelExecutor::new(&index, 4, RunOptions::default());
        let stats = exec.run("d", &mut cache, &prompt).unwrap();

        assert_eq!(stats.executed, 4);
        let contents = std::fs::read_to_string("order.txt").unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.last(), Some(&"d"), "d must run only after a, b, and c complete");
    }

    #[test]
    fn failing_sibling_still_lets_others_finish_but_blocks_the_dependent() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::env::set_current_dir(tmp.path()).unwrap();

        let mut file = Jakefile::new();
        let mut a = Recipe::new_task("a");
        a.commands.push(Command::shell("echo a >> order.txt"));
        let mut b = Recipe::new_task("b");
        b.commands.push(Command::shell("exit 1"));
        let mut c = Recipe::new_task("c");
        c.commands.push(Command::shell("echo c >> order.txt"));
        file.recipes.push(a);
        file.recipes.push(b);
        file.recipes.push(c);
        let mut d = Recipe::new_task("d");
        d.dependencies = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        d.commands.push(Command::shell("echo d >> order.txt"));
        file.recipes.push(d);

        let index = index_for(&file);
        let mut cache = Cache::new();
        let prompt = AutoConfirm;
        let exec = ParallelExecutor::new(&index, 4, RunOptions::default());
        let result = exec.run("d", &mut cache, &prompt);

        assert!(matches!(result, Err(JakeError::CommandFailed { .. })));
        let contents = std::fs::read_to_string("order.txt").unwrap();
        assert!(!contents.contains('d'), "d must never run when a dependency failed");
    }

    #[test]
    fn dry_run_uses_sequential_fallback_and_runs_nothing() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::env::set_current_dir(tmp.path()).unwrap();

        let mut file = Jakefile::new();
        let mut r = Recipe::new_task("build");
        r.commands.push(Command::shell("echo should-not-run >> order.txt"));
        file.recipes.push(r);

        let index = index_for(&file);
        let mut cache = Cache::new();
        let prompt = AutoConfirm;
        let exec = ParallelExecutor::new(&index, 4, RunOptions { dry_run: true, verbose: false });
        let stats = exec.run("build", &mut cache, &prompt).unwrap();

        assert_eq!(stats.executed, 1);
        assert!(!std::path::Path::new("order.txt").exists());
    }
}
