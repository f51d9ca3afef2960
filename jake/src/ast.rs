//! The typed tree a [`crate::parser::Parser`] produces from a token stream.
//!
//! Every node owns its `String`/`PathBuf` data directly rather than
//! borrowing into the source buffer. Rust's ownership model makes that
//! nearly free here, so there is no arena and no bundle of "extra
//! allocations" the caller has to free after the import resolver runs —
//! `Drop` does that for free.

use std::collections::HashSet;
use std::path::PathBuf;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Whether a recipe always runs (`task`) or only runs when its declared
/// `output` is stale relative to its `file_deps` (`file`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RecipeKind {
    /// Always runs when invoked.
    Task,
    /// Runs only if `output` is missing or stale.
    File,
}

/// A directive attached to a command line inside a recipe body, dispatched
/// by the executor rather than spawned as a shell command.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CommandDirective {
    /// `@confirm "message"` — prompt before proceeding; abort on "no".
    Confirm(String),
    /// `@needs binary` — verify an external binary exists on `PATH`.
    Needs(String),
    /// `@watch pattern` — a pattern the [`crate::watcher::Watcher`] should
    /// track; ignored by the executor itself.
    Watch(String),
}

/// One line inside a recipe body: either a directive the executor
/// dispatches, or a literal shell command line.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Command {
    /// The raw line text (for plain commands) or the directive's argument
    /// text (for directive commands).
    pub line: String,
    /// Set if this line was an `@`-prefixed directive rather than a plain
    /// shell command.
    pub directive: Option<CommandDirective>,
}

impl Command {
    /// A plain shell command line.
    #[must_use]
    pub fn shell(line: impl Into<String>) -> Self {
        Self {
            line: line.into(),
            directive: None,
        }
    }

    /// A recipe-body directive line.
    #[must_use]
    pub fn directive(directive: CommandDirective, line: impl Into<String>) -> Self {
        Self {
            line: line.into(),
            directive: Some(directive),
        }
    }
}

/// A hook's timing relative to the recipe it's attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum HookKind {
    /// Runs before the recipe's dependencies/commands.
    Pre,
    /// Runs after the recipe, success or failure.
    Post,
    /// Runs only when the recipe failed.
    OnError,
}

/// A hook command, global (`recipe_name: None`) or targeted at one recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Hook {
    /// The shell command to run (subject to `{{var}}` expansion).
    pub command: String,
    /// Pre, post, or on-error.
    pub kind: HookKind,
    /// `None` for a global hook; `Some(name)` for one targeted at a single
    /// recipe by name.
    pub recipe_name: Option<String>,
}

/// The kind of an `@`-prefixed top-level or recipe-scope directive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DirectiveKind {
    /// `@dotenv`
    Dotenv,
    /// `@export VAR`
    Export,
    /// Any directive this parser doesn't special-case, keyed by its literal
    /// name (without the leading `@`).
    Other(String),
}

/// A top-level directive not otherwise absorbed into a dedicated field
/// (imports and hooks are split out into their own lists — see
/// [`Jakefile`]).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Directive {
    /// The directive's kind.
    pub kind: DirectiveKind,
    /// Everything after the directive keyword, verbatim.
    pub payload: String,
}

/// A `(name, value)` pair with source-order preserved by the containing
/// `Vec`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Variable {
    /// Variable name, referenced inside `{{name}}` expansions.
    pub name: String,
    /// Literal value, itself not expanded at parse time.
    pub value: String,
}

/// `@import "path" (as prefix)?`
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ImportDirective {
    /// The literal path text as written in the Jakefile.
    pub path: String,
    /// Optional namespace prefix; recipes from the imported file become
    /// `"prefix.name"` when set.
    pub prefix: Option<String>,
}

/// A named, immutable unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Recipe {
    /// Unique name within a Jakefile after import merge.
    pub name: String,
    /// `task` or `file`.
    pub kind: RecipeKind,
    /// Names of recipes this one depends on, in declared order. Duplicates
    /// are allowed; visiting semantics are "visit once".
    pub dependencies: Vec<String>,
    /// Glob patterns this recipe's staleness is checked against. Only
    /// meaningful when `kind == RecipeKind::File`.
    pub file_deps: Vec<String>,
    /// The path this recipe produces. Required and meaningful iff
    /// `kind == RecipeKind::File`.
    pub output: Option<PathBuf>,
    /// Positional parameter names.
    pub params: Vec<String>,
    /// Command lines, in source order.
    pub commands: Vec<Command>,
    /// Hooks declared inside this recipe's own body (as opposed to global
    /// or targeted hooks declared at top level).
    pub pre_hooks: Vec<Hook>,
    /// Recipe-local post hooks.
    pub post_hooks: Vec<Hook>,
    /// Alternate names that resolve to this recipe.
    pub aliases: Vec<String>,
    /// `@group` value, presentation-only.
    pub group: Option<String>,
    /// `@desc` value, presentation-only.
    pub description: Option<String>,
    /// Doc comment: a run of `#`-prefixed lines immediately preceding the
    /// recipe.
    pub doc_comment: Option<String>,
    /// `@only-os` tags; empty means "runs on every OS".
    pub only_os: HashSet<String>,
    /// `@shell` override, e.g. `/bin/bash`. Defaults to `/bin/sh` when
    /// unset.
    pub shell: Option<String>,
    /// `@cwd` override.
    pub working_dir: Option<PathBuf>,
    /// `@quiet` — suppress echoing command lines before running them.
    pub quiet: bool,
    /// `@default` — this recipe is the one run when no target is given.
    pub is_default: bool,
}

impl Recipe {
    /// A minimal `task` recipe with no dependencies, commands, or metadata.
    #[must_use]
    pub fn new_task(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: RecipeKind::Task,
            dependencies: Vec::new(),
            file_deps: Vec::new(),
            output: None,
            params: Vec::new(),
            commands: Vec::new(),
            pre_hooks: Vec::new(),
            post_hooks: Vec::new(),
            aliases: Vec::new(),
            group: None,
            description: None,
            doc_comment: None,
            only_os: HashSet::new(),
            shell: None,
            working_dir: None,
            quiet: false,
            is_default: false,
        }
    }
}

/// The root aggregate produced by the parser and mutated only by the
/// import resolver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Jakefile {
    /// Recipes, in declaration order (target recipes first, then any
    /// merged-in imported recipes).
    pub recipes: Vec<Recipe>,
    /// Variables, in insertion order; on merge, the target's variables
    /// come first and win on name collision.
    pub variables: Vec<Variable>,
    /// Top-level directives other than imports and hooks.
    pub directives: Vec<Directive>,
    /// `@import` directives.
    pub imports: Vec<ImportDirective>,
    /// Global pre-hooks (`recipe_name: None`) and targeted pre-hooks
    /// declared at top level.
    pub pre_hooks: Vec<Hook>,
    /// Global and targeted post-hooks declared at top level.
    pub post_hooks: Vec<Hook>,
    /// Global and targeted on-error hooks declared at top level.
    pub on_error_hooks: Vec<Hook>,
}

impl Jakefile {
    /// An empty Jakefile.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}
