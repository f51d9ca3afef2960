//! O(1) name/kind lookups over a merged [`Jakefile`].

use std::collections::HashMap;

use crate::ast::{Directive, DirectiveKind, Jakefile, Recipe};

/// Borrowed lookup tables over a [`Jakefile`]. Invalidated if the
/// underlying jakefile is mutated after indexing — enforced at compile
/// time by the borrow checker, since `JakefileIndex` holds an ordinary
/// Rust lifetime rather than a manually-tracked "dirty" flag.
#[derive(Debug)]
pub struct JakefileIndex<'a> {
    jakefile: &'a Jakefile,
    recipes: HashMap<&'a str, &'a Recipe>,
    variables: HashMap<&'a str, &'a str>,
    directives: HashMap<String, Vec<&'a Directive>>,
    default_recipe: Option<&'a Recipe>,
}

impl<'a> JakefileIndex<'a> {
    /// Build an index over `jakefile`.
    #[must_use]
    pub fn build(jakefile: &'a Jakefile) -> Self {
        let mut recipes = HashMap::new();
        for recipe in &jakefile.recipes {
            let _ = recipes.entry(recipe.name.as_str()).or_insert(recipe);
            for alias in &recipe.aliases {
                let _ = recipes.entry(alias.as_str()).or_insert(recipe);
            }
        }

        let mut variables = HashMap::new();
        for var in &jakefile.variables {
            let _ = variables
                .entry(var.name.as_str())
                .or_insert(var.value.as_str());
        }

        let mut directives: HashMap<String, Vec<&Directive>> = HashMap::new();
        for directive in &jakefile.directives {
            directives
                .entry(directive_kind_key(&directive.kind))
                .or_default()
                .push(directive);
        }

        let default_recipe = jakefile
            .recipes
            .iter()
            .find(|r| r.is_default)
            .or_else(|| jakefile.recipes.first());

        Self {
            jakefile,
            recipes,
            variables,
            directives,
            default_recipe,
        }
    }

    /// The jakefile this index was built over.
    #[must_use]
    pub fn jakefile(&self) -> &'a Jakefile {
        self.jakefile
    }

    /// Look up a recipe by its primary name or any alias.
    #[must_use]
    pub fn recipe(&self, name: &str) -> Option<&'a Recipe> {
        self.recipes.get(name).copied()
    }

    /// Look up a variable's literal value.
    #[must_use]
    pub fn variable(&self, name: &str) -> Option<&'a str> {
        self.variables.get(name).copied()
    }

    /// All variables as a plain map, for seeding an expansion context.
    /// First writer wins on duplicate names, matching [`Self::variable`].
    #[must_use]
    pub fn variables(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        for var in &self.jakefile.variables {
            let _ = map.entry(var.name.clone()).or_insert_with(|| var.value.clone());
        }
        map
    }

    /// Directives of a given kind, in source order.
    #[must_use]
    pub fn directives(&self, kind_key: &str) -> &[&'a Directive] {
        self.directives.get(kind_key).map_or(&[], Vec::as_slice)
    }

    /// The default recipe: the first recipe with `is_default = true`, or
    /// the first recipe overall if none is marked.
    #[must_use]
    pub fn default_recipe(&self) -> Option<&'a Recipe> {
        self.default_recipe
    }

    /// All recipes in declaration order, for `--list`.
    #[must_use]
    pub fn recipes_in_order(&self) -> &'a [Recipe] {
        &self.jakefile.recipes
    }
}

fn directive_kind_key(kind: &DirectiveKind) -> String {
    match kind {
        DirectiveKind::Dotenv => "dotenv".to_string(),
        DirectiveKind::Export => "export".to_string(),
        DirectiveKind::Other(name) => name.clone(),
    }
}

/// Variable names listed in top-level `@export` directives, resolved
/// against the jakefile's own variable declarations and handed back as a
/// map ready to merge into a spawned command's environment.
///
/// This is deliberately separate from [`JakefileIndex::variables`]: a
/// `{{var}}` expansion only ever reads the jakefile's variable map, while
/// `@export` additionally forwards a *named* subset of it into the
/// spawned process's real environment, where ambient tools that only look
/// at `std::env` (not at `{{var}}` syntax) can see it.
#[must_use]
pub fn exported_env(jakefile: &Jakefile) -> HashMap<String, String> {
    let mut values: HashMap<&str, &str> = HashMap::new();
    for var in &jakefile.variables {
        let _ = values.entry(var.name.as_str()).or_insert(var.value.as_str());
    }

    let mut exported = HashMap::new();
    for directive in &jakefile.directives {
        if directive.kind != DirectiveKind::Export {
            continue;
        }
        for name in directive.payload.split_whitespace() {
            if let Some(&value) = values.get(name) {
                let _ = exported.insert(name.to_string(), value.to_string());
            }
        }
    }
    exported
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Recipe, Variable};

    #[test]
    fn first_writer_wins_on_duplicate_recipe_name() {
        let mut file = Jakefile::new();
        let mut a = Recipe::new_task("build");
        a.group = Some("first".to_string());
        let mut b = Recipe::new_task("build");
        b.group = Some("second".to_string());
        file.recipes.push(a);
        file.recipes.push(b);

        let index = JakefileIndex::build(&file);
        assert_eq!(index.recipe("build").unwrap().group.as_deref(), Some("first"));
    }

    #[test]
    fn alias_resolves_to_same_recipe() {
        let mut file = Jakefile::new();
        let mut r = Recipe::new_task("build");
        r.aliases.push("b".to_string());
        file.recipes.push(r);

        let index = JakefileIndex::build(&file);
        assert_eq!(index.recipe("b").unwrap().name, "build");
    }

    #[test]
    fn default_recipe_falls_back_to_first() {
        let mut file = Jakefile::new();
        file.recipes.push(Recipe::new_task("a"));
        file.recipes.push(Recipe::new_task("b"));

        let index = JakefileIndex::build(&file);
        assert_eq!(index.default_recipe().unwrap().name, "a");
    }

    #[test]
    fn default_recipe_honors_is_default_flag() {
        let mut file = Jakefile::new();
        file.recipes.push(Recipe::new_task("a"));
        let mut b = Recipe::new_task("b");
        b.is_default = true;
        file.recipes.push(b);

        let index = JakefileIndex::build(&file);
        assert_eq!(index.default_recipe().unwrap().name, "b");
    }

    #[test]
    fn variable_first_writer_wins() {
        let mut file = Jakefile::new();
        file.variables.push(Variable {
            name: "x".into(),
            value: "first".into(),
        });
        file.variables.push(Variable {
            name: "x".into(),
            value: "second".into(),
        });

        let index = JakefileIndex::build(&file);
        assert_eq!(index.variable("x"), Some("first"));
    }

    #[test]
    fn exported_env_resolves_named_variables_only() {
        let mut file = Jakefile::new();
        file.variables.push(Variable {
            name: "TOKEN".into(),
            value: "secret".into(),
        });
        file.variables.push(Variable {
            name: "UNEXPORTED".into(),
            value: "hidden".into(),
        });
        file.directives.push(crate::ast::Directive {
            kind: DirectiveKind::Export,
            payload: "TOKEN".into(),
        });

        let env = exported_env(&file);
        assert_eq!(env.get("TOKEN").map(String::as_str), Some("secret"));
        assert!(!env.contains_key("UNEXPORTED"));
    }

    #[test]
    fn exported_env_skips_names_with_no_matching_variable() {
        let mut file = Jakefile::new();
        file.directives.push(crate::ast::Directive {
            kind: DirectiveKind::Export,
            payload: "NEVER_DECLARED".into(),
        });

        assert!(exported_env(&file).is_empty());
    }
}
