//! Tokens → [`Jakefile`] AST.
//!
//! A hand-written recursive-descent parser over the flat token stream
//! produced by [`crate::lexer::Lexer`]: a `statement()` dispatch on the
//! current token's kind, `bump`/`expect`/`error` helpers, and error
//! recovery that skips to the next top-level line rather than aborting
//! the whole parse on the first bad one.

use std::collections::HashSet;
use std::path::PathBuf;

use crate::ast::{
    Command, CommandDirective, Directive, DirectiveKind, Hook, HookKind, ImportDirective,
    Jakefile, Recipe, RecipeKind, Variable,
};
use crate::lexer::{Lexer, Token};
use crate::syntax_kind::SyntaxKind;

/// Parses a complete Jakefile source buffer.
///
/// # Errors
///
/// Returns a list of [`ParseIssue`]s (non-empty) if the input contains
/// malformed constructs. A single malformed recipe does not prevent the
/// rest of the file from being parsed; all issues found are reported
/// together.
pub fn parse(src: &str) -> Result<Jakefile, Vec<ParseIssue>> {
    let tokens = Lexer::tokenize(src);
    let mut parser = Parser::new(tokens);
    let file = parser.parse_jakefile();
    if parser.issues.is_empty() {
        Ok(file)
    } else {
        Err(parser.issues)
    }
}

/// A single parse error, with the byte span it occurred at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIssue {
    /// Human-readable description.
    pub message: String,
    /// Byte offset the error was detected at.
    pub offset: usize,
}

impl std::fmt::Display for ParseIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (at byte {})", self.message, self.offset)
    }
}

/// Directives accumulated before a recipe header that apply to that
/// recipe once it's parsed.
#[derive(Default)]
struct PendingRecipeModifiers {
    doc_comment: Vec<String>,
    aliases: Vec<String>,
    group: Option<String>,
    description: Option<String>,
    only_os: HashSet<String>,
    shell: Option<String>,
    working_dir: Option<PathBuf>,
    quiet: bool,
    is_default: bool,
}

impl PendingRecipeModifiers {
    fn apply(self, recipe: &mut Recipe) {
        if !self.doc_comment.is_empty() {
            recipe.doc_comment = Some(self.doc_comment.join("\n"));
        }
        recipe.aliases = self.aliases;
        recipe.group = self.group;
        recipe.description = self.description;
        recipe.only_os = self.only_os;
        recipe.shell = self.shell;
        recipe.working_dir = self.working_dir;
        recipe.quiet = self.quiet;
        recipe.is_default = self.is_default;
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    issues: Vec<ParseIssue>,
    pending: PendingRecipeModifiers,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            issues: Vec::new(),
            pending: PendingRecipeModifiers::default(),
        }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> SyntaxKind {
        self.peek().kind
    }

    fn bump(&mut self) -> Token {
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn at_eof(&self) -> bool {
        self.peek_kind() == SyntaxKind::Eof
    }

    fn error(&mut self, message: impl Into<String>) {
        self.issues.push(ParseIssue {
            message: message.into(),
            offset: self.peek().span.start,
        });
    }

    /// Skip to (and consume) the next `Newline`, for error recovery.
    fn skip_to_newline(&mut self) {
        while !matches!(self.peek_kind(), SyntaxKind::Newline | SyntaxKind::Eof) {
            let _ = self.bump();
        }
        if self.peek_kind() == SyntaxKind::Newline {
            let _ = self.bump();
        }
    }

    /// Skip blank-line separators (`Newline` tokens carrying no text and
    /// not indented) that occur outside a recipe body.
    fn skip_blank_separators(&mut self) {
        while self.peek_kind() == SyntaxKind::Newline && !self.peek().indented {
            let _ = self.bump();
        }
    }

    /// Join remaining non-indented tokens on the current line into a
    /// single space-separated string, consuming through the trailing
    /// `Newline`.
    fn collect_rest_of_line(&mut self) -> String {
        let mut parts = Vec::new();
        while !matches!(self.peek_kind(), SyntaxKind::Newline | SyntaxKind::Eof) {
            parts.push(self.bump().text);
        }
        if self.peek_kind() == SyntaxKind::Newline {
            let _ = self.bump();
        }
        parts.join(" ")
    }

    fn parse_jakefile(&mut self) -> Jakefile {
        let mut file = Jakefile::new();

        while !self.at_eof() {
            self.skip_blank_separators();
            if self.at_eof() {
                break;
            }
            self.statement(&mut file);
        }

        file
    }

    fn statement(&mut self, file: &mut Jakefile) {
        match self.peek_kind() {
            SyntaxKind::Comment => {
                let text = self.bump().text;
                self.pending.doc_comment.push(text);
                // A comment consumes its own trailing Newline emitted by
                // the lexer as a separate token.
                if self.peek_kind() == SyntaxKind::Newline && !self.peek().indented {
                    let _ = self.bump();
                }
            }
            SyntaxKind::ImportKw => self.parse_import(file),
            SyntaxKind::PreKw => self.parse_hook(file, HookKind::Pre),
            SyntaxKind::PostKw => self.parse_hook(file, HookKind::Post),
            SyntaxKind::OnErrorKw => self.parse_hook(file, HookKind::OnError),
            SyntaxKind::AliasKw => {
                let _ = self.bump();
                let rest = self.collect_rest_of_line();
                for name in rest.split(',') {
                    let name = name.trim();
                    if !name.is_empty() {
                        self.pending.aliases.push(name.to_string());
                    }
                }
            }
            SyntaxKind::GroupKw => {
                let _ = self.bump();
                self.pending.group = Some(self.collect_rest_of_line());
            }
            SyntaxKind::DescKw => {
                let _ = self.bump();
                self.pending.description = Some(self.collect_rest_of_line());
            }
            SyntaxKind::OnlyOsKw => {
                let _ = self.bump();
                let rest = self.collect_rest_of_line();
                for tag in rest.split(',') {
                    let tag = tag.trim();
                    if !tag.is_empty() {
                        let _ = self.pending.only_os.insert(tag.to_string());
                    }
                }
            }
            SyntaxKind::ShellKw => {
                let _ = self.bump();
                self.pending.shell = Some(self.collect_rest_of_line());
            }
            SyntaxKind::CwdKw => {
                let _ = self.bump();
                self.pending.working_dir = Some(PathBuf::from(self.collect_rest_of_line()));
            }
            SyntaxKind::QuietKw => {
                let _ = self.bump();
                let _ = self.collect_rest_of_line();
                self.pending.quiet = true;
            }
            SyntaxKind::DefaultKw => {
                let _ = self.bump();
                let _ = self.collect_rest_of_line();
                self.pending.is_default = true;
            }
            SyntaxKind::DotenvKw => {
                let _ = self.bump();
                let payload = self.collect_rest_of_line();
                file.directives.push(Directive {
                    kind: DirectiveKind::Dotenv,
                    payload,
                });
            }
            SyntaxKind::ExportKw => {
                let _ = self.bump();
                let payload = self.collect_rest_of_line();
                file.directives.push(Directive {
                    kind: DirectiveKind::Export,
                    payload,
                });
            }
            SyntaxKind::UnknownDirective => {
                let name = self.bump().text.trim_start_matches('@').to_string();
                let payload = self.collect_rest_of_line();
                file.directives.push(Directive {
                    kind: DirectiveKind::Other(name),
                    payload,
                });
            }
            SyntaxKind::TaskKw | SyntaxKind::FileKw => self.parse_recipe(file),
            SyntaxKind::Ident => self.parse_variable_or_skip(file),
            SyntaxKind::Eof => {}
            _ => {
                self.error(format!("unexpected token {:?}", self.peek_kind()));
                self.skip_to_newline();
            }
        }
    }

    fn parse_import(&mut self, file: &mut Jakefile) {
        let _ = self.bump(); // @import
        if self.peek_kind() != SyntaxKind::StringLit {
            self.error("expected a quoted path after @import");
            self.skip_to_newline();
            return;
        }
        let path = self.bump().text;
        let mut prefix = None;
        if self.peek_kind() == SyntaxKind::AsKw {
            let _ = self.bump();
            if self.peek_kind() == SyntaxKind::Ident {
                prefix = Some(self.bump().text);
            } else {
                self.error("expected an identifier after `as`");
            }
        }
        self.skip_to_newline();
        file.imports.push(ImportDirective { path, prefix });
    }

    fn parse_hook(&mut self, file: &mut Jakefile, kind: HookKind) {
        let _ = self.bump(); // @pre / @post / @on_error
        let mut recipe_name = None;
        if self.peek_kind() == SyntaxKind::LBracket {
            let _ = self.bump();
            if self.peek_kind() == SyntaxKind::Ident {
                recipe_name = Some(self.bump().text);
            } else {
                self.error("expected a recipe name inside `[...]`");
            }
            if self.peek_kind() == SyntaxKind::RBracket {
                let _ = self.bump();
            } else {
                self.error("expected `]` after hook target");
            }
        }
        let command = self.collect_rest_of_line();
        let hook = Hook {
            command,
            kind,
            recipe_name,
        };
        match kind {
            HookKind::Pre => file.pre_hooks.push(hook),
            HookKind::Post => file.post_hooks.push(hook),
            HookKind::OnError => file.on_error_hooks.push(hook),
        }
    }

    fn parse_variable_or_skip(&mut self, file: &mut Jakefile) {
        // Look ahead one token for `IDENT =`.
        let save = self.pos;
        let name_tok = self.bump();
        if self.peek_kind() == SyntaxKind::Eq {
            let _ = self.bump();
            let value = self.collect_rest_of_line();
            file.variables.push(Variable {
                name: name_tok.text,
                value,
            });
        } else {
            self.pos = save;
            self.error(format!(
                "unexpected identifier `{}` outside of a recipe or variable assignment",
                name_tok.text
            ));
            self.skip_to_newline();
        }
    }

    fn parse_dep_list(&mut self) -> Vec<String> {
        let mut deps = Vec::new();
        let bracketed = self.peek_kind() == SyntaxKind::LBracket;
        if bracketed {
            let _ = self.bump();
        }
        loop {
            match self.peek_kind() {
                SyntaxKind::Ident => deps.push(self.bump().text),
                SyntaxKind::StringLit => deps.push(self.bump().text),
                _ => break,
            }
            if self.peek_kind() == SyntaxKind::Comma {
                let _ = self.bump();
                continue;
            }
            break;
        }
        if bracketed {
            if self.peek_kind() == SyntaxKind::RBracket {
                let _ = self.bump();
            } else {
                self.error("expected `]` to close dependency list");
            }
        }
        deps
    }

    fn parse_recipe(&mut self, file: &mut Jakefile) {
        let kind = if self.bump().kind == SyntaxKind::TaskKw {
            RecipeKind::Task
        } else {
            RecipeKind::File
        };

        let name = if self.peek_kind() == SyntaxKind::Ident {
            self.bump().text
        } else {
            self.error("expected a recipe name after `task`/`file`");
            self.skip_to_newline();
            self.pending = PendingRecipeModifiers::default();
            return;
        };

        let mut recipe = Recipe::new_task(name);
        recipe.kind = kind;
        if kind == RecipeKind::File {
            recipe.output = Some(PathBuf::from(&recipe.name));
        }

        if self.peek_kind() == SyntaxKind::Colon {
            let _ = self.bump();
            let deps = self.parse_dep_list();
            match kind {
                RecipeKind::Task => recipe.dependencies = deps,
                RecipeKind::File => recipe.file_deps = deps,
            }
        }

        if self.peek_kind() == SyntaxKind::Newline {
            let _ = self.bump();
        }

        self.parse_recipe_body(&mut recipe);

        std::mem::take(&mut self.pending).apply(&mut recipe);
        file.recipes.push(recipe);
    }

    fn parse_recipe_body(&mut self, recipe: &mut Recipe) {
        loop {
            match self.peek_kind() {
                SyntaxKind::Newline if !self.peek().indented => {
                    // Blank line: may be inside or after the body. Peek past
                    // it to decide.
                    let save = self.pos;
                    let _ = self.bump();
                    if self.peek().indented {
                        continue;
                    }
                    self.pos = save;
                    break;
                }
                SyntaxKind::Ident if self.peek().indented => {
                    let text = self.bump().text;
                    if self.peek_kind() == SyntaxKind::Newline {
                        let _ = self.bump();
                    }
                    recipe.commands.push(parse_body_line(&text));
                }
                SyntaxKind::Eof => break,
                _ => break,
            }
        }
    }
}

/// Classify one recipe-body line as a plain shell command or a recognized
/// directive command (`@confirm`, `@needs`, `@watch`).
fn parse_body_line(text: &str) -> Command {
    let trimmed = text.trim_end();
    if let Some(rest) = trimmed.strip_prefix('@') {
        let (word, arg) = match rest.split_once(char::is_whitespace) {
            Some((w, a)) => (w, a.trim()),
            None => (rest, ""),
        };
        let arg = strip_quotes(arg).to_string();
        let directive = match word {
            "confirm" => Some(CommandDirective::Confirm(arg.clone())),
            "needs" => Some(CommandDirective::Needs(arg.clone())),
            "watch" => Some(CommandDirective::Watch(arg.clone())),
            _ => None,
        };
        if let Some(directive) = directive {
            return Command::directive(directive, arg);
        }
    }
    Command::shell(trimmed.to_string())
}

fn strip_quotes(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(s)
}
