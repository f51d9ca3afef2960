//! Token kinds produced by the [`crate::lexer`].

use logos::Logos;

/// A single lexical token tag.
///
/// Command-body lines and doc comments are captured by dedicated lexer
/// modes rather than pure regexes (see [`crate::lexer::Lexer`]), so this
/// enum covers the "line-structure" tokens the parser dispatches on.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[logos(skip r"[ \t]+")]
pub enum SyntaxKind {
    /// `task` keyword.
    #[token("task")]
    TaskKw,
    /// `file` keyword.
    #[token("file")]
    FileKw,
    /// `as` keyword, used in `@import ... as prefix`.
    #[token("as")]
    AsKw,

    /// `@import`
    #[token("@import")]
    ImportKw,
    /// `@pre`
    #[token("@pre")]
    PreKw,
    /// `@post`
    #[token("@post")]
    PostKw,
    /// `@on_error`
    #[token("@on_error")]
    OnErrorKw,
    /// `@alias`
    #[token("@alias")]
    AliasKw,
    /// `@group`
    #[token("@group")]
    GroupKw,
    /// `@desc`
    #[token("@desc")]
    DescKw,
    /// `@only-os`
    #[token("@only-os")]
    OnlyOsKw,
    /// `@shell`
    #[token("@shell")]
    ShellKw,
    /// `@cwd`
    #[token("@cwd")]
    CwdKw,
    /// `@quiet`
    #[token("@quiet")]
    QuietKw,
    /// `@default`
    #[token("@default")]
    DefaultKw,
    /// `@confirm`
    #[token("@confirm")]
    ConfirmKw,
    /// `@needs`
    #[token("@needs")]
    NeedsKw,
    /// `@watch`
    #[token("@watch")]
    WatchKw,
    /// `@dotenv`
    #[token("@dotenv")]
    DotenvKw,
    /// `@export`
    #[token("@export")]
    ExportKw,
    /// Any other `@ident` directive not recognized above.
    #[regex(r"@[A-Za-z_][A-Za-z0-9_-]*")]
    UnknownDirective,

    /// A bareword identifier, dotted/pathlike recipe name, or glob pattern.
    /// The leading class includes `/` so absolute paths (`/bin/bash`,
    /// `/tmp`) lex as one token instead of splitting on the leading slash;
    /// the continuation class includes `*`/`?` so glob dependencies like
    /// `src/*.zig` or `**/*.rs` lex as one token too. Bracketed character
    /// classes (`file[0-9].txt`) are a known limitation, since `[`/`]` are
    /// reserved for bracketed dependency lists (see DESIGN.md).
    #[regex(r"[A-Za-z_*/][A-Za-z0-9_./\-*?]*")]
    Ident,

    /// A double-quoted string with backslash escapes.
    #[regex(r#""(\\.|[^"\\])*""#)]
    StringLit,

    #[token("=")]
    Eq,
    #[token(":")]
    Colon,
    #[token(",")]
    Comma,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,

    /// `#`-prefixed comment, stripped of its leading `#` by the lexer.
    #[regex(r"#[^\n]*")]
    Comment,

    /// One or more blank/indent-carrying newlines.
    #[token("\n")]
    Newline,

    /// A byte sequence that doesn't match any other token.
    Invalid,

    /// Synthetic end-of-input marker, always the last token emitted.
    Eof,
}

impl SyntaxKind {
    /// True for tokens that carry no semantic weight outside of
    /// line-structure (comments are handled separately for doc-comment
    /// attachment, so they are *not* considered trivia here).
    #[must_use]
    pub fn is_trivia(self) -> bool {
        matches!(self, SyntaxKind::Newline)
    }
}
