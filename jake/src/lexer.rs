//! Byte stream → tagged token stream.
//!
//! A Jakefile is line-structured: a line starting at column zero begins a
//! new top-level construct (import, directive, variable, hook, or recipe
//! header); a line starting with leading whitespace is part of the
//! preceding recipe's body and is captured close to verbatim, since command
//! lines are opaque shell text the lexer must not tokenize. Top-level lines
//! are tokenized with `logos`; indented body lines are handed to the parser
//! as a single raw token so it can decide whether the line is a directive
//! (`@needs zig`) or a literal command (`echo hello`).
//!
//! This mirrors the tokenizer contract used elsewhere in this codebase:
//! produce a flat `Vec<Token>`, never error out of tokenizing — unknown
//! bytes become a distinguishable `Invalid` token and the parser decides
//! what to do with it — and always terminate with a single `Eof` token so
//! downstream code never special-cases end of input.

use std::ops::Range;

use logos::Logos;

use crate::syntax_kind::SyntaxKind;

/// One lexical token: a tag, its source span, and (for convenience) its
/// literal text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// The token's tag.
    pub kind: SyntaxKind,
    /// The token's source text.
    pub text: String,
    /// Byte offset range within the original source buffer.
    pub span: Range<usize>,
    /// True if this line began with leading whitespace (i.e. is a recipe
    /// body line rather than a top-level construct).
    pub indented: bool,
}

/// Tokenizes Jakefile source.
pub struct Lexer;

impl Lexer {
    /// Tokenize the whole source buffer into a flat token stream terminated
    /// by a single [`SyntaxKind::Eof`] token.
    #[must_use]
    pub fn tokenize(src: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut offset = 0usize;

        for raw_line in split_keep_newlines(src) {
            let line_start = offset;
            let trimmed_start = raw_line.len() - raw_line.trim_start().len();
            let indented = trimmed_start > 0 && !raw_line.trim().is_empty();
            let content = raw_line.trim_end_matches(['\n', '\r']);

            if content.trim().is_empty() {
                // Blank line: just a separator.
                tokens.push(Token {
                    kind: SyntaxKind::Newline,
                    text: String::new(),
                    span: line_start..line_start + raw_line.len(),
                    indented: false,
                });
                offset += raw_line.len();
                continue;
            }

            if indented {
                let body = &content[trimmed_start..];
                let body_start = line_start + trimmed_start;
                tokens.push(Token {
                    kind: SyntaxKind::Ident, // placeholder, parser re-inspects `text`
                    text: body.to_string(),
                    span: body_start..body_start + body.len(),
                    indented: true,
                });
            } else {
                let mut inner = SyntaxKind::lexer(content);
                while let Some(result) = inner.next() {
                    let span = inner.span();
                    let kind = result.unwrap_or(SyntaxKind::Invalid);
                    let text = if kind == SyntaxKind::Comment {
                        inner.slice().trim_start_matches('#').trim().to_string()
                    } else if kind == SyntaxKind::StringLit {
                        unescape(inner.slice())
                    } else {
                        inner.slice().to_string()
                    };
                    tokens.push(Token {
                        kind,
                        text,
                        span: (line_start + span.start)..(line_start + span.end),
                        indented: false,
                    });
                }
            }

            tokens.push(Token {
                kind: SyntaxKind::Newline,
                text: String::new(),
                span: (line_start + content.len())..(line_start + raw_line.len()),
                indented: false,
            });
            offset += raw_line.len();
        }

        tokens.push(Token {
            kind: SyntaxKind::Eof,
            text: String::new(),
            span: offset..offset,
            indented: false,
        });
        tokens
    }
}

fn split_keep_newlines(src: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let bytes = src.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'\n' {
            lines.push(&src[start..=i]);
            start = i + 1;
        }
    }
    if start < src.len() {
        lines.push(&src[start..]);
    }
    lines
}

fn unescape(quoted: &str) -> String {
    let inner = quoted.strip_prefix('"').and_then(|s| s.strip_suffix('"')).unwrap_or(quoted);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('"') => out.push('"'),
                Some('\\') => out.push('\\'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}
