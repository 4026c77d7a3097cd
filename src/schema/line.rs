//! Line classifier - the tokenizer behind the block parser
//!
//! The schema grammar is flat and line oriented, so every raw line maps to
//! exactly one [`LineKind`]. Same-line comments are stripped before
//! classification but never removed from the stored text.

use super::BlockKind;
use regex::Regex;
use std::sync::OnceLock;

/// Marker that starts a same-line comment
pub const COMMENT_MARKER: &str = "//";

/// Prefix of a block-level attribute line (`@@id([a, b])`, `@@map("x")`)
pub const BLOCK_ATTRIBUTE_MARKER: &str = "@@";

/// Annotation that marks a relation field
pub const RELATION_MARKER: &str = "@relation";

/// Sub-clause only present on the foreign-key side of a relation
pub const FIELDS_MARKER: &str = "fields:";

/// `model Name {` / `enum Name {`; the brace is required so a field named
/// `model` or `enum` (`model String`) stays a field.
static BLOCK_OPEN: OnceLock<Regex> = OnceLock::new();

fn block_open_regex() -> &'static Regex {
    BLOCK_OPEN.get_or_init(|| {
        Regex::new(r"^(model|enum)\s+([A-Za-z_][A-Za-z0-9_]*)\s*\{$")
            .expect("block opener pattern is valid")
    })
}

/// The role a single line plays in the block grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind<'a> {
    /// `model Name {` or `enum Name {`
    BlockOpen { kind: BlockKind, name: &'a str },
    /// A lone `}`
    BlockClose,
    /// Block attribute (`@@...`)
    Attribute,
    /// `name Type ...` - anything with at least two tokens
    Field { name: &'a str, type_token: &'a str },
    /// Nothing but a comment
    Comment,
    /// Whitespace only
    Blank,
    /// Single-token lines such as enum values
    Other,
}

impl LineKind<'_> {
    /// Lines that are kept in a snapshot without looking at their type token
    pub fn is_structural(&self) -> bool {
        !matches!(self, LineKind::Field { .. } | LineKind::Other)
    }
}

/// Return the code part of a line, i.e. everything before a `//` comment.
///
/// A `//` inside a double-quoted string (`@default("https://...")`) is not a comment.
pub fn strip_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'/' if bytes.get(i + 1) == Some(&b'/') => return &line[..i],
            _ => {}
        }
    }

    line
}

/// Classify a raw line (terminator included or not).
pub fn classify(line: &str) -> LineKind<'_> {
    let code = strip_comment(line).trim();

    if code.is_empty() {
        return if line.trim().is_empty() {
            LineKind::Blank
        } else {
            LineKind::Comment
        };
    }

    if code == "}" {
        return LineKind::BlockClose;
    }

    if let Some(caps) = block_open_regex().captures(code) {
        let kind = match &caps[1] {
            "model" => BlockKind::Model,
            _ => BlockKind::Enum,
        };
        if let Some(name) = caps.get(2) {
            return LineKind::BlockOpen {
                kind,
                name: name.as_str(),
            };
        }
    }

    if code.starts_with(BLOCK_ATTRIBUTE_MARKER) {
        return LineKind::Attribute;
    }

    let mut tokens = code.split_whitespace();
    match (tokens.next(), tokens.next()) {
        (Some(name), Some(type_token)) => LineKind::Field { name, type_token },
        _ => LineKind::Other,
    }
}

/// Strip list and optional markers from a type token (`Post[]` -> `Post`, `User?` -> `User`).
pub fn base_type(type_token: &str) -> &str {
    type_token
        .trim_end_matches('?')
        .trim_end_matches("[]")
        .trim_end_matches('?')
}

/// True for the foreign-key side of a relation: `author User @relation(fields: [authorId], ...)`.
///
/// The inverse side (`posts Post[]`) carries no `fields:` clause and must not count.
pub fn is_relation_declaration(line: &str) -> bool {
    let code = strip_comment(line);
    code.contains(RELATION_MARKER) && code.contains(FIELDS_MARKER)
}
