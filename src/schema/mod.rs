//! Schema model - lossless in-memory form of a block-structured schema
//!
//! A schema is a sequence of items in document order:
//! - header lines (anything outside a `model` / `enum` block)
//! - blocks (`model Name { ... }` or `enum Name { ... }`)
//!
//! Raw lines keep their terminators, so the original text can always be
//! rebuilt byte-for-byte.

pub mod line;
pub mod parser;

pub use line::{LineKind, base_type, classify, is_relation_declaration, strip_comment};
pub use parser::parse;

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// The two block keywords the sequencer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    /// Entity with fields; participates in dependency ordering
    Model,
    /// Closed set of values; always safe to include
    Enum,
}

impl BlockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Model => "model",
            BlockKind::Enum => "enum",
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A `model` or `enum` block, opening line through closing brace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,
    pub name: String,
    /// 1-indexed line of the opening declaration
    pub line: usize,
    /// Raw lines including terminators
    pub lines: Vec<String>,
}

impl Block {
    /// Reassemble the block exactly as it appeared in the source
    pub fn text(&self) -> String {
        self.lines.concat()
    }

    /// Target types of the foreign-key side of every relation in this block
    pub fn relation_targets(&self) -> impl Iterator<Item = &str> {
        self.lines
            .iter()
            .filter(|line| is_relation_declaration(line))
            .filter_map(|line| match classify(line) {
                LineKind::Field { type_token, .. } => Some(base_type(type_token)),
                _ => None,
            })
    }
}

/// One top-level item of a schema, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Header(String),
    Block(Block),
}

/// A parsed schema: header text plus model and enum blocks.
#[derive(Debug, Clone, Default)]
pub struct ParsedSchema {
    items: Vec<Item>,
    /// Block name → index into `items`
    index: HashMap<String, usize>,
}

impl ParsedSchema {
    pub(crate) fn push_header(&mut self, line: &str) {
        self.items.push(Item::Header(line.to_string()));
    }

    pub(crate) fn push_block(&mut self, block: Block) {
        self.index.insert(block.name.clone(), self.items.len());
        self.items.push(Item::Block(block));
    }

    pub(crate) fn block(&self, name: &str) -> Option<&Block> {
        match self.index.get(name).map(|&i| &self.items[i]) {
            Some(Item::Block(block)) => Some(block),
            _ => None,
        }
    }

    /// Parse schema text
    pub fn parse(text: &str) -> crate::Result<Self> {
        parser::parse(text)
    }

    /// All items in document order
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Every line outside a block, concatenated in order
    pub fn header(&self) -> String {
        self.items
            .iter()
            .filter_map(|item| match item {
                Item::Header(line) => Some(line.as_str()),
                Item::Block(_) => None,
            })
            .collect()
    }

    fn blocks_of(&self, kind: BlockKind) -> impl Iterator<Item = &Block> {
        self.items.iter().filter_map(move |item| match item {
            Item::Block(block) if block.kind == kind => Some(block),
            _ => None,
        })
    }

    /// Enum blocks in declaration order
    pub fn enums(&self) -> impl Iterator<Item = &Block> {
        self.blocks_of(BlockKind::Enum)
    }

    /// Model blocks in declaration order
    pub fn models(&self) -> impl Iterator<Item = &Block> {
        self.blocks_of(BlockKind::Model)
    }

    /// Model names in declaration order
    pub fn model_names(&self) -> Vec<&str> {
        self.models().map(|m| m.name.as_str()).collect()
    }

    /// Get a model block by name
    pub fn model(&self, name: &str) -> Option<&Block> {
        self.block(name).filter(|b| b.kind == BlockKind::Model)
    }

    pub fn is_model(&self, name: &str) -> bool {
        self.model(name).is_some()
    }

    pub fn model_count(&self) -> usize {
        self.models().count()
    }

    pub fn enum_count(&self) -> usize {
        self.enums().count()
    }

    /// Rebuild the source text. Lossless for anything [`parse`] accepted.
    pub fn to_source(&self) -> String {
        let mut out = String::new();
        for item in &self.items {
            match item {
                Item::Header(line) => out.push_str(line),
                Item::Block(block) => out.push_str(&block.text()),
            }
        }
        out
    }
}

impl FromStr for ParsedSchema {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        parser::parse(s)
    }
}
