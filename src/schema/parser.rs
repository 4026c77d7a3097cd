//! Block parser
//!
//! Two-state machine over classified lines: outside a block every line is
//! header; `model X` / `enum X` opens a block that collects lines until a
//! lone `}`. Unterminated, nested and duplicate blocks are hard errors.

use super::line::{LineKind, classify};
use super::{Block, ParsedSchema};
use crate::{Error, Result};
use std::collections::HashMap;

enum State {
    Outside,
    Inside(Block),
}

/// Parse schema text into header lines and model/enum blocks.
pub fn parse(text: &str) -> Result<ParsedSchema> {
    let mut schema = ParsedSchema::default();
    let mut declared: HashMap<String, usize> = HashMap::new();
    let mut state = State::Outside;

    for (idx, raw) in text.split_inclusive('\n').enumerate() {
        let line_no = idx + 1;
        let kind = classify(raw);

        state = match (state, kind) {
            (State::Outside, LineKind::BlockOpen { kind, name }) => {
                if let Some(&first_line) = declared.get(name) {
                    return Err(Error::DuplicateBlock {
                        name: name.to_string(),
                        first_line,
                        line: line_no,
                    });
                }
                declared.insert(name.to_string(), line_no);
                tracing::debug!("line {}: open {} {}", line_no, kind, name);

                State::Inside(Block {
                    kind,
                    name: name.to_string(),
                    line: line_no,
                    lines: vec![raw.to_string()],
                })
            }
            (State::Outside, _) => {
                schema.push_header(raw);
                State::Outside
            }
            (State::Inside(_), LineKind::BlockOpen { name, .. }) => {
                return Err(Error::NestedBlock {
                    name: name.to_string(),
                    line: line_no,
                });
            }
            (State::Inside(mut block), LineKind::BlockClose) => {
                block.lines.push(raw.to_string());
                tracing::debug!("line {}: close {} {}", line_no, block.kind, block.name);
                schema.push_block(block);
                State::Outside
            }
            (State::Inside(mut block), _) => {
                block.lines.push(raw.to_string());
                State::Inside(block)
            }
        };
    }

    if let State::Inside(block) = state {
        return Err(Error::UnterminatedBlock {
            kind: block.kind,
            name: block.name,
            line: block.line,
        });
    }

    Ok(schema)
}
