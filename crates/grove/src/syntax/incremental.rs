//
// syntax/incremental.rs
//
// Chunk-level reuse between two versions of a file
//

use std::sync::Arc;

use super::lexer::lex_from;
use super::parser::{file_node, parse_chunk, split_chunks};
use super::tree::{GreenElement, GreenNode, SyntaxTree};

/// A single text replacement in byte offsets: `[start, old_end)` of the old
/// text became `[start, new_end)` of the new text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextEdit {
    pub start: u32,
    pub old_end: u32,
    pub new_end: u32,
}

impl TextEdit {
    /// Map a new offset that lies after the edit back to the old text.
    fn unshift(&self, new_offset: u32) -> u32 {
        new_offset + self.old_end - self.new_end
    }

    /// Map an old offset that lies after the edit into the new text.
    fn shift(&self, old_offset: u32) -> u32 {
        old_offset + self.new_end - self.old_end
    }
}

/// Counts from the last reparse, for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReuseStats {
    pub reused: usize,
    pub reparsed: usize,
    /// Bytes of the new text that went through the lexer
    pub relexed: usize,
}

/// Reparse `new_text` reusing every top-level chunk of `old` whose text is
/// unchanged. Reused chunks are the very same `Arc`s as in `old`.
///
/// Lexing restarts at the last chunk that begins before the edit and stops
/// at the first column-0 token past the edit that lands on an old chunk
/// boundary; the old chunks from there on are taken over shifted.
pub fn reparse(old: &SyntaxTree, edit: TextEdit, new_text: &str) -> (SyntaxTree, ReuseStats) {
    let old_items: Vec<(u32, &Arc<GreenNode>)> = old
        .green()
        .children
        .iter()
        .filter_map(|(offset, element)| match element {
            GreenElement::Node(node) => Some((*offset, node)),
            GreenElement::Token(_) => None,
        })
        .collect();

    // an edit at a chunk's first byte can fold it into the chunk before
    let (kept, restart) = match old_items.iter().rposition(|(offset, _)| *offset < edit.start) {
        Some(0) | None => (0, 0),
        Some(index) => (index, old_items[index].0),
    };

    let mut tokens = Vec::new();
    let mut resync = None;
    for token in lex_from(new_text, restart as usize) {
        if token.line_start && token.col == 0 && token.start >= edit.new_end {
            let old_start = edit.unshift(token.start);
            if let Ok(index) = old_items.binary_search_by_key(&old_start, |(offset, _)| *offset) {
                if old.position(old_start).character == 0 {
                    resync = Some((index, token.start));
                    break;
                }
            }
        }
        tokens.push(token);
    }
    let relexed_end = resync.map_or(new_text.len() as u32, |(_, start)| start);

    let mut stats = ReuseStats {
        reused: kept,
        relexed: (relexed_end - restart) as usize,
        ..ReuseStats::default()
    };
    let mut items: Vec<(u32, Arc<GreenNode>)> = old_items[..kept]
        .iter()
        .map(|(offset, node)| (*offset, Arc::clone(node)))
        .collect();

    for range in split_chunks(&tokens) {
        let chunk = &tokens[range];
        let start = chunk[0].start;
        let end = chunk[chunk.len() - 1].end;

        let candidate = if end <= edit.start {
            Some(start)
        } else if start >= edit.new_end {
            Some(edit.unshift(start))
        } else {
            None
        };
        let reused = candidate
            .and_then(|old_start| {
                let index = old_items
                    .binary_search_by_key(&old_start, |(offset, _)| *offset)
                    .ok()?;
                Some((old_start, old_items[index].1))
            })
            .filter(|(old_start, node)| {
                chunk[0].col == 0
                    && old.position(*old_start).character == 0
                    && old.text().get(*old_start as usize..(old_start + node.len) as usize)
                        == new_text.get(start as usize..end as usize)
            })
            .map(|(_, node)| node.clone());

        let node = match reused {
            Some(node) => {
                stats.reused += 1;
                node
            }
            None => {
                stats.reparsed += 1;
                parse_chunk(new_text, chunk)
            }
        };
        items.push((start, node));
    }

    if let Some((index, _)) = resync {
        for (offset, node) in &old_items[index..] {
            items.push((edit.shift(*offset), Arc::clone(node)));
        }
        stats.reused += old_items.len() - index;
    }

    log::trace!(
        "Reparse reused {} chunks, reparsed {}, relexed {} bytes (edit {}..{} -> {})",
        stats.reused,
        stats.reparsed,
        stats.relexed,
        edit.start,
        edit.old_end,
        edit.new_end
    );
    let tree = SyntaxTree::new(
        Arc::from(new_text),
        file_node(items, new_text.len() as u32),
    );
    (tree, stats)
}

/// Compute the byte-offset edit for replacing `[start, end)` of `old_text`
/// with `inserted`.
pub fn edit_for_replacement(start: u32, end: u32, inserted: &str) -> TextEdit {
    TextEdit {
        start,
        old_end: end,
        new_end: start + inserted.len() as u32,
    }
}
