//! Document Update Composer
//!
//! Mutations are expressed as data (`DocUpdate` values) rather than
//! imperative edit sequences, so logically related steps compose into one
//! atomic, undoable transaction.
//!
//! # Atomicity
//!
//! `DocUpdate::apply` returns `None` to signal "inapplicable given current
//! state" (for example, the target node no longer resolves). The composer
//! abandons the *whole* batch on the first `None`: either every update in
//! the list takes effect or none does. Inapplicability is an expected
//! condition under concurrent edits, never an error.

use crate::doc::transaction::{Selection, Step, Transaction};
use crate::models::Node;

/// One composable document mutation.
pub trait DocUpdate {
    /// Apply this update on top of the pending transaction.
    ///
    /// Returns the extended transaction, or `None` when the update cannot
    /// apply to the transaction's current `after` snapshot.
    fn apply(&self, tr: Transaction) -> Option<Transaction>;
}

/// Apply an ordered list of updates as one atomic batch.
///
/// Short-circuits and discards all accumulated changes on the first
/// inapplicable update; the caller then simply never dispatches anything.
pub fn compose(updates: &[Box<dyn DocUpdate>], tr: Transaction) -> Option<Transaction> {
    let mut pending = tr;
    for (index, update) in updates.iter().enumerate() {
        match update.apply(pending) {
            Some(next) => pending = next,
            None => {
                tracing::debug!(index, "update batch abandoned: inapplicable update");
                return None;
            }
        }
    }
    Some(pending)
}

/// Merge attributes into one node.
pub struct SetNodeAttributes {
    pub stable_id: String,
    pub attrs: serde_json::Map<String, serde_json::Value>,
}

impl DocUpdate for SetNodeAttributes {
    fn apply(&self, mut tr: Transaction) -> Option<Transaction> {
        tr.apply_step(Step::SetAttrs {
            stable_id: self.stable_id.clone(),
            attrs: self.attrs.clone(),
        })
        .ok()?;
        Some(tr)
    }
}

/// Replace one node's text content.
pub struct ReplaceNodeText {
    pub stable_id: String,
    pub text: String,
}

impl DocUpdate for ReplaceNodeText {
    fn apply(&self, mut tr: Transaction) -> Option<Transaction> {
        tr.apply_step(Step::ReplaceText {
            stable_id: self.stable_id.clone(),
            text: self.text.clone(),
        })
        .ok()?;
        Some(tr)
    }
}

/// Content payload for [`InsertContent`].
pub enum InsertPayload {
    /// Purely inline text with no formatting of its own.
    InlineText(String),
    /// One or more block nodes.
    Blocks(Vec<Node>),
}

/// Insert content at a target node.
///
/// Encodes the edge-case policy for insertion:
///
/// - inline text aimed at a collapsed selection is spliced into the target's
///   text at the caret, preserving whatever formatting marks are active on
///   the selection (the marks live on the selection and are not touched);
/// - block content aimed at an empty, non-code text block replaces that
///   block outright rather than nesting inside it; otherwise the blocks are
///   inserted after the target's top-level block.
pub struct InsertContent {
    pub target: String,
    pub payload: InsertPayload,
}

impl DocUpdate for InsertContent {
    fn apply(&self, mut tr: Transaction) -> Option<Transaction> {
        match &self.payload {
            InsertPayload::InlineText(text) => {
                let node = tr.after().node_by_id(&self.target)?.clone();
                if !node.is_text_node() {
                    return None;
                }
                let offset = match tr.selection() {
                    Some(sel) if sel.node_id == self.target && sel.is_collapsed() => {
                        floor_char_boundary(node.text(), sel.anchor_offset)
                    }
                    _ => node.text().len(),
                };
                let mut combined = String::with_capacity(node.text().len() + text.len());
                combined.push_str(&node.text()[..offset]);
                combined.push_str(text);
                combined.push_str(&node.text()[offset..]);
                tr.apply_step(Step::ReplaceText {
                    stable_id: self.target.clone(),
                    text: combined,
                })
                .ok()?;
                Some(tr)
            }
            InsertPayload::Blocks(blocks) => {
                let block_index = tr.after().block_index_of(&self.target)?;
                let replace_target = tr
                    .after()
                    .blocks()
                    .get(block_index)
                    .is_some_and(|block| {
                        block.stable_id == self.target && block.is_empty_text_block()
                    });
                let (from, to) = if replace_target {
                    (block_index, block_index + 1)
                } else {
                    (block_index + 1, block_index + 1)
                };
                tr.apply_step(Step::ReplaceBlocks {
                    from,
                    to,
                    blocks: blocks.clone(),
                })
                .ok()?;
                Some(tr)
            }
        }
    }
}

/// Largest UTF-8 char boundary at or below `offset`, capped at the text
/// length.
///
/// Selection offsets come from callers tracking their own caret state; one
/// that lands inside a multibyte character must not fault the splice, so it
/// snaps back to the start of that character.
fn floor_char_boundary(text: &str, offset: usize) -> usize {
    if offset >= text.len() {
        return text.len();
    }
    let mut at = offset;
    while !text.is_char_boundary(at) {
        at -= 1;
    }
    at
}

/// Move the selection to a caret position on a target node.
pub struct MoveSelection {
    pub node_id: String,
    pub offset: usize,
}

impl DocUpdate for MoveSelection {
    fn apply(&self, mut tr: Transaction) -> Option<Transaction> {
        // Inapplicable when the target no longer resolves.
        tr.after().resolve_position(&self.node_id)?;
        let active_marks = tr
            .selection()
            .map(|sel| sel.active_marks.clone())
            .unwrap_or_default();
        let mut selection = Selection::caret(self.node_id.clone(), self.offset);
        selection.active_marks = active_marks;
        tr.set_selection(selection);
        Some(tr)
    }
}
