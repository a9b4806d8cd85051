//! Transactions and Step Maps
//!
//! A `Transaction` is an ordered batch of tree edits applied atomically.
//! Each step produces a new immutable snapshot plus a `StepMap`: the
//! position-remapping function for that step together with the raw
//! `[old_start, old_end)` preorder range it touched. The change detector
//! walks these maps after a transaction is applied to find node instances
//! whose stable ids disappeared.
//!
//! All intermediate snapshots are retained on the transaction so per-step
//! diffs (old tree vs. new tree at the mapped range) can be computed after
//! the fact.

use crate::doc::tree::{span, DocTree};
use crate::models::{Node, ValidationError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Errors applying a step to the current snapshot
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Unknown node: {stable_id}")]
    UnknownNode { stable_id: String },

    #[error("Invalid block range {from}..{to} (document has {len} blocks)")]
    InvalidRange { from: usize, to: usize, len: usize },

    #[error("Node {stable_id} does not carry text content")]
    NotATextNode { stable_id: String },

    #[error("Transaction was built against a snapshot that is no longer current")]
    StaleTransaction,

    #[error("Node validation failed: {0}")]
    Validation(#[from] ValidationError),
}

/// One atomic edit step.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Replace the top-level block range `[from, to)` with `blocks`.
    /// Covers insertion (`from == to`) and deletion (`blocks` empty).
    ReplaceBlocks {
        from: usize,
        to: usize,
        blocks: Vec<Node>,
    },
    /// Merge attributes into the node with this stable id.
    SetAttrs {
        stable_id: String,
        attrs: serde_json::Map<String, serde_json::Value>,
    },
    /// Replace the text content of the node with this stable id.
    ReplaceText { stable_id: String, text: String },
}

/// One remapped position range: `[old_start, old_end)` in the pre-step
/// snapshot maps onto `[new_start, new_end)` in the post-step snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedRange {
    pub old_start: usize,
    pub old_end: usize,
    pub new_start: usize,
    pub new_end: usize,
}

/// Position-remapping function for one step, plus the raw old range it
/// touched.
#[derive(Debug, Clone, PartialEq)]
pub struct StepMap {
    ranges: Vec<MappedRange>,
}

impl StepMap {
    fn single(range: MappedRange) -> Self {
        Self {
            ranges: vec![range],
        }
    }

    /// Map a pre-step position to its post-step equivalent.
    ///
    /// Positions inside a replaced range collapse to the start of the
    /// replacement.
    pub fn map_pos(&self, pos: usize) -> usize {
        let mut mapped = pos as isize;
        for range in &self.ranges {
            if pos >= range.old_end {
                let shift = (range.new_end as isize - range.new_start as isize)
                    - (range.old_end as isize - range.old_start as isize);
                mapped += shift;
            } else if pos >= range.old_start {
                return range.new_start;
            }
        }
        mapped.max(0) as usize
    }

    /// Visit each remapped range in order.
    pub fn for_each_mapped_range(&self, mut f: impl FnMut(&MappedRange)) {
        for range in &self.ranges {
            f(range);
        }
    }

    /// The raw `[old_start, old_end)` preorder range this step touched.
    pub fn old_range(&self) -> (usize, usize) {
        let start = self.ranges.iter().map(|r| r.old_start).min().unwrap_or(0);
        let end = self.ranges.iter().map(|r| r.old_end).max().unwrap_or(0);
        (start, end)
    }
}

/// Editing selection carried on a transaction.
///
/// Collapsed when `anchor_offset == head_offset`. `active_marks` records the
/// formatting marks active at the caret, which plain-text insertion must
/// preserve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub node_id: String,
    pub anchor_offset: usize,
    pub head_offset: usize,
    #[serde(default)]
    pub active_marks: Vec<String>,
}

impl Selection {
    pub fn caret(node_id: impl Into<String>, offset: usize) -> Self {
        Self {
            node_id: node_id.into(),
            anchor_offset: offset,
            head_offset: offset,
            active_marks: Vec::new(),
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor_offset == self.head_offset
    }
}

/// An ordered batch of steps applied against one starting snapshot.
#[derive(Debug, Clone)]
pub struct Transaction {
    /// Snapshot chain: `docs[0]` is the tree before the transaction,
    /// `docs[i + 1]` is the tree after step `i`.
    docs: Vec<Arc<DocTree>>,
    steps: Vec<Step>,
    maps: Vec<StepMap>,
    selection: Option<Selection>,
}

impl Transaction {
    /// Start an empty transaction against the given snapshot.
    pub fn new(tree: Arc<DocTree>) -> Self {
        Self {
            docs: vec![tree],
            steps: Vec::new(),
            maps: Vec::new(),
            selection: None,
        }
    }

    /// The snapshot before any step was applied.
    pub fn before(&self) -> &Arc<DocTree> {
        &self.docs[0]
    }

    /// The snapshot after all steps applied so far.
    pub fn after(&self) -> &Arc<DocTree> {
        self.docs.last().expect("transaction always has a snapshot")
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step_maps(&self) -> &[StepMap] {
        &self.maps
    }

    /// Snapshot the given step was applied against.
    pub fn doc_before_step(&self, index: usize) -> &Arc<DocTree> {
        &self.docs[index]
    }

    /// Snapshot produced by the given step.
    pub fn doc_after_step(&self, index: usize) -> &Arc<DocTree> {
        &self.docs[index + 1]
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = Some(selection);
    }

    /// Whether any step changed the document.
    pub fn doc_changed(&self) -> bool {
        !self.steps.is_empty()
    }

    /// Apply one step against the current snapshot, appending its step map.
    pub fn apply_step(&mut self, step: Step) -> Result<(), TransactionError> {
        let current = self.after().clone();
        let (next, map) = apply_step_to(&current, &step)?;
        self.docs.push(Arc::new(next));
        self.maps.push(map);
        self.steps.push(step);
        Ok(())
    }
}

fn apply_step_to(tree: &DocTree, step: &Step) -> Result<(DocTree, StepMap), TransactionError> {
    match step {
        Step::ReplaceBlocks { from, to, blocks } => {
            let len = tree.blocks().len();
            if from > to || *to > len {
                return Err(TransactionError::InvalidRange {
                    from: *from,
                    to: *to,
                    len,
                });
            }
            let old_start = tree.block_start(*from);
            let old_end = tree.block_start(*to);
            let new_span: usize = blocks.iter().map(span).sum();

            let mut next_blocks = tree.blocks().to_vec();
            next_blocks.splice(from..to, blocks.iter().cloned());
            let next = DocTree::new(next_blocks)?;

            let map = StepMap::single(MappedRange {
                old_start,
                old_end,
                new_start: old_start,
                new_end: old_start + new_span,
            });
            Ok((next, map))
        }
        Step::SetAttrs { stable_id, attrs } => {
            let touched = touched_range(tree, stable_id)?;
            let next = replace_node(tree, stable_id, |node| node.with_attrs_merged(attrs))?;
            Ok((next, StepMap::single(touched)))
        }
        Step::ReplaceText { stable_id, text } => {
            let node = tree
                .node_by_id(stable_id)
                .ok_or_else(|| TransactionError::UnknownNode {
                    stable_id: stable_id.clone(),
                })?;
            if !node.is_text_node() {
                return Err(TransactionError::NotATextNode {
                    stable_id: stable_id.clone(),
                });
            }
            let touched = touched_range(tree, stable_id)?;
            let next = replace_node(tree, stable_id, |node| node.with_text(text.clone()))?;
            Ok((next, StepMap::single(touched)))
        }
    }
}

/// Identity-mapped range covering the node's subtree. Attribute and text
/// steps never change spans, so old and new ranges coincide.
fn touched_range(tree: &DocTree, stable_id: &str) -> Result<MappedRange, TransactionError> {
    let pos = tree
        .resolve_position(stable_id)
        .ok_or_else(|| TransactionError::UnknownNode {
            stable_id: stable_id.to_string(),
        })?;
    let node = tree
        .node_by_id(stable_id)
        .ok_or_else(|| TransactionError::UnknownNode {
            stable_id: stable_id.to_string(),
        })?;
    let start = pos.index();
    let end = start + span(node);
    Ok(MappedRange {
        old_start: start,
        old_end: end,
        new_start: start,
        new_end: end,
    })
}

fn replace_node(
    tree: &DocTree,
    stable_id: &str,
    rebuild: impl Fn(&Node) -> Node + Copy,
) -> Result<DocTree, TransactionError> {
    fn walk(nodes: &[Node], stable_id: &str, rebuild: &impl Fn(&Node) -> Node) -> Option<Vec<Node>> {
        let hit = nodes.iter().position(|node| {
            node.stable_id == stable_id
                || walk_contains(node.children(), stable_id)
        })?;
        let mut out = nodes.to_vec();
        if out[hit].stable_id == stable_id {
            out[hit] = rebuild(&out[hit]);
        } else {
            let children = walk(out[hit].children(), stable_id, rebuild)?;
            out[hit] = Node {
                content: crate::models::NodeContent::Children(children),
                ..out[hit].clone()
            };
        }
        Some(out)
    }

    fn walk_contains(nodes: &[Node], stable_id: &str) -> bool {
        nodes.iter().any(|node| {
            node.stable_id == stable_id || walk_contains(node.children(), stable_id)
        })
    }

    let blocks =
        walk(tree.blocks(), stable_id, &rebuild).ok_or_else(|| TransactionError::UnknownNode {
            stable_id: stable_id.to_string(),
        })?;
    Ok(DocTree::new(blocks)?)
}
