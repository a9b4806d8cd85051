//! Immutable Tree Snapshots and Position Resolution
//!
//! A `DocTree` is one immutable snapshot of the document: an ordered list of
//! top-level blocks, each of which may nest children. Nodes are addressed
//! two ways:
//!
//! - by **stable id**, which survives any structural edit, and
//! - by **position**, a preorder index into the linearized snapshot, which
//!   is only meaningful against that exact snapshot.
//!
//! `Position<'tree>` borrows the snapshot it was resolved against, so the
//! type system rejects caching a position across a mutation: once a new
//! snapshot replaces the old one, old positions no longer compile. Every
//! component that needs a position resolves it fresh via
//! [`DocTree::resolve_position`].

use crate::models::{Node, NodeType, ValidationError};
use std::collections::HashSet;
use std::marker::PhantomData;

/// A preorder index into one linearized tree snapshot.
///
/// Valid only with respect to the snapshot it borrows; never persisted
/// across mutations without re-resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position<'tree> {
    index: usize,
    _snapshot: PhantomData<&'tree DocTree>,
}

impl Position<'_> {
    pub fn index(&self) -> usize {
        self.index
    }
}

/// One immutable snapshot of the document tree.
#[derive(Debug, Clone, PartialEq)]
pub struct DocTree {
    blocks: Vec<Node>,
}

impl DocTree {
    /// Build a snapshot, validating node invariants and stable-id
    /// uniqueness per type.
    pub fn new(blocks: Vec<Node>) -> Result<Self, ValidationError> {
        let tree = Self { blocks };
        tree.validate()?;
        Ok(tree)
    }

    /// An empty document.
    pub fn empty() -> Self {
        Self { blocks: Vec::new() }
    }

    pub fn blocks(&self) -> &[Node] {
        &self.blocks
    }

    /// Total number of positions in the linearized snapshot.
    pub fn size(&self) -> usize {
        self.blocks.iter().map(span).sum()
    }

    /// Map a stable id to its current position in this snapshot.
    ///
    /// Resolution is a fresh scan every call; `None` means the node is not
    /// part of this snapshot, which is an expected condition under
    /// concurrent edits, never an error.
    pub fn resolve_position(&self, stable_id: &str) -> Option<Position<'_>> {
        self.preorder()
            .find(|(_, node)| node.stable_id == stable_id)
            .map(|(index, _)| Position {
                index,
                _snapshot: PhantomData,
            })
    }

    /// Look up a node anywhere in the snapshot by stable id.
    pub fn node_by_id(&self, stable_id: &str) -> Option<&Node> {
        self.preorder()
            .map(|(_, node)| node)
            .find(|node| node.stable_id == stable_id)
    }

    /// Type-scoped lookup: stable ids are only unique per type, so
    /// lifecycle components always qualify lookups with the expected tag.
    pub fn node_of_type(&self, stable_id: &str, node_type: NodeType) -> Option<&Node> {
        self.preorder()
            .map(|(_, node)| node)
            .find(|node| node.stable_id == stable_id && node.node_type == node_type)
    }

    /// Type-scoped position resolution.
    pub fn resolve_position_of(
        &self,
        stable_id: &str,
        node_type: NodeType,
    ) -> Option<Position<'_>> {
        self.preorder()
            .find(|(_, node)| node.stable_id == stable_id && node.node_type == node_type)
            .map(|(index, _)| Position {
                index,
                _snapshot: PhantomData,
            })
    }

    /// The node at a preorder position, if in range.
    pub fn node_at(&self, index: usize) -> Option<&Node> {
        self.preorder()
            .find(|(position, _)| *position == index)
            .map(|(_, node)| node)
    }

    /// All nodes whose preorder position falls within `[start, end)`.
    pub fn nodes_in_range(&self, start: usize, end: usize) -> Vec<&Node> {
        self.preorder()
            .filter(|(position, _)| *position >= start && *position < end)
            .map(|(_, node)| node)
            .collect()
    }

    /// All heading nodes in document order.
    pub fn headings(&self) -> Vec<&Node> {
        self.preorder()
            .map(|(_, node)| node)
            .filter(|node| node.node_type == NodeType::Heading)
            .collect()
    }

    /// Whether any node in the snapshot carries this stable id.
    pub fn contains_id(&self, stable_id: &str) -> bool {
        self.node_by_id(stable_id).is_some()
    }

    /// Index into `blocks` of the top-level block that contains the node
    /// with this stable id (the block itself or a descendant).
    pub fn block_index_of(&self, stable_id: &str) -> Option<usize> {
        self.blocks
            .iter()
            .position(|block| subtree_contains(block, stable_id))
    }

    /// Preorder position at which block `index` starts.
    ///
    /// `index == blocks.len()` yields the end-of-document position.
    pub fn block_start(&self, index: usize) -> usize {
        self.blocks[..index].iter().map(span).sum()
    }

    /// Depth-first preorder walk yielding `(position, node)` pairs.
    pub fn preorder(&self) -> impl Iterator<Item = (usize, &Node)> {
        let mut out = Vec::new();
        let mut next = 0usize;
        for block in &self.blocks {
            collect_preorder(block, &mut next, &mut out);
        }
        out.into_iter()
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let mut seen: HashSet<(NodeType, &str)> = HashSet::new();
        for (_, node) in self.preorder() {
            if !seen.insert((node.node_type, node.stable_id.as_str())) {
                return Err(ValidationError::DuplicateStableId(node.stable_id.clone()));
            }
        }
        for block in &self.blocks {
            block.validate()?;
        }
        Ok(())
    }
}

/// Number of preorder positions a subtree occupies.
pub fn span(node: &Node) -> usize {
    1 + node.children().iter().map(span).sum::<usize>()
}

fn subtree_contains(node: &Node, stable_id: &str) -> bool {
    node.stable_id == stable_id
        || node
            .children()
            .iter()
            .any(|child| subtree_contains(child, stable_id))
}

fn collect_preorder<'a>(node: &'a Node, next: &mut usize, out: &mut Vec<(usize, &'a Node)>) {
    out.push((*next, node));
    *next += 1;
    for child in node.children() {
        collect_preorder(child, next, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NodeType;
    use serde_json::json;

    fn sample_tree() -> DocTree {
        let list = Node::new_container(
            NodeType::BulletList,
            vec![
                Node::new_with_id("item-1", NodeType::Paragraph, "first", json!({})),
                Node::new_with_id("item-2", NodeType::Paragraph, "second", json!({})),
            ],
            json!({}),
        );
        DocTree::new(vec![
            Node::new_with_id("h-1", NodeType::Heading, "Title", json!({ "level": 1 })),
            list,
            Node::new_with_id("code-1", NodeType::CodeBlock, "x = 1", json!({})),
        ])
        .unwrap()
    }

    #[test]
    fn test_preorder_positions_cover_nested_children() {
        let tree = sample_tree();
        assert_eq!(tree.size(), 5);
        assert_eq!(tree.resolve_position("h-1").unwrap().index(), 0);
        assert_eq!(tree.resolve_position("item-1").unwrap().index(), 2);
        assert_eq!(tree.resolve_position("item-2").unwrap().index(), 3);
        assert_eq!(tree.resolve_position("code-1").unwrap().index(), 4);
    }

    #[test]
    fn test_resolve_position_missing_id_is_none() {
        let tree = sample_tree();
        assert!(tree.resolve_position("no-such-node").is_none());
    }

    #[test]
    fn test_nodes_in_range_is_half_open() {
        let tree = sample_tree();
        let ids: Vec<_> = tree
            .nodes_in_range(2, 4)
            .iter()
            .map(|node| node.stable_id.as_str())
            .collect();
        assert_eq!(ids, vec!["item-1", "item-2"]);
    }

    #[test]
    fn test_block_index_of_finds_containing_block() {
        let tree = sample_tree();
        assert_eq!(tree.block_index_of("item-2"), Some(1));
        assert_eq!(tree.block_index_of("code-1"), Some(2));
        assert_eq!(tree.block_start(2), 4);
        assert_eq!(tree.block_start(3), 5);
    }

    #[test]
    fn test_duplicate_stable_id_rejected() {
        let result = DocTree::new(vec![
            Node::new_with_id("dup", NodeType::Paragraph, "a", json!({})),
            Node::new_with_id("dup", NodeType::Paragraph, "b", json!({})),
        ]);
        assert!(matches!(result, Err(ValidationError::DuplicateStableId(_))));
    }

    #[test]
    fn test_same_id_different_types_allowed() {
        // Lookups are type-scoped at the storage layer; the tree only
        // enforces uniqueness per type.
        let result = DocTree::new(vec![
            Node::new_with_id("shared", NodeType::Heading, "a", json!({ "level": 1 })),
            Node::new_with_id("shared", NodeType::CodeBlock, "b", json!({})),
        ]);
        assert!(result.is_ok());
    }
}
