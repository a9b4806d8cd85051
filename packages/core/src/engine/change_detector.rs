//! Transaction Change Detector
//!
//! After a transaction is applied, this pass determines which stable-id
//! node instances of the lifecycle-managed types were removed, and
//! unregisters their controllers from storage.
//!
//! # Accumulation across step maps
//!
//! Compound edits routinely remove and re-insert the same node: drag-and-
//! drop is move-by-delete-then-insert internally. Short-circuiting after
//! the first step map would therefore report false-positive removals.
//! Instead, removal *candidates* accumulate across every step map in
//! order, and each candidate is confirmed against the final post-edit
//! tree: a stable id still present anywhere was moved, not removed.
//!
//! Only node types whose behavior registers `requires_lifecycle_cleanup`
//! are scanned; everything else is skipped for efficiency.

use crate::doc::Transaction;
use crate::engine::storage::EditorRuntime;
use crate::models::NodeType;
use std::collections::HashSet;

/// Stable identities (type-scoped) removed by a transaction.
pub fn removed_nodes(tr: &Transaction, runtime: &EditorRuntime) -> HashSet<(NodeType, String)> {
    let watched = runtime.behaviors().cleanup_types();
    if watched.is_empty() {
        return HashSet::new();
    }

    let mut candidates: HashSet<(NodeType, String)> = HashSet::new();

    for (index, map) in tr.step_maps().iter().enumerate() {
        let old_tree = tr.doc_before_step(index);
        let new_tree = tr.doc_after_step(index);

        let (old_start, old_end) = map.old_range();
        let old_set: HashSet<(NodeType, String)> = old_tree
            .nodes_in_range(old_start, old_end)
            .into_iter()
            .filter(|node| watched.contains(&node.node_type))
            .map(|node| (node.node_type, node.stable_id.clone()))
            .collect();

        let mut new_set: HashSet<(NodeType, String)> = HashSet::new();
        map.for_each_mapped_range(|range| {
            for node in new_tree.nodes_in_range(range.new_start, range.new_end) {
                if watched.contains(&node.node_type) {
                    new_set.insert((node.node_type, node.stable_id.clone()));
                }
            }
        });

        candidates.extend(old_set.difference(&new_set).cloned());
    }

    // Confirm against the final tree: an id that persists anywhere in the
    // post-edit snapshot was moved within the edit, not removed.
    let final_tree = tr.after();
    candidates
        .into_iter()
        .filter(|(node_type, stable_id)| final_tree.node_of_type(stable_id, *node_type).is_none())
        .collect()
}

/// Unregister controllers for every node the transaction removed.
///
/// Returns the number of controllers pruned. Runs before any dirty
/// re-evaluation in the tick, so the reference resolver never sees a
/// dangling controller as "present".
pub fn prune_removed(tr: &Transaction, runtime: &EditorRuntime) -> usize {
    let removed = removed_nodes(tr, runtime);
    let count = removed.len();
    for (node_type, stable_id) in removed {
        if let Some(storage) = runtime.storage(node_type) {
            storage.remove_node_view(&stable_id);
        }
    }
    if count > 0 {
        tracing::debug!(count, "pruned controllers for removed nodes");
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behaviors::NodeBehaviorRegistry;
    use crate::doc::{DocTree, Step, Transaction};
    use crate::engine::async_node::NullExecutor;
    use crate::engine::controller::{BufferedView, NodeController};
    use crate::models::Node;
    use serde_json::json;
    use std::sync::Arc;

    fn runtime() -> EditorRuntime {
        EditorRuntime::new(NodeBehaviorRegistry::standard(Arc::new(NullExecutor)))
    }

    fn register(runtime: &EditorRuntime, id: &str, tag: NodeType) {
        runtime.storage(tag).unwrap().add_node_view(
            id,
            NodeController::new(id, tag, Box::new(BufferedView::new()), false),
        );
    }

    fn base_tree() -> Arc<DocTree> {
        Arc::new(
            DocTree::new(vec![
                Node::new_with_id("h-1", NodeType::Heading, "One", json!({ "level": 1 })),
                Node::new_with_id("p-1", NodeType::Paragraph, "prose", json!({})),
                Node::new_with_id("code-1", NodeType::CodeBlock, "x = 1", json!({})),
            ])
            .unwrap(),
        )
    }

    #[test]
    fn test_deletion_reports_watched_types_only() {
        let runtime = runtime();
        let mut tr = Transaction::new(base_tree());
        // Delete everything.
        tr.apply_step(Step::ReplaceBlocks {
            from: 0,
            to: 3,
            blocks: vec![],
        })
        .unwrap();

        let removed = removed_nodes(&tr, &runtime);
        assert!(removed.contains(&(NodeType::Heading, "h-1".to_string())));
        assert!(removed.contains(&(NodeType::CodeBlock, "code-1".to_string())));
        // Paragraphs are not lifecycle-managed.
        assert!(!removed
            .iter()
            .any(|(_, id)| id == "p-1"));
    }

    #[test]
    fn test_move_by_delete_then_insert_is_not_a_removal() {
        let runtime = runtime();
        let tree = base_tree();
        let heading = tree.node_by_id("h-1").unwrap().clone();

        let mut tr = Transaction::new(tree);
        // Drag-and-drop: delete the heading, then re-insert it at the end.
        tr.apply_step(Step::ReplaceBlocks {
            from: 0,
            to: 1,
            blocks: vec![],
        })
        .unwrap();
        tr.apply_step(Step::ReplaceBlocks {
            from: 2,
            to: 2,
            blocks: vec![heading],
        })
        .unwrap();

        let removed = removed_nodes(&tr, &runtime);
        assert!(
            removed.is_empty(),
            "a moved stable id must not count as removed, got {removed:?}"
        );
    }

    #[test]
    fn test_replacement_within_range_keeps_surviving_ids() {
        let runtime = runtime();
        let mut tr = Transaction::new(base_tree());
        // Replace the code block with a different one.
        tr.apply_step(Step::ReplaceBlocks {
            from: 2,
            to: 3,
            blocks: vec![Node::new_with_id(
                "code-2",
                NodeType::CodeBlock,
                "y = 2",
                json!({}),
            )],
        })
        .unwrap();

        let removed = removed_nodes(&tr, &runtime);
        assert_eq!(removed.len(), 1);
        assert!(removed.contains(&(NodeType::CodeBlock, "code-1".to_string())));
    }

    #[test]
    fn test_prune_removes_controllers_and_tolerates_absent_ones() {
        let runtime = runtime();
        register(&runtime, "h-1", NodeType::Heading);
        // code-1 intentionally has no controller: prune must not fail.

        let mut tr = Transaction::new(base_tree());
        tr.apply_step(Step::ReplaceBlocks {
            from: 0,
            to: 3,
            blocks: vec![],
        })
        .unwrap();

        let pruned = prune_removed(&tr, &runtime);
        assert_eq!(pruned, 2);
        assert!(runtime.controller(NodeType::Heading, "h-1").is_none());
    }

    #[test]
    fn test_attr_only_step_removes_nothing() {
        let runtime = runtime();
        let mut tr = Transaction::new(base_tree());
        let mut attrs = serde_json::Map::new();
        attrs.insert("level".to_string(), json!(2));
        tr.apply_step(Step::SetAttrs {
            stable_id: "h-1".to_string(),
            attrs,
        })
        .unwrap();

        assert!(removed_nodes(&tr, &runtime).is_empty());
    }
}
