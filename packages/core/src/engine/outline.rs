//! Outline Synchronizer
//!
//! Maintains the derived heading outline without re-scanning the whole
//! document on every keystroke. The split is the general pattern this
//! component exists for: patch the derived structure in place when the
//! change provably cannot affect it structurally, and fall back to a full
//! recompute on any structural ambiguity.
//!
//! Indentation is a dense ranking over the *set* of distinct levels
//! present, so a single heading's level change (or removal) can shift the
//! indentation of every other item; those changes always recompute.

use crate::doc::{DocTree, Transaction};
use crate::models::{Node, NodeType, Outline, OutlineItem};
use std::collections::BTreeSet;

/// One heading affected by the latest edit.
#[derive(Debug, Clone)]
pub struct HeadingChange {
    pub node: Node,
    pub removed: bool,
}

/// Full scan: collect headings in document order and compute the dense
/// indentation mapping. O(n) in document size.
pub fn create_outline(tree: &DocTree) -> Outline {
    let headings = tree.headings();
    let levels: BTreeSet<i64> = headings
        .iter()
        .filter_map(|node| node.heading_level())
        .collect();
    let rank = |level: Option<i64>| -> usize {
        level
            .and_then(|l| levels.iter().position(|known| *known == l))
            .unwrap_or(0)
    };

    Outline {
        items: headings
            .iter()
            .map(|node| OutlineItem {
                id: node.stable_id.clone(),
                label: node.text().to_string(),
                level: node.heading_level(),
                indentation: rank(node.heading_level()),
            })
            .collect(),
    }
}

/// Incrementally maintain an outline against a batch of heading diffs.
///
/// Content-only edits patch the matching item's label in place. A removal,
/// an unknown stable id (a new heading), or a level change contaminates the
/// dense indentation mapping, so the incremental result is discarded and
/// the outline recomputed from scratch.
pub fn update_outline(tree: &DocTree, mut outline: Outline, changes: &[HeadingChange]) -> Outline {
    for change in changes {
        if change.removed {
            tracing::debug!(id = %change.node.stable_id, "heading removed; outline recompute");
            return create_outline(tree);
        }
        let Some(item) = outline
            .items
            .iter_mut()
            .find(|item| item.id == change.node.stable_id)
        else {
            tracing::debug!(id = %change.node.stable_id, "heading unknown to outline; recompute");
            return create_outline(tree);
        };
        if item.level != change.node.heading_level() {
            tracing::debug!(id = %change.node.stable_id, "heading level changed; recompute");
            return create_outline(tree);
        }
        // Content-only edit: safe to patch just the label.
        item.label = change.node.text().to_string();
    }
    outline
}

/// Derive per-heading diffs from an applied transaction.
///
/// Compares the before/after snapshots by stable id: vanished headings are
/// removals; new headings and headings whose text or level differs are
/// changes.
pub fn heading_changes(tr: &Transaction) -> Vec<HeadingChange> {
    let before = tr.before();
    let after = tr.after();
    let mut changes = Vec::new();

    for old in before.headings() {
        match after.node_of_type(&old.stable_id, NodeType::Heading) {
            None => changes.push(HeadingChange {
                node: old.clone(),
                removed: true,
            }),
            Some(new) => {
                if new.text() != old.text() || new.heading_level() != old.heading_level() {
                    changes.push(HeadingChange {
                        node: new.clone(),
                        removed: false,
                    });
                }
            }
        }
    }
    for new in after.headings() {
        if before.node_of_type(&new.stable_id, NodeType::Heading).is_none() {
            changes.push(HeadingChange {
                node: new.clone(),
                removed: false,
            });
        }
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn heading(id: &str, label: &str, level: i64) -> Node {
        Node::new_with_id(id, NodeType::Heading, label, json!({ "level": level }))
    }

    fn tree_with_levels(levels: &[i64]) -> DocTree {
        let blocks = levels
            .iter()
            .enumerate()
            .map(|(i, level)| heading(&format!("h-{i}"), &format!("Heading {i}"), *level))
            .collect();
        DocTree::new(blocks).unwrap()
    }

    #[test]
    fn test_indentation_is_dense_rank_of_distinct_levels() {
        let tree = tree_with_levels(&[2, 3, 1, 3, 4, 1]);
        let outline = create_outline(&tree);
        let indentations: Vec<usize> = outline.items.iter().map(|i| i.indentation).collect();
        assert_eq!(indentations, vec![1, 2, 0, 2, 3, 0]);
    }

    #[test]
    fn test_create_outline_preserves_document_order() {
        let tree = tree_with_levels(&[1, 2, 3]);
        let outline = create_outline(&tree);
        let ids: Vec<&str> = outline.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["h-0", "h-1", "h-2"]);
    }

    #[test]
    fn test_label_edit_patches_in_place() {
        let tree_before = tree_with_levels(&[1, 2]);
        let outline = create_outline(&tree_before);
        let untouched = outline.items[1].clone();

        // Same id and level, new text.
        let edited = heading("h-0", "Renamed", 1);
        let tree_after = DocTree::new(vec![edited.clone(), heading("h-1", "Heading 1", 2)]).unwrap();

        let updated = update_outline(
            &tree_after,
            outline,
            &[HeadingChange {
                node: edited,
                removed: false,
            }],
        );
        assert_eq!(updated.items[0].label, "Renamed");
        assert_eq!(updated.items[0].indentation, 0);
        // Patch path: the unaffected item is byte-identical.
        assert_eq!(updated.items[1], untouched);
    }

    #[test]
    fn test_level_change_triggers_recompute() {
        let tree_before = tree_with_levels(&[1, 2, 3]);
        let outline = create_outline(&tree_before);

        // h-0 moves from level 1 to level 5: every rank can shift.
        let tree_after = DocTree::new(vec![
            heading("h-0", "Heading 0", 5),
            heading("h-1", "Heading 1", 2),
            heading("h-2", "Heading 2", 3),
        ])
        .unwrap();

        let updated = update_outline(
            &tree_after,
            outline,
            &[HeadingChange {
                node: heading("h-0", "Heading 0", 5),
                removed: false,
            }],
        );
        let indentations: Vec<usize> = updated.items.iter().map(|i| i.indentation).collect();
        // Distinct levels now {2, 3, 5}: ranks 0, 1, 2.
        assert_eq!(indentations, vec![2, 0, 1]);
    }

    #[test]
    fn test_removal_triggers_recompute() {
        let tree_before = tree_with_levels(&[2, 3, 4]);
        let outline = create_outline(&tree_before);

        // Removing the level-2 heading promotes everything.
        let tree_after = DocTree::new(vec![
            heading("h-1", "Heading 1", 3),
            heading("h-2", "Heading 2", 4),
        ])
        .unwrap();

        let updated = update_outline(
            &tree_after,
            outline,
            &[HeadingChange {
                node: heading("h-0", "Heading 0", 2),
                removed: true,
            }],
        );
        assert_eq!(updated.len(), 2);
        let indentations: Vec<usize> = updated.items.iter().map(|i| i.indentation).collect();
        assert_eq!(indentations, vec![0, 1]);
    }

    #[test]
    fn test_unknown_heading_triggers_recompute() {
        let tree_before = tree_with_levels(&[1]);
        let outline = create_outline(&tree_before);

        let new_heading = heading("h-new", "Fresh", 2);
        let tree_after =
            DocTree::new(vec![heading("h-0", "Heading 0", 1), new_heading.clone()]).unwrap();

        let updated = update_outline(
            &tree_after,
            outline,
            &[HeadingChange {
                node: new_heading,
                removed: false,
            }],
        );
        assert_eq!(updated.len(), 2);
        assert!(updated.item("h-new").is_some());
    }

    #[test]
    fn test_heading_changes_classifies_edits() {
        use crate::doc::{Step, Transaction};
        use std::sync::Arc;

        let tree = Arc::new(tree_with_levels(&[1, 2]));
        let mut tr = Transaction::new(tree);
        tr.apply_step(Step::ReplaceText {
            stable_id: "h-0".to_string(),
            text: "Edited".to_string(),
        })
        .unwrap();
        tr.apply_step(Step::ReplaceBlocks {
            from: 1,
            to: 2,
            blocks: vec![],
        })
        .unwrap();

        let changes = heading_changes(&tr);
        assert_eq!(changes.len(), 2);
        assert!(changes
            .iter()
            .any(|c| c.node.stable_id == "h-0" && !c.removed));
        assert!(changes
            .iter()
            .any(|c| c.node.stable_id == "h-1" && c.removed));
    }
}
