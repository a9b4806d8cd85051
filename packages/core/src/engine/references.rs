//! Reference Dependency Resolver
//!
//! Decides whether a reference-bearing node's cached output is stale
//! relative to the current content of the nodes it references. References
//! are declared as a pair of positionally-matched arrays on the node:
//! `references` (stable ids) and `referenceHashes` (the content digest
//! observed for each reference when the output was produced).
//!
//! Staleness is never an error: a deleted dependency simply makes the node
//! dirty, and its human-facing label resolves to a removal sentinel.

use crate::doc::DocTree;
use crate::engine::storage::EditorRuntime;
use crate::models::{Node, NodeType};
use crate::utils::EMPTY_CONTENT_HASH;

/// Label shown for a reference whose target no longer resolves.
pub const REMOVED_REFERENCE_LABEL: &str = "Ref (removed)";

/// Whether the node's cached output is stale.
///
/// Dirty when:
/// 1. the `references` and `referenceHashes` arrays disagree in length
///    (a reference was added or removed);
/// 2. any referenced node no longer resolves through its type-scoped
///    storage (the dependency was deleted);
/// 3. any referenced node's freshly computed content digest differs from
///    the cached one.
///
/// Short-circuits on the first dirty finding, in references-array order.
/// Empty content hashes to a designated sentinel, so "empty vs. empty"
/// never spuriously registers as changed.
pub fn is_async_node_dirty(node: &Node, runtime: &EditorRuntime, tree: &DocTree) -> bool {
    let references = node.references();
    let cached_hashes = node.reference_hashes();

    if references.len() != cached_hashes.len() {
        return true;
    }
    if references.is_empty() {
        return false;
    }

    let Some(target_type) = reference_target_type(runtime, node.node_type) else {
        // References declared but no target type registered: nothing can
        // resolve them, so the cache cannot be trusted.
        return true;
    };

    for (ref_id, cached_hash) in references.iter().zip(cached_hashes.iter()) {
        if runtime.controller(target_type, ref_id).is_none() {
            tracing::debug!(stable_id = %node.stable_id, ref_id, "reference unresolved; dirty");
            return true;
        }
        let current_hash = hash_reference(runtime, tree, target_type, ref_id);
        if current_hash.as_deref() != Some(cached_hash.as_str()) {
            tracing::debug!(stable_id = %node.stable_id, ref_id, "reference content changed; dirty");
            return true;
        }
    }
    false
}

/// Current content digests for every reference the node declares, in
/// references-array order.
///
/// The execution engine snapshots these *before* awaiting a computation so
/// the write-back records pre-call dependency state, not state mutated
/// mid-flight. Unresolvable references snapshot as the empty sentinel.
pub fn snapshot_reference_hashes(node: &Node, runtime: &EditorRuntime, tree: &DocTree) -> Vec<String> {
    let Some(target_type) = reference_target_type(runtime, node.node_type) else {
        return node
            .references()
            .iter()
            .map(|_| EMPTY_CONTENT_HASH.to_string())
            .collect();
    };
    node.references()
        .iter()
        .map(|ref_id| {
            hash_reference(runtime, tree, target_type, ref_id)
                .unwrap_or_else(|| EMPTY_CONTENT_HASH.to_string())
        })
        .collect()
}

/// Human-facing short label for one reference.
///
/// A pure lookup against the type-scoped storage: resolvable references
/// label as "Ref N" (1-based), removed ones as the removal sentinel. Never
/// fails.
pub fn reference_label(
    runtime: &EditorRuntime,
    target_type: NodeType,
    ref_id: &str,
    ordinal: usize,
) -> String {
    if runtime.controller(target_type, ref_id).is_some() {
        format!("Ref {ordinal}")
    } else {
        REMOVED_REFERENCE_LABEL.to_string()
    }
}

fn reference_target_type(runtime: &EditorRuntime, node_type: NodeType) -> Option<NodeType> {
    runtime
        .behaviors()
        .get(node_type)
        .and_then(|behavior| behavior.reference_target_type())
}

fn hash_reference(
    runtime: &EditorRuntime,
    tree: &DocTree,
    target_type: NodeType,
    ref_id: &str,
) -> Option<String> {
    let referenced = tree.node_of_type(ref_id, target_type)?;
    let behavior = runtime.behaviors().get(target_type)?;
    Some(behavior.content_hash(referenced))
}
