//! Async Node Execution Engine
//!
//! Extends the controller triad for nodes whose content is produced by a
//! computation (executing a code block, fetching a remote result). Each
//! node runs a small state machine: `Idle → Running → (Success|Failed) →
//! Idle`, with a hard at-most-one-concurrent-execution-per-node invariant
//! enforced by the `performing_async_operation` guard.
//!
//! # Suspension and staleness
//!
//! The await inside [`execute_async_call`] is the engine's only suspension
//! point; arbitrary transactions (local or remote-collaborator-originated)
//! may land while a computation is in flight. Every re-entry after the
//! await therefore re-validates: the node must still resolve with the
//! expected type, and its incarnation counter must match the value captured
//! before the await. Cancellation is cooperative and implicit: a stale
//! result is simply discarded ("view not updated"), never an error.
//!
//! Dependency hashes are snapshotted *before* the await so the write-back
//! records pre-call dependency state, not state mutated mid-flight.
//!
//! Domain errors from the executor propagate to the caller, who owns
//! user-facing reporting; the engine's own finally-equivalent guarantees
//! the guard flag is reset and the view refreshed on every exit path, so
//! no loading state can get permanently stuck.

use crate::doc::{compose, DocHost, DocUpdate, SetNodeAttributes, Transaction, TransactionError};
use crate::engine::controller::NodeController;
use crate::engine::references::snapshot_reference_hashes;
use crate::engine::storage::EditorRuntime;
use crate::models::{attr, NodeType};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

/// Engine-level errors.
///
/// Stale references and vanished nodes are *not* errors (they surface as
/// dirty flags or discarded results); this enum covers genuine failures.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The node's computation itself failed. Propagated to the caller for
    /// user-facing reporting; the engine has already cleaned up.
    #[error("Async execution failed for node {stable_id}: {source}")]
    Execution {
        stable_id: String,
        #[source]
        source: anyhow::Error,
    },

    /// The node's type has no registered executor.
    #[error("No executor registered for node type {0:?}")]
    NoExecutor(NodeType),

    /// Writing the result back to the tree failed.
    #[error("Result write-back failed: {0}")]
    Transaction(#[from] TransactionError),
}

/// Content of one resolved dependency, as seen before the computation
/// started.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferencedContent {
    pub stable_id: String,
    pub text: String,
}

/// Everything a computation gets to see.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionInput {
    pub stable_id: String,
    /// The async node's own source text.
    pub text: String,
    /// Resolved dependency contents, in references-array order.
    pub references: Vec<ReferencedContent>,
}

/// The subclass-specific computation for an async node type.
#[async_trait]
pub trait AsyncNodeExecutor: Send + Sync {
    /// Produce the node's computed output.
    ///
    /// Domain errors are returned as-is; the engine never catches or
    /// reinterprets them.
    async fn create_output(&self, input: ExecutionInput) -> anyhow::Result<String>;
}

/// Executor producing empty output; placeholder for contexts with no
/// computation backend attached.
pub struct NullExecutor;

#[async_trait]
impl AsyncNodeExecutor for NullExecutor {
    async fn create_output(&self, _input: ExecutionInput) -> anyhow::Result<String> {
        Ok(String::new())
    }
}

/// How an execution attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Output was written back and the dirty flag cleared.
    Completed,
    /// An execution was already in flight; this call was a no-op.
    AlreadyRunning,
    /// The computation finished but the result was discarded: the node
    /// vanished, changed type, or changed incarnation mid-flight.
    NotUpdated,
}

/// Finally-equivalent: resets the running flag and refreshes the view on
/// every exit path, including error returns and panics.
struct FinishGuard<'a>(&'a NodeController);

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        self.0.finish_async();
        self.0.update_view();
    }
}

/// Run the node's computation and write the result back to the tree.
///
/// See the module docs for the full state machine and staleness contract.
pub async fn execute_async_call(
    controller: &Arc<NodeController>,
    runtime: &EditorRuntime,
    host: &DocHost,
) -> Result<ExecutionOutcome, EngineError> {
    let stable_id = controller.stable_id().to_string();
    let node_type = controller.node_type();

    if !controller.async_capable() {
        return Err(EngineError::NoExecutor(node_type));
    }

    // Idle → Running, or bail: at-most-one-in-flight per node.
    let Some(captured_incarnation) = controller.begin_async() else {
        tracing::debug!(stable_id, "execution already in flight; ignoring");
        return Ok(ExecutionOutcome::AlreadyRunning);
    };
    let _finish = FinishGuard(controller);
    controller.update_view(); // loading affordance

    let executor = runtime
        .behaviors()
        .get(node_type)
        .and_then(|behavior| behavior.executor())
        .ok_or(EngineError::NoExecutor(node_type))?;

    // Capture node state and dependency hashes before suspending.
    let tree = host.tree();
    let Some(node) = tree.node_of_type(&stable_id, node_type).cloned() else {
        tracing::debug!(stable_id, "node gone before execution started");
        return Ok(ExecutionOutcome::NotUpdated);
    };
    let hashes_before = snapshot_reference_hashes(&node, runtime, &tree);
    let target_type = runtime
        .behaviors()
        .get(node_type)
        .and_then(|behavior| behavior.reference_target_type());
    let references = node
        .references()
        .iter()
        .filter_map(|ref_id| {
            let target = target_type?;
            tree.node_of_type(ref_id, target).map(|dep| ReferencedContent {
                stable_id: dep.stable_id.clone(),
                text: dep.text().to_string(),
            })
        })
        .collect();
    drop(tree);

    let input = ExecutionInput {
        stable_id: stable_id.clone(),
        text: node.text().to_string(),
        references,
    };

    tracing::debug!(stable_id, "async execution started");
    let output = executor
        .create_output(input)
        .await
        .map_err(|source| EngineError::Execution {
            stable_id: stable_id.clone(),
            source,
        })?;

    // Re-entry after the await: re-validate against the current snapshot.
    let current = host.tree();
    let still_present = current.node_of_type(&stable_id, node_type).is_some();
    if !still_present || controller.incarnation() != captured_incarnation {
        tracing::debug!(stable_id, "stale on completion; result discarded");
        return Ok(ExecutionOutcome::NotUpdated);
    }

    // Write output plus the pre-call hash snapshot back as one atomic batch.
    let mut attrs = serde_json::Map::new();
    attrs.insert(attr::OUTPUT.to_string(), json!(output));
    attrs.insert(attr::REFERENCE_HASHES.to_string(), json!(hashes_before));
    let updates: Vec<Box<dyn DocUpdate>> = vec![Box::new(SetNodeAttributes {
        stable_id: stable_id.clone(),
        attrs,
    })];
    let Some(write_back) = compose(&updates, Transaction::new(current)) else {
        return Ok(ExecutionOutcome::NotUpdated);
    };
    match host.dispatch(write_back) {
        Ok(_) => {}
        // Another transaction won the race; the next dirty pass recovers.
        Err(TransactionError::StaleTransaction) => {
            tracing::debug!(stable_id, "write-back lost a dispatch race; discarded");
            return Ok(ExecutionOutcome::NotUpdated);
        }
        Err(other) => return Err(other.into()),
    }

    controller.set_dirty(false);
    tracing::debug!(stable_id, "async execution completed");
    Ok(ExecutionOutcome::Completed)
}
