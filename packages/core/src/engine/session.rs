//! Editor Session
//!
//! Orchestrates the per-transaction data flow across the engine, in the
//! one order that keeps shared state consistent within a tick:
//!
//! 1. change detector prunes controllers for removed nodes,
//! 2. controllers are created lazily for newly-encountered managed nodes,
//! 3. survivors rebind, resync their models, and re-evaluate dirtiness
//!    through the reference resolver (pruning *must* come first, so the
//!    resolver never sees a dangling controller as "present"),
//! 4. views refresh,
//! 5. the outline is incrementally synchronized from the heading diffs.
//!
//! The session subscribes to the host's transaction stream; everything in
//! the tick is synchronous and single-threaded. Async executions requested
//! through [`EditorSession::execute_async_call`] are the only suspension
//! points.

use crate::doc::{compose, DocHost, DocTree, DocUpdate, Transaction};
use crate::engine::async_node::{execute_async_call, EngineError, ExecutionOutcome};
use crate::engine::change_detector::prune_removed;
use crate::engine::controller::NodeController;
use crate::engine::outline::{create_outline, heading_changes, update_outline};
use crate::engine::references::is_async_node_dirty;
use crate::engine::storage::EditorRuntime;
use crate::models::{NodeType, Outline};
use crate::utils::lock;
use std::sync::{Arc, Mutex};

/// Long-lived engine facade bound to one document host.
pub struct EditorSession {
    runtime: Arc<EditorRuntime>,
    host: Arc<DocHost>,
    outline: Mutex<Outline>,
}

impl EditorSession {
    /// Create a session, seed controllers and the outline from the current
    /// snapshot, and subscribe to the host's transaction stream.
    pub fn new(runtime: Arc<EditorRuntime>, host: Arc<DocHost>) -> Arc<Self> {
        let session = Arc::new(Self {
            outline: Mutex::new(create_outline(&host.tree())),
            runtime,
            host,
        });

        let tree = session.host.tree();
        session.ensure_controllers(&tree);
        session.refresh_controllers(&tree);

        let weak = Arc::downgrade(&session);
        session.host.subscribe(Box::new(move |tr| {
            if let Some(session) = weak.upgrade() {
                session.handle_transaction(tr);
            }
        }));
        session
    }

    pub fn runtime(&self) -> &Arc<EditorRuntime> {
        &self.runtime
    }

    pub fn host(&self) -> &Arc<DocHost> {
        &self.host
    }

    /// Current derived outline.
    pub fn outline(&self) -> Outline {
        lock(&self.outline).clone()
    }

    /// Compose and dispatch an atomic update batch against the current
    /// snapshot.
    ///
    /// Returns the new snapshot, or `None` when the batch was inapplicable
    /// (nothing was applied) or lost a dispatch race.
    pub fn apply_updates(&self, updates: &[Box<dyn DocUpdate>]) -> Option<Arc<DocTree>> {
        let tr = compose(updates, Transaction::new(self.host.tree()))?;
        self.host.dispatch(tr).ok()
    }

    /// Run the computation for an async node by stable id.
    ///
    /// A missing controller is the usual lifecycle no-op: the node was
    /// removed before the call landed.
    pub async fn execute_async_call(
        &self,
        stable_id: &str,
    ) -> Result<ExecutionOutcome, EngineError> {
        let Some(controller) = self.runtime.controller(NodeType::AsyncBlock, stable_id) else {
            tracing::debug!(stable_id, "execute requested for unknown node; ignored");
            return Ok(ExecutionOutcome::NotUpdated);
        };
        execute_async_call(&controller, &self.runtime, &self.host).await
    }

    /// Per-transaction reconciliation pass; see the module docs for the
    /// ordering contract.
    pub fn handle_transaction(&self, tr: &Transaction) {
        prune_removed(tr, &self.runtime);

        let tree = tr.after().clone();
        self.ensure_controllers(&tree);
        self.refresh_controllers(&tree);

        let changes = heading_changes(tr);
        if !changes.is_empty() {
            let mut outline = lock(&self.outline);
            let current = std::mem::take(&mut *outline);
            *outline = update_outline(&tree, current, &changes);
        }
    }

    /// Lazily create controllers for managed nodes seen for the first
    /// time.
    fn ensure_controllers(&self, tree: &DocTree) {
        for (_, node) in tree.preorder() {
            let Some(behavior) = self.runtime.behaviors().get(node.node_type) else {
                continue;
            };
            if !behavior.requires_lifecycle_cleanup() {
                continue;
            }
            let Some(storage) = self.runtime.storage(node.node_type) else {
                continue;
            };
            if storage.get_node_view(&node.stable_id).is_some() {
                continue;
            }
            let controller = NodeController::new(
                node.stable_id.clone(),
                node.node_type,
                behavior.make_view(),
                behavior.executor().is_some(),
            );
            controller.sync_from_node(node);
            controller.bind(tree);
            storage.add_node_view(node.stable_id.clone(), controller);
            tracing::debug!(stable_id = %node.stable_id, node_type = ?node.node_type, "controller created");
        }
    }

    /// Rebind survivors, resync models, re-evaluate dirtiness, refresh
    /// views.
    fn refresh_controllers(&self, tree: &DocTree) {
        for node_type in self.runtime.behaviors().cleanup_types() {
            let Some(storage) = self.runtime.storage(node_type) else {
                continue;
            };
            for stable_id in storage.ids() {
                let Some(controller) = storage.get_node_view(&stable_id) else {
                    continue;
                };
                controller.bind(tree);
                let Some(node) = tree.node_of_type(&stable_id, node_type) else {
                    // Unbound: intermediate state, do not touch.
                    continue;
                };
                controller.sync_from_node(node);
                if controller.async_capable() && !controller.performing_async_operation() {
                    let dirty = is_async_node_dirty(node, &self.runtime, tree);
                    controller.set_dirty(dirty);
                } else {
                    controller.update_view();
                }
            }
        }
    }
}
