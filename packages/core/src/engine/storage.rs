//! Node View Storage and Editor Runtime
//!
//! `NodeViewStorage` is the per-node-type registry mapping a stable id to
//! its live controller. It exclusively owns controller lifecycle: the
//! session registers controllers lazily on first encounter, and the change
//! detector unregisters them when their node leaves the tree.
//!
//! One storage instance exists per node type, so a heading's id can never
//! collide with a code block's id: all lookups are type-scoped.
//!
//! `EditorRuntime` is the explicit dependency-injection context bundling
//! the storage map with the behavior registry. It is passed to every
//! component that needs it; there is no ambient global registry.

use crate::behaviors::NodeBehaviorRegistry;
use crate::engine::controller::NodeController;
use crate::models::NodeType;
use crate::utils::lock;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Per-type registry of live controllers, keyed by stable id.
pub struct NodeViewStorage {
    node_type: NodeType,
    views: Mutex<HashMap<String, Arc<NodeController>>>,
}

impl NodeViewStorage {
    pub fn new(node_type: NodeType) -> Self {
        Self {
            node_type,
            views: Mutex::new(HashMap::new()),
        }
    }

    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    /// Look up the live controller for a stable id.
    pub fn get_node_view(&self, stable_id: &str) -> Option<Arc<NodeController>> {
        lock(&self.views).get(stable_id).cloned()
    }

    /// Register a controller for a stable id.
    ///
    /// Idempotent-safe: when a controller already exists for the id, the
    /// existing one is kept (and returned) so any in-flight async state is
    /// preserved; the caller repositions it in place instead of replacing.
    pub fn add_node_view(
        &self,
        stable_id: impl Into<String>,
        controller: Arc<NodeController>,
    ) -> Arc<NodeController> {
        let stable_id = stable_id.into();
        let mut views = lock(&self.views);
        if let Some(existing) = views.get(&stable_id) {
            tracing::debug!(
                node_type = ?self.node_type,
                stable_id,
                "controller already registered; keeping existing instance"
            );
            return existing.clone();
        }
        views.insert(stable_id, controller.clone());
        controller
    }

    /// Unregister and destroy the controller for a stable id.
    ///
    /// Removing an absent id is a silent no-op: under concurrent edits,
    /// absence is an expected condition, never an error.
    pub fn remove_node_view(&self, stable_id: &str) {
        let removed = lock(&self.views).remove(stable_id);
        match removed {
            Some(controller) => {
                controller.mark_destroyed();
                tracing::debug!(
                    node_type = ?self.node_type,
                    stable_id,
                    "controller destroyed"
                );
            }
            None => {
                tracing::debug!(
                    node_type = ?self.node_type,
                    stable_id,
                    "remove of absent controller ignored"
                );
            }
        }
    }

    /// Stable ids with live controllers.
    pub fn ids(&self) -> Vec<String> {
        lock(&self.views).keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.views).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Explicit dependency-injection context for the engine.
///
/// Owns one `NodeViewStorage` per registered behavior plus the behavior
/// registry itself. Components receive it as a parameter, never through
/// ambient lookup.
pub struct EditorRuntime {
    storages: HashMap<NodeType, NodeViewStorage>,
    behaviors: NodeBehaviorRegistry,
}

impl EditorRuntime {
    pub fn new(behaviors: NodeBehaviorRegistry) -> Self {
        let storages = behaviors
            .registered_types()
            .into_iter()
            .map(|tag| (tag, NodeViewStorage::new(tag)))
            .collect();
        Self {
            storages,
            behaviors,
        }
    }

    pub fn behaviors(&self) -> &NodeBehaviorRegistry {
        &self.behaviors
    }

    /// The type-scoped storage for a node type, when the type is
    /// registered.
    pub fn storage(&self, node_type: NodeType) -> Option<&NodeViewStorage> {
        self.storages.get(&node_type)
    }

    /// Convenience type-scoped controller lookup.
    pub fn controller(&self, node_type: NodeType, stable_id: &str) -> Option<Arc<NodeController>> {
        self.storage(node_type)?.get_node_view(stable_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::async_node::NullExecutor;
    use crate::engine::controller::BufferedView;

    fn controller(id: &str, node_type: NodeType) -> Arc<NodeController> {
        NodeController::new(id, node_type, Box::new(BufferedView::new()), false)
    }

    #[test]
    fn test_add_then_get_round_trips() {
        let storage = NodeViewStorage::new(NodeType::Heading);
        storage.add_node_view("h-1", controller("h-1", NodeType::Heading));
        assert!(storage.get_node_view("h-1").is_some());
        assert!(storage.get_node_view("h-2").is_none());
    }

    #[test]
    fn test_add_is_idempotent_and_keeps_existing() {
        let storage = NodeViewStorage::new(NodeType::AsyncBlock);
        let first = storage.add_node_view("a-1", controller("a-1", NodeType::AsyncBlock));
        let second = storage.add_node_view("a-1", controller("a-1", NodeType::AsyncBlock));
        assert!(Arc::ptr_eq(&first, &second), "existing controller preserved");
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn test_remove_absent_id_is_a_noop() {
        let storage = NodeViewStorage::new(NodeType::Heading);
        storage.remove_node_view("never-added");
        assert!(storage.is_empty());
    }

    #[test]
    fn test_remove_destroys_controller() {
        use crate::engine::controller::ControllerPhase;
        let storage = NodeViewStorage::new(NodeType::Heading);
        let ctrl = storage.add_node_view("h-1", controller("h-1", NodeType::Heading));
        storage.remove_node_view("h-1");
        assert_eq!(ctrl.phase(), ControllerPhase::Destroyed);
        assert!(storage.get_node_view("h-1").is_none());
    }

    #[test]
    fn test_runtime_storages_are_type_scoped() {
        let runtime = EditorRuntime::new(NodeBehaviorRegistry::standard(Arc::new(NullExecutor)));
        runtime
            .storage(NodeType::Heading)
            .unwrap()
            .add_node_view("shared", controller("shared", NodeType::Heading));

        // The same id under another type does not collide.
        assert!(runtime.controller(NodeType::Heading, "shared").is_some());
        assert!(runtime.controller(NodeType::CodeBlock, "shared").is_none());
    }
}
