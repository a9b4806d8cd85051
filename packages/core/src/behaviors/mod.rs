//! Node Behavior System
//!
//! Per-type behavior for the closed `NodeType` set, expressed as a registry
//! of behavior tables instead of a class hierarchy:
//!
//! - `NodeBehavior` trait - per-type hash function, lifecycle-cleanup flag,
//!   view factory, and (for computational nodes) the async executor
//! - Built-in behaviors for the standard node catalog
//! - `NodeBehaviorRegistry` - tag → behavior lookup and registration
//!
//! The registry keeps dispatch extensible via registration while avoiding
//! virtual inheritance; everything downstream asks the registry rather than
//! matching on tags directly.

use crate::engine::async_node::AsyncNodeExecutor;
use crate::engine::controller::{BufferedView, NodeView};
use crate::models::{Node, NodeType};
use crate::utils::content_hash;
use std::collections::HashMap;
use std::sync::Arc;

/// Behavior table for one node type.
pub trait NodeBehavior: Send + Sync {
    /// The type tag this behavior serves.
    fn node_type(&self) -> NodeType;

    /// Whether instances of this type get a registered controller that the
    /// change detector must clean up. Types without long-lived UI state opt
    /// out so the detector can skip them.
    fn requires_lifecycle_cleanup(&self) -> bool {
        false
    }

    /// Digest of the node's content for staleness comparison.
    fn content_hash(&self, node: &Node) -> String {
        content_hash(node.text())
    }

    /// Construct the view half of a new controller.
    fn make_view(&self) -> Box<dyn NodeView> {
        Box::new(BufferedView::new())
    }

    /// Executor for computation-producing nodes; `None` for plain types.
    fn executor(&self) -> Option<Arc<dyn AsyncNodeExecutor>> {
        None
    }

    /// The type this node's `references` attribute points at, when the type
    /// declares dependencies.
    fn reference_target_type(&self) -> Option<NodeType> {
        None
    }
}

/// Heading nodes: lifecycle-managed so the outline can track them.
pub struct HeadingBehavior;

impl NodeBehavior for HeadingBehavior {
    fn node_type(&self) -> NodeType {
        NodeType::Heading
    }

    fn requires_lifecycle_cleanup(&self) -> bool {
        true
    }
}

/// Plain paragraphs: no long-lived state, no lifecycle cleanup.
pub struct ParagraphBehavior;

impl NodeBehavior for ParagraphBehavior {
    fn node_type(&self) -> NodeType {
        NodeType::Paragraph
    }
}

/// Bullet lists: containers, no lifecycle state of their own.
pub struct BulletListBehavior;

impl NodeBehavior for BulletListBehavior {
    fn node_type(&self) -> NodeType {
        NodeType::BulletList
    }
}

/// Code blocks: lifecycle-managed because async blocks reference their
/// content through the storage layer.
pub struct CodeBlockBehavior;

impl NodeBehavior for CodeBlockBehavior {
    fn node_type(&self) -> NodeType {
        NodeType::CodeBlock
    }

    fn requires_lifecycle_cleanup(&self) -> bool {
        true
    }
}

/// Images: inert at this layer.
pub struct ImageBehavior;

impl NodeBehavior for ImageBehavior {
    fn node_type(&self) -> NodeType {
        NodeType::Image
    }
}

/// Async computational blocks: lifecycle-managed, executable, and
/// dependent on code block content.
pub struct AsyncBlockBehavior {
    executor: Arc<dyn AsyncNodeExecutor>,
}

impl AsyncBlockBehavior {
    pub fn new(executor: Arc<dyn AsyncNodeExecutor>) -> Self {
        Self { executor }
    }
}

impl NodeBehavior for AsyncBlockBehavior {
    fn node_type(&self) -> NodeType {
        NodeType::AsyncBlock
    }

    fn requires_lifecycle_cleanup(&self) -> bool {
        true
    }

    fn executor(&self) -> Option<Arc<dyn AsyncNodeExecutor>> {
        Some(self.executor.clone())
    }

    fn reference_target_type(&self) -> Option<NodeType> {
        Some(NodeType::CodeBlock)
    }
}

/// Tag → behavior table lookup.
pub struct NodeBehaviorRegistry {
    behaviors: HashMap<NodeType, Arc<dyn NodeBehavior>>,
}

impl NodeBehaviorRegistry {
    pub fn new() -> Self {
        Self {
            behaviors: HashMap::new(),
        }
    }

    /// The standard node catalog, with the given executor backing async
    /// blocks.
    pub fn standard(executor: Arc<dyn AsyncNodeExecutor>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(HeadingBehavior));
        registry.register(Arc::new(ParagraphBehavior));
        registry.register(Arc::new(BulletListBehavior));
        registry.register(Arc::new(CodeBlockBehavior));
        registry.register(Arc::new(ImageBehavior));
        registry.register(Arc::new(AsyncBlockBehavior::new(executor)));
        registry
    }

    /// Register (or replace) the behavior for a type tag.
    pub fn register(&mut self, behavior: Arc<dyn NodeBehavior>) {
        let tag = behavior.node_type();
        if self.behaviors.insert(tag, behavior).is_some() {
            tracing::debug!(?tag, "behavior replaced");
        }
    }

    pub fn get(&self, node_type: NodeType) -> Option<&Arc<dyn NodeBehavior>> {
        self.behaviors.get(&node_type)
    }

    /// Types registered as requiring lifecycle cleanup; the change detector
    /// scans only these.
    pub fn cleanup_types(&self) -> Vec<NodeType> {
        self.behaviors
            .values()
            .filter(|behavior| behavior.requires_lifecycle_cleanup())
            .map(|behavior| behavior.node_type())
            .collect()
    }

    pub fn registered_types(&self) -> Vec<NodeType> {
        self.behaviors.keys().copied().collect()
    }
}

impl Default for NodeBehaviorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::async_node::{ExecutionInput, NullExecutor};
    use serde_json::json;

    #[test]
    fn test_standard_registry_covers_all_types() {
        let registry = NodeBehaviorRegistry::standard(Arc::new(NullExecutor));
        for tag in [
            NodeType::Heading,
            NodeType::Paragraph,
            NodeType::BulletList,
            NodeType::CodeBlock,
            NodeType::Image,
            NodeType::AsyncBlock,
        ] {
            assert!(registry.get(tag).is_some(), "missing behavior for {tag:?}");
        }
    }

    #[test]
    fn test_cleanup_types_scoped_to_lifecycle_managed() {
        let registry = NodeBehaviorRegistry::standard(Arc::new(NullExecutor));
        let cleanup = registry.cleanup_types();
        assert!(cleanup.contains(&NodeType::Heading));
        assert!(cleanup.contains(&NodeType::CodeBlock));
        assert!(cleanup.contains(&NodeType::AsyncBlock));
        assert!(!cleanup.contains(&NodeType::Paragraph));
        assert!(!cleanup.contains(&NodeType::Image));
    }

    #[test]
    fn test_content_hash_defaults_to_text_digest() {
        let registry = NodeBehaviorRegistry::standard(Arc::new(NullExecutor));
        let behavior = registry.get(NodeType::CodeBlock).unwrap();
        let node = Node::new(NodeType::CodeBlock, "x = 1", json!({}));
        assert_eq!(behavior.content_hash(&node), content_hash("x = 1"));
    }

    #[tokio::test]
    async fn test_async_block_behavior_exposes_executor() {
        let registry = NodeBehaviorRegistry::standard(Arc::new(NullExecutor));
        let behavior = registry.get(NodeType::AsyncBlock).unwrap();
        let executor = behavior.executor().expect("async blocks are executable");
        let output = executor
            .create_output(ExecutionInput {
                stable_id: "a-1".to_string(),
                text: "run()".to_string(),
                references: vec![],
            })
            .await
            .unwrap();
        assert_eq!(output, "");
        assert_eq!(behavior.reference_target_type(), Some(NodeType::CodeBlock));
    }
}
