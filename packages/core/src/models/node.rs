//! Node Data Structures
//!
//! This module defines the core `Node` struct and related types for the
//! Notebook document tree.
//!
//! # Architecture
//!
//! - **Immutable values**: nodes are never mutated in place; edits build a
//!   new tree snapshot that shares unchanged subtrees
//! - **Closed type set**: `NodeType` is a tagged union, with per-type
//!   behavior supplied by the behavior registry rather than inheritance
//! - **JSON attributes**: all type-specific data lives in the `attrs` object
//!   (heading level, code language, async references, cached output)
//! - **Stable identity**: `stable_id` is assigned at creation, never reused,
//!   and survives structural moves; it is the key every lifecycle component
//!   uses, never the node's transient position
//!
//! # Examples
//!
//! ```rust
//! use notebook_core::models::{Node, NodeType};
//! use serde_json::json;
//!
//! // A level-2 heading
//! let heading = Node::new(NodeType::Heading, "Background", json!({ "level": 2 }));
//!
//! // An async block depending on a code block's content
//! let block = Node::new(
//!     NodeType::AsyncBlock,
//!     "run()",
//!     json!({
//!         "references": ["code-1"],
//!         "referenceHashes": ["abc123"]
//!     }),
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Well-known attribute keys.
///
/// Attributes are free-form JSON, but the engine gives meaning to these keys.
pub mod attr {
    /// Heading level (integer, 1-based).
    pub const LEVEL: &str = "level";
    /// Code block language tag.
    pub const LANGUAGE: &str = "language";
    /// Stable ids of nodes this node's output depends on.
    pub const REFERENCES: &str = "references";
    /// Content digests observed for each reference, positionally paired
    /// with `references`.
    pub const REFERENCE_HASHES: &str = "referenceHashes";
    /// Cached output of the most recent async execution.
    pub const OUTPUT: &str = "output";
}

/// Validation errors for Node operations
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Node attrs must be a JSON object, got: {0}")]
    AttrsNotAnObject(String),

    #[error("Duplicate stable id within one snapshot: {0}")]
    DuplicateStableId(String),

    #[error("Invalid attribute {key} on node {stable_id}: {reason}")]
    InvalidAttribute {
        stable_id: String,
        key: String,
        reason: String,
    },
}

/// Closed set of node type tags.
///
/// Per-type behavior (content hashing, view construction, lifecycle
/// cleanup, async execution) is looked up through the behavior registry,
/// keyed by this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeType {
    Heading,
    Paragraph,
    BulletList,
    CodeBlock,
    Image,
    AsyncBlock,
}

/// Node payload: either text content or ordered child nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeContent {
    Text(String),
    Children(Vec<Node>),
}

/// Immutable document-tree node.
///
/// # Fields
///
/// - `stable_id`: identity assigned at creation; unique among live nodes of
///   a type at any snapshot and preserved across structural edits
/// - `node_type`: closed type tag
/// - `attrs`: JSON object of type-specific attributes
/// - `content`: text content or ordered children
/// - `created_at`: creation timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Stable identity, distinct from the node's transient tree position
    pub stable_id: String,

    /// Node type tag
    pub node_type: NodeType,

    /// Type-specific attributes (always a JSON object)
    pub attrs: serde_json::Value,

    /// Text content or ordered children
    pub content: NodeContent,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Node {
    /// Create a new text-content node with an auto-generated stable id.
    pub fn new(node_type: NodeType, text: impl Into<String>, attrs: serde_json::Value) -> Self {
        Self::new_with_id(Uuid::new_v4().to_string(), node_type, text, attrs)
    }

    /// Create a new text-content node with an explicit stable id.
    ///
    /// Primarily for tests and for hosts that mint their own identifiers.
    pub fn new_with_id(
        stable_id: impl Into<String>,
        node_type: NodeType,
        text: impl Into<String>,
        attrs: serde_json::Value,
    ) -> Self {
        Self {
            stable_id: stable_id.into(),
            node_type,
            attrs: normalize_attrs(attrs),
            content: NodeContent::Text(text.into()),
            created_at: Utc::now(),
        }
    }

    /// Create a new container node holding ordered children.
    pub fn new_container(
        node_type: NodeType,
        children: Vec<Node>,
        attrs: serde_json::Value,
    ) -> Self {
        Self {
            stable_id: Uuid::new_v4().to_string(),
            node_type,
            attrs: normalize_attrs(attrs),
            content: NodeContent::Children(children),
            created_at: Utc::now(),
        }
    }

    /// Text content, or `""` for container nodes.
    pub fn text(&self) -> &str {
        match &self.content {
            NodeContent::Text(text) => text,
            NodeContent::Children(_) => "",
        }
    }

    /// Ordered children, or an empty slice for text nodes.
    pub fn children(&self) -> &[Node] {
        match &self.content {
            NodeContent::Text(_) => &[],
            NodeContent::Children(children) => children,
        }
    }

    /// Whether this node carries text content (possibly empty).
    pub fn is_text_node(&self) -> bool {
        matches!(self.content, NodeContent::Text(_))
    }

    /// Whether this is an empty, non-code text block.
    ///
    /// The update composer replaces such blocks outright when block content
    /// is inserted into them, instead of nesting content inside.
    pub fn is_empty_text_block(&self) -> bool {
        self.is_text_node() && self.text().is_empty() && self.node_type != NodeType::CodeBlock
    }

    /// Look up a single attribute value.
    pub fn attr(&self, key: &str) -> Option<&serde_json::Value> {
        self.attrs.as_object().and_then(|map| map.get(key))
    }

    /// Heading level, when present and integral.
    pub fn heading_level(&self) -> Option<i64> {
        self.attr(attr::LEVEL).and_then(|v| v.as_i64())
    }

    /// Stable ids of the nodes this node's output depends on.
    ///
    /// Order-significant: positionally paired with [`Node::reference_hashes`].
    pub fn references(&self) -> Vec<String> {
        string_array_attr(self, attr::REFERENCES)
    }

    /// Previously observed content digests for each reference.
    pub fn reference_hashes(&self) -> Vec<String> {
        string_array_attr(self, attr::REFERENCE_HASHES)
    }

    /// Cached output of the most recent async execution, if any.
    pub fn output(&self) -> Option<&str> {
        self.attr(attr::OUTPUT).and_then(|v| v.as_str())
    }

    /// Build a copy of this node with its text replaced.
    ///
    /// Identity, type, attributes, and timestamp are preserved; container
    /// nodes become text nodes.
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self {
            content: NodeContent::Text(text.into()),
            ..self.clone()
        }
    }

    /// Build a copy of this node with the given attributes merged in.
    ///
    /// Existing keys are overwritten; keys mapped to `null` are removed.
    pub fn with_attrs_merged(&self, updates: &serde_json::Map<String, serde_json::Value>) -> Self {
        let mut merged = self
            .attrs
            .as_object()
            .cloned()
            .unwrap_or_default();
        for (key, value) in updates {
            if value.is_null() {
                merged.remove(key);
            } else {
                merged.insert(key.clone(), value.clone());
            }
        }
        Self {
            attrs: serde_json::Value::Object(merged),
            ..self.clone()
        }
    }

    /// Validate structural invariants for this node and its subtree.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.attrs.is_object() {
            return Err(ValidationError::AttrsNotAnObject(self.attrs.to_string()));
        }
        for key in [attr::REFERENCES, attr::REFERENCE_HASHES] {
            if let Some(value) = self.attr(key) {
                let all_strings = value
                    .as_array()
                    .is_some_and(|items| items.iter().all(|item| item.is_string()));
                if !all_strings {
                    return Err(ValidationError::InvalidAttribute {
                        stable_id: self.stable_id.clone(),
                        key: key.to_string(),
                        reason: "expected an array of strings".to_string(),
                    });
                }
            }
        }
        for child in self.children() {
            child.validate()?;
        }
        Ok(())
    }
}

/// Coerce non-object attrs to an empty object so accessors stay total.
fn normalize_attrs(attrs: serde_json::Value) -> serde_json::Value {
    if attrs.is_object() {
        attrs
    } else {
        serde_json::Value::Object(serde_json::Map::new())
    }
}

fn string_array_attr(node: &Node, key: &str) -> Vec<String> {
    node.attr(key)
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
