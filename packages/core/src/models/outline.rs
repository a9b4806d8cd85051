//! Derived Document Outline
//!
//! The outline is a render-ready, order-preserving projection of the
//! document's heading nodes, used for navigation. Indentation is a dense
//! 0-based ranking of the *distinct* heading levels present, not the raw
//! level: levels `[2, 3, 1, 3, 4, 1]` render at indentations
//! `[1, 2, 0, 2, 3, 0]`.
//!
//! Construction and incremental maintenance live in `engine::outline`; these
//! are the pure data types.

use serde::{Deserialize, Serialize};

/// One heading entry in the outline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlineItem {
    /// Stable id of the heading node
    pub id: String,

    /// Heading text
    pub label: String,

    /// Raw heading level, when the node declares one
    pub level: Option<i64>,

    /// Dense 0-based rank of `level` among the distinct levels present
    pub indentation: usize,
}

/// Ordered list of outline items in document order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outline {
    pub items: Vec<OutlineItem>,
}

impl Outline {
    /// Find the outline item for a heading, if present.
    pub fn item(&self, id: &str) -> Option<&OutlineItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}
