//! Data Models
//!
//! This module contains the core data structures used throughout Notebook:
//!
//! - `Node` - Immutable document-tree node value for all content types
//! - `NodeType` - Closed set of node type tags
//! - `Outline` / `OutlineItem` - Derived navigation outline for headings
//!
//! Entity-specific data lives in the node's JSON `attrs` field rather than
//! in per-type struct variants, so new attributes never change the shape of
//! the tree.

mod node;
mod outline;

pub use node::{attr, Node, NodeContent, NodeType, ValidationError};
pub use outline::{Outline, OutlineItem};
