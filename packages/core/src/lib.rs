//! Notebook Core Editing Engine
//!
//! Core node lifecycle, dependency tracking, and document synchronization
//! for a collaborative block-based notebook editor.
//!
//! # Architecture
//!
//! - **Immutable snapshots**: every edit produces a new [`doc::DocTree`];
//!   positions are resolved fresh against the current snapshot and are
//!   never cached across edits
//! - **Closed node type system**: a [`models::NodeType`] enum plus a
//!   behavior registry instead of an open class hierarchy
//! - **Controller triad**: long-lived per-node controllers own a model and
//!   a view, created and destroyed by the engine, never by callers
//! - **Content-hash dirty tracking**: reference-bearing nodes cache the
//!   digests of their dependencies and re-evaluate staleness per edit
//!
//! # Modules
//!
//! - [`models`] - Data structures (Node, NodeType, Outline)
//! - [`behaviors`] - Node type system and trait-based behaviors
//! - [`doc`] - Document tree, transactions, updates, and the host
//! - [`engine`] - Controllers, storage, async execution, change detection,
//!   outline synchronization, and the session orchestrator
//! - [`utils`] - Content hashing and small shared helpers

pub mod behaviors;
pub mod doc;
pub mod engine;
pub mod models;
pub mod utils;

// Re-export commonly used types
pub use behaviors::{NodeBehavior, NodeBehaviorRegistry};
pub use doc::{DocHost, DocTree, DocUpdate, Transaction};
pub use engine::{
    AsyncNodeExecutor, EditorRuntime, EditorSession, EngineError, NodeController,
};
pub use models::{Node, NodeType, Outline};
