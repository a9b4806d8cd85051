//! Node lifecycle and dependency-tracking engine
//!
//! The runtime half of the crate: controllers that bind document nodes to
//! views, the type-scoped storage that owns them, the async execution
//! state machine, reference staleness resolution, removal detection over
//! applied transactions, the derived outline, and the session that wires
//! the whole flow to a [`crate::doc::DocHost`].

pub mod async_node;
pub mod change_detector;
pub mod controller;
pub mod outline;
pub mod references;
pub mod session;
pub mod storage;

pub use async_node::{
    execute_async_call, AsyncNodeExecutor, EngineError, ExecutionInput, ExecutionOutcome,
    NullExecutor, ReferencedContent,
};
pub use change_detector::{prune_removed, removed_nodes};
pub use controller::{
    BufferedView, ControllerPhase, NodeController, NodeView, RenderLog, ViewState,
};
pub use outline::{create_outline, heading_changes, update_outline, HeadingChange};
pub use references::{
    is_async_node_dirty, reference_label, snapshot_reference_hashes, REMOVED_REFERENCE_LABEL,
};
pub use session::EditorSession;
pub use storage::{EditorRuntime, NodeViewStorage};
