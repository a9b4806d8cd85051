//! Node Controller / Model / View Triad
//!
//! A `NodeController` is the long-lived unit of lifecycle management bound
//! 1:1 to a node's stable id. It is created lazily when the engine first
//! encounters the node and destroyed when the change detector finds the id
//! absent from the post-edit tree. The controller mediates between the live
//! tree and its two owned halves:
//!
//! - **Model** (`NodeModel`): pure state and business rules, no UI access
//! - **View** (`NodeView`): renders model state into the editing surface;
//!   `update_view` is idempotent and fully resyncs visible state
//!
//! # Lifecycle
//!
//! `Created → Bound ⇄ Unbound → Destroyed`. `Unbound` means position
//! resolution failed against the current snapshot; it is transient and can
//! flip back to `Bound` within the same tick (intermediate transaction
//! steps routinely unresolve nodes that a later step re-inserts). Only
//! `Destroyed` is terminal, and only the change detector drives it.
//!
//! A `get_pos` of `None` always means "do not touch", never an error.

use crate::doc::{DocTree, Position};
use crate::models::{Node, NodeType};
use crate::utils::lock;
use std::sync::{Arc, Mutex};

/// Fully resolved render state handed to a view.
///
/// Views resync everything from this snapshot on every call; no incremental
/// patching contract exists between model and view.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub text: String,
    /// True only while an async computation is in flight.
    pub loading: bool,
    /// True when cached output no longer reflects current inputs.
    pub dirty: bool,
    /// Cached async output, when any.
    pub output: Option<String>,
}

/// Renders model state into the editing surface.
pub trait NodeView: Send {
    /// Fully resync visible state from the model snapshot.
    ///
    /// Idempotent: calling this N times with the same state must leave the
    /// same rendered result as calling it once.
    fn update_view(&mut self, state: &ViewState);
}

/// Shared render log written by [`BufferedView`].
#[derive(Debug, Default)]
pub struct RenderLog {
    pub state: Option<ViewState>,
    pub renders: usize,
}

/// Headless view that renders into a shared buffer.
///
/// The default view for behaviors that have no UI attached (tests, server
/// contexts); the buffer handle lets callers observe what would be drawn.
pub struct BufferedView {
    log: Arc<Mutex<RenderLog>>,
}

impl BufferedView {
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(RenderLog::default())),
        }
    }

    /// Handle to the render buffer; retains access after the view is boxed.
    pub fn log(&self) -> Arc<Mutex<RenderLog>> {
        self.log.clone()
    }
}

impl Default for BufferedView {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeView for BufferedView {
    fn update_view(&mut self, state: &ViewState) {
        let mut log = lock(&self.log);
        log.renders += 1;
        log.state = Some(state.clone());
    }
}

/// Controller lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerPhase {
    Created,
    Bound,
    Unbound,
    Destroyed,
}

/// Async-execution extension of the model.
#[derive(Debug, Clone)]
pub struct AsyncState {
    /// True only while a computation is in flight; set and cleared
    /// exclusively by the execution engine.
    pub performing_async_operation: bool,
    /// True when cached output no longer reflects current inputs.
    pub is_dirty: bool,
    /// Generation counter, bumped whenever the node's own text changes.
    /// An execution captures it before awaiting and discards its result on
    /// mismatch, which subsumes ad hoc existence/type checks.
    pub incarnation: u64,
}

/// Pure per-node state; no UI access.
#[derive(Debug, Clone)]
pub struct NodeModel {
    pub text: String,
    pub output: Option<String>,
    pub async_state: Option<AsyncState>,
}

/// Long-lived controller bound 1:1 to a stable id.
pub struct NodeController {
    stable_id: String,
    node_type: NodeType,
    phase: Mutex<ControllerPhase>,
    model: Mutex<NodeModel>,
    view: Mutex<Box<dyn NodeView>>,
}

impl NodeController {
    pub fn new(
        stable_id: impl Into<String>,
        node_type: NodeType,
        view: Box<dyn NodeView>,
        async_capable: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            stable_id: stable_id.into(),
            node_type,
            phase: Mutex::new(ControllerPhase::Created),
            model: Mutex::new(NodeModel {
                text: String::new(),
                output: None,
                async_state: async_capable.then(|| AsyncState {
                    performing_async_operation: false,
                    is_dirty: false,
                    incarnation: 0,
                }),
            }),
            view: Mutex::new(view),
        })
    }

    pub fn stable_id(&self) -> &str {
        &self.stable_id
    }

    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    pub fn phase(&self) -> ControllerPhase {
        *lock(&self.phase)
    }

    /// Resolve this controller's node against the given snapshot.
    ///
    /// `None` means the node no longer resolves (or the controller is
    /// destroyed): treat as "do not touch".
    pub fn get_pos<'t>(&self, tree: &'t DocTree) -> Option<Position<'t>> {
        if self.phase() == ControllerPhase::Destroyed {
            return None;
        }
        tree.resolve_position_of(&self.stable_id, self.node_type)
    }

    /// Re-evaluate binding against the current snapshot.
    ///
    /// Transitions `Bound ⇄ Unbound`; a destroyed controller stays
    /// destroyed.
    pub fn bind(&self, tree: &DocTree) -> bool {
        let resolved = tree
            .resolve_position_of(&self.stable_id, self.node_type)
            .is_some();
        let mut phase = lock(&self.phase);
        if *phase == ControllerPhase::Destroyed {
            return false;
        }
        *phase = if resolved {
            ControllerPhase::Bound
        } else {
            ControllerPhase::Unbound
        };
        resolved
    }

    /// Terminal transition, driven by the change detector via storage
    /// removal.
    pub(crate) fn mark_destroyed(&self) {
        *lock(&self.phase) = ControllerPhase::Destroyed;
    }

    /// Refresh the model from the node's current tree instance.
    ///
    /// Bumps the incarnation counter when the node's own text changed, so
    /// in-flight executions started against the old text discard their
    /// results.
    pub fn sync_from_node(&self, node: &Node) {
        let mut model = lock(&self.model);
        if model.text != node.text() {
            model.text = node.text().to_string();
            if let Some(state) = model.async_state.as_mut() {
                state.incarnation += 1;
            }
        }
        model.output = node.output().map(str::to_string);
    }

    /// Mark cached output stale (or fresh).
    ///
    /// A direct model+view update, independent of the execution state
    /// machine: it never triggers execution by itself.
    pub fn set_dirty(&self, dirty: bool) {
        {
            let mut model = lock(&self.model);
            match model.async_state.as_mut() {
                Some(state) => state.is_dirty = dirty,
                None => return,
            }
        }
        self.update_view();
    }

    pub fn is_dirty(&self) -> bool {
        lock(&self.model)
            .async_state
            .as_ref()
            .is_some_and(|state| state.is_dirty)
    }

    pub fn async_capable(&self) -> bool {
        lock(&self.model).async_state.is_some()
    }

    pub fn performing_async_operation(&self) -> bool {
        lock(&self.model)
            .async_state
            .as_ref()
            .is_some_and(|state| state.performing_async_operation)
    }

    pub fn incarnation(&self) -> u64 {
        lock(&self.model)
            .async_state
            .as_ref()
            .map(|state| state.incarnation)
            .unwrap_or(0)
    }

    /// Attempt the `Idle → Running` transition.
    ///
    /// Returns the captured incarnation on success, or `None` when an
    /// execution is already in flight (the at-most-one-per-node guard).
    pub(crate) fn begin_async(&self) -> Option<u64> {
        let mut model = lock(&self.model);
        let state = model.async_state.as_mut()?;
        if state.performing_async_operation {
            return None;
        }
        state.performing_async_operation = true;
        Some(state.incarnation)
    }

    /// Unconditional `Running → Idle` reset; part of the engine's
    /// finally-equivalent.
    pub(crate) fn finish_async(&self) {
        let mut model = lock(&self.model);
        if let Some(state) = model.async_state.as_mut() {
            state.performing_async_operation = false;
        }
    }

    /// Current model snapshot as a view would render it.
    pub fn view_state(&self) -> ViewState {
        let model = lock(&self.model);
        ViewState {
            text: model.text.clone(),
            loading: model
                .async_state
                .as_ref()
                .is_some_and(|s| s.performing_async_operation),
            dirty: model.async_state.as_ref().is_some_and(|s| s.is_dirty),
            output: model.output.clone(),
        }
    }

    /// Fully resync the view from the model. Idempotent.
    pub fn update_view(&self) {
        let state = self.view_state();
        lock(&self.view).update_view(&state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc::DocTree;
    use serde_json::json;

    fn controller_with_log(async_capable: bool) -> (Arc<NodeController>, Arc<Mutex<RenderLog>>) {
        let view = BufferedView::new();
        let log = view.log();
        let controller =
            NodeController::new("n-1", NodeType::AsyncBlock, Box::new(view), async_capable);
        (controller, log)
    }

    #[test]
    fn test_update_view_is_idempotent() {
        let (controller, log) = controller_with_log(true);
        controller.sync_from_node(&Node::new_with_id(
            "n-1",
            NodeType::AsyncBlock,
            "run()",
            json!({}),
        ));

        controller.update_view();
        let once = lock(&log).state.clone();

        controller.update_view();
        controller.update_view();
        let thrice = lock(&log).state.clone();

        assert_eq!(once, thrice, "repeated syncs must render the same state");
        assert_eq!(lock(&log).renders, 3);
    }

    #[test]
    fn test_bind_flips_between_bound_and_unbound() {
        let (controller, _log) = controller_with_log(false);
        assert_eq!(controller.phase(), ControllerPhase::Created);

        let with_node = DocTree::new(vec![Node::new_with_id(
            "n-1",
            NodeType::AsyncBlock,
            "run()",
            json!({}),
        )])
        .unwrap();
        assert!(controller.bind(&with_node));
        assert_eq!(controller.phase(), ControllerPhase::Bound);

        let without_node = DocTree::empty();
        assert!(!controller.bind(&without_node));
        assert_eq!(controller.phase(), ControllerPhase::Unbound);

        // Transient: re-binding against a tree that has the node again.
        assert!(controller.bind(&with_node));
        assert_eq!(controller.phase(), ControllerPhase::Bound);
    }

    #[test]
    fn test_destroyed_is_terminal() {
        let (controller, _log) = controller_with_log(false);
        controller.mark_destroyed();

        let tree = DocTree::new(vec![Node::new_with_id(
            "n-1",
            NodeType::AsyncBlock,
            "run()",
            json!({}),
        )])
        .unwrap();
        assert!(!controller.bind(&tree));
        assert_eq!(controller.phase(), ControllerPhase::Destroyed);
        assert!(controller.get_pos(&tree).is_none());
    }

    #[test]
    fn test_get_pos_is_type_scoped() {
        let (controller, _log) = controller_with_log(false);
        // Same stable id, different type: must not resolve.
        let tree = DocTree::new(vec![Node::new_with_id(
            "n-1",
            NodeType::Paragraph,
            "text",
            json!({}),
        )])
        .unwrap();
        assert!(controller.get_pos(&tree).is_none());
    }

    #[test]
    fn test_set_dirty_updates_model_and_view() {
        let (controller, log) = controller_with_log(true);
        controller.set_dirty(true);
        assert!(controller.is_dirty());
        assert!(lock(&log).state.as_ref().unwrap().dirty);

        controller.set_dirty(false);
        assert!(!controller.is_dirty());
        assert!(!lock(&log).state.as_ref().unwrap().dirty);
    }

    #[test]
    fn test_sync_bumps_incarnation_only_on_text_change() {
        let (controller, _log) = controller_with_log(true);
        let node = Node::new_with_id("n-1", NodeType::AsyncBlock, "run()", json!({}));
        controller.sync_from_node(&node);
        let first = controller.incarnation();

        // Attribute-only change (own output write-back) must not bump.
        let with_output =
            Node::new_with_id("n-1", NodeType::AsyncBlock, "run()", json!({ "output": "42" }));
        controller.sync_from_node(&with_output);
        assert_eq!(controller.incarnation(), first);

        let edited = Node::new_with_id("n-1", NodeType::AsyncBlock, "run(2)", json!({}));
        controller.sync_from_node(&edited);
        assert_eq!(controller.incarnation(), first + 1);
    }
}
