//! Document Tree Host
//!
//! This module is the concrete tree side the lifecycle engine runs against:
//!
//! - `DocTree` / `Position` - Immutable snapshots and fresh position
//!   resolution (`Position` is lifetime-bound to its snapshot, so a stale
//!   position cannot be carried across a mutation)
//! - `Step` / `StepMap` / `Transaction` - Atomic multi-step edits with
//!   per-step position remapping
//! - `DocUpdate` and the composer - Mutations expressed as data, applied
//!   all-or-nothing
//! - `DocHost` - Holder of the current snapshot plus the per-transaction
//!   subscription stream the engine listens on

mod host;
mod transaction;
mod tree;
mod update;

pub use host::DocHost;
pub use transaction::{MappedRange, Selection, Step, StepMap, Transaction, TransactionError};
pub use tree::{DocTree, Position};
pub use update::{
    compose, DocUpdate, InsertContent, InsertPayload, MoveSelection, ReplaceNodeText,
    SetNodeAttributes,
};
