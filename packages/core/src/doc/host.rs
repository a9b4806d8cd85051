//! Document Host
//!
//! Owns the current tree snapshot and the per-transaction subscription
//! stream. Transactions are applied atomically and synchronously with
//! respect to each other: `dispatch` swaps the current snapshot, then
//! notifies every subscriber with the applied transaction (before/after
//! snapshots plus step maps) in subscription order.
//!
//! Scheduling is single-threaded and cooperative; the mutexes here exist so
//! controllers and in-flight async executions can hold cheap shared handles,
//! not for parallelism.

use crate::doc::transaction::{Transaction, TransactionError};
use crate::doc::tree::DocTree;
use crate::utils::lock;
use std::sync::{Arc, Mutex};

/// Callback invoked once per applied transaction.
pub type TransactionListener = Box<dyn Fn(&Transaction) + Send>;

/// Holder of the current snapshot plus transaction subscribers.
pub struct DocHost {
    current: Mutex<Arc<DocTree>>,
    listeners: Mutex<Vec<TransactionListener>>,
}

impl DocHost {
    pub fn new(tree: DocTree) -> Self {
        Self {
            current: Mutex::new(Arc::new(tree)),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// The current snapshot. Positions resolved against it are invalid once
    /// another transaction is dispatched; re-resolve rather than cache.
    pub fn tree(&self) -> Arc<DocTree> {
        lock(&self.current).clone()
    }

    /// Subscribe to applied transactions.
    pub fn subscribe(&self, listener: TransactionListener) {
        lock(&self.listeners).push(listener);
    }

    /// Apply a transaction: swap the current snapshot, then notify
    /// subscribers.
    ///
    /// Rejects transactions built against a snapshot that is no longer
    /// current; the caller rebuilds against the fresh tree.
    pub fn dispatch(&self, tr: Transaction) -> Result<Arc<DocTree>, TransactionError> {
        let after = {
            let mut current = lock(&self.current);
            if !Arc::ptr_eq(&current, tr.before()) {
                return Err(TransactionError::StaleTransaction);
            }
            *current = tr.after().clone();
            current.clone()
        };

        tracing::debug!(steps = tr.steps().len(), "transaction dispatched");
        let listeners = lock(&self.listeners);
        for listener in listeners.iter() {
            listener(&tr);
        }
        Ok(after)
    }
}
