//! Utility functions for Notebook Core
//!
//! This module provides common utility functions used across the codebase.

mod hash;

pub use hash::{content_hash, EMPTY_CONTENT_HASH};

use std::sync::{Mutex, MutexGuard};

/// Lock a mutex, recovering the inner value if a previous holder panicked.
///
/// The engine is single-threaded by contract, so a poisoned lock can only
/// mean a panic already unwound through a holder; the data itself is still
/// consistent (every critical section is a plain field update).
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
