//! Thread-local runtime context
//!
//! Guest code may call back into the host, and the host may open a nested
//! runtime from there. The currently active context is tracked per thread;
//! guards capture the previous value on construction and put it back on
//! drop, whichever way the scope is left.

use std::cell::Cell;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies one execution environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

impl ContextId {
    pub fn next() -> Self {
        ContextId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

thread_local! {
    static ACTIVE: Cell<Option<ContextId>> = const { Cell::new(None) };
}

/// The context installed on this thread, if any
pub fn active() -> Option<ContextId> {
    ACTIVE.with(|c| c.get())
}

/// Restores the previously active context when dropped
#[must_use = "the previous context is restored when the guard is dropped"]
pub struct ContextGuard {
    prev: Option<ContextId>,
    // Tied to the thread whose cell it captured
    _not_send: PhantomData<*const ()>,
}

impl ContextGuard {
    /// Stash the caller's context and run with none installed
    pub fn isolate() -> Self {
        Self::swap(None)
    }

    /// Install `id` as the active context
    pub fn enter(id: ContextId) -> Self {
        Self::swap(Some(id))
    }

    fn swap(next: Option<ContextId>) -> Self {
        let prev = ACTIVE.with(|c| c.replace(next));
        Self {
            prev,
            _not_send: PhantomData,
        }
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        ACTIVE.with(|c| c.set(self.prev));
    }
}
