// SPDX-License-Identifier: MIT OR Apache-2.0

use std::any::Any;
use std::sync::{Arc, Mutex};

/// Opaque per-instance plugin state, shared between an instance and the
/// cleanup that destroys it.
pub type OpaqueData = Arc<dyn Any + Send + Sync>;

type Cleanup = Box<dyn FnOnce() + Send>;

/// A release scope with pre-registered destructors.
///
/// Plugin instances and other per-transaction objects register their
/// teardown here at creation time. When the scope is released (dropped, or
/// via [`MemScope::release`]) every registered cleanup runs exactly once,
/// in reverse registration order. Scopes form a strict tree: a subscope is
/// released no later than its parent.
pub struct MemScope {
    cleanups: Mutex<Vec<Cleanup>>,
}

impl MemScope {
    pub fn new() -> Self {
        Self {
            cleanups: Mutex::new(Vec::new()),
        }
    }

    /// Register a cleanup to run on release. LIFO order.
    pub fn register_cleanup<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cleanups
            .lock()
            .expect("Mutex poisoned")
            .push(Box::new(f));
    }

    pub fn cleanup_count(&self) -> usize {
        self.cleanups.lock().expect("Mutex poisoned").len()
    }

    /// Create a child scope whose release is tied to this scope.
    ///
    /// The returned handle may be dropped earlier; the parent keeps the
    /// scope alive (and releases it) otherwise.
    pub fn subscope(&self) -> Arc<MemScope> {
        let child = Arc::new(MemScope::new());
        let held = Arc::clone(&child);
        self.register_cleanup(move || drop(held));
        child
    }

    /// Run all registered cleanups now, newest first.
    pub fn release(&self) {
        let drained: Vec<Cleanup> = {
            let mut list = self.cleanups.lock().expect("Mutex poisoned");
            list.drain(..).collect()
        };
        for cleanup in drained.into_iter().rev() {
            cleanup();
        }
    }
}

impl Default for MemScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MemScope {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for MemScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemScope")
            .field("cleanups", &self.cleanup_count())
            .finish()
    }
}
