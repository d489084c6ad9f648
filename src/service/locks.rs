//! Per-namespace write locks.
//!
//! Acquisition never waits: a namespace that is already being written is
//! reported busy immediately.

use std::sync::Arc;

use dashmap::DashSet;

/// Set of namespaces with a write in progress.
#[derive(Debug, Clone, Default)]
pub struct NamespaceLocks {
    held: Arc<DashSet<String>>,
}

impl NamespaceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the write lock of `namespace`, or `None` if it is held.
    pub fn try_acquire(&self, namespace: &str) -> Option<NamespaceGuard> {
        if self.held.insert(namespace.to_string()) {
            Some(NamespaceGuard {
                held: Arc::clone(&self.held),
                namespace: namespace.to_string(),
            })
        } else {
            None
        }
    }

    pub fn is_locked(&self, namespace: &str) -> bool {
        self.held.contains(namespace)
    }
}

/// Releases the namespace on drop.
#[derive(Debug)]
pub struct NamespaceGuard {
    held: Arc<DashSet<String>>,
    namespace: String,
}

impl NamespaceGuard {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl Drop for NamespaceGuard {
    fn drop(&mut self) {
        self.held.remove(&self.namespace);
    }
}
