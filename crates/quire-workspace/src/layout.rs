//! Process-local record of tenants whose default layout already exists.
//!
//! This is an idempotency shortcut only. The unique index on live node paths
//! is what actually prevents duplicate layout folders when two processes (or
//! two threads racing past the cache) initialize the same tenant.

use std::collections::HashSet;

use parking_lot::Mutex;

/// Keyed "already initialized" cache.
#[derive(Debug, Default)]
pub struct LayoutCache {
    initialized: Mutex<HashSet<String>>,
}

impl LayoutCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self, tenant_id: &str) -> bool {
        self.initialized.lock().contains(tenant_id)
    }

    /// Record a tenant as initialized. Returns `false` if it already was.
    pub fn mark(&self, tenant_id: &str) -> bool {
        self.initialized.lock().insert(tenant_id.to_string())
    }

    /// Drop a tenant from the cache so the next call re-checks storage.
    pub fn forget(&self, tenant_id: &str) {
        self.initialized.lock().remove(tenant_id);
    }

    pub fn len(&self) -> usize {
        self.initialized.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.initialized.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_mark_and_forget() {
        let cache = LayoutCache::new();
        assert!(!cache.is_initialized("t1"));
        assert!(cache.mark("t1"));
        assert!(!cache.mark("t1"));
        assert!(cache.is_initialized("t1"));
        cache.forget("t1");
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_mark_single_winner() {
        let cache = Arc::new(LayoutCache::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.mark("tenant"))
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(cache.len(), 1);
    }
}
