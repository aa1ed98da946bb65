//! The work set: a deduplicated, insertion-ordered map from host to its
//! most recent serialized answer.
//!
//! A scan always visits entries in insertion order, which makes the resume
//! cursor meaningful across passes within one process. Writes are atomic
//! per key; get/set/scan are safe to call concurrently.

use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
struct Inner {
    order: Vec<String>,
    entries: HashMap<String, Option<Vec<u8>>>,
}

/// Insertion-ordered host → answer-payload map shared by the pipeline.
#[derive(Default)]
pub struct WorkSet {
    inner: RwLock<Inner>,
}

impl WorkSet {
    /// Creates an empty work set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `host` with an empty payload unless it is already present.
    /// Returns true when the host was newly inserted.
    pub fn put_if_absent(&self, host: &str) -> bool {
        let mut inner = self.inner.write().expect("work set lock poisoned");
        if inner.entries.contains_key(host) {
            return false;
        }
        inner.order.push(host.to_string());
        inner.entries.insert(host.to_string(), None);
        true
    }

    /// Returns the payload stored for `host`: `None` when the host is
    /// unknown, `Some(None)` when it is queued but unresolved.
    pub fn get(&self, host: &str) -> Option<Option<Vec<u8>>> {
        let inner = self.inner.read().expect("work set lock poisoned");
        inner.entries.get(host).cloned()
    }

    /// Stores `payload` for `host`, inserting the host if needed.
    pub fn set(&self, host: &str, payload: Vec<u8>) {
        let mut inner = self.inner.write().expect("work set lock poisoned");
        if !inner.entries.contains_key(host) {
            inner.order.push(host.to_string());
        }
        inner.entries.insert(host.to_string(), Some(payload));
    }

    /// Number of hosts in the set.
    pub fn len(&self) -> usize {
        self.inner.read().expect("work set lock poisoned").order.len()
    }

    /// True when the set holds no hosts.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visits every entry exactly once, in insertion order.
    ///
    /// The read lock is held for the duration of the scan; callers must not
    /// call `set` or `put_if_absent` from inside the closure.
    pub fn scan<F>(&self, mut f: F)
    where
        F: FnMut(&str, Option<&[u8]>),
    {
        let inner = self.inner.read().expect("work set lock poisoned");
        for host in &inner.order {
            if let Some(payload) = inner.entries.get(host) {
                f(host, payload.as_deref());
            }
        }
    }

    /// Snapshot of the hosts in scan order.
    pub fn hosts(&self) -> Vec<String> {
        self.inner.read().expect("work set lock poisoned").order.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_if_absent_is_idempotent() {
        let set = WorkSet::new();
        assert!(set.put_if_absent("a.example.com"));
        assert!(!set.put_if_absent("a.example.com"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn scan_preserves_insertion_order() {
        let set = WorkSet::new();
        for host in ["c.test", "a.test", "b.test"] {
            set.put_if_absent(host);
        }
        // repeated insertion must not move an entry
        set.put_if_absent("c.test");

        let mut first = Vec::new();
        set.scan(|host, _| first.push(host.to_string()));
        let mut second = Vec::new();
        set.scan(|host, _| second.push(host.to_string()));

        assert_eq!(first, vec!["c.test", "a.test", "b.test"]);
        assert_eq!(first, second);
    }

    #[test]
    fn set_updates_payload_without_reordering() {
        let set = WorkSet::new();
        set.put_if_absent("a.test");
        set.put_if_absent("b.test");
        set.set("a.test", b"payload".to_vec());

        assert_eq!(set.get("a.test"), Some(Some(b"payload".to_vec())));
        assert_eq!(set.get("b.test"), Some(None));
        assert_eq!(set.get("missing.test"), None);
        assert_eq!(set.hosts(), vec!["a.test", "b.test"]);
    }

    #[test]
    fn scan_visits_each_entry_once() {
        let set = WorkSet::new();
        for i in 0..50 {
            set.put_if_absent(&format!("host{i}.test"));
        }
        let mut seen = std::collections::HashSet::new();
        set.scan(|host, _| {
            assert!(seen.insert(host.to_string()), "duplicate visit: {host}");
        });
        assert_eq!(seen.len(), 50);
    }
}
