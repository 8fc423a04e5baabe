use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// A set of endpoint URLs behind a mutex.
///
/// Poisoning is recovered from: a panic in one holder must not take the
/// crawl loops down with it.
#[derive(Debug)]
struct EndpointSet {
    name: &'static str,
    endpoints: Mutex<BTreeSet<String>>,
}

impl EndpointSet {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            endpoints: Mutex::new(BTreeSet::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeSet<String>> {
        self.endpoints.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn get(&self) -> Vec<String> {
        self.lock().iter().cloned().collect()
    }

    fn append(&self, endpoint: String) -> bool {
        let added = self.lock().insert(endpoint);
        debug!("{}: append ({})", self.name, if added { "new" } else { "present" });
        added
    }

    fn combine<I>(&self, endpoints: I) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        let mut set = self.lock();
        let before = set.len();
        set.extend(endpoints);
        let added = set.len() - before;
        debug!("{}: combined {} new endpoint(s), {} total", self.name, added, set.len());
        added
    }

    fn clear(&self) {
        self.lock().clear();
    }

    fn remove_all(&self, endpoints: &[String]) -> usize {
        let mut set = self.lock();
        endpoints.iter().filter(|e| set.remove(e.as_str())).count()
    }

    fn len(&self) -> usize {
        self.lock().len()
    }

    fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

macro_rules! endpoint_registry {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug)]
        pub struct $name {
            inner: EndpointSet,
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl $name {
            pub fn new() -> Self {
                Self {
                    inner: EndpointSet::new($label),
                }
            }

            /// Sorted snapshot of the current contents.
            pub fn get(&self) -> Vec<String> {
                self.inner.get()
            }

            /// Add one endpoint. Returns false if it was already present.
            pub fn append(&self, endpoint: impl Into<String>) -> bool {
                self.inner.append(endpoint.into())
            }

            /// Merge many endpoints at once. Returns how many were new.
            pub fn combine<I, S>(&self, endpoints: I) -> usize
            where
                I: IntoIterator<Item = S>,
                S: Into<String>,
            {
                self.inner.combine(endpoints.into_iter().map(Into::into))
            }

            pub fn clear(&self) {
                self.inner.clear();
            }

            /// Remove exactly `endpoints`, leaving anything added since untouched.
            /// Returns how many were removed.
            pub fn remove_all(&self, endpoints: &[String]) -> usize {
                self.inner.remove_all(endpoints)
            }

            pub fn len(&self) -> usize {
                self.inner.len()
            }

            pub fn is_empty(&self) -> bool {
                self.inner.is_empty()
            }
        }
    };
}

endpoint_registry!(
    /// Endpoints submitted by callers and waiting for the next crawl pass.
    EndpointRegistry,
    "endpoint registry"
);

endpoint_registry!(
    /// Endpoints already crawled, waiting to be resubmitted by the scheduler.
    PlannedEndpointRegistry,
    "planned registry"
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_append_is_idempotent() {
        let registry = EndpointRegistry::new();
        assert!(registry.append("http://a/api/sparql/query"));
        assert!(!registry.append("http://a/api/sparql/query"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_get_is_sorted_snapshot() {
        let registry = EndpointRegistry::new();
        registry.combine(["http://c", "http://a", "http://b"]);
        let snapshot = registry.get();
        registry.append("http://d");
        assert_eq!(snapshot, vec!["http://a", "http://b", "http://c"]);
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_combine_collapses_duplicates() {
        let registry = PlannedEndpointRegistry::new();
        registry.append("http://x");
        let added = registry.combine(vec!["http://x".to_string(), "http://y".to_string(), "http://y".to_string()]);
        assert_eq!(added, 1);
        assert_eq!(registry.get(), vec!["http://x", "http://y"]);
    }

    #[test]
    fn test_remove_all_keeps_later_additions() {
        let registry = EndpointRegistry::new();
        registry.combine(["http://x", "http://y"]);
        let snapshot = registry.get();
        registry.append("http://z");

        assert_eq!(registry.remove_all(&snapshot), 2);
        assert_eq!(registry.get(), vec!["http://z"]);
    }

    #[test]
    fn test_clear() {
        let registry = EndpointRegistry::new();
        registry.combine(["http://x", "http://y"]);
        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_appends() {
        let registry = Arc::new(EndpointRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for i in 0..50 {
                        registry.append(format!("http://host-{}/{}", i % 10, t % 2));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.len(), 20);
    }

    #[test]
    fn test_recovers_from_poisoned_lock() {
        let registry = Arc::new(EndpointRegistry::new());
        registry.append("http://a");

        let poisoner = Arc::clone(&registry);
        let _ = thread::spawn(move || {
            let _guard = poisoner.inner.lock();
            panic!("poison the registry lock");
        })
        .join();

        registry.append("http://b");
        assert_eq!(registry.get(), vec!["http://a", "http://b"]);
    }
}
