//! Per-hub listener registry.
//!
//! Tracks which callbacks are registered for which event types and
//! provides receive-side fan-out in registration order.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// Application callback invoked with the event params.
pub type Listener = Arc<dyn Fn(&Value) + Send + Sync>;

struct Registration {
    event_type: String,
    callback: Listener,
}

/// Ordered list of `(event_type, callback)` registrations.
///
/// The same pair may be registered more than once; each registration is
/// invoked and removed independently.
#[derive(Default)]
pub struct ListenerRegistry {
    registrations: Vec<Registration>,
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.registrations.iter().map(|r| &r.event_type))
            .finish()
    }
}

impl ListenerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a registration.
    pub fn add(&mut self, event_type: impl Into<String>, callback: Listener) {
        self.registrations.push(Registration {
            event_type: event_type.into(),
            callback,
        });
    }

    /// Removes the most recently added registration of exactly this pair.
    ///
    /// Callbacks are compared by `Arc` identity. Returns `true` if one was
    /// removed.
    pub fn remove(&mut self, event_type: &str, callback: &Listener) -> bool {
        let found = self
            .registrations
            .iter()
            .rposition(|r| r.event_type == event_type && Arc::ptr_eq(&r.callback, callback));
        match found {
            Some(index) => {
                self.registrations.remove(index);
                true
            }
            None => false,
        }
    }

    /// Callbacks registered for `event_type`, in registration order.
    #[must_use]
    pub fn matching(&self, event_type: &str) -> Vec<Listener> {
        self.registrations
            .iter()
            .filter(|r| r.event_type == event_type)
            .map(|r| Arc::clone(&r.callback))
            .collect()
    }

    /// Total number of registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn noop() -> Listener {
        Arc::new(|_: &Value| {})
    }

    #[test]
    fn empty_matches_nothing() {
        let registry = ListenerRegistry::new();
        assert!(registry.matching("x").is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn matching_keeps_registration_order() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut registry = ListenerRegistry::new();
        for n in 0..3 {
            let order = Arc::clone(&order);
            registry.add("x", Arc::new(move |_: &Value| {
                if let Ok(mut o) = order.lock() {
                    o.push(n);
                }
            }));
        }
        registry.add("y", noop());

        let callbacks = registry.matching("x");
        assert_eq!(callbacks.len(), 3);
        for cb in &callbacks {
            cb(&Value::Null);
        }
        let seen = order.lock().map(|o| o.clone()).unwrap_or_default();
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[test]
    fn remove_requires_exact_pair() {
        let mut registry = ListenerRegistry::new();
        let cb = noop();
        registry.add("x", Arc::clone(&cb));

        assert!(!registry.remove("y", &cb));
        assert!(!registry.remove("x", &noop()));
        assert!(registry.remove("x", &cb));
        assert!(registry.is_empty());
    }

    #[test]
    fn remove_takes_one_duplicate_at_a_time() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let cb: Listener = Arc::new(move |_: &Value| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let mut registry = ListenerRegistry::new();
        registry.add("x", Arc::clone(&cb));
        registry.add("x", Arc::clone(&cb));

        assert!(registry.remove("x", &cb));
        assert_eq!(registry.len(), 1);
        for listener in registry.matching("x") {
            listener(&Value::Null);
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn remove_scans_from_most_recent() {
        let mut registry = ListenerRegistry::new();
        let cb = noop();
        let other = noop();
        registry.add("x", Arc::clone(&cb));
        registry.add("x", Arc::clone(&other));
        registry.add("x", Arc::clone(&cb));

        assert!(registry.remove("x", &cb));
        let left = registry.matching("x");
        assert_eq!(left.len(), 2);
        let first = left.first().map(|l| Arc::ptr_eq(l, &cb));
        let second = left.get(1).map(|l| Arc::ptr_eq(l, &other));
        assert_eq!(first, Some(true));
        assert_eq!(second, Some(true));
    }
}
