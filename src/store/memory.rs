//! In-process shared store with per-context handles.
//!
//! [`MemoryStore`] holds the entries behind a single [`RwLock`] and keeps
//! insertion order, so `key(index)` enumerates like browser storage does.
//! Each participant attaches through its own [`StoreHandle`]; writes made
//! through a handle are broadcast to every other handle's change feed.
//!
//! # Concurrency
//!
//! - Reads from many handles run concurrently.
//! - Writes are serialized, and their notifications are sent while the
//!   write lock is held so feeds observe changes in store order.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::broadcast;

use super::{ChangeSubscription, ContextId, Notification, SharedStore, StorageEvent};
use crate::domain::StoreEntry;
use crate::error::StoreError;

/// Default capacity of the change-notification channel.
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 1_024;

#[derive(Debug, Default)]
struct Entries {
    keys: Vec<String>,
    values: HashMap<String, String>,
    bytes: usize,
}

#[derive(Debug)]
struct Shared {
    entries: RwLock<Entries>,
    quota: Option<usize>,
    sender: broadcast::Sender<Notification>,
}

/// Shared in-memory store. Cloning yields another reference to the same
/// entries.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    /// Creates an empty, unlimited store.
    #[must_use]
    pub fn new() -> Self {
        Self::build(None, DEFAULT_NOTIFICATION_CAPACITY)
    }

    /// Creates an empty store that rejects writes once keys and values
    /// together would exceed `limit_bytes`.
    #[must_use]
    pub fn with_quota(limit_bytes: usize) -> Self {
        Self::build(Some(limit_bytes), DEFAULT_NOTIFICATION_CAPACITY)
    }

    /// Creates an empty store with an explicit quota and notification
    /// channel capacity.
    #[must_use]
    pub fn build(quota: Option<usize>, notification_capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(notification_capacity.max(1));
        Self {
            shared: Arc::new(Shared {
                entries: RwLock::new(Entries::default()),
                quota,
                sender,
            }),
        }
    }

    /// Attaches a new execution context.
    #[must_use]
    pub fn connect(&self) -> StoreHandle {
        StoreHandle {
            shared: Arc::clone(&self.shared),
            context: ContextId::new(),
        }
    }

    /// Returns all entries in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<StoreEntry> {
        let entries = self.shared.read();
        entries
            .keys
            .iter()
            .filter_map(|key| {
                entries
                    .values
                    .get(key)
                    .map(|value| StoreEntry::new(key.clone(), value.clone()))
            })
            .collect()
    }

    /// Number of entries in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.read().keys.len()
    }

    /// Returns `true` if the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes used by keys and values.
    #[must_use]
    pub fn used_bytes(&self) -> usize {
        self.shared.read().bytes
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Shared {
    fn read(&self) -> std::sync::RwLockReadGuard<'_, Entries> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Entries> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, origin: ContextId, event: StorageEvent) {
        // No receivers is fine: nobody is listening yet.
        let _ = self.sender.send(Notification { origin, event });
    }
}

/// One execution context's view of a [`MemoryStore`].
#[derive(Debug, Clone)]
pub struct StoreHandle {
    shared: Arc<Shared>,
    context: ContextId,
}

impl StoreHandle {
    /// Identity of this context.
    #[must_use]
    pub const fn context(&self) -> ContextId {
        self.context
    }

    /// Removes every entry. Other contexts see a keyless event.
    pub fn clear(&self) {
        let mut entries = self.shared.write();
        if entries.keys.is_empty() {
            return;
        }
        *entries = Entries::default();
        self.shared.notify(self.context, StorageEvent::cleared());
    }
}

impl SharedStore for StoreHandle {
    fn len(&self) -> usize {
        self.shared.read().keys.len()
    }

    fn key(&self, index: usize) -> Option<String> {
        self.shared.read().keys.get(index).cloned()
    }

    fn get(&self, key: &str) -> Option<String> {
        self.shared.read().values.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.shared.write();
        let previous = entries.values.get(key).map(String::len);
        if entries.values.get(key).is_some_and(|v| v == value) {
            return Ok(());
        }

        let released = previous.map_or(0, |len| len + key.len());
        let needed = entries.bytes - released + key.len() + value.len();
        if let Some(limit) = self.shared.quota
            && needed > limit
        {
            return Err(StoreError::QuotaExceeded {
                key: key.to_string(),
                limit,
            });
        }

        if previous.is_none() {
            entries.keys.push(key.to_string());
        }
        entries.values.insert(key.to_string(), value.to_string());
        entries.bytes = needed;
        self.shared
            .notify(self.context, StorageEvent::set(key, value));
        Ok(())
    }

    fn remove(&self, key: &str) {
        let mut entries = self.shared.write();
        let Some(old) = entries.values.remove(key) else {
            return;
        };
        entries.keys.retain(|k| k != key);
        entries.bytes -= key.len() + old.len();
        self.shared.notify(self.context, StorageEvent::removed(key));
    }

    fn subscribe(&self) -> ChangeSubscription {
        ChangeSubscription::new(self.shared.sender.subscribe(), self.context)
    }
}
