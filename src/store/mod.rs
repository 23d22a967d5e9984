//! Shared store interface and change notifications.
//!
//! [`SharedStore`] is the only substrate the transport talks to: an
//! enumerable, string-keyed map plus a change feed. The feed delivers a
//! [`StorageEvent`] for every write made by *another* context; a context
//! never observes its own writes. [`memory::MemoryStore`] is the bundled
//! in-process implementation.

pub mod memory;

use std::fmt::Debug;

use tokio::sync::broadcast;

use crate::domain::StoreEntry;
use crate::error::StoreError;

pub use memory::{MemoryStore, StoreHandle};

/// Enumerable string-keyed map shared by every participant.
///
/// All operations are synchronous. `remove` of an absent key is a no-op,
/// which keeps racing garbage collectors harmless.
pub trait SharedStore: Debug + Send + Sync {
    /// Number of entries currently stored.
    fn len(&self) -> usize;

    /// Returns `true` if the store holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Key at position `index`, or `None` past the end.
    fn key(&self, index: usize) -> Option<String>;

    /// Value stored under `key`.
    fn get(&self, key: &str) -> Option<String>;

    /// Writes `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the write was rejected (for example
    /// because the store is full). The caller may retry later.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Removes `key` if present.
    fn remove(&self, key: &str);

    /// Opens a change feed for this context.
    fn subscribe(&self) -> ChangeSubscription;
}

/// A change observed in the store.
///
/// Mirrors browser storage events: a removal has a key but no new value,
/// a full clear has neither.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    /// Key that changed, `None` for a full clear.
    pub key: Option<String>,
    /// Value after the change, `None` for removals and clears.
    pub new_value: Option<String>,
}

impl StorageEvent {
    /// Event for a write of `key`.
    #[must_use]
    pub fn set(key: impl Into<String>, new_value: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            new_value: Some(new_value.into()),
        }
    }

    /// Event for the removal of `key`.
    #[must_use]
    pub fn removed(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            new_value: None,
        }
    }

    /// Event for a full clear.
    #[must_use]
    pub const fn cleared() -> Self {
        Self {
            key: None,
            new_value: None,
        }
    }

    /// Returns `true` if the event only signals a deletion.
    #[must_use]
    pub fn is_removal(&self) -> bool {
        self.key.is_some() && self.new_value.is_none()
    }

    /// Returns `true` if the event signals that the whole store was cleared.
    #[must_use]
    pub fn is_clear(&self) -> bool {
        self.key.is_none() && self.new_value.is_none()
    }
}

/// Identity of one execution context attached to a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(uuid::Uuid);

impl ContextId {
    /// Creates a new random context id.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

/// A [`StorageEvent`] together with the context that caused it.
#[derive(Debug, Clone)]
pub struct Notification {
    /// Writer of the change.
    pub origin: ContextId,
    /// The change itself.
    pub event: StorageEvent,
}

/// Change feed for one context. Skips notifications the context caused.
#[derive(Debug)]
pub struct ChangeSubscription {
    receiver: broadcast::Receiver<Notification>,
    context: ContextId,
}

impl ChangeSubscription {
    /// Wraps a broadcast receiver, filtering out `context`'s own writes.
    #[must_use]
    pub fn new(receiver: broadcast::Receiver<Notification>, context: ContextId) -> Self {
        Self { receiver, context }
    }

    /// Waits for the next change made by another context.
    ///
    /// # Errors
    ///
    /// Returns [`broadcast::error::RecvError::Lagged`] if notifications were
    /// dropped and [`broadcast::error::RecvError::Closed`] once the store is
    /// gone.
    pub async fn recv(&mut self) -> Result<StorageEvent, broadcast::error::RecvError> {
        loop {
            let notification = self.receiver.recv().await?;
            if notification.origin != self.context {
                return Ok(notification.event);
            }
        }
    }

    /// Returns the next pending change made by another context, if any.
    ///
    /// # Errors
    ///
    /// Returns [`broadcast::error::TryRecvError::Empty`] when nothing is
    /// pending, or the lag/close conditions of [`Self::recv`].
    pub fn try_recv(&mut self) -> Result<StorageEvent, broadcast::error::TryRecvError> {
        loop {
            let notification = self.receiver.try_recv()?;
            if notification.origin != self.context {
                return Ok(notification.event);
            }
        }
    }
}

/// Reads every entry of `store` in one pass.
///
/// Walks indices from the end, like a scan that may remove as it goes.
/// Keys that vanish mid-scan are skipped.
#[must_use]
pub fn entries(store: &dyn SharedStore) -> Vec<StoreEntry> {
    let len = store.len();
    let mut out = Vec::with_capacity(len);
    for index in (0..len).rev() {
        let Some(key) = store.key(index) else {
            continue;
        };
        let Some(value) = store.get(&key) else {
            continue;
        };
        out.push(StoreEntry { key, value });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kinds() {
        assert!(StorageEvent::removed("k").is_removal());
        assert!(!StorageEvent::removed("k").is_clear());
        assert!(StorageEvent::cleared().is_clear());
        assert!(!StorageEvent::cleared().is_removal());
        let set = StorageEvent::set("k", "v");
        assert!(!set.is_removal());
        assert!(!set.is_clear());
    }

    #[test]
    fn entries_reads_everything() {
        let store = MemoryStore::new();
        let handle = store.connect();
        assert!(handle.set("a", "1").is_ok());
        assert!(handle.set("b", "2").is_ok());

        let mut all = entries(&handle);
        all.sort_by(|x, y| x.key.cmp(&y.key));
        assert_eq!(
            all,
            vec![StoreEntry::new("a", "1"), StoreEntry::new("b", "2")]
        );
    }

    #[tokio::test]
    async fn subscription_skips_own_writes() {
        let store = MemoryStore::new();
        let mine = store.connect();
        let theirs = store.connect();
        let mut feed = mine.subscribe();

        assert!(mine.set("own", "1").is_ok());
        assert!(theirs.set("peer", "2").is_ok());

        let event = feed.recv().await;
        assert_eq!(event.ok(), Some(StorageEvent::set("peer", "2")));
        assert!(feed.try_recv().is_err());
    }
}
