//! Point-to-point messaging over a shared key-value store.
//!
//! A [`Transport`] is one participant. It announces itself with a listener
//! record that a heartbeat keeps fresh, sends by writing one message record
//! per live peer, receives by scanning for records addressed to itself when
//! the change feed fires, and removes peers whose listener record went stale
//! together with the messages nobody will ever read.
//!
//! # Lifecycle
//!
//! `Initializing → Active → Destroyed`. Creation registers the listener,
//! runs one garbage-collection pass, then spawns the heartbeat and
//! change-feed tasks. [`Transport::destroy`] (or dropping the transport)
//! aborts both tasks and removes the listener record.

mod tasks;

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, TryLockError};

use serde_json::Value;
use tokio::task::JoinHandle;

use crate::config::TransportConfig;
use crate::domain::record::{self, Record};
use crate::domain::{Clock, SystemClock, TargetId};
use crate::error::MessengerError;
use crate::store::{self, SharedStore, StorageEvent};

/// Callback invoked with `(event_type, params)` for every consumed message.
pub type ReceiveHandler = Arc<dyn Fn(&str, &Value) + Send + Sync>;

/// Lifecycle state of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    /// Registering and running the first garbage-collection pass.
    Initializing,
    /// Heartbeating and receiving.
    Active,
    /// Terminal. Nothing runs any more.
    Destroyed,
}

/// What a change notification asks the transport to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    /// Deletion only; nothing to read.
    Ignore,
    /// Scan for messages addressed to self.
    Deliver,
    /// The store was cleared: re-register and collect garbage.
    Collect,
}

/// Classifies a change notification.
#[must_use]
pub fn classify(event: &StorageEvent) -> ChangeAction {
    if event.is_removal() {
        ChangeAction::Ignore
    } else if event.is_clear() {
        ChangeAction::Collect
    } else {
        ChangeAction::Deliver
    }
}

/// Construction options for [`Transport::create_with`].
#[derive(Clone)]
pub struct TransportOptions {
    /// Timing parameters.
    pub config: TransportConfig,
    /// Clock used for record timestamps.
    pub clock: Arc<dyn Clock>,
    /// Fixed address; a random one is generated when `None`.
    pub target_id: Option<TargetId>,
    /// Receive callback installed before the background tasks start.
    pub handler: Option<ReceiveHandler>,
}

impl fmt::Debug for TransportOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportOptions")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .field("target_id", &self.target_id)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

impl TransportOptions {
    /// Replaces the timing parameters.
    #[must_use]
    pub fn with_config(mut self, config: TransportConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Pins the participant address.
    #[must_use]
    pub fn with_target_id(mut self, target_id: impl Into<TargetId>) -> Self {
        self.target_id = Some(target_id.into());
        self
    }

    /// Sets the receive callback so that no message arriving between
    /// creation and a later [`Transport::set_receive_handler`] is consumed
    /// unhandled.
    #[must_use]
    pub fn with_receive_handler(mut self, handler: ReceiveHandler) -> Self {
        self.handler = Some(handler);
        self
    }
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            config: TransportConfig::default(),
            clock: Arc::new(SystemClock),
            target_id: None,
            handler: None,
        }
    }
}

struct Inner {
    store: Arc<dyn SharedStore>,
    target_id: TargetId,
    listener_key: String,
    config: TransportConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<TransportState>,
    handler: RwLock<Option<ReceiveHandler>>,
    delivery: Mutex<()>,
}

impl fmt::Debug for Inner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inner")
            .field("target_id", &self.target_id)
            .field("state", &self.state())
            .field("config", &self.config)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, TransportState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> TransportState {
        *self.lock_state()
    }

    fn is_active(&self) -> bool {
        self.state() == TransportState::Active
    }

    fn handler(&self) -> Option<ReceiveHandler> {
        self.handler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Writes the own listener record with a fresh timestamp.
    ///
    /// The state lock is held across the write so a concurrent `destroy`
    /// either runs first (and the write is skipped) or waits for it and
    /// removes the record afterwards.
    fn register(&self) {
        let state = self.lock_state();
        if *state == TransportState::Destroyed {
            return;
        }
        let value = record::timestamp_value(self.clock.now_millis());
        let result = self.store.set(&self.listener_key, &value);
        drop(state);
        if let Err(err) = result {
            tracing::warn!(
                target_id = %self.target_id,
                error = %err,
                "listener refresh dropped, retrying next heartbeat"
            );
        }
    }

    fn heartbeat(&self) {
        self.register();
        self.collect_garbage();
    }

    fn apply(&self, action: ChangeAction) -> usize {
        if !self.is_active() {
            return 0;
        }
        match action {
            ChangeAction::Ignore => 0,
            ChangeAction::Deliver => self.deliver_pending(),
            ChangeAction::Collect => {
                self.register();
                self.collect_garbage()
            }
        }
    }

    fn send(&self, event_type: &str, params: &Value) -> usize {
        let now = self.clock.now_millis();
        let ttl = self.config.ttl_millis();
        let value = record::timestamp_value(now);
        let mut recipients = HashSet::new();
        let mut written = 0;

        for entry in store::entries(self.store.as_ref()) {
            let Some(Record::Listener(listener)) = entry.record() else {
                continue;
            };
            if listener.target_id == self.target_id
                || record::is_expired(&entry, now, ttl)
                || !recipients.insert(listener.target_id.clone())
            {
                continue;
            }

            let message = Record::message(listener.target_id, event_type, params.clone());
            let key = match record::encode(&message) {
                Ok(key) => key,
                Err(err) => {
                    tracing::warn!(error = %err, "message record could not be encoded");
                    continue;
                }
            };
            match self.store.set(&key, &value) {
                Ok(()) => written += 1,
                Err(err) => tracing::warn!(
                    target_id = %self.target_id,
                    recipient = %message.target_id(),
                    error = %err,
                    "message write dropped"
                ),
            }
        }

        tracing::debug!(
            target_id = %self.target_id,
            event_type,
            recipients = written,
            "message sent"
        );
        written
    }

    fn deliver_pending(&self) -> usize {
        if !self.is_active() {
            return 0;
        }
        let _guard = match self.delivery.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return 0,
        };

        let handler = self.handler();
        let mut delivered = 0;
        for entry in store::entries(self.store.as_ref()) {
            let Some(Record::Message(message)) = entry.record() else {
                continue;
            };
            if message.target_id != self.target_id {
                continue;
            }
            if !self.is_active() {
                break;
            }
            if let Some(handler) = &handler {
                handler(&message.event_type, &message.params);
            }
            self.store.remove(&entry.key);
            delivered += 1;
        }

        if delivered > 0 {
            tracing::debug!(target_id = %self.target_id, delivered, "messages delivered");
        }
        delivered
    }

    fn collect_garbage(&self) -> usize {
        let now = self.clock.now_millis();
        let ttl = self.config.ttl_millis();
        let decoded: Vec<_> = store::entries(self.store.as_ref())
            .into_iter()
            .filter_map(|entry| entry.record().map(|record| (entry, record)))
            .collect();

        let mut live = HashSet::new();
        let mut dead = HashSet::new();
        let mut removed = 0;

        for (entry, record) in &decoded {
            let Record::Listener(listener) = record else {
                continue;
            };
            if listener.target_id == self.target_id || !record::is_expired(entry, now, ttl) {
                live.insert(listener.target_id.clone());
            } else {
                self.store.remove(&entry.key);
                dead.insert(listener.target_id.clone());
                removed += 1;
            }
        }

        for (entry, record) in &decoded {
            let Record::Message(message) = record else {
                continue;
            };
            let target = &message.target_id;
            if *target == self.target_id || live.contains(target) {
                continue;
            }
            // Orphans whose listener is already gone expire on their own stamp.
            if dead.contains(target) || record::is_expired(entry, now, ttl) {
                self.store.remove(&entry.key);
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::debug!(
                target_id = %self.target_id,
                removed,
                dead_listeners = dead.len(),
                "garbage collected"
            );
        }
        removed
    }
}

struct Tasks {
    heartbeat: JoinHandle<()>,
    notifications: JoinHandle<()>,
}

impl Tasks {
    fn abort(self) {
        self.heartbeat.abort();
        self.notifications.abort();
    }
}

/// One participant on the shared store.
///
/// Must be created inside a Tokio runtime, which owns the heartbeat and
/// change-feed tasks. Dropping the transport destroys it.
pub struct Transport {
    inner: Arc<Inner>,
    tasks: Mutex<Option<Tasks>>,
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl Transport {
    /// Creates a transport with a random address and default timing.
    ///
    /// # Errors
    ///
    /// Returns [`MessengerError::NoRuntime`] when called outside a Tokio
    /// runtime.
    pub fn create(store: Arc<dyn SharedStore>) -> Result<Self, MessengerError> {
        Self::create_with(store, TransportOptions::default())
    }

    /// Creates a transport with explicit options.
    ///
    /// Registers the listener record, runs one garbage-collection pass and
    /// starts the background tasks. A failed registration write is logged
    /// and retried by the first heartbeat.
    ///
    /// # Errors
    ///
    /// Returns [`MessengerError::InvalidConfig`] if the heartbeat is not
    /// shorter than the TTL, or [`MessengerError::NoRuntime`] when called
    /// outside a Tokio runtime.
    pub fn create_with(
        store: Arc<dyn SharedStore>,
        options: TransportOptions,
    ) -> Result<Self, MessengerError> {
        options.config.validate()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|err| MessengerError::NoRuntime(err.to_string()))?;

        let target_id = options.target_id.unwrap_or_default();
        let listener_key = record::encode(&Record::listener(target_id.clone()))?;
        let inner = Arc::new(Inner {
            store,
            target_id,
            listener_key,
            config: options.config,
            clock: options.clock,
            state: Mutex::new(TransportState::Initializing),
            handler: RwLock::new(options.handler),
            delivery: Mutex::new(()),
        });

        inner.register();
        let feed = inner.store.subscribe();
        inner.collect_garbage();
        *inner.lock_state() = TransportState::Active;

        let tasks = Tasks {
            heartbeat: runtime.spawn(tasks::heartbeat(Arc::clone(&inner))),
            notifications: runtime.spawn(tasks::notifications(Arc::clone(&inner), feed)),
        };

        tracing::info!(target_id = %inner.target_id, "transport created");
        Ok(Self {
            inner,
            tasks: Mutex::new(Some(tasks)),
        })
    }

    /// This participant's address.
    #[must_use]
    pub fn target_id(&self) -> &TargetId {
        &self.inner.target_id
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> TransportState {
        self.inner.state()
    }

    /// Timing parameters in use.
    #[must_use]
    pub fn config(&self) -> &TransportConfig {
        &self.inner.config
    }

    /// Writes one message record per live peer.
    ///
    /// Returns the number of records written; zero when no other live
    /// participant exists. Failed writes are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`MessengerError::Destroyed`] after [`Self::destroy`].
    pub fn send(&self, event_type: &str, params: &Value) -> Result<usize, MessengerError> {
        if self.state() == TransportState::Destroyed {
            return Err(MessengerError::Destroyed);
        }
        Ok(self.inner.send(event_type, params))
    }

    /// Installs the single receive callback, replacing any previous one.
    pub fn set_receive_handler<F>(&self, handler: F)
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        *self
            .inner
            .handler
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(handler));
    }

    /// Classifies a change notification without acting on it.
    #[must_use]
    pub fn handle_change(&self, event: &StorageEvent) -> ChangeAction {
        classify(event)
    }

    /// Runs the deferred step for a classified notification.
    ///
    /// Returns the number of messages delivered or entries collected.
    /// No-op once destroyed.
    pub fn apply(&self, action: ChangeAction) -> usize {
        self.inner.apply(action)
    }

    /// Delivers and deletes every message addressed to this participant.
    ///
    /// Returns the number of messages consumed. Returns 0 after destroy or
    /// when called from inside the receive handler.
    pub fn deliver_pending(&self) -> usize {
        self.inner.deliver_pending()
    }

    /// Removes dead listener records and the messages addressed to them.
    ///
    /// Returns the number of entries removed.
    pub fn collect_garbage(&self) -> usize {
        self.inner.collect_garbage()
    }

    /// Runs one heartbeat tick: refresh the listener, then collect garbage.
    /// No-op once destroyed.
    pub fn heartbeat(&self) {
        if self.inner.is_active() {
            self.inner.heartbeat();
        }
    }

    /// Stops background work and removes the listener record. Idempotent.
    pub fn destroy(&self) {
        {
            let mut state = self.inner.lock_state();
            if *state == TransportState::Destroyed {
                return;
            }
            *state = TransportState::Destroyed;
            self.inner.store.remove(&self.inner.listener_key);
        }

        if let Some(tasks) = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            tasks.abort();
        }

        tracing::info!(target_id = %self.inner.target_id, "transport destroyed");
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.destroy();
    }
}
