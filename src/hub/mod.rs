//! Typed pub/sub façade over one [`Transport`].
//!
//! [`Hub`] maps application event names onto transport sends and fans
//! received messages out to every callback registered for the event type.
//! It installs itself as the transport's single receive handler.

pub mod registry;

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use serde_json::Value;

use crate::domain::TargetId;
use crate::error::MessengerError;
use crate::store::SharedStore;
use crate::transport::{ReceiveHandler, Transport, TransportOptions};

pub use registry::{Listener, ListenerRegistry};

/// Event hub for one participant.
///
/// Cloning is not supported; share it behind an `Arc`. Dropping the hub
/// drops its transport, which removes the participant from the store.
#[derive(Debug)]
pub struct Hub {
    transport: Transport,
    listeners: Arc<Mutex<ListenerRegistry>>,
}

impl Hub {
    /// Creates a hub on `store` with a fresh participant.
    ///
    /// # Errors
    ///
    /// Returns [`MessengerError::NoRuntime`] when called outside a Tokio
    /// runtime.
    pub fn create(store: Arc<dyn SharedStore>) -> Result<Self, MessengerError> {
        Self::create_with(store, TransportOptions::default())
    }

    /// Creates a hub with explicit transport options.
    ///
    /// The dispatcher is handed to the transport before its background
    /// tasks start, replacing any handler already set in `options`.
    ///
    /// # Errors
    ///
    /// See [`Transport::create_with`].
    pub fn create_with(
        store: Arc<dyn SharedStore>,
        options: TransportOptions,
    ) -> Result<Self, MessengerError> {
        let listeners = Arc::new(Mutex::new(ListenerRegistry::new()));
        let options = options.with_receive_handler(dispatcher(&listeners));
        let transport = Transport::create_with(store, options)?;
        Ok(Self {
            transport,
            listeners,
        })
    }

    /// Wraps an existing transport, replacing its receive handler.
    ///
    /// Messages the transport consumed before this call were not seen by
    /// the hub; prefer [`Self::create_with`].
    #[must_use]
    pub fn new(transport: Transport) -> Self {
        let listeners = Arc::new(Mutex::new(ListenerRegistry::new()));
        let dispatch = dispatcher(&listeners);
        transport.set_receive_handler(move |event_type, params| dispatch(event_type, params));
        Self {
            transport,
            listeners,
        }
    }

    /// This participant's address.
    #[must_use]
    pub fn target_id(&self) -> &TargetId {
        self.transport.target_id()
    }

    /// The underlying transport.
    #[must_use]
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Registers `callback` for `event_type`.
    pub fn on(&self, event_type: impl Into<String>, callback: Listener) {
        self.registry().add(event_type, callback);
    }

    /// Removes one registration of exactly this `(event_type, callback)`
    /// pair, the most recent first. Returns `true` if one was removed.
    pub fn off(&self, event_type: &str, callback: &Listener) -> bool {
        self.registry().remove(event_type, callback)
    }

    /// Number of registered callbacks.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.registry().len()
    }

    /// Sends `event_type` with `params` to every other live participant.
    ///
    /// Returns the number of participants addressed.
    ///
    /// # Errors
    ///
    /// Returns [`MessengerError::Serialization`] if `params` cannot be
    /// represented as JSON, or [`MessengerError::Destroyed`] after
    /// [`Self::destroy`].
    pub fn trigger<T>(&self, event_type: &str, params: &T) -> Result<usize, MessengerError>
    where
        T: Serialize + ?Sized,
    {
        let params = serde_json::to_value(params)?;
        self.transport.send(event_type, &params)
    }

    /// Destroys the underlying transport. Idempotent.
    pub fn destroy(&self) {
        self.transport.destroy();
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, ListenerRegistry> {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn dispatcher(listeners: &Arc<Mutex<ListenerRegistry>>) -> ReceiveHandler {
    let listeners = Arc::clone(listeners);
    Arc::new(move |event_type, params| {
        // Release the lock before calling out so callbacks may use on/off.
        let callbacks = listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .matching(event_type);
        for callback in callbacks {
            callback(params);
        }
    })
}

/// Convenience for building a [`Listener`] from a closure.
pub fn listener<F>(callback: F) -> Listener
where
    F: Fn(&Value) + Send + Sync + 'static,
{
    Arc::new(callback)
}
