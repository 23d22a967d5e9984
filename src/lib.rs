//! # storage-messenger
//!
//! Addressed pub/sub messaging between isolated execution contexts that
//! share nothing but a key-value store.
//!
//! Participants never hold references to each other. Each one announces
//! itself with a heartbeated listener record, sends by writing one message
//! record per live peer, and receives by consuming the records addressed to
//! it when the store's change feed fires. Stale participants and the
//! messages left for them are garbage-collected by whoever notices first.
//!
//! ## Architecture
//!
//! ```text
//! Application
//!     │
//!     ├── Hub (hub/)            on / off / trigger
//!     │
//!     ├── Transport (transport/) heartbeat, send, deliver, GC
//!     │
//!     ├── Record codec (domain/) listener + message keys
//!     │
//!     └── SharedStore (store/)   MemoryStore or any implementation
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use storage_messenger::hub::{Hub, listener};
//! use storage_messenger::store::{MemoryStore, SharedStore};
//!
//! # async fn run() -> Result<(), storage_messenger::error::MessengerError> {
//! let store = MemoryStore::new();
//! let left: Arc<dyn SharedStore> = Arc::new(store.connect());
//! let right: Arc<dyn SharedStore> = Arc::new(store.connect());
//!
//! let sender = Hub::create(left)?;
//! let receiver = Hub::create(right)?;
//! receiver.on("greeting", listener(|params| println!("got {params}")));
//!
//! sender.trigger("greeting", "hello")?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod domain;
pub mod error;
pub mod hub;
pub mod store;
pub mod transport;

pub use error::{MessengerError, StoreError};
pub use hub::Hub;
pub use transport::Transport;
