//! Domain layer: identifiers, clock, and the store record codec.
//!
//! This module contains the value types shared by the store, transport
//! and hub layers. Nothing here touches the store itself.

pub mod clock;
pub mod ids;
pub mod record;

pub use clock::{Clock, ManualClock, SystemClock};
pub use ids::{MessageId, TargetId};
pub use record::{ListenerRecord, MessageRecord, Record, StoreEntry};
