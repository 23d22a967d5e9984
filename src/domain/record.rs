//! Record codec for entries multiplexed into the shared store.
//!
//! The store has no schema, so every entry this protocol writes carries a
//! kind tag inside its key. Keys are compact JSON objects:
//!
//! ```text
//! {"tag":"8cc00beb-…","targetId":"a1"}                                  listener
//! {"tag":"b6297eba-…","messageId":"…","targetId":"b1",
//!  "eventType":"hey","params":{}}                                       message
//! ```
//!
//! Values are decimal Unix-millisecond timestamps. Entries that do not
//! decode are foreign data and are never treated as an error.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{MessageId, TargetId};

/// Tag carried by every listener record key.
pub const LISTENER_TAG: &str = "8cc00beb-0943-41e8-9bbf-a74f91e3679e";

/// Tag carried by every message record key.
pub const MESSAGE_TAG: &str = "b6297eba-31e4-11e3-8cf6-ce3f5508acd9";

/// One raw `(key, value)` pair read from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEntry {
    /// Store key.
    pub key: String,
    /// Store value.
    pub value: String,
}

impl StoreEntry {
    /// Creates an entry from a key and value.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Decodes the key, returning `None` for foreign entries.
    #[must_use]
    pub fn record(&self) -> Option<Record> {
        decode(&self.key)
    }
}

/// Presence of one live participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenerRecord {
    /// Address of the participant.
    pub target_id: TargetId,
}

/// One addressed, undelivered message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    /// Fresh id making the key unique.
    pub message_id: MessageId,
    /// Recipient address.
    pub target_id: TargetId,
    /// Application event name.
    pub event_type: String,
    /// Event payload.
    #[serde(default)]
    pub params: Value,
}

/// A decoded protocol record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
// serde renames must be literals; keep them equal to LISTENER_TAG and MESSAGE_TAG.
#[serde(tag = "tag")]
pub enum Record {
    /// A participant's presence record.
    #[serde(rename = "8cc00beb-0943-41e8-9bbf-a74f91e3679e")]
    Listener(ListenerRecord),
    /// A message addressed to one participant.
    #[serde(rename = "b6297eba-31e4-11e3-8cf6-ce3f5508acd9")]
    Message(MessageRecord),
}

impl Record {
    /// Builds a listener record for `target_id`.
    #[must_use]
    pub fn listener(target_id: TargetId) -> Self {
        Self::Listener(ListenerRecord { target_id })
    }

    /// Builds a message record with a fresh [`MessageId`].
    #[must_use]
    pub fn message(target_id: TargetId, event_type: impl Into<String>, params: Value) -> Self {
        Self::Message(MessageRecord {
            message_id: MessageId::new(),
            target_id,
            event_type: event_type.into(),
            params,
        })
    }

    /// Address carried by the record.
    #[must_use]
    pub fn target_id(&self) -> &TargetId {
        match self {
            Self::Listener(l) => &l.target_id,
            Self::Message(m) => &m.target_id,
        }
    }
}

/// Encodes a record into its store key.
///
/// # Errors
///
/// Returns the `serde_json` error if the params cannot be written, which
/// does not happen for a well-formed [`Value`].
pub fn encode(record: &Record) -> Result<String, serde_json::Error> {
    serde_json::to_string(record)
}

/// Decodes a store key. Malformed or foreign keys yield `None`.
#[must_use]
pub fn decode(key: &str) -> Option<Record> {
    if !key.starts_with('{') {
        return None;
    }
    serde_json::from_str(key).ok()
}

/// Returns `true` if the entry's key decodes to a listener record.
#[must_use]
pub fn is_listener_record(entry: &StoreEntry) -> bool {
    matches!(entry.record(), Some(Record::Listener(_)))
}

/// Returns `true` if the entry's key decodes to a message record.
#[must_use]
pub fn is_message_record(entry: &StoreEntry) -> bool {
    matches!(entry.record(), Some(Record::Message(_)))
}

/// Returns `true` if the entry's key decodes to a record addressed to `id`.
#[must_use]
pub fn has_target_id(entry: &StoreEntry, id: &TargetId) -> bool {
    entry.record().is_some_and(|r| r.target_id() == id)
}

/// Parses a stored timestamp.
#[must_use]
pub fn parse_timestamp(value: &str) -> Option<i64> {
    value.trim().parse().ok()
}

/// Formats `now` as a store value.
#[must_use]
pub fn timestamp_value(now_millis: i64) -> String {
    now_millis.to_string()
}

/// Returns `true` if the entry is older than `ttl_millis` at `now_millis`.
///
/// An unparsable timestamp counts as infinitely old.
#[must_use]
pub fn is_expired(entry: &StoreEntry, now_millis: i64, ttl_millis: i64) -> bool {
    parse_timestamp(&entry.value).is_none_or(|ts| now_millis.saturating_sub(ts) > ttl_millis)
}
