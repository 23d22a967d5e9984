//! Messenger error types.
//!
//! [`StoreError`] describes a failed write against the shared store. It is
//! transient by nature: the transport logs it and lets the next heartbeat
//! retry. [`MessengerError`] is what the public API returns, and it only
//! carries programming errors (bad payloads, use after destroy, missing
//! runtime, invalid configuration).

/// Failure reported by a [`crate::store::SharedStore`] write.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The write would push the store past its byte quota.
    #[error("store quota of {limit} bytes exceeded while writing {key}")]
    QuotaExceeded {
        /// Key that could not be written.
        key: String,
        /// Configured quota in bytes.
        limit: usize,
    },

    /// The store rejected the write for another reason.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Error enum for the public messenger API.
///
/// # Error Codes
///
/// | Range     | Category                 |
/// |-----------|--------------------------|
/// | 1000–1999 | Caller / programming     |
/// | 2000–2999 | Lifecycle                |
#[derive(Debug, thiserror::Error)]
pub enum MessengerError {
    /// Event params could not be represented as JSON.
    #[error("params are not serializable: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration values are inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The transport was used after `destroy()`.
    #[error("transport has been destroyed")]
    Destroyed,

    /// No Tokio runtime is available to own the background tasks.
    #[error("no tokio runtime available: {0}")]
    NoRuntime(String),
}

impl MessengerError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::Serialization(_) => 1001,
            Self::InvalidConfig(_) => 1002,
            Self::Destroyed => 2001,
            Self::NoRuntime(_) => 2002,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn codes_fall_in_their_category_ranges() {
        assert_eq!(MessengerError::InvalidConfig("ttl".to_string()).error_code(), 1002);
        assert_eq!(MessengerError::Destroyed.error_code(), 2001);
        assert_eq!(
            MessengerError::NoRuntime("no reactor".to_string()).error_code(),
            2002
        );
    }

    #[test]
    fn quota_message_names_key_and_limit() {
        let err = StoreError::QuotaExceeded {
            key: "k".to_string(),
            limit: 16,
        };
        let text = err.to_string();
        assert!(text.contains("16"));
        assert!(text.contains('k'));
    }

    #[test]
    fn serialization_error_converts() {
        let Err(json_err) = serde_json::from_str::<serde_json::Value>("{") else {
            panic!("expected a parse error");
        };
        let err = MessengerError::from(json_err);
        assert_eq!(err.error_code(), 1001);
    }
}
