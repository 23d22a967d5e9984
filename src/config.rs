//! Messenger configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). [`TransportConfig`] is the subset a
//! [`crate::transport::Transport`] needs; the rest drives the demo binary.

use std::time::Duration;

use crate::error::MessengerError;

/// Default time after which an unrefreshed listener record is dead.
pub const DEFAULT_TTL_MS: u64 = 1_000;

/// Default heartbeat interval. Kept well under the TTL so a single missed
/// tick does not expire a live participant.
pub const DEFAULT_HEARTBEAT_MS: u64 = 400;

/// Timing parameters for one transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
    /// Age after which a listener record is considered dead.
    pub ttl: Duration,
    /// Interval between listener refreshes. Must be shorter than `ttl`.
    pub heartbeat_interval: Duration,
}

impl TransportConfig {
    /// Creates a config from millisecond values.
    #[must_use]
    pub const fn from_millis(ttl_ms: u64, heartbeat_ms: u64) -> Self {
        Self {
            ttl: Duration::from_millis(ttl_ms),
            heartbeat_interval: Duration::from_millis(heartbeat_ms),
        }
    }

    /// Returns the TTL in whole milliseconds, saturating at `i64::MAX`.
    #[must_use]
    pub fn ttl_millis(&self) -> i64 {
        i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX)
    }

    /// Checks that the heartbeat can keep a listener alive.
    ///
    /// # Errors
    ///
    /// Returns [`MessengerError::InvalidConfig`] if the TTL or heartbeat is
    /// zero, or the heartbeat is not strictly shorter than the TTL.
    pub fn validate(&self) -> Result<(), MessengerError> {
        if self.ttl.is_zero() {
            return Err(MessengerError::InvalidConfig(
                "ttl must be greater than zero".to_string(),
            ));
        }
        if self.heartbeat_interval.is_zero() {
            return Err(MessengerError::InvalidConfig(
                "heartbeat interval must be greater than zero".to_string(),
            ));
        }
        if self.heartbeat_interval >= self.ttl {
            return Err(MessengerError::InvalidConfig(format!(
                "heartbeat interval ({} ms) must be shorter than ttl ({} ms)",
                self.heartbeat_interval.as_millis(),
                self.ttl.as_millis()
            )));
        }
        Ok(())
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::from_millis(DEFAULT_TTL_MS, DEFAULT_HEARTBEAT_MS)
    }
}

/// Log output format for the binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Top-level configuration.
///
/// Loaded once at startup via [`MessengerConfig::from_env`].
#[derive(Debug, Clone)]
pub struct MessengerConfig {
    /// Transport timing.
    pub transport: TransportConfig,

    /// Byte quota for the in-memory store (`None` = unlimited).
    pub store_quota_bytes: Option<usize>,

    /// Number of participants the shoutbox demo starts.
    pub shoutbox_participants: usize,

    /// Log line format.
    pub log_format: LogFormat,
}

impl MessengerConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to defaults when a variable is not set or unparsable.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`MessengerError::InvalidConfig`] if the resulting transport
    /// timing is inconsistent.
    pub fn from_env() -> Result<Self, MessengerError> {
        dotenvy::dotenv().ok();

        let transport = TransportConfig::from_millis(
            parse_env("MESSENGER_TTL_MS", DEFAULT_TTL_MS),
            parse_env("MESSENGER_HEARTBEAT_MS", DEFAULT_HEARTBEAT_MS),
        );
        transport.validate()?;

        let store_quota_bytes = match parse_env("MESSENGER_STORE_QUOTA_BYTES", 0usize) {
            0 => None,
            n => Some(n),
        };

        let shoutbox_participants = parse_env("SHOUTBOX_PARTICIPANTS", 3usize);

        let log_format = match std::env::var("LOG_FORMAT").ok().as_deref() {
            Some("json") | Some("JSON") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            transport,
            store_quota_bytes,
            shoutbox_participants,
            log_format,
        })
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = TransportConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ttl_millis(), 1_000);
    }

    #[test]
    fn heartbeat_must_be_shorter_than_ttl() {
        let config = TransportConfig::from_millis(400, 400);
        assert!(matches!(
            config.validate(),
            Err(MessengerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let config = TransportConfig::from_millis(0, 0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn parse_env_falls_back_on_missing_key() {
        let value: u64 = parse_env("STORAGE_MESSENGER_TEST_UNSET_KEY", 42);
        assert_eq!(value, 42);
    }
}
