//! StreamerConfig - Config Loader output
//!
//! Tunables for sessions, dispatch and the typewriter helper. Every field has
//! a default, so an empty document is a valid configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{now_millis, DataFrame};

/// Complete configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct StreamerConfig {
    #[serde(default)]
    #[validate(nested)]
    pub session: SessionConfig,

    #[serde(default)]
    #[validate(nested)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub typewriter: TypewriterConfig,
}

/// Channel and stop-signal settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SessionConfig {
    /// Channel timeout applied by `open_channel` (0 = no timer)
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,

    /// How long an unread stop request stays valid
    #[serde(default = "default_stop_signal_ttl_secs")]
    #[validate(range(min = 1, message = "stop_signal_ttl_secs must be > 0"))]
    pub stop_signal_ttl_secs: u64,

    /// Initial capacity of the session registry
    #[serde(default = "default_registry_capacity")]
    #[validate(range(min = 1, message = "registry_capacity must be > 0"))]
    pub registry_capacity: usize,

    /// Outbound frames queued per channel before `send` waits
    #[serde(default = "default_queue_capacity")]
    #[validate(range(min = 1, message = "queue_capacity must be > 0"))]
    pub queue_capacity: usize,
}

impl SessionConfig {
    pub fn default_timeout(&self) -> Option<Duration> {
        (self.default_timeout_ms > 0).then(|| Duration::from_millis(self.default_timeout_ms))
    }

    pub fn stop_signal_ttl(&self) -> Duration {
        Duration::from_secs(self.stop_signal_ttl_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_timeout_ms(),
            stop_signal_ttl_secs: default_stop_signal_ttl_secs(),
            registry_capacity: default_registry_capacity(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    8 * 60 * 1000
}

fn default_stop_signal_ttl_secs() -> u64 {
    16
}

fn default_registry_capacity() -> usize {
    256
}

fn default_queue_capacity() -> usize {
    32
}

/// Dispatcher settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct DispatchConfig {
    /// Buffered dispatcher flush threshold in bytes
    #[serde(default = "default_buffer_threshold")]
    #[validate(range(min = 1, message = "buffer_threshold must be > 0"))]
    pub buffer_threshold: usize,

    /// How the terminal frame is timestamped
    #[serde(default)]
    pub end_timestamp: EndTimestampMode,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            buffer_threshold: default_buffer_threshold(),
            end_timestamp: EndTimestampMode::default(),
        }
    }
}

fn default_buffer_threshold() -> usize {
    1024
}

/// Timestamp carried by the terminal `end` frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndTimestampMode {
    /// Captured once per process; every end frame reports the same value
    #[default]
    Static,
    /// Stamped when the end frame is sent
    Live,
}

impl EndTimestampMode {
    /// Build the terminal frame for this mode
    pub fn end_frame(self) -> DataFrame {
        match self {
            Self::Static => DataFrame::end(),
            Self::Live => DataFrame::end_at(now_millis()),
        }
    }
}

/// Character-by-character send pacing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypewriterConfig {
    /// Pause after an ASCII letter
    #[serde(default = "default_letter_delay_ms")]
    pub letter_delay_ms: u64,

    /// Pause after any other character when the caller passes no interval
    #[serde(default = "default_interval_ms")]
    pub default_interval_ms: u64,
}

impl Default for TypewriterConfig {
    fn default() -> Self {
        Self {
            letter_delay_ms: default_letter_delay_ms(),
            default_interval_ms: default_interval_ms(),
        }
    }
}

fn default_letter_delay_ms() -> u64 {
    1
}

fn default_interval_ms() -> u64 {
    20
}
