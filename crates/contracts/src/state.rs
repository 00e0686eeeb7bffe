//! Channel lifecycle states and the events that drive them

use std::fmt;

/// Lifecycle state of one channel handle.
///
/// `Open -> Completing -> Closed` on normal completion, `Open -> Errored ->
/// Closed` on error or timeout. Nothing ever returns to `Open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ChannelState {
    Open = 0,
    Completing = 1,
    Errored = 2,
    Closed = 3,
}

impl ChannelState {
    pub fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Open,
            1 => Self::Completing,
            2 => Self::Errored,
            _ => Self::Closed,
        }
    }

    pub fn is_open(self) -> bool {
        self == Self::Open
    }

    pub fn is_closed(self) -> bool {
        self == Self::Closed
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Open => "open",
            Self::Completing => "completing",
            Self::Errored => "errored",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Input to the channel state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Graceful end of stream
    Complete,
    /// The producer side decided the stream must end abnormally
    Error(String),
    /// The transport timer fired before a terminal state was reached
    Timeout,
}

impl LifecycleEvent {
    /// State entered on the way to `Closed`
    pub fn intermediate_state(&self) -> ChannelState {
        match self {
            Self::Complete => ChannelState::Completing,
            Self::Error(_) | Self::Timeout => ChannelState::Errored,
        }
    }

    /// Label used for the `reason` metric dimension
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Error(_) => "error",
            Self::Timeout => "timeout",
        }
    }
}
