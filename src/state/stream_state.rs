//! Stream state definitions for the traversal state machine
//!
//! This module defines the states the event stream moves through while it is
//! driven by read requests.

use std::fmt;

/// Represents the current state of the event stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StreamState {
    // ===== Active States =====
    /// Waiting for the next read request
    #[default]
    Idle,

    /// A fragment is being waited for, fetched or processed
    Fetching,

    /// Caught up with every known fragment; further progress needs polling
    Synchronizing,

    // ===== Suspended States =====
    /// Externally paused; no fetching happens, checkpoints may be exported
    Paused,

    // ===== Terminal States =====
    /// No fragments remain (or the stream was destroyed)
    Ended,
}

impl StreamState {
    /// Returns true if no further network activity will happen
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended)
    }

    /// Returns true if a checkpoint may be exported in this state
    pub fn allows_export(&self) -> bool {
        matches!(self, Self::Paused | Self::Ended)
    }

    /// Stable lowercase name of the state
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Synchronizing => "synchronizing",
            Self::Paused => "paused",
            Self::Ended => "ended",
        }
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_terminal() {
        assert!(StreamState::Ended.is_terminal());
        assert!(!StreamState::Paused.is_terminal());
        assert!(!StreamState::Idle.is_terminal());
    }

    #[test]
    fn test_allows_export() {
        assert!(StreamState::Paused.allows_export());
        assert!(StreamState::Ended.allows_export());
        assert!(!StreamState::Fetching.allows_export());
        assert!(!StreamState::Synchronizing.allows_export());
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", StreamState::Synchronizing), "synchronizing");
        assert_eq!(StreamState::default(), StreamState::Idle);
    }
}
