//! Lifecycle state of a tool server connection.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// `Connecting → Ready → Closing → Closed`, never backwards.
///
/// A connection whose handshake fails goes straight from `Connecting` to
/// `Closing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ConnectionState {
    Connecting = 0,
    Ready = 1,
    Closing = 2,
    Closed = 3,
}

impl ConnectionState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Ready => "ready",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }

    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Connecting, Self::Ready | Self::Closing)
                | (Self::Ready, Self::Closing)
                | (Self::Closing, Self::Closed)
        )
    }

    pub const fn is_shutting_down(self) -> bool {
        matches!(self, Self::Closing | Self::Closed)
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Connecting,
            1 => Self::Ready,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Lock-free holder for a [`ConnectionState`] that only accepts forward
/// transitions.
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new() -> Self {
        Self(AtomicU8::new(ConnectionState::Connecting as u8))
    }

    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves to `target`, returning the state observed when the transition
    /// was rejected.
    pub fn transition(&self, target: ConnectionState) -> Result<(), ConnectionState> {
        let mut current = self.get();
        loop {
            if !current.can_transition_to(target) {
                return Err(current);
            }
            match self.0.compare_exchange(
                current as u8,
                target as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(()),
                Err(observed) => current = ConnectionState::from_u8(observed),
            }
        }
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follows_the_happy_path() {
        let cell = StateCell::new();
        assert_eq!(cell.get(), ConnectionState::Connecting);
        cell.transition(ConnectionState::Ready).expect("ready");
        cell.transition(ConnectionState::Closing).expect("closing");
        cell.transition(ConnectionState::Closed).expect("closed");
        assert_eq!(cell.get(), ConnectionState::Closed);
    }

    #[test]
    fn failed_handshake_may_skip_ready() {
        let cell = StateCell::new();
        cell.transition(ConnectionState::Closing).expect("closing");
        assert_eq!(cell.get(), ConnectionState::Closing);
    }

    #[test]
    fn rejects_backward_and_skipping_transitions() {
        let cell = StateCell::new();
        cell.transition(ConnectionState::Ready).expect("ready");
        assert_eq!(
            cell.transition(ConnectionState::Connecting),
            Err(ConnectionState::Ready)
        );
        assert_eq!(
            cell.transition(ConnectionState::Closed),
            Err(ConnectionState::Ready)
        );
        cell.transition(ConnectionState::Closing).expect("closing");
        assert_eq!(
            cell.transition(ConnectionState::Ready),
            Err(ConnectionState::Closing)
        );
    }

    #[test]
    fn closed_is_final() {
        for target in [
            ConnectionState::Connecting,
            ConnectionState::Ready,
            ConnectionState::Closing,
            ConnectionState::Closed,
        ] {
            assert!(!ConnectionState::Closed.can_transition_to(target));
        }
    }
}
