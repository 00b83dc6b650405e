//! Client connection state machine for the closing handshake.

/// Lifecycle state of a [`Client`](crate::Client).
///
/// A client starts `Open` once the upgrade succeeded. `close` moves it to
/// `CloseSent` after the close frame is written and to `Closed` once the
/// transport has been released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum ConnectionState {
    /// Handshake done, frames may flow in both directions.
    #[default]
    Open,
    /// Close frame written, waiting for the peer's answer.
    CloseSent,
    /// Transport released. Nothing more may be read or written.
    Closed,
}

impl ConnectionState {
    /// Check if writing frames is allowed in this state.
    ///
    /// Returns `true` only for `Open`.
    #[must_use]
    #[inline]
    pub const fn can_send(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    /// Check if reading frames is allowed in this state.
    ///
    /// Returns `true` for `Open` or `CloseSent`.
    #[must_use]
    #[inline]
    pub const fn can_receive(&self) -> bool {
        matches!(self, ConnectionState::Open | ConnectionState::CloseSent)
    }

    /// `true` once the transport has been released.
    #[must_use]
    #[inline]
    pub const fn is_closed(&self) -> bool {
        matches!(self, ConnectionState::Closed)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Open => write!(f, "Open"),
            ConnectionState::CloseSent => write!(f, "CloseSent"),
            ConnectionState::Closed => write!(f, "Closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        assert_eq!(ConnectionState::default(), ConnectionState::Open);
    }

    #[test]
    fn test_can_send_in_each_state() {
        assert!(ConnectionState::Open.can_send());
        assert!(!ConnectionState::CloseSent.can_send());
        assert!(!ConnectionState::Closed.can_send());
    }

    #[test]
    fn test_can_receive_in_each_state() {
        assert!(ConnectionState::Open.can_receive());
        assert!(ConnectionState::CloseSent.can_receive());
        assert!(!ConnectionState::Closed.can_receive());
    }

    #[test]
    fn test_is_closed() {
        assert!(!ConnectionState::Open.is_closed());
        assert!(!ConnectionState::CloseSent.is_closed());
        assert!(ConnectionState::Closed.is_closed());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::Open.to_string(), "Open");
        assert_eq!(ConnectionState::CloseSent.to_string(), "CloseSent");
        assert_eq!(ConnectionState::Closed.to_string(), "Closed");
    }
}
