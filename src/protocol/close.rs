//! Close status codes (RFC 6455 Section 7.4).

/// Status code carried in the first two payload bytes of a close frame.
///
/// A close frame without a payload has no status at all; that case is
/// represented as `None` on [`Frame::status`](crate::Frame::status), not
/// as a variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseCode {
    /// 1000
    Normal,
    /// 1001, endpoint going away.
    GoingAway,
    /// 1002
    ProtocolError,
    /// 1003, data type not accepted.
    UnsupportedData,
    /// 1007, payload inconsistent with the message type.
    InvalidPayload,
    /// 1008
    PolicyViolation,
    /// 1009
    MessageTooBig,
    /// 1010, client expected an extension.
    MandatoryExtension,
    /// 1011
    InternalError,
    /// Any other value, including application codes 3000-4999.
    Other(u16),
}

impl CloseCode {
    /// Map a wire value to a close code.
    #[must_use]
    pub const fn from_u16(code: u16) -> Self {
        match code {
            1000 => CloseCode::Normal,
            1001 => CloseCode::GoingAway,
            1002 => CloseCode::ProtocolError,
            1003 => CloseCode::UnsupportedData,
            1007 => CloseCode::InvalidPayload,
            1008 => CloseCode::PolicyViolation,
            1009 => CloseCode::MessageTooBig,
            1010 => CloseCode::MandatoryExtension,
            1011 => CloseCode::InternalError,
            other => CloseCode::Other(other),
        }
    }

    /// Wire value of this close code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        match self {
            CloseCode::Normal => 1000,
            CloseCode::GoingAway => 1001,
            CloseCode::ProtocolError => 1002,
            CloseCode::UnsupportedData => 1003,
            CloseCode::InvalidPayload => 1007,
            CloseCode::PolicyViolation => 1008,
            CloseCode::MessageTooBig => 1009,
            CloseCode::MandatoryExtension => 1010,
            CloseCode::InternalError => 1011,
            CloseCode::Other(code) => code,
        }
    }

    /// Codes 1004-1006 and 1015 must never be put on the wire.
    #[must_use]
    pub const fn is_reserved(self) -> bool {
        matches!(self.as_u16(), 1004..=1006 | 1015)
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}
