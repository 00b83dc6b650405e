//! Error types for the WebSocket client.
//!
//! Transport failures are carried verbatim in [`Error::Io`]. A refused
//! upgrade is always reported as the single [`Error::CannotUpgrade`] kind,
//! whatever the server answered.

use thiserror::Error;

/// Result type alias for WebSocket client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while dialing, negotiating or exchanging frames.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// I/O error on the underlying transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The server did not accept the upgrade (non-101 status or wrong `Upgrade` header).
    #[error("cannot upgrade connection")]
    CannotUpgrade,

    /// The handshake response could not be parsed as HTTP.
    #[error("Invalid handshake: {0}")]
    InvalidHandshake(String),

    /// The handshake response head exceeded the configured maximum.
    #[error("Handshake too large: {size} bytes (max: {max})")]
    HandshakeTooLarge {
        /// Bytes read so far.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// A request header name or value could not be encoded.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// The target URL could not be parsed or has no host.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The URL scheme is not one of ws, wss, http or https.
    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    /// The configured Origin override is not a valid origin.
    #[error("Invalid origin: {0}")]
    InvalidOrigin(String),

    /// The host cannot be used as a TLS server name.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(String),

    /// TLS protocol failure reported by rustls.
    #[cfg(feature = "tls-rustls")]
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// The TLS configuration cannot be turned into a client config.
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    /// The OS entropy source failed while generating the handshake key.
    #[error("Entropy source unavailable: {0}")]
    Entropy(String),

    /// Invalid frame structure.
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Reserved opcode received.
    #[error("Reserved opcode: {0:#x}")]
    ReservedOpcode(u8),

    /// Opcode outside the 4-bit range.
    #[error("Invalid opcode: {0:#x}")]
    InvalidOpcode(u8),

    /// Reserved bits set; no extension is ever negotiated by this client.
    #[error("Reserved bits set without negotiated extension")]
    ReservedBitsSet,

    /// Control frame with FIN cleared.
    #[error("Control frames cannot be fragmented")]
    FragmentedControlFrame,

    /// Control frame payload above 125 bytes.
    #[error("Control frame payload too large: {0} bytes (max: 125)")]
    ControlFrameTooLarge(usize),

    /// Frame payload above the configured maximum.
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Announced payload size.
        size: u64,
        /// Maximum allowed size.
        max: usize,
    },

    /// The connection has already been closed.
    #[error("Connection closed")]
    ConnectionClosed,
}

impl Error {
    /// Returns `true` if this error means the server refused the upgrade.
    #[must_use]
    pub const fn is_cannot_upgrade(&self) -> bool {
        matches!(self, Error::CannotUpgrade)
    }
}

impl From<getrandom::Error> for Error {
    fn from(err: getrandom::Error) -> Self {
        Error::Entropy(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::InvalidUrl(err.to_string())
    }
}

impl From<http::Error> for Error {
    fn from(err: http::Error) -> Self {
        Error::InvalidHeader(err.to_string())
    }
}
