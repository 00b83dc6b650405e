//! # rswc - blocking WebSocket client
//!
//! `rswc` is the client side of an RFC 6455 WebSocket transport over
//! plain blocking I/O. It dials `ws://` and `wss://` URLs (or upgrades a
//! stream you opened yourself), exchanges masked frames and runs a
//! bounded closing handshake.
//!
//! ## Features
//!
//! - **Opening handshake** built on the `http` and `url` crates, with
//!   header templates and Origin override
//! - **Frame I/O** with strict validation and configurable size limits
//! - **TLS** via rustls (feature `tls-rustls`, on by default)
//! - **Pooled** frames and scratch buffers for allocation reuse
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rswc::{Frame, dial};
//!
//! # fn main() -> rswc::Result<()> {
//! let mut client = dial("ws://localhost:8080/echo")?;
//! client.write(b"Hello")?;
//!
//! let mut frame = Frame::acquire();
//! client.read_frame(&mut frame)?;
//! assert_eq!(frame.payload(), b"Hello");
//!
//! client.close()?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod dial;
pub mod error;
pub mod pool;
pub mod protocol;
pub mod stream;

#[cfg(feature = "tls-rustls")]
pub mod tls;

pub use client::{client_with_config, client_with_headers, make_client, upgrade_as_client};
pub use config::{ClientConfig, Limits};
pub use connection::{CLOSE_TIMEOUT, Client, ConnectionState};
pub use dial::{Dialer, WsClient, dial, dial_with_config, dial_with_headers};
pub use error::{Error, Result};
pub use protocol::{CloseCode, Frame, OpCode, WS_GUID, apply_mask, compute_accept_key, make_rand_key};
pub use stream::{MaybeTlsStream, Transport};

#[cfg(feature = "tls-rustls")]
pub use dial::dial_tls;
#[cfg(feature = "tls-rustls")]
pub use tls::{TlsConfig, TlsVersion, load_certs_from_file};

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn test_public_types_are_send() {
        assert_send::<Error>();
        assert_send::<ClientConfig>();
        assert_send::<Limits>();
        assert_send::<Frame>();
        assert_send::<CloseCode>();
        assert_send::<ConnectionState>();
        assert_send::<WsClient>();
    }

    #[test]
    fn test_public_types_are_sync() {
        assert_sync::<Error>();
        assert_sync::<ClientConfig>();
        assert_sync::<Limits>();
        assert_sync::<Frame>();
        assert_sync::<CloseCode>();
        assert_sync::<ConnectionState>();
    }
}
