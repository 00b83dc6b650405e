//! Turning an open stream into a [`Client`].
//!
//! These functions run the opening handshake over a stream the caller
//! has already connected. The dial functions in [`crate::dial`] build on
//! them.

use std::io::{BufReader, Read, Write};

use http::{Request, Response};
use tracing::debug;
use url::Url;

use crate::config::ClientConfig;
use crate::connection::Client;
use crate::error::Result;
use crate::protocol::handshake;
use crate::stream::Transport;

/// Upgrade `stream` to a WebSocket client session for `url`.
///
/// The Origin is derived from the URL and no extra headers are sent.
/// On failure the stream is closed before the error is returned.
///
/// # Errors
///
/// - `Error::InvalidUrl` if `url` does not parse or has no host
/// - `Error::CannotUpgrade` if the server refuses the upgrade
/// - `Error::Io` if the stream fails
pub fn make_client<T: Transport>(stream: T, url: &str) -> Result<Client<T>> {
    client_with_config(stream, url, None, &ClientConfig::default())
}

/// Like [`make_client`], additionally sending the headers of `template`.
///
/// The handshake headers themselves always override same-named
/// template headers; a template `Host` is kept.
///
/// # Errors
///
/// Same as [`make_client`].
pub fn client_with_headers<T: Transport>(
    stream: T,
    url: &str,
    template: &Request<()>,
) -> Result<Client<T>> {
    client_with_config(stream, url, Some(template), &ClientConfig::default())
}

/// Fully configurable form of [`make_client`].
///
/// # Errors
///
/// Same as [`make_client`], plus `Error::InvalidOrigin` for a bad origin
/// override and `Error::HandshakeTooLarge` for an oversized response.
pub fn client_with_config<T: Transport>(
    mut stream: T,
    url: &str,
    template: Option<&Request<()>>,
    config: &ClientConfig,
) -> Result<Client<T>> {
    match Url::parse(url) {
        Ok(url) => establish(stream, &url, template, config),
        Err(e) => {
            release(&mut stream);
            Err(e.into())
        }
    }
}

/// Run only the opening handshake over a borrowed stream.
///
/// The response is read one byte at a time, so nothing after its blank
/// line is taken from `stream`; the caller can continue with its own
/// framing. The stream is left open on failure. Returns the server's
/// response head.
///
/// # Errors
///
/// Same as [`client_with_config`].
pub fn upgrade_as_client<S: Read + Write>(
    stream: &mut S,
    url: &str,
    template: Option<&Request<()>>,
    config: &ClientConfig,
) -> Result<Response<()>> {
    let url = Url::parse(url)?;
    let mut reader = BufReader::with_capacity(1, stream);
    handshake::negotiate(&mut reader, &url, template, config)
}

/// Handshake over an owned transport, closing it if anything fails.
pub(crate) fn establish<T: Transport>(
    stream: T,
    url: &Url,
    template: Option<&Request<()>>,
    config: &ClientConfig,
) -> Result<Client<T>> {
    let mut reader = BufReader::with_capacity(config.read_buffer_size.max(1), stream);
    match handshake::negotiate(&mut reader, url, template, config) {
        Ok(_) => Ok(Client::from_parts(reader, config)),
        Err(e) => {
            debug!(url = %url, error = %e, "handshake failed, closing transport");
            release(reader.get_mut());
            Err(e)
        }
    }
}

fn release<T: Transport>(stream: &mut T) {
    if let Err(e) = stream.close() {
        debug!(error = %e, "failed to close transport");
    }
}
