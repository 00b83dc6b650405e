//! Opening connections from a URL.
//!
//! `ws://` and `http://` URLs get a plain TCP connection on port 80 by
//! default, `wss://` and `https://` a TLS connection on port 443. The
//! handshake is then run over the new stream; if it fails the stream is
//! closed before the error is returned.

use std::net::TcpStream;

use http::Request;
use tracing::debug;
use url::{Host, Url};

use crate::client::establish;
use crate::config::ClientConfig;
use crate::connection::Client;
use crate::error::{Error, Result};
use crate::stream::MaybeTlsStream;
#[cfg(feature = "tls-rustls")]
use crate::tls::TlsConfig;

/// Default port for `ws://` and `http://`.
pub const DEFAULT_PORT: u16 = 80;

/// Default port for `wss://` and `https://`.
pub const DEFAULT_TLS_PORT: u16 = 443;

/// A client session over the stream type the dialer produces.
pub type WsClient = Client<MaybeTlsStream>;

/// Connect to `url` with default settings.
///
/// # Errors
///
/// - `Error::InvalidUrl` / `Error::UnsupportedScheme` for a bad URL
/// - `Error::Io` if resolving or connecting fails
/// - `Error::InvalidDnsName` / `Error::Tls` for TLS setup failures
/// - the handshake errors of [`make_client`](crate::make_client)
pub fn dial(url: &str) -> Result<WsClient> {
    Dialer::new().dial(url)
}

/// Connect to `url` using the given TLS policy for `wss://`.
///
/// # Errors
///
/// Same as [`dial`].
#[cfg(feature = "tls-rustls")]
pub fn dial_tls(url: &str, tls: &TlsConfig) -> Result<WsClient> {
    Dialer::new().tls(tls.clone()).dial(url)
}

/// Connect to `url`, sending the headers of `template` with the upgrade.
///
/// # Errors
///
/// Same as [`dial`].
pub fn dial_with_headers(url: &str, template: &Request<()>) -> Result<WsClient> {
    Dialer::new().template(template).dial(url)
}

/// Connect to `url` with a custom handshake configuration.
///
/// # Errors
///
/// Same as [`dial`].
pub fn dial_with_config(url: &str, config: &ClientConfig) -> Result<WsClient> {
    Dialer::new().config(config.clone()).dial(url)
}

/// Builder for outgoing connections.
///
/// ```rust,no_run
/// use rswc::{ClientConfig, Dialer};
///
/// # fn main() -> rswc::Result<()> {
/// let client = Dialer::new()
///     .config(ClientConfig::new().with_origin("https://app.example"))
///     .dial("wss://echo.example/ws")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct Dialer<'a> {
    config: ClientConfig,
    template: Option<&'a Request<()>>,
    #[cfg(feature = "tls-rustls")]
    tls: TlsConfig,
}

impl<'a> Dialer<'a> {
    /// Dialer with default handshake and TLS settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `config` for the handshake.
    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Send the headers of `template` with the upgrade request.
    #[must_use]
    pub fn template(mut self, template: &'a Request<()>) -> Self {
        self.template = Some(template);
        self
    }

    /// Use `tls` for `wss://` and `https://` URLs.
    #[cfg(feature = "tls-rustls")]
    #[must_use]
    pub fn tls(mut self, tls: TlsConfig) -> Self {
        self.tls = tls;
        self
    }

    /// Connect to `url` and run the opening handshake.
    ///
    /// # Errors
    ///
    /// Same as [`dial`].
    pub fn dial(&self, url: &str) -> Result<WsClient> {
        let mut url = Url::parse(url)?;
        let secure = match url.scheme() {
            "ws" | "http" => false,
            "wss" | "https" => true,
            other => return Err(Error::UnsupportedScheme(other.to_string())),
        };

        let host = match url.host() {
            Some(Host::Domain(domain)) => domain.to_string(),
            Some(Host::Ipv4(ip)) => ip.to_string(),
            Some(Host::Ipv6(ip)) => ip.to_string(),
            None => return Err(Error::InvalidUrl(format!("{url} has no host"))),
        };
        let default_port = if secure { DEFAULT_TLS_PORT } else { DEFAULT_PORT };
        let port = url.port().unwrap_or(default_port);

        let addrs = url.socket_addrs(|| Some(port))?;
        debug!(host = %host, port, secure, "dialing");
        let tcp = TcpStream::connect(&addrs[..])?;

        let stream = if secure {
            self.connect_tls(&host, tcp)?
        } else {
            MaybeTlsStream::Plain(tcp)
        };

        url.set_scheme(if secure { "https" } else { "http" })
            .map_err(|()| Error::InvalidUrl(format!("cannot rewrite scheme of {url}")))?;

        establish(stream, &url, self.template, &self.config)
    }

    #[cfg(feature = "tls-rustls")]
    fn connect_tls(&self, host: &str, tcp: TcpStream) -> Result<MaybeTlsStream> {
        use rustls::pki_types::ServerName;
        use rustls::{ClientConnection, StreamOwned};

        let config = self.tls.build()?;
        let name = ServerName::try_from(host.to_string())
            .map_err(|_| Error::InvalidDnsName(host.to_string()))?;
        let conn = ClientConnection::new(config, name)?;

        let mut tls = StreamOwned::new(conn, tcp);
        while tls.conn.is_handshaking() {
            tls.conn.complete_io(&mut tls.sock)?;
        }
        debug!(
            host,
            version = ?tls.conn.protocol_version(),
            alpn = ?tls.conn.alpn_protocol().map(String::from_utf8_lossy),
            "TLS handshake complete"
        );

        Ok(MaybeTlsStream::from(tls))
    }

    #[cfg(not(feature = "tls-rustls"))]
    fn connect_tls(&self, _host: &str, _tcp: TcpStream) -> Result<MaybeTlsStream> {
        Err(Error::UnsupportedScheme(
            "wss (built without TLS support)".to_string(),
        ))
    }
}
