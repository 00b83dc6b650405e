//! Byte streams a [`Client`](crate::Client) can run over.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

#[cfg(feature = "tls-rustls")]
use rustls::{ClientConnection, StreamOwned};

/// A connected, duplex byte stream.
///
/// Besides reading and writing, a transport must support a read timeout
/// (used to bound the closing handshake) and an explicit close.
pub trait Transport: Read + Write {
    /// Set or clear the timeout for blocking reads.
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;

    /// Release the connection.
    fn close(&mut self) -> io::Result<()>;
}

impl Transport for TcpStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_read_timeout(self, timeout)
    }

    fn close(&mut self) -> io::Result<()> {
        match self.shutdown(Shutdown::Both) {
            // the peer may already have torn the socket down
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }
}

#[cfg(feature = "tls-rustls")]
impl Transport for StreamOwned<ClientConnection, TcpStream> {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.sock.set_read_timeout(timeout)
    }

    fn close(&mut self) -> io::Result<()> {
        self.conn.send_close_notify();
        // best effort: the peer may be gone already
        let _ = self.flush();
        Transport::close(&mut self.sock)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        (**self).set_read_timeout(timeout)
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

/// A TCP stream that may or may not be wrapped in TLS.
///
/// This is what the dialer hands out, so `ws://` and `wss://` clients
/// share one type.
pub enum MaybeTlsStream {
    /// Unencrypted socket stream.
    Plain(TcpStream),
    /// Encrypted socket stream using `rustls`.
    #[cfg(feature = "tls-rustls")]
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
}

impl MaybeTlsStream {
    /// The underlying TCP socket.
    pub fn get_ref(&self) -> &TcpStream {
        match self {
            MaybeTlsStream::Plain(s) => s,
            #[cfg(feature = "tls-rustls")]
            MaybeTlsStream::Tls(s) => s.get_ref(),
        }
    }

    /// `true` for the TLS variant.
    pub fn is_tls(&self) -> bool {
        match self {
            MaybeTlsStream::Plain(_) => false,
            #[cfg(feature = "tls-rustls")]
            MaybeTlsStream::Tls(_) => true,
        }
    }
}

impl std::fmt::Debug for MaybeTlsStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaybeTlsStream::Plain(s) => f.debug_tuple("Plain").field(s).finish(),
            #[cfg(feature = "tls-rustls")]
            MaybeTlsStream::Tls(s) => f.debug_tuple("Tls").field(s.get_ref()).finish(),
        }
    }
}

impl From<TcpStream> for MaybeTlsStream {
    fn from(value: TcpStream) -> Self {
        Self::Plain(value)
    }
}

#[cfg(feature = "tls-rustls")]
impl From<StreamOwned<ClientConnection, TcpStream>> for MaybeTlsStream {
    fn from(value: StreamOwned<ClientConnection, TcpStream>) -> Self {
        Self::Tls(Box::new(value))
    }
}

impl Read for MaybeTlsStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            MaybeTlsStream::Plain(s) => s.read(buf),
            #[cfg(feature = "tls-rustls")]
            MaybeTlsStream::Tls(s) => s.read(buf),
        }
    }
}

impl Write for MaybeTlsStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            MaybeTlsStream::Plain(s) => s.write(buf),
            #[cfg(feature = "tls-rustls")]
            MaybeTlsStream::Tls(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            MaybeTlsStream::Plain(s) => s.flush(),
            #[cfg(feature = "tls-rustls")]
            MaybeTlsStream::Tls(s) => s.flush(),
        }
    }
}

impl Transport for MaybeTlsStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.get_ref().set_read_timeout(timeout)
    }

    fn close(&mut self) -> io::Result<()> {
        match self {
            MaybeTlsStream::Plain(s) => Transport::close(s),
            #[cfg(feature = "tls-rustls")]
            MaybeTlsStream::Tls(s) => Transport::close(&mut **s),
        }
    }
}
