use std::io::{self, BufReader, Read, Write};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use tracing::{debug, trace};

use crate::config::{ClientConfig, Limits};
use crate::connection::ConnectionState;
use crate::error::{Error, Result};
use crate::protocol::{Frame, OpCode, generate_mask};
use crate::stream::Transport;

/// How long `close` waits for the peer's answer to our close frame.
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(3);

/// A negotiated WebSocket session over a blocking transport.
///
/// Obtained from the dial functions or from [`make_client`](crate::make_client)
/// and friends. Every operation takes `&mut self`; to share a client
/// between threads, wrap it in a mutex.
///
/// ## Example
///
/// ```rust,no_run
/// use rswc::{Frame, dial};
///
/// # fn main() -> rswc::Result<()> {
/// let mut client = dial("ws://localhost:8080/echo")?;
/// client.write(b"hello")?;
///
/// let mut frame = Frame::acquire();
/// client.read_frame(&mut frame)?;
/// println!("got {:?}", frame.payload());
///
/// client.close()?;
/// # Ok(())
/// # }
/// ```
pub struct Client<T: Transport> {
    reader: BufReader<T>,
    write_buf: BytesMut,
    limits: Limits,
    state: ConnectionState,
}

impl<T: Transport> Client<T> {
    /// Wrap a transport whose handshake has already succeeded.
    ///
    /// `reader` must be the reader the handshake response was read
    /// through, so frames the server sent right after it are kept.
    pub(crate) fn from_parts(reader: BufReader<T>, config: &ClientConfig) -> Self {
        Self {
            reader,
            write_buf: BytesMut::with_capacity(config.write_buffer_size),
            limits: config.limits.clone(),
            state: ConnectionState::Open,
        }
    }

    /// Get the current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Limits applied to incoming frames.
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Send `data` as one final, masked text frame.
    ///
    /// Returns the number of bytes written to the transport.
    ///
    /// # Errors
    ///
    /// `Error::ConnectionClosed` once `close` has been called, otherwise
    /// any transport error.
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.write_data(OpCode::Text, data)
    }

    /// Send `data` as one final, masked binary frame.
    ///
    /// # Errors
    ///
    /// Same as [`Client::write`].
    pub fn write_binary(&mut self, data: &[u8]) -> Result<usize> {
        self.write_data(OpCode::Binary, data)
    }

    fn write_data(&mut self, opcode: OpCode, data: &[u8]) -> Result<usize> {
        let mut frame = Frame::acquire();
        frame.fin = true;
        frame.opcode = opcode;
        frame.set_payload(data);
        self.write_frame(&frame)
    }

    /// Serialize `frame`, write it and flush the transport.
    ///
    /// The wire copy is masked with the frame's own key, or with a fresh
    /// one if the frame has none; `frame` itself is not modified.
    ///
    /// Writing a close frame moves the client to `CloseSent`: no more
    /// frames may be written and [`Client::close`] only waits for the reply.
    ///
    /// # Errors
    ///
    /// - `Error::ConnectionClosed` unless the state is `Open`
    /// - the errors of [`Frame::validate`]; nothing is written in that case
    /// - any transport error
    pub fn write_frame(&mut self, frame: &Frame) -> Result<usize> {
        if !self.state.can_send() {
            return Err(Error::ConnectionClosed);
        }
        let written = self.send(frame)?;
        if frame.opcode == OpCode::Close {
            self.state = ConnectionState::CloseSent;
            debug!(status = ?frame.status(), "close frame sent");
        }
        Ok(written)
    }

    fn send(&mut self, frame: &Frame) -> Result<usize> {
        frame.validate()?;
        let key = frame.mask_key().unwrap_or_else(generate_mask);

        self.write_buf.clear();
        let written = frame.encode(&mut self.write_buf, Some(key));

        let stream = self.reader.get_mut();
        stream.write_all(&self.write_buf)?;
        stream.flush()?;
        trace!(opcode = %frame.opcode, len = written, "wrote frame");

        Ok(written)
    }

    /// Read the next frame from the server into `frame`.
    ///
    /// Returns the number of bytes consumed from the transport. See
    /// [`Frame::read_from`] for the validation applied.
    ///
    /// # Errors
    ///
    /// `Error::ConnectionClosed` once the transport has been released,
    /// otherwise the errors of [`Frame::read_from`].
    pub fn read_frame(&mut self, frame: &mut Frame) -> Result<usize> {
        if !self.state.can_receive() {
            return Err(Error::ConnectionClosed);
        }
        let consumed = frame.read_from(&mut self.reader, &self.limits)?;
        trace!(opcode = %frame.opcode, len = consumed, "read frame");
        Ok(consumed)
    }

    /// Run the closing handshake and release the transport.
    ///
    /// A close frame without status is sent unless one was already written,
    /// then at most one frame is read back. The read gives up once
    /// [`CLOSE_TIMEOUT`] has elapsed in total, however the peer paces its
    /// bytes. Whatever that read yields is discarded and the transport is
    /// closed.
    ///
    /// # Errors
    ///
    /// - `Error::ConnectionClosed` if the client is already closed
    /// - the write error if the close frame cannot be sent; the transport
    ///   is left open and can be recovered with [`Client::into_inner`]
    /// - the transport's own close error
    pub fn close(&mut self) -> Result<()> {
        match self.state {
            ConnectionState::Closed => return Err(Error::ConnectionClosed),
            ConnectionState::CloseSent => {}
            ConnectionState::Open => {
                let mut frame = Frame::acquire();
                frame.fin = true;
                frame.opcode = OpCode::Close;
                self.write_frame(&frame)?;
            }
        }

        let deadline = Instant::now() + CLOSE_TIMEOUT;
        match self.reader.get_ref().set_read_timeout(Some(CLOSE_TIMEOUT)) {
            Ok(()) => {
                let mut reply = Frame::acquire();
                let mut reader = DeadlineReader {
                    reader: &mut self.reader,
                    deadline,
                };
                match reply.read_from(&mut reader, &self.limits) {
                    Ok(_) => trace!(opcode = %reply.opcode, status = ?reply.status(), "close reply"),
                    Err(e) => trace!(error = %e, "no close reply"),
                }
            }
            Err(e) => debug!(error = %e, "cannot bound close wait, skipping reply"),
        }

        self.state = ConnectionState::Closed;
        self.reader.get_mut().close()?;
        debug!("connection closed");
        Ok(())
    }

    /// Unwrap the transport.
    ///
    /// Bytes already buffered from the server are lost.
    pub fn into_inner(self) -> T {
        self.reader.into_inner()
    }

    /// Get a reference to the underlying transport.
    pub fn get_ref(&self) -> &T {
        self.reader.get_ref()
    }

    /// Get a mutable reference to the underlying transport.
    ///
    /// Writing to it directly will corrupt the frame stream.
    pub fn get_mut(&mut self) -> &mut T {
        self.reader.get_mut()
    }
}

/// Reads through `reader`, failing with `TimedOut` once `deadline` passes.
///
/// The transport's read timeout is narrowed to the time left before every
/// read.
struct DeadlineReader<'a, T: Transport> {
    reader: &'a mut BufReader<T>,
    deadline: Instant,
}

impl<T: Transport> Read for DeadlineReader<'_, T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "close deadline passed"));
        }
        self.reader.get_ref().set_read_timeout(Some(remaining))?;
        self.reader.read(buf)
    }
}

impl<T: Transport + std::fmt::Debug> std::fmt::Debug for Client<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("transport", self.reader.get_ref())
            .field("state", &self.state)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}
