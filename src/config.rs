//! Handshake customization and resource limits for client connections.

/// Resource limits applied while reading from the server.
///
/// These bound memory use when the peer announces huge frames or sends
/// an endless response head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum payload size of a single incoming frame in bytes.
    ///
    /// Default: 16 MB (16 * 1024 * 1024)
    pub max_frame_size: usize,

    /// Maximum size of the handshake response head in bytes.
    ///
    /// Default: 8 KB (8192)
    pub max_handshake_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_frame_size: 16 * 1024 * 1024,
            max_handshake_size: 8192,
        }
    }
}

impl Limits {
    /// Create new limits with custom values.
    #[must_use]
    pub const fn new(max_frame_size: usize, max_handshake_size: usize) -> Self {
        Self {
            max_frame_size,
            max_handshake_size,
        }
    }

    /// Validate an announced frame payload length.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FrameTooLarge`](crate::Error::FrameTooLarge) if `size` exceeds the configured maximum.
    pub const fn check_frame_size(&self, size: u64) -> Result<(), crate::Error> {
        if size > self.max_frame_size as u64 {
            Err(crate::Error::FrameTooLarge {
                size,
                max: self.max_frame_size,
            })
        } else {
            Ok(())
        }
    }

    /// Validate the number of handshake bytes read so far.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HandshakeTooLarge`](crate::Error::HandshakeTooLarge) if `size` exceeds the configured maximum.
    pub const fn check_handshake_size(&self, size: usize) -> Result<(), crate::Error> {
        if size > self.max_handshake_size {
            Err(crate::Error::HandshakeTooLarge {
                size,
                max: self.max_handshake_size,
            })
        } else {
            Ok(())
        }
    }
}

/// Options for the opening handshake.
///
/// A config is read-only once handed to a dial or upgrade call.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Origin header override.
    ///
    /// `None` derives `scheme://host[:port]` from the target URL.
    /// `Some` is parsed as a URL and reduced to its origin.
    pub origin: Option<String>,

    /// Check `Sec-WebSocket-Accept` against the key that was sent.
    ///
    /// Only the status code and `Upgrade` header are checked when this
    /// is off. Default: false
    pub verify_accept: bool,

    /// Resource limits.
    pub limits: Limits,

    /// Read buffer size (in bytes).
    ///
    /// Default: 8 KB (8192)
    pub read_buffer_size: usize,

    /// Write buffer size (in bytes).
    ///
    /// Default: 8 KB (8192)
    pub write_buffer_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            origin: None,
            verify_accept: false,
            limits: Limits::default(),
            read_buffer_size: 8192,
            write_buffer_size: 8192,
        }
    }
}

impl ClientConfig {
    /// Create a configuration that derives the Origin from the URL.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Send the given Origin instead of deriving it from the URL.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Require a matching `Sec-WebSocket-Accept` in the response.
    #[must_use]
    pub const fn with_accept_verification(mut self) -> Self {
        self.verify_accept = true;
        self
    }

    /// Set custom limits.
    #[must_use]
    pub const fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set read buffer size.
    #[must_use]
    pub const fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Set write buffer size.
    #[must_use]
    pub const fn with_write_buffer_size(mut self, size: usize) -> Self {
        self.write_buffer_size = size;
        self
    }
}
