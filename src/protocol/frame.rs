//! WebSocket frame encoding and decoding (RFC 6455 Section 5.2).
//!
//! A [`Frame`] always stores the logical, unmasked payload. Masking is
//! applied only to the serialized copy produced by [`Frame::encode`], and
//! [`Frame::read_from`] unmasks incoming payloads in place before the
//! caller sees them.

use std::io::Read;

use bytes::{Buf, BufMut, BytesMut};

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::pool::{self, Pooled, Reset};
use crate::protocol::mask::{apply_mask_fast, generate_mask};
use crate::protocol::{CloseCode, OpCode};

/// Maximum payload size for control frames (RFC 6455).
pub const MAX_CONTROL_FRAME_PAYLOAD: usize = 125;

/// One wire-level WebSocket frame.
///
/// Frames are meant to be reused: take one from the pool with
/// [`Frame::acquire`], fill it, and let the guard hand it back.
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
/// |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
/// |N|V|V|V|       |S|             |   (if payload len==126/127)   |
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |                 Masking key (if MASK set)                     |
/// +---------------------------------------------------------------+
/// |                     Payload data                              |
/// +---------------------------------------------------------------+
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment of a message.
    pub fin: bool,
    /// Reserved bit 1. Always zero unless an extension is negotiated, which this client never does.
    pub rsv1: bool,
    /// Reserved bit 2.
    pub rsv2: bool,
    /// Reserved bit 3.
    pub rsv3: bool,
    /// Frame type.
    pub opcode: OpCode,
    mask: Option<[u8; 4]>,
    status: Option<CloseCode>,
    payload: BytesMut,
}

impl Reset for Frame {
    fn reset(&mut self) {
        Frame::reset(self);
    }
}

impl Frame {
    /// Build a frame holding a copy of `payload`.
    #[must_use]
    pub fn new(fin: bool, opcode: OpCode, payload: &[u8]) -> Self {
        Self {
            fin,
            opcode,
            payload: BytesMut::from(payload),
            ..Self::default()
        }
    }

    /// Final text frame.
    #[must_use]
    pub fn text(data: impl AsRef<[u8]>) -> Self {
        Self::new(true, OpCode::Text, data.as_ref())
    }

    /// Final binary frame.
    #[must_use]
    pub fn binary(data: impl AsRef<[u8]>) -> Self {
        Self::new(true, OpCode::Binary, data.as_ref())
    }

    /// Close frame, with or without a status code.
    #[must_use]
    pub fn close(status: Option<CloseCode>) -> Self {
        Self {
            fin: true,
            opcode: OpCode::Close,
            status,
            ..Self::default()
        }
    }

    /// Ping frame.
    #[must_use]
    pub fn ping(data: impl AsRef<[u8]>) -> Self {
        Self::new(true, OpCode::Ping, data.as_ref())
    }

    /// Pong frame.
    #[must_use]
    pub fn pong(data: impl AsRef<[u8]>) -> Self {
        Self::new(true, OpCode::Pong, data.as_ref())
    }

    /// Borrow a reset frame from the process-wide frame pool.
    pub fn acquire() -> Pooled<'static, Frame> {
        pool::acquire_frame()
    }

    /// Clear every field. The payload allocation is kept.
    pub fn reset(&mut self) {
        self.fin = false;
        self.rsv1 = false;
        self.rsv2 = false;
        self.rsv3 = false;
        self.opcode = OpCode::default();
        self.mask = None;
        self.status = None;
        self.payload.clear();
    }

    /// Logical payload bytes. For close frames this excludes the status code.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Mutable access to the payload buffer.
    pub fn payload_mut(&mut self) -> &mut BytesMut {
        &mut self.payload
    }

    /// Replace the payload with a copy of `data`.
    pub fn set_payload(&mut self, data: &[u8]) {
        self.payload.clear();
        self.payload.extend_from_slice(data);
    }

    /// Give the frame a fresh random mask key.
    pub fn mask(&mut self) {
        self.mask = Some(generate_mask());
    }

    /// Use a specific mask key.
    pub fn set_mask_key(&mut self, key: [u8; 4]) {
        self.mask = Some(key);
    }

    /// Drop the mask key.
    pub fn clear_mask(&mut self) {
        self.mask = None;
    }

    /// The mask key, if the frame is masked.
    #[must_use]
    pub fn mask_key(&self) -> Option<[u8; 4]> {
        self.mask
    }

    /// Whether the MASK bit is (or was) set.
    #[must_use]
    pub fn is_masked(&self) -> bool {
        self.mask.is_some()
    }

    /// Close status code. Only meaningful for close frames.
    #[must_use]
    pub fn status(&self) -> Option<CloseCode> {
        self.status
    }

    /// Set or clear the close status code.
    pub fn set_status(&mut self, status: Option<CloseCode>) {
        self.status = status;
    }

    fn wire_status(&self) -> Option<CloseCode> {
        if self.opcode == OpCode::Close {
            self.status
        } else {
            None
        }
    }

    /// Payload length as it appears on the wire, status code included.
    #[must_use]
    pub fn wire_payload_len(&self) -> usize {
        let status_len = if self.wire_status().is_some() { 2 } else { 0 };
        status_len + self.payload.len()
    }

    /// Calculate the size needed to write this frame.
    #[must_use]
    pub fn wire_size(&self, masked: bool) -> usize {
        let payload_len = self.wire_payload_len();
        let extended_len_size = if payload_len <= 125 {
            0
        } else if payload_len <= 65535 {
            2
        } else {
            8
        };
        let mask_size = if masked { 4 } else { 0 };
        2 + extended_len_size + mask_size + payload_len
    }

    /// Append the wire form of this frame to `buf`.
    ///
    /// With `Some(mask)` the MASK bit is set, the key is written, and the
    /// copied payload is XOR-masked. The frame itself is left untouched.
    /// The RSV bits are written as 0 whatever the frame's `rsv*` fields say.
    /// Returns the number of bytes appended.
    pub fn encode(&self, buf: &mut BytesMut, mask: Option<[u8; 4]>) -> usize {
        let payload_len = self.wire_payload_len();
        let total = self.wire_size(mask.is_some());
        buf.reserve(total);

        // RSV bits stay 0.
        let mut byte0 = self.opcode.as_u8();
        if self.fin {
            byte0 |= 0x80;
        }
        buf.put_u8(byte0);

        let mask_bit = if mask.is_some() { 0x80 } else { 0x00 };
        if payload_len <= 125 {
            buf.put_u8(mask_bit | payload_len as u8);
        } else if payload_len <= 65535 {
            buf.put_u8(mask_bit | 126);
            buf.put_u16(payload_len as u16);
        } else {
            buf.put_u8(mask_bit | 127);
            buf.put_u64(payload_len as u64);
        }

        if let Some(key) = mask {
            buf.put_slice(&key);
        }

        let payload_start = buf.len();
        if let Some(code) = self.wire_status() {
            buf.put_u16(code.as_u16());
        }
        buf.put_slice(&self.payload);

        if let Some(key) = mask {
            apply_mask_fast(&mut buf[payload_start..], key);
        }

        total
    }

    /// Check the frame against the RFC 6455 rules that apply without extensions.
    ///
    /// # Errors
    ///
    /// - `Error::ReservedBitsSet` if any RSV bit is set
    /// - `Error::FragmentedControlFrame` if a control frame has FIN cleared
    /// - `Error::ControlFrameTooLarge` if a control frame payload exceeds 125 bytes
    pub fn validate(&self) -> Result<()> {
        self.validate_header(self.wire_payload_len() as u64)
    }

    fn validate_header(&self, payload_len: u64) -> Result<()> {
        if self.rsv1 || self.rsv2 || self.rsv3 {
            return Err(Error::ReservedBitsSet);
        }

        if self.opcode.is_control() {
            if !self.fin {
                return Err(Error::FragmentedControlFrame);
            }
            if payload_len > MAX_CONTROL_FRAME_PAYLOAD as u64 {
                return Err(Error::ControlFrameTooLarge(payload_len as usize));
            }
        }

        Ok(())
    }

    /// Read one complete frame from `reader` into `self`.
    ///
    /// The frame is reset first. A masked payload is unmasked in place,
    /// and a close frame's leading two bytes become [`Frame::status`].
    /// Returns the number of bytes consumed from the reader.
    ///
    /// # Errors
    ///
    /// - `Error::Io` on read failure, including EOF in the middle of a frame
    /// - `Error::ReservedOpcode` / `Error::InvalidOpcode` for unknown opcodes
    /// - `Error::FrameTooLarge` if the announced length exceeds `limits.max_frame_size`
    /// - the errors of [`Frame::validate`]
    /// - `Error::InvalidFrame` for a close payload of exactly one byte
    pub fn read_from<R: Read>(&mut self, reader: &mut R, limits: &Limits) -> Result<usize> {
        self.reset();

        let mut head = [0u8; 2];
        reader.read_exact(&mut head)?;
        let mut consumed = head.len();

        self.fin = (head[0] & 0x80) != 0;
        self.rsv1 = (head[0] & 0x40) != 0;
        self.rsv2 = (head[0] & 0x20) != 0;
        self.rsv3 = (head[0] & 0x10) != 0;
        self.opcode = OpCode::from_u8(head[0] & 0x0F)?;

        let masked = (head[1] & 0x80) != 0;
        let payload_len = match head[1] & 0x7F {
            126 => {
                let mut ext = [0u8; 2];
                reader.read_exact(&mut ext)?;
                consumed += ext.len();
                u64::from(u16::from_be_bytes(ext))
            }
            127 => {
                let mut ext = [0u8; 8];
                reader.read_exact(&mut ext)?;
                consumed += ext.len();
                u64::from_be_bytes(ext)
            }
            len => u64::from(len),
        };

        self.validate_header(payload_len)?;
        limits.check_frame_size(payload_len)?;

        if masked {
            let mut key = [0u8; 4];
            reader.read_exact(&mut key)?;
            consumed += key.len();
            self.mask = Some(key);
        }

        // bounded by max_frame_size above
        let payload_len = payload_len as usize;
        self.payload.resize(payload_len, 0);
        reader.read_exact(&mut self.payload)?;
        consumed += payload_len;

        if let Some(key) = self.mask {
            apply_mask_fast(&mut self.payload, key);
        }

        if self.opcode == OpCode::Close {
            match self.payload.len() {
                0 => {}
                1 => {
                    return Err(Error::InvalidFrame(
                        "close payload must be empty or at least 2 bytes".into(),
                    ));
                }
                _ => {
                    let code = u16::from_be_bytes([self.payload[0], self.payload[1]]);
                    self.status = Some(CloseCode::from_u16(code));
                    self.payload.advance(2);
                }
            }
        }

        Ok(consumed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn read(data: &[u8]) -> Result<(Frame, usize)> {
        let mut frame = Frame::default();
        let n = frame.read_from(&mut Cursor::new(data), &Limits::default())?;
        Ok((frame, n))
    }

    #[test]
    fn test_read_unmasked_text_frame() {
        let (frame, len) = read(&[0x81, 0x05, b'H', b'e', b'l', b'l', b'o']).unwrap();
        assert_eq!(len, 7);
        assert!(frame.fin);
        assert_eq!(frame.opcode, OpCode::Text);
        assert!(!frame.is_masked());
        assert_eq!(frame.payload(), b"Hello");
    }

    #[test]
    fn test_read_masked_frame_is_unmasked() {
        let data = [
            0x81, 0x85, // FIN + Text, MASK + len=5
            0x37, 0xfa, 0x21, 0x3d, // key
            0x7f, 0x9f, 0x4d, 0x51, 0x58, // masked "Hello"
        ];
        let (frame, len) = read(&data).unwrap();
        assert_eq!(len, 11);
        assert_eq!(frame.mask_key(), Some([0x37, 0xfa, 0x21, 0x3d]));
        assert_eq!(frame.payload(), b"Hello");
    }

    #[test]
    fn test_read_extended_length_126() {
        let mut data = vec![0x82, 0x7E, 0x01, 0x2C];
        data.extend(std::iter::repeat_n(0xAB, 300));
        let (frame, len) = read(&data).unwrap();
        assert_eq!(len, 304);
        assert_eq!(frame.payload().len(), 300);
        assert!(frame.payload().iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn test_read_extended_length_127() {
        let mut data = vec![0x82, 0x7F, 0, 0, 0, 0, 0, 1, 0, 0];
        data.extend(std::iter::repeat_n(0x01, 65536));
        let (frame, len) = read(&data).unwrap();
        assert_eq!(len, 10 + 65536);
        assert_eq!(frame.payload().len(), 65536);
    }

    #[test]
    fn test_read_close_with_status() {
        let (frame, _) = read(&[0x88, 0x04, 0x03, 0xe8, b'o', b'k']).unwrap();
        assert_eq!(frame.opcode, OpCode::Close);
        assert_eq!(frame.status(), Some(CloseCode::Normal));
        assert_eq!(frame.payload(), b"ok");
    }

    #[test]
    fn test_read_close_without_status() {
        let (frame, len) = read(&[0x88, 0x00]).unwrap();
        assert_eq!(len, 2);
        assert_eq!(frame.status(), None);
        assert!(frame.payload().is_empty());
    }

    #[test]
    fn test_read_close_single_byte_rejected() {
        assert!(matches!(read(&[0x88, 0x01, 0x03]), Err(Error::InvalidFrame(_))));
    }

    #[test]
    fn test_read_reserved_opcode() {
        assert!(matches!(read(&[0x83, 0x00]), Err(Error::ReservedOpcode(0x3))));
    }

    #[test]
    fn test_read_rsv_bits_rejected() {
        assert!(matches!(read(&[0xC1, 0x00]), Err(Error::ReservedBitsSet)));
    }

    #[test]
    fn test_read_fragmented_control_rejected() {
        assert!(matches!(
            read(&[0x09, 0x00]),
            Err(Error::FragmentedControlFrame)
        ));
    }

    #[test]
    fn test_read_oversized_control_rejected() {
        let mut data = vec![0x89, 0x7E, 0x00, 0x7E];
        data.extend(std::iter::repeat_n(0, 126));
        assert!(matches!(read(&data), Err(Error::ControlFrameTooLarge(126))));
    }

    #[test]
    fn test_read_respects_frame_limit() {
        let mut frame = Frame::default();
        let data = [0x82, 0x7E, 0x10, 0x00];
        let result = frame.read_from(&mut Cursor::new(&data[..]), &Limits::new(1024, 8192));
        assert!(matches!(
            result,
            Err(Error::FrameTooLarge { size: 4096, max: 1024 })
        ));
    }

    #[test]
    fn test_read_truncated_payload_is_io_error() {
        match read(&[0x81, 0x05, b'H', b'i']) {
            Err(Error::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof),
            other => panic!("expected EOF, got {other:?}"),
        }
    }

    #[test]
    fn test_read_resets_previous_contents() {
        let mut frame = Frame::close(Some(CloseCode::GoingAway));
        frame.set_payload(b"old contents");
        frame.set_mask_key([1, 2, 3, 4]);
        frame
            .read_from(&mut Cursor::new(&[0x82u8, 0x01, 0x07][..]), &Limits::default())
            .unwrap();
        assert_eq!(frame.opcode, OpCode::Binary);
        assert_eq!(frame.payload(), &[0x07]);
        assert_eq!(frame.status(), None);
        assert_eq!(frame.mask_key(), None);
    }

    #[test]
    fn test_encode_unmasked_text_frame() {
        let mut buf = BytesMut::new();
        let n = Frame::text("Hello").encode(&mut buf, None);
        assert_eq!(n, 7);
        assert_eq!(&buf[..], &[0x81, 0x05, b'H', b'e', b'l', b'l', b'o']);
    }

    #[test]
    fn test_encode_masked_matches_rfc_example() {
        let frame = Frame::text("Hello");
        let mut buf = BytesMut::new();
        let n = frame.encode(&mut buf, Some([0x37, 0xfa, 0x21, 0x3d]));
        assert_eq!(n, 11);
        assert_eq!(
            &buf[..],
            &[0x81, 0x85, 0x37, 0xfa, 0x21, 0x3d, 0x7f, 0x9f, 0x4d, 0x51, 0x58]
        );
        assert_eq!(frame.payload(), b"Hello");
    }

    #[test]
    fn test_encode_extended_lengths() {
        let mut buf = BytesMut::new();
        Frame::binary(vec![0u8; 300]).encode(&mut buf, None);
        assert_eq!(&buf[..4], &[0x82, 0x7E, 0x01, 0x2C]);

        buf.clear();
        Frame::binary(vec![0u8; 70_000]).encode(&mut buf, None);
        assert_eq!(buf[1], 0x7F);
        assert_eq!(&buf[2..10], &70_000u64.to_be_bytes());
    }

    #[test]
    fn test_encode_close_without_status_is_empty() {
        let mut buf = BytesMut::new();
        let n = Frame::close(None).encode(&mut buf, Some([9, 9, 9, 9]));
        assert_eq!(n, 6);
        assert_eq!(&buf[..2], &[0x88, 0x80]);
    }

    #[test]
    fn test_encode_close_with_status() {
        let mut buf = BytesMut::new();
        Frame::close(Some(CloseCode::Normal)).encode(&mut buf, None);
        assert_eq!(&buf[..], &[0x88, 0x02, 0x03, 0xe8]);
    }

    #[test]
    fn test_status_ignored_for_data_frames() {
        let mut frame = Frame::text("x");
        frame.set_status(Some(CloseCode::Normal));
        assert_eq!(frame.wire_payload_len(), 1);
    }

    #[test]
    fn test_encode_appends() {
        let mut buf = BytesMut::from(&b"prefix"[..]);
        let n = Frame::ping("p").encode(&mut buf, None);
        assert_eq!(n, 3);
        assert_eq!(buf.len(), 9);
        assert_eq!(&buf[..6], b"prefix");
    }

    #[test]
    fn test_masked_encode_then_read() {
        let mut frame = Frame::binary([1u8, 2, 3, 4, 5, 6]);
        frame.mask();
        let key = frame.mask_key().unwrap();

        let mut buf = BytesMut::new();
        let written = frame.encode(&mut buf, Some(key));

        let (parsed, consumed) = read(&buf).unwrap();
        assert_eq!(consumed, written);
        assert_eq!(parsed.payload(), frame.payload());
        assert_eq!(parsed.mask_key(), Some(key));
    }

    #[test]
    fn test_wire_size() {
        assert_eq!(Frame::text(vec![0u8; 125]).wire_size(false), 127);
        assert_eq!(Frame::text(vec![0u8; 126]).wire_size(false), 130);
        assert_eq!(Frame::text(vec![0u8; 65536]).wire_size(true), 2 + 8 + 4 + 65536);
        assert_eq!(Frame::close(Some(CloseCode::Normal)).wire_size(true), 8);
    }

    #[test]
    fn test_validate() {
        assert!(Frame::text("ok").validate().is_ok());

        let mut ping = Frame::ping("p");
        ping.fin = false;
        assert!(matches!(ping.validate(), Err(Error::FragmentedControlFrame)));

        let big = Frame::pong(vec![0u8; MAX_CONTROL_FRAME_PAYLOAD + 1]);
        assert!(matches!(big.validate(), Err(Error::ControlFrameTooLarge(126))));

        let mut rsv = Frame::text("x");
        rsv.rsv2 = true;
        assert!(matches!(rsv.validate(), Err(Error::ReservedBitsSet)));
    }

    #[test]
    fn test_encode_never_sets_rsv_bits() {
        let mut frame = Frame::text("x");
        frame.rsv1 = true;
        frame.rsv2 = true;
        frame.rsv3 = true;

        let mut buf = BytesMut::new();
        frame.encode(&mut buf, None);
        assert_eq!(buf[0], 0x81);

        buf.clear();
        frame.encode(&mut buf, Some([1, 2, 3, 4]));
        assert_eq!(buf[0] & 0x70, 0);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut frame = Frame::close(Some(CloseCode::Normal));
        frame.set_payload(b"bye");
        frame.mask();
        frame.rsv1 = true;
        frame.reset();
        assert_eq!(frame, Frame::default());
    }
}
