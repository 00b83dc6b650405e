//! WebSocket protocol core (RFC 6455): framing, masking and the client handshake.

pub mod close;
pub mod frame;
pub mod handshake;
pub mod mask;
pub mod opcode;

pub use close::CloseCode;
pub use frame::{Frame, MAX_CONTROL_FRAME_PAYLOAD};
pub use handshake::{WS_GUID, compute_accept_key, make_rand_key};
pub use mask::{apply_mask, apply_mask_fast, generate_mask};
pub use opcode::OpCode;
