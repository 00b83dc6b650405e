//! Client sessions and their closing state machine.
//!
//! ## Connection Lifecycle
//!
//! 1. **Open** - state after a successful handshake
//! 2. **CloseSent** - close frame written, waiting (bounded) for the peer
//! 3. **Closed** - transport released

mod client;
mod state;

pub use client::{CLOSE_TIMEOUT, Client};
pub use state::ConnectionState;
