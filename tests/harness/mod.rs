//! Test harness: a minimal blocking WebSocket server.
//!
//! Each [`TestServer`] accepts a single connection on a background thread,
//! plays one [`Behavior`] and reports what it saw once the client is gone.

#![allow(dead_code)]

mod server;

pub use server::{Behavior, Report, TestServer, serve};
