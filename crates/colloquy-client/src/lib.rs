//! colloquy-client: conversation synchronization against an agent server
//!
//! This crate owns the in-memory side of the protocol: the current agent
//! session and its canonical message log, the streaming run controller,
//! rehydration of persisted conversations, and the pure projection of
//! display items into renderable nodes.

pub mod client;
pub mod error;
pub mod rehydrate;
pub mod session;
pub mod transcript;
pub mod transport;

#[cfg(test)]
pub(crate) mod testutil;

pub use client::{Client, Run, RunState};
pub use error::{Error, Result};
pub use session::Session;
pub use transcript::{project, RenderNode, RenderSink};
pub use transport::{EventFrameStream, HttpTransport, Transport};
