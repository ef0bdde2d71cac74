//! colloquy-protocol: wire types and event decoding
//!
//! This crate defines the canonical message model shared with the agent
//! server, the streamed protocol events, and the decoder that turns framed
//! SSE envelopes into typed events. It performs no I/O.

pub mod decode;
pub mod display;
pub mod error;
pub mod types;

pub use decode::{decode_event, decode_snapshot, ProtocolEvent};
pub use display::{DisplayItem, DisplayRecord, DisplayRole};
pub use error::{ProtocolError, Result};
pub use types::{FunctionCall, Message, RunInput, ThreadId, ToolCall};
