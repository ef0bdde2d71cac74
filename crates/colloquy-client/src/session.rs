//! Agent session state: one thread id bound to the canonical message log.

use colloquy_protocol::{Message, ThreadId};

use crate::error::{Error, Result};

/// One conversation's canonical state.
///
/// The log is the source of truth the server resumes reasoning from:
/// append-only during a live run, wholesale-replaced by snapshots and
/// rehydration. Exactly one session is current at a time; its owner is the
/// only mutator.
pub struct Session {
    thread_id: ThreadId,
    messages: Vec<Message>,
    /// Whether the tail message is the in-progress assistant entry
    streaming: bool,
}

impl Session {
    /// Create an empty session bound to a thread id
    pub fn new(thread_id: ThreadId) -> Self {
        Self {
            thread_id,
            messages: vec![],
            streaming: false,
        }
    }

    /// The thread id this session is bound to
    pub fn thread_id(&self) -> &ThreadId {
        &self.thread_id
    }

    /// The canonical log in insertion order
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Whether an in-progress assistant entry is open at the tail
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Replace the whole log. Used by snapshot events and rehydration; the
    /// incoming sequence is fully authoritative, so any in-progress entry
    /// is gone with the old log.
    pub fn replace_all(&mut self, messages: Vec<Message>) {
        self.messages = messages;
        self.streaming = false;
    }

    /// Append the user's turn with a fresh id and return a reference to it
    pub fn push_user(&mut self, content: impl Into<String>) -> &Message {
        self.messages.push(Message::user(content));
        self.messages.last().expect("just pushed")
    }

    /// Open the in-progress assistant entry at the tail
    pub fn begin_assistant(&mut self) {
        self.messages.push(Message::assistant_empty());
        self.streaming = true;
    }

    /// Seal the in-progress assistant entry, if one is open
    pub fn end_assistant(&mut self) {
        self.streaming = false;
    }

    /// Append delta text to the in-progress assistant entry.
    ///
    /// Calling this without an open assistant entry is a contract
    /// violation, not a recoverable condition.
    pub fn append_delta(&mut self, delta: &str) -> Result<()> {
        if !self.streaming {
            return Err(Error::InvalidStateTransition(
                "text delta with no in-progress assistant message",
            ));
        }
        match self.messages.last_mut() {
            Some(Message::Assistant { content, .. }) => {
                content.push_str(delta);
                Ok(())
            }
            _ => Err(Error::InvalidStateTransition(
                "in-progress entry is not an assistant message",
            )),
        }
    }
}
