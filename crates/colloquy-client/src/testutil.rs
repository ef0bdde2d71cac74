//! In-memory transport fake and helpers shared by the crate's tests.

use std::collections::HashMap;

use async_stream::stream;
use async_trait::async_trait;

use colloquy_protocol::{DisplayRecord, RunInput, ThreadId};

use crate::error::{Error, Result};
use crate::transcript::{RenderNode, RenderSink};
use crate::transport::{EventFrameStream, Transport};

/// Frame a JSON event the way the server does on the wire.
pub fn frame(event: &serde_json::Value) -> String {
    format!("data: {}", event)
}

pub fn plan_frame(steps: &[&str]) -> String {
    frame(&serde_json::json!({
        "type": "CUSTOM",
        "name": "secret_plan",
        "value": {"steps": steps},
    }))
}

pub fn run_finished_frame(thread_id: &str) -> String {
    frame(&serde_json::json!({
        "type": "RUN_FINISHED",
        "threadId": thread_id,
        "runId": "run-test",
    }))
}

/// A canned transport serving fixed frames and persisted logs.
#[derive(Default)]
pub struct FakeTransport {
    pub frames: Vec<String>,
    /// Yielded as a stream error after the frames, if set
    pub trailing_error: Option<String>,
    pub conversations: Vec<ThreadId>,
    /// Canonical snapshot envelopes keyed by thread id
    pub snapshots: HashMap<String, String>,
    /// Display logs keyed by thread id
    pub display_logs: HashMap<String, Vec<DisplayRecord>>,
    pub fail_snapshot: bool,
    pub fail_display_log: bool,
}

impl FakeTransport {
    pub fn with_frames(frames: Vec<String>) -> Self {
        Self {
            frames,
            ..Self::default()
        }
    }

    pub fn insert_thread(
        &mut self,
        thread_id: &str,
        envelope: String,
        display_log: Vec<DisplayRecord>,
    ) {
        self.conversations.push(ThreadId::new(thread_id));
        self.snapshots.insert(thread_id.to_string(), envelope);
        self.display_logs.insert(thread_id.to_string(), display_log);
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn submit(&self, _input: &RunInput) -> Result<EventFrameStream> {
        let frames = self.frames.clone();
        let trailing = self.trailing_error.clone();
        let s = stream! {
            for f in frames {
                yield Ok(f);
            }
            if let Some(msg) = trailing {
                yield Err(Error::Sse(msg));
            }
        };
        Ok(Box::pin(s))
    }

    async fn conversations(&self) -> Result<Vec<ThreadId>> {
        Ok(self.conversations.clone())
    }

    async fn snapshot_envelope(&self, thread_id: &ThreadId) -> Result<String> {
        if self.fail_snapshot {
            return Err(Error::Sse("snapshot fetch failed".to_string()));
        }
        self.snapshots
            .get(thread_id.as_str())
            .cloned()
            .ok_or_else(|| Error::Sse(format!("no snapshot for {}", thread_id)))
    }

    async fn display_log(&self, thread_id: &ThreadId) -> Result<Vec<DisplayRecord>> {
        if self.fail_display_log {
            return Err(Error::Sse("display log fetch failed".to_string()));
        }
        self.display_logs
            .get(thread_id.as_str())
            .cloned()
            .ok_or_else(|| Error::Sse(format!("no display log for {}", thread_id)))
    }

    async fn raw_messages(&self, _thread_id: &ThreadId) -> Result<serde_json::Value> {
        Ok(serde_json::json!([]))
    }
}

/// A sink that records every render call for assertions.
#[derive(Default)]
pub struct RecordingSink {
    pub renders: Vec<Vec<RenderNode>>,
    pub clears: usize,
}

impl RenderSink for RecordingSink {
    fn clear(&mut self) {
        self.clears += 1;
    }

    fn render(&mut self, nodes: &[RenderNode]) {
        self.renders.push(nodes.to_vec());
    }
}
