//! Streaming session controller: drives one live request/response cycle.

use std::sync::Arc;

use futures::StreamExt;

use colloquy_protocol::{decode_event, display, DisplayItem, ProtocolEvent, RunInput, ThreadId};

use crate::error::{Error, Result};
use crate::session::Session;
use crate::transcript::{project, RenderSink};
use crate::transport::Transport;

/// States one run moves through. `Finished` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Submitted,
    Streaming,
    Finished,
    Failed,
}

impl RunState {
    /// Whether the run still accepts events
    pub fn is_unresolved(self) -> bool {
        matches!(self, RunState::Submitted | RunState::Streaming)
    }
}

/// One request/response cycle, bound at creation to the submitting
/// session's thread id. Events for a run whose thread is no longer
/// current are discarded, which is how late arrivals after a conversation
/// switch are dropped.
#[derive(Debug)]
pub struct Run {
    thread_id: ThreadId,
    run_id: String,
    state: RunState,
    /// Accumulated assistant text; the display item is re-rendered from
    /// this on every delta rather than appended to, so the visible text
    /// can never drift from the canonical entry.
    acc: String,
    /// Index of the in-progress assistant item in the transcript
    display_index: usize,
}

impl Run {
    /// The run's current state
    pub fn state(&self) -> RunState {
        self.state
    }

    /// The thread this run was submitted against
    pub fn thread_id(&self) -> &ThreadId {
        &self.thread_id
    }

    /// The wire-level run id
    pub fn run_id(&self) -> &str {
        &self.run_id
    }
}

/// The client: owns the single current session, the display transcript,
/// and at most one run per session at a time.
pub struct Client {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) session: Session,
    pub(crate) transcript: Vec<DisplayItem>,
    run: Option<Run>,
}

impl Client {
    /// Create a client starting on a fresh conversation
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            session: Session::new(ThreadId::generate()),
            transcript: vec![],
            run: None,
        }
    }

    /// The current session
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The current thread id
    pub fn thread_id(&self) -> &ThreadId {
        self.session.thread_id()
    }

    /// The display transcript in display order
    pub fn transcript(&self) -> &[DisplayItem] {
        &self.transcript
    }

    /// State of the most recent run, if any
    pub fn run_state(&self) -> Option<RunState> {
        self.run.as_ref().map(Run::state)
    }

    /// Retire the current session and start an empty conversation.
    ///
    /// An unresolved run stays bound to the retired thread; its late
    /// events will be discarded by the currency check in `apply_event`.
    pub fn start_new_conversation(&mut self) {
        self.session = Session::new(ThreadId::generate());
        self.transcript.clear();
    }

    /// List known conversations from the server
    pub async fn conversations(&self) -> Result<Vec<ThreadId>> {
        self.transport.conversations().await
    }

    /// Fetch the raw persisted canonical log for inspection; no effect on
    /// client state.
    pub async fn raw_messages(&self, thread_id: &ThreadId) -> Result<serde_json::Value> {
        self.transport.raw_messages(thread_id).await
    }

    /// Start a run: optimistically append the user's turn, open the
    /// in-progress assistant entry and its display item, and build the
    /// request body. Rejected while a prior run on this session is
    /// unresolved.
    pub fn begin_run(&mut self, prompt: &str) -> Result<RunInput> {
        if let Some(run) = &self.run {
            if run.state.is_unresolved() && run.thread_id == *self.session.thread_id() {
                return Err(Error::RunInProgress);
            }
        }

        self.session.push_user(prompt);
        self.transcript.push(DisplayItem::user(prompt));
        self.transcript.push(DisplayItem::assistant(""));
        let display_index = self.transcript.len() - 1;
        self.session.begin_assistant();

        let input = RunInput::new(
            self.session.thread_id().clone(),
            self.session.messages().to_vec(),
        );
        self.run = Some(Run {
            thread_id: self.session.thread_id().clone(),
            run_id: input.run_id.clone(),
            state: RunState::Submitted,
            acc: String::new(),
            display_index,
        });
        Ok(input)
    }

    /// Apply one decoded event to the active run.
    ///
    /// Events bound to a retired thread, or arriving after the run
    /// resolved, are discarded. `InvalidStateTransition` from the store
    /// propagates; the caller converts it into a failed run.
    pub fn apply_event(&mut self, event: ProtocolEvent) -> Result<RunState> {
        let Some(run) = self.run.as_mut() else {
            return Err(Error::InvalidStateTransition("event with no active run"));
        };

        if run.thread_id != *self.session.thread_id() {
            tracing::debug!(
                run_id = %run.run_id,
                thread_id = %run.thread_id,
                "discarding event for retired conversation"
            );
            return Ok(run.state);
        }
        if !run.state.is_unresolved() {
            tracing::debug!(run_id = %run.run_id, "discarding event after run resolved");
            return Ok(run.state);
        }

        if run.state == RunState::Submitted {
            run.state = RunState::Streaming;
        }

        match event {
            ProtocolEvent::MessagesSnapshot { messages } => {
                self.session.replace_all(messages);
            }
            ProtocolEvent::TextDelta { delta, .. } => {
                self.session.append_delta(&delta)?;
                run.acc.push_str(&delta);
                self.transcript[run.display_index] = DisplayItem::assistant(run.acc.clone());
            }
            ProtocolEvent::Custom { name, value } => {
                if let Some(item) = display::project_custom(&name, &value) {
                    self.transcript.push(item);
                } else {
                    tracing::debug!(name = %name, "ignoring unrecognized custom event");
                }
            }
            ProtocolEvent::RunFinished { .. } => {
                self.session.end_assistant();
                run.state = RunState::Finished;
            }
            ProtocolEvent::Unknown { event_type, .. } => {
                tracing::debug!(event_type = %event_type, "ignoring effect-free event");
            }
        }

        Ok(run.state)
    }

    /// Mark the active run failed and overwrite its in-progress display
    /// item with an error marker. The optimistic user message stays: the
    /// user's turn was sent even if the reply died.
    pub fn fail_run(&mut self, message: impl Into<String>) {
        let Some(run) = self.run.as_mut() else {
            return;
        };
        if !run.state.is_unresolved() || run.thread_id != *self.session.thread_id() {
            return;
        }
        run.state = RunState::Failed;
        self.session.end_assistant();
        self.transcript[run.display_index] = DisplayItem::Error {
            message: message.into(),
        };
    }

    /// Submit a prompt and drive the run to a terminal state, re-rendering
    /// the transcript through `sink` after every effect.
    ///
    /// On success the run is `Finished`; the caller typically refreshes
    /// the conversation list afterwards. Transport and decode failures
    /// resolve the run as `Failed` with a visible marker and propagate.
    pub async fn submit(&mut self, prompt: &str, sink: &mut dyn RenderSink) -> Result<()> {
        let input = self.begin_run(prompt)?;
        sink.render(&project(&self.transcript));

        let transport = Arc::clone(&self.transport);
        let mut frames = match transport.submit(&input).await {
            Ok(frames) => frames,
            Err(e) => {
                self.fail_run(e.to_string());
                sink.render(&project(&self.transcript));
                return Err(e);
            }
        };

        while let Some(frame) = frames.next().await {
            let applied = frame
                .and_then(|raw| decode_event(&raw).map_err(Error::from))
                .and_then(|event| self.apply_event(event));
            match applied {
                Ok(state) => {
                    sink.render(&project(&self.transcript));
                    if state == RunState::Finished {
                        return Ok(());
                    }
                }
                Err(e) => {
                    self.fail_run(e.to_string());
                    sink.render(&project(&self.transcript));
                    return Err(e);
                }
            }
        }

        // The server closed the stream without a terminal marker.
        if self.run_state().is_some_and(RunState::is_unresolved) {
            let e = Error::Sse("stream ended before run finished".to_string());
            self.fail_run(e.to_string());
            sink.render(&project(&self.transcript));
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{frame, plan_frame, run_finished_frame, FakeTransport, RecordingSink};
    use crate::transcript::NullSink;
    use colloquy_protocol::{DisplayRole, Message};

    fn delta_frames(deltas: &[&str]) -> Vec<String> {
        deltas
            .iter()
            .map(|d| {
                frame(&serde_json::json!({
                    "type": "TEXT_MESSAGE_CONTENT",
                    "messageId": "m1",
                    "delta": d,
                }))
            })
            .collect()
    }

    #[tokio::test]
    async fn test_submit_streams_deltas_into_store_and_transcript() {
        let mut frames = delta_frames(&["Hel", "lo", " world"]);
        frames.push(run_finished_frame("conv-x"));
        let transport = FakeTransport::with_frames(frames);
        let mut client = Client::new(Arc::new(transport));
        let mut sink = RecordingSink::default();

        client.submit("hi there", &mut sink).await.unwrap();

        assert_eq!(client.run_state(), Some(RunState::Finished));
        let messages = client.session().messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content(), "hi there");
        assert_eq!(messages[1].content(), "Hello world");
        assert_eq!(
            client.transcript().last().unwrap(),
            &DisplayItem::assistant("Hello world")
        );

        // Every rendered frame shows the concatenation of deltas so far,
        // and the canonical entry always matches the rendered text.
        let rendered: Vec<&str> = sink
            .renders
            .iter()
            .filter_map(|nodes| match nodes.last() {
                Some(crate::transcript::RenderNode::Text {
                    role: DisplayRole::Assistant,
                    content,
                }) => Some(content.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(rendered, vec!["", "Hel", "Hello", "Hello world", "Hello world"]);
    }

    #[tokio::test]
    async fn test_custom_plan_lands_in_transcript_not_in_log() {
        let frames = vec![
            plan_frame(&["step1", "step2"]),
            run_finished_frame("conv-x"),
        ];
        let transport = FakeTransport::with_frames(frames);
        let mut client = Client::new(Arc::new(transport));

        client.submit("show me the plan", &mut NullSink).await.unwrap();

        let plans: Vec<_> = client
            .transcript()
            .iter()
            .filter(|item| matches!(item, DisplayItem::Plan { .. }))
            .collect();
        assert_eq!(plans.len(), 1);
        assert_eq!(
            plans[0],
            &DisplayItem::Plan {
                steps: vec!["step1".to_string(), "step2".to_string()],
            }
        );
        // The plan must never be synthesized into a canonical message.
        assert!(client.session().messages().iter().all(|m| m.role() != "event"));
        assert_eq!(client.session().messages().len(), 2);
    }

    #[tokio::test]
    async fn test_transport_failure_marks_run_failed_keeps_user_turn() {
        let mut transport = FakeTransport::with_frames(delta_frames(&["par"]));
        transport.trailing_error = Some("connection reset".to_string());
        let mut client = Client::new(Arc::new(transport));

        let err = client.submit("hello?", &mut NullSink).await.unwrap_err();
        assert!(matches!(err, Error::Sse(_)));
        assert_eq!(client.run_state(), Some(RunState::Failed));

        // At-least-sent: the optimistic user message is not rolled back.
        assert_eq!(client.session().messages()[0].content(), "hello?");
        assert!(matches!(
            client.transcript().last().unwrap(),
            DisplayItem::Error { .. }
        ));
    }

    #[tokio::test]
    async fn test_stream_end_without_terminal_marker_fails_run() {
        let transport = FakeTransport::with_frames(delta_frames(&["half"]));
        let mut client = Client::new(Arc::new(transport));

        let err = client.submit("hi", &mut NullSink).await.unwrap_err();
        assert!(matches!(err, Error::Sse(_)));
        assert_eq!(client.run_state(), Some(RunState::Failed));
    }

    #[tokio::test]
    async fn test_malformed_event_aborts_run() {
        let frames = vec!["data: not json".to_string()];
        let transport = FakeTransport::with_frames(frames);
        let mut client = Client::new(Arc::new(transport));

        let err = client.submit("hi", &mut NullSink).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        assert_eq!(client.run_state(), Some(RunState::Failed));
    }

    #[test]
    fn test_delta_accumulation_matches_store_at_each_step() {
        let mut client = Client::new(Arc::new(FakeTransport::default()));
        client.begin_run("hi").unwrap();

        let mut expected = String::new();
        for delta in ["t1", "t2", "t3"] {
            client
                .apply_event(ProtocolEvent::TextDelta {
                    message_id: "m1".to_string(),
                    delta: delta.to_string(),
                })
                .unwrap();
            expected.push_str(delta);
            // After every step the canonical entry and the display item
            // hold the same accumulated text.
            assert_eq!(
                client.session().messages().last().unwrap().content(),
                expected
            );
            assert_eq!(
                client.transcript().last().unwrap(),
                &DisplayItem::assistant(expected.clone())
            );
        }
    }

    #[test]
    fn test_second_submission_rejected_while_unresolved() {
        let transport = FakeTransport::default();
        let mut client = Client::new(Arc::new(transport));

        client.begin_run("first").unwrap();
        let err = client.begin_run("second").unwrap_err();
        assert!(matches!(err, Error::RunInProgress));
    }

    #[test]
    fn test_event_without_active_run_is_contract_violation() {
        let transport = FakeTransport::default();
        let mut client = Client::new(Arc::new(transport));
        let err = client
            .apply_event(ProtocolEvent::TextDelta {
                message_id: "m1".to_string(),
                delta: "x".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, Error::InvalidStateTransition(_)));
    }

    #[test]
    fn test_snapshot_replaces_log_then_delta_raises() {
        let transport = FakeTransport::default();
        let mut client = Client::new(Arc::new(transport));
        client.begin_run("hi").unwrap();

        client
            .apply_event(ProtocolEvent::MessagesSnapshot {
                messages: vec![Message::user("authoritative")],
            })
            .unwrap();
        assert_eq!(client.session().messages().len(), 1);

        // The snapshot wiped the in-progress entry; a stray delta must
        // raise rather than fabricate a message.
        let err = client
            .apply_event(ProtocolEvent::TextDelta {
                message_id: "m1".to_string(),
                delta: "late".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, Error::InvalidStateTransition(_)));
    }

    #[test]
    fn test_unknown_events_have_no_effect() {
        let transport = FakeTransport::default();
        let mut client = Client::new(Arc::new(transport));
        client.begin_run("hi").unwrap();
        let before_len = client.session().messages().len();

        let state = client
            .apply_event(ProtocolEvent::Unknown {
                event_type: "TEXT_MESSAGE_START".to_string(),
                payload: serde_json::json!({"type": "TEXT_MESSAGE_START"}),
            })
            .unwrap();
        assert_eq!(state, RunState::Streaming);
        assert_eq!(client.session().messages().len(), before_len);
    }

    #[test]
    fn test_late_run_finished_after_switch_mutates_nothing() {
        let transport = FakeTransport::default();
        let mut client = Client::new(Arc::new(transport));
        client.begin_run("on old thread").unwrap();

        // Switching retires the old session while the run is in flight.
        client.start_new_conversation();
        let thread_after_switch = client.thread_id().clone();

        let state = client
            .apply_event(ProtocolEvent::RunFinished {
                thread_id: None,
                run_id: None,
            })
            .unwrap();

        // The run stayed unresolved and the new session saw no mutation.
        assert_eq!(state, RunState::Submitted);
        assert_eq!(client.thread_id(), &thread_after_switch);
        assert!(client.session().messages().is_empty());
        assert!(client.transcript().is_empty());
    }

    #[test]
    fn test_submission_allowed_after_abandoning_run_on_switch() {
        let transport = FakeTransport::default();
        let mut client = Client::new(Arc::new(transport));
        client.begin_run("on old thread").unwrap();
        client.start_new_conversation();

        // The unresolved run belongs to a retired thread; a new submission
        // on the fresh session replaces it.
        assert!(client.begin_run("on new thread").is_ok());
    }
}
