//! Transport abstraction over the agent server's HTTP surface

use std::pin::Pin;

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest_eventsource::{Event, EventSource};
use tokio_stream::Stream;

use colloquy_protocol::{DisplayRecord, RunInput, ThreadId};

use crate::error::{Error, Result};

/// A stream of raw event payloads from one run submission.
///
/// Frames are surfaced undecoded so the decoder stays a separate stage;
/// transport-level failures appear as `Err` items and terminate the stream.
pub type EventFrameStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// The server endpoints the client consumes.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Submit a prompt run, streaming back framed protocol events
    async fn submit(&self, input: &RunInput) -> Result<EventFrameStream>;

    /// List known conversation thread ids
    async fn conversations(&self) -> Result<Vec<ThreadId>>;

    /// Fetch the persisted canonical snapshot envelope for a thread
    async fn snapshot_envelope(&self, thread_id: &ThreadId) -> Result<String>;

    /// Fetch the persisted display log for a thread
    async fn display_log(&self, thread_id: &ThreadId) -> Result<Vec<DisplayRecord>>;

    /// Fetch the raw persisted canonical log, for inspection only
    async fn raw_messages(&self, thread_id: &ThreadId) -> Result<serde_json::Value>;
}

/// HTTP transport against a running agent server.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Create a transport for the given base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn submit(&self, input: &RunInput) -> Result<EventFrameStream> {
        let request_builder = self.client.post(self.url("/chat/")).json(input);

        let mut event_source = EventSource::new(request_builder)
            .map_err(|e| Error::Sse(format!("Failed to create event source: {}", e)))?;

        let frames = stream! {
            while let Some(event) = event_source.next().await {
                match event {
                    Ok(Event::Open) => {}
                    Ok(Event::Message(msg)) => yield Ok(msg.data),
                    // The server closing the stream is the normal end of a
                    // run cycle; whether the run actually finished is the
                    // controller's call.
                    Err(reqwest_eventsource::Error::StreamEnded) => break,
                    Err(e) => {
                        yield Err(Error::Sse(e.to_string()));
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(frames))
    }

    async fn conversations(&self) -> Result<Vec<ThreadId>> {
        let response = self
            .client
            .get(self.url("/conversations/"))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn snapshot_envelope(&self, thread_id: &ThreadId) -> Result<String> {
        let response = self
            .client
            .post(self.url("/rehydrate/"))
            .json(&serde_json::json!({"conversation_id": thread_id}))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }

    async fn display_log(&self, thread_id: &ThreadId) -> Result<Vec<DisplayRecord>> {
        let response = self
            .client
            .get(self.url("/display-messages/"))
            .query(&[("conversation_id", thread_id.as_str())])
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn raw_messages(&self, thread_id: &ThreadId) -> Result<serde_json::Value> {
        let response = self
            .client
            .get(self.url("/messages/"))
            .query(&[("conversation_id", thread_id.as_str())])
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}
